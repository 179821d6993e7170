//! Session compressor: transcript file in, observation markdown out.

use crate::observer::{extract_observations, format_observations_md, generate_observation_prompt, Observation};
use crate::session::{parse_session_str, read_session};
use claw_core::{reduction_pct, ClawConfig, Result, TokenCounter};
use serde::Serialize;
use std::path::Path;
use tracing::info;

/// Outcome of compressing one transcript.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub file: String,
    pub turns: usize,
    pub skipped_lines: usize,
    pub observations: Vec<Observation>,
    pub tokens_before: usize,
    pub tokens_after: usize,
    pub reduction_pct: f64,
    /// Empty when nothing was observed.
    pub markdown: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_prompt: Option<String>,
}

impl SessionSummary {
    pub fn observation_count(&self) -> usize {
        self.observations.len()
    }
}

pub fn compress_session(path: impl AsRef<Path>, use_llm: bool) -> Result<SessionSummary> {
    let limit = ClawConfig::default().limits.max_file_bytes;
    compress_session_with(path, use_llm, &TokenCounter::global(), limit)
}

/// Parse, extract and render one transcript. Bad lines are counted in
/// `skipped_lines`; only an unreadable file or one over `max_bytes` fails.
pub fn compress_session_with(
    path: impl AsRef<Path>,
    use_llm: bool,
    counter: &TokenCounter,
    max_bytes: u64,
) -> Result<SessionSummary> {
    let path = path.as_ref();
    let raw = read_session(path, max_bytes)?;
    let tokens_before = counter.count(&raw);
    let parsed = parse_session_str(&raw);
    let observations = extract_observations(&parsed.turns);

    let markdown = if observations.is_empty() {
        String::new()
    } else {
        format_observations_md(&observations, &path.display().to_string())
    };
    let tokens_after = counter.count(&markdown);
    let llm_prompt = (use_llm && !parsed.turns.is_empty())
        .then(|| generate_observation_prompt(&parsed.turns));

    info!(
        file = %path.display(),
        turns = parsed.turns.len(),
        observations = observations.len(),
        tokens_before,
        tokens_after,
        "session compressed"
    );

    Ok(SessionSummary {
        file: path.display().to_string(),
        turns: parsed.turns.len(),
        skipped_lines: parsed.skipped_lines,
        observations,
        tokens_before,
        tokens_after,
        reduction_pct: reduction_pct(tokens_before, tokens_after),
        markdown,
        llm_prompt,
    })
}
