//! Turn new session transcripts into observation files under `memory/`.

use crate::workspace::{session_files, write_atomic, Failure};
use chrono::{DateTime, NaiveDate, Utc};
use claw_core::{CompactorError, Result, TokenCounter};
use claw_session::compress_session_with;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const TRACKER_FILE: &str = "memory/.observed-sessions.json";
pub const OBSERVATIONS_DIR: &str = "memory/observations";

/// Session file name → time it was observed.
pub type Tracker = BTreeMap<String, String>;

#[derive(Debug, Clone)]
pub struct ObserveOptions {
    pub sessions_dir: PathBuf,
    /// Only sessions modified at or after this instant.
    pub since: Option<DateTime<Utc>>,
    pub use_llm: bool,
    /// Transcripts larger than this are recorded as failures.
    pub max_file_bytes: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ObservedSession {
    pub file: String,
    pub turns: usize,
    pub skipped_lines: usize,
    pub observations: usize,
    pub tokens_before: usize,
    pub tokens_after: usize,
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_prompt: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ObserveReport {
    pub sessions: Vec<ObservedSession>,
    pub already_observed: usize,
    pub before_since: usize,
    pub failures: Vec<Failure>,
    pub total_tracked: usize,
}

impl ObserveReport {
    pub fn processed(&self) -> usize {
        self.sessions.len()
    }
}

/// Accept an RFC 3339 timestamp or a bare `YYYY-MM-DD` (midnight UTC).
pub fn parse_since(value: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| CompactorError::InvalidArgument(format!("--since is not ISO 8601: {value}")))
}

pub fn load_tracker(ws: &Path) -> Result<Tracker> {
    let path = ws.join(TRACKER_FILE);
    if !path.is_file() {
        return Ok(Tracker::new());
    }
    let text = std::fs::read_to_string(&path).map_err(|e| CompactorError::io(&path, e))?;
    serde_json::from_str(&text).map_err(|e| CompactorError::parse(&path, e.to_string()))
}

fn save_tracker(ws: &Path, tracker: &Tracker) -> Result<()> {
    write_atomic(&ws.join(TRACKER_FILE), &(serde_json::to_string_pretty(tracker)? + "\n"))
}

fn modified_at(path: &Path) -> Option<DateTime<Utc>> {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .map(DateTime::<Utc>::from)
}

/// Process every transcript not yet in the tracker. Sessions without
/// observations are tracked but produce no file. A corrupt tracker starts
/// over empty.
pub fn observe_sessions(ws: &Path, opts: &ObserveOptions, counter: &TokenCounter) -> Result<ObserveReport> {
    let mut tracker = load_tracker(ws).unwrap_or_else(|e| {
        warn!("ignoring unreadable tracker: {e}");
        Tracker::new()
    });
    let out_dir = ws.join(OBSERVATIONS_DIR);
    let mut report = ObserveReport::default();

    for file in session_files(&opts.sessions_dir) {
        let Some(name) = file.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
            continue;
        };
        if tracker.contains_key(&name) {
            report.already_observed += 1;
            continue;
        }
        if let Some(since) = opts.since {
            if modified_at(&file).map_or(true, |m| m < since) {
                debug!(file = %name, "older than --since");
                report.before_since += 1;
                continue;
            }
        }

        let summary = compress_session_with(&file, opts.use_llm, counter, opts.max_file_bytes);
        let result = summary.and_then(|summary| {
            let output = if summary.markdown.is_empty() {
                None
            } else {
                let stem = file.file_stem().and_then(|s| s.to_str()).unwrap_or(&name);
                let dest = out_dir.join(format!("{stem}.md"));
                write_atomic(&dest, &summary.markdown)?;
                Some(dest.display().to_string())
            };
            Ok(ObservedSession {
                file: name.clone(),
                turns: summary.turns,
                skipped_lines: summary.skipped_lines,
                observations: summary.observation_count(),
                tokens_before: summary.tokens_before,
                tokens_after: summary.tokens_after,
                output,
                llm_prompt: summary.llm_prompt,
            })
        });
        match result {
            Ok(session) => {
                tracker.insert(name, Utc::now().to_rfc3339());
                report.sessions.push(session);
            }
            Err(e) => {
                warn!(file = %file.display(), "observe failed: {e}");
                report.failures.push(Failure::new(&file, &e));
            }
        }
    }

    if !report.sessions.is_empty() {
        save_tracker(ws, &tracker)?;
    }
    report.total_tracked = tracker.len();
    Ok(report)
}
