//! Non-destructive, stage-by-stage savings report for a workspace.

use crate::orchestrator::counter_for;
use crate::workspace::{collect_files, load_docs, session_files, Failure};
use claw_compactor::layer2_tokenizer::optimize_tokens_with;
use claw_compactor::{build_codebook_with, RleCodec, RulePipeline, TextCodec};
use claw_core::{reduction_pct, ClawConfig, Result, TokenCounter};
use serde::Serialize;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkStep {
    pub name: &'static str,
    pub before: usize,
    pub after: usize,
    pub saved: usize,
    pub pct: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkReport {
    pub tokenizer: &'static str,
    pub files: usize,
    pub baseline_tokens: usize,
    pub steps: Vec<BenchmarkStep>,
    pub total_after: usize,
    pub total_saved: usize,
    pub total_pct: f64,
    pub session_transcripts: usize,
    pub failures: Vec<Failure>,
}

impl BenchmarkReport {
    pub fn step(&self, name: &str) -> Option<&BenchmarkStep> {
        self.steps.iter().find(|s| s.name == name)
    }

    pub fn recommendations(&self) -> Vec<String> {
        let mut out = Vec::new();
        if self.total_pct < 5.0 {
            out.push("Workspace is already well-optimized".to_string());
        } else {
            let pct = |name: &str| self.step(name).map_or(0.0, |s| s.pct);
            if pct("rule_engine") > 3.0 {
                out.push("Run `compress` to apply rule engine savings".to_string());
            }
            if pct("dictionary") > 2.0 {
                out.push("Run `dict --apply` to apply dictionary compression".to_string());
            }
            if pct("tokenizer_opt") > 1.0 {
                out.push("Run `optimize` for tokenizer-level savings".to_string());
            }
        }
        if self.session_transcripts > 0 {
            out.push(format!(
                "Run `observe` to compress {} session transcript(s)",
                self.session_transcripts
            ));
        }
        out
    }
}

/// A stage output that would raise the count is replaced by its input.
fn guarded_step(
    name: &'static str,
    counter: &TokenCounter,
    input: String,
    before: usize,
    f: impl FnOnce(&str) -> String,
) -> (String, BenchmarkStep) {
    let candidate = f(&input);
    let candidate_tokens = counter.count(&candidate);
    let (text, after) = if candidate_tokens <= before {
        (candidate, candidate_tokens)
    } else {
        debug!(stage = name, before, candidate_tokens, "stage discarded");
        (input, before)
    };
    let step = BenchmarkStep {
        name,
        before,
        after,
        saved: before - after,
        pct: reduction_pct(before, after),
    };
    (text, step)
}

/// Run baseline, rule engine, dictionary, tokenizer optimizer and RLE over
/// the combined corpus without touching any file. Token counts never rise
/// from one step to the next.
pub fn benchmark(ws: &Path, config: &ClawConfig) -> Result<BenchmarkReport> {
    let counter = counter_for(config);
    let files = collect_files(ws, None)?;
    let (docs, failures) = load_docs(ws, &files, config.limits.max_file_bytes);
    let combined = docs.iter().map(|(_, text)| text.as_str()).collect::<Vec<_>>().join("\n");
    let baseline = counter.count(&combined);

    let rules = RulePipeline::new(config.rules.clone(), counter);
    let mut steps = Vec::new();
    let (text, step) = guarded_step("rule_engine", &counter, combined, baseline, |s| rules.run(s).output);
    let mut tokens = step.after;
    steps.push(step);

    let (text, step) = guarded_step("dictionary", &counter, text, tokens, |s| {
        build_codebook_with(&[s], &config.dictionary).compress(s)
    });
    tokens = step.after;
    steps.push(step);

    let (text, step) = guarded_step("tokenizer_opt", &counter, text, tokens, |s| {
        optimize_tokens_with(&counter, s, true)
    });
    tokens = step.after;
    steps.push(step);

    let root = ws.canonicalize().unwrap_or_else(|_| ws.to_path_buf()).display().to_string();
    let (_, step) = guarded_step("rle", &counter, text, tokens, |s| {
        RleCodec::learn(&[root.as_str()], &[s]).compress(s)
    });
    tokens = step.after;
    steps.push(step);

    Ok(BenchmarkReport {
        tokenizer: counter.name(),
        files: docs.len(),
        baseline_tokens: baseline,
        steps,
        total_after: tokens,
        total_saved: baseline - tokens,
        total_pct: reduction_pct(baseline, tokens),
        session_transcripts: session_files(&config.resolved_sessions_dir()).len(),
        failures,
    })
}
