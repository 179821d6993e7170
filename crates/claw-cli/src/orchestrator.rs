//! Per-file compression and the workspace-wide rewrites built on it.

use crate::workspace::{display_name, read_text, write_atomic, Failure};
use claw_compactor::layer2_tokenizer::optimize_tokens_with;
use claw_compactor::{generate_llm_prompt, RulePipeline};
use claw_core::{reduction_pct, ClawConfig, CompactorError, Result, StageStats, TokenCounter};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const DEFAULT_TARGET_PCT: u8 = 40;

#[derive(Debug, Clone)]
pub struct CompressOptions {
    pub dry_run: bool,
    /// Write here instead of over the input. Single-file runs only.
    pub output: Option<PathBuf>,
    /// Attach a prompt for a further model-driven pass.
    pub llm_prompt: bool,
    pub target_pct: u8,
}

impl Default for CompressOptions {
    fn default() -> Self {
        Self { dry_run: false, output: None, llm_prompt: false, target_pct: DEFAULT_TARGET_PCT }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FileStats {
    pub file: String,
    pub original_tokens: usize,
    pub compressed_tokens: usize,
    pub reduction_pct: f64,
    /// Where the result went; `None` for dry runs and unchanged files.
    pub written_to: Option<String>,
    pub stages: Vec<StageStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_prompt: Option<String>,
}

impl FileStats {
    pub fn saved(&self) -> usize {
        self.original_tokens.saturating_sub(self.compressed_tokens)
    }
}

/// Aggregate over many files. Failures do not stop the run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub files: Vec<FileStats>,
    pub failures: Vec<Failure>,
    pub total_before: usize,
    pub total_after: usize,
    pub reduction_pct: f64,
}

impl BatchReport {
    fn push(&mut self, stats: FileStats) {
        self.total_before += stats.original_tokens;
        self.total_after += stats.compressed_tokens;
        self.reduction_pct = reduction_pct(self.total_before, self.total_after);
        self.files.push(stats);
    }

    pub fn total_saved(&self) -> usize {
        self.total_before.saturating_sub(self.total_after)
    }
}

pub fn counter_for(config: &ClawConfig) -> TokenCounter {
    TokenCounter::new(config.tokenizer.model)
}

fn write_result(source: &Path, changed: bool, opts: &CompressOptions, text: &str) -> Result<Option<String>> {
    if opts.dry_run {
        return Ok(None);
    }
    let dest = match &opts.output {
        Some(out) => out.as_path(),
        None if changed => source,
        None => return Ok(None),
    };
    write_atomic(dest, text)?;
    Ok(Some(dest.display().to_string()))
}

/// Rule-compress one file. Nothing is written until the pipeline has finished.
pub fn compress_file(path: &Path, opts: &CompressOptions, config: &ClawConfig) -> Result<FileStats> {
    let text = read_text(path, config.limits.max_file_bytes)?;
    let run = RulePipeline::new(config.rules.clone(), counter_for(config)).run(&text);
    let written_to = write_result(path, run.output != text, opts, &run.output)?;
    let llm_prompt = opts.llm_prompt.then(|| generate_llm_prompt(&run.output, opts.target_pct));

    info!(
        file = %path.display(),
        tokens_in = run.tokens_in,
        tokens_out = run.tokens_out,
        dry_run = opts.dry_run,
        "compressed"
    );
    Ok(FileStats {
        file: path.display().to_string(),
        original_tokens: run.tokens_in,
        compressed_tokens: run.tokens_out,
        reduction_pct: reduction_pct(run.tokens_in, run.tokens_out),
        written_to,
        stages: run.stages,
        llm_prompt,
    })
}

/// Compress each file in order, collecting failures instead of stopping.
pub fn compress_files(files: &[PathBuf], opts: &CompressOptions, config: &ClawConfig) -> Result<BatchReport> {
    if opts.output.is_some() && files.len() > 1 {
        return Err(CompactorError::InvalidArgument(
            "--output needs a single input file".into(),
        ));
    }
    let mut report = BatchReport::default();
    for file in files {
        match compress_file(file, opts, config) {
            Ok(stats) => report.push(stats),
            Err(e) => {
                warn!(file = %file.display(), "compress failed: {e}");
                report.failures.push(Failure::new(file, &e));
            }
        }
    }
    Ok(report)
}

/// Apply the aggressive tokenizer optimizer to every file.
pub fn optimize_files(base: &Path, files: &[PathBuf], dry_run: bool, config: &ClawConfig) -> BatchReport {
    let counter = counter_for(config);
    let mut report = BatchReport::default();
    for file in files {
        let result = read_text(file, config.limits.max_file_bytes).and_then(|text| {
            let optimized = optimize_tokens_with(&counter, &text, true);
            let changed = optimized != text;
            let written_to = if changed && !dry_run {
                write_atomic(file, &optimized)?;
                Some(file.display().to_string())
            } else {
                None
            };
            let (before, after) = (counter.count(&text), counter.count(&optimized));
            Ok(FileStats {
                file: display_name(base, file),
                original_tokens: before,
                compressed_tokens: after,
                reduction_pct: reduction_pct(before, after),
                written_to,
                stages: Vec::new(),
                llm_prompt: None,
            })
        });
        match result {
            Ok(stats) => report.push(stats),
            Err(e) => {
                warn!(file = %file.display(), "optimize failed: {e}");
                report.failures.push(Failure::new(file, &e));
            }
        }
    }
    report
}

#[derive(Debug, Clone, Serialize)]
pub struct FileEstimate {
    pub file: String,
    pub tokens: usize,
    pub chars: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct EstimateReport {
    pub tokenizer: &'static str,
    pub files: Vec<FileEstimate>,
    pub total_tokens: usize,
    pub failures: Vec<Failure>,
}

/// Token counts per file; files under `threshold` tokens are left out of the
/// listing but still counted in the total.
pub fn estimate_files(base: &Path, files: &[PathBuf], threshold: usize, config: &ClawConfig) -> EstimateReport {
    let counter = counter_for(config);
    let mut report = EstimateReport {
        tokenizer: counter.name(),
        files: Vec::new(),
        total_tokens: 0,
        failures: Vec::new(),
    };
    for file in files {
        match read_text(file, config.limits.max_file_bytes) {
            Ok(text) => {
                let tokens = counter.count(&text);
                report.total_tokens += tokens;
                if tokens >= threshold {
                    report.files.push(FileEstimate {
                        file: display_name(base, file),
                        tokens,
                        chars: text.chars().count(),
                    });
                }
            }
            Err(e) => report.failures.push(Failure::new(file, &e)),
        }
    }
    report
}
