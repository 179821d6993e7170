use super::{open_workspace, print_json, report_failures, Outcome};
use crate::workspace::{collect_files, load_docs, Failure};
use anyhow::Result;
use clap::Args;
use claw_compactor::dedup::{find_duplicate_sections, DuplicateCluster, SIMILARITY_THRESHOLD};
use claw_compactor::sections::parse_sections;
use claw_core::CompactorError;
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Args)]
pub struct DedupArgs {
    pub workspace: PathBuf,
    /// Jaccard similarity at which sections count as duplicates
    #[arg(long, default_value_t = SIMILARITY_THRESHOLD)]
    pub threshold: f64,
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
pub struct DedupReport {
    pub total_entries: usize,
    pub duplicate_groups: Vec<DuplicateCluster>,
    pub redundant_tokens: usize,
}

/// Report-only scan for near-duplicate sections across the workspace.
pub fn scan(ws: &Path, threshold: f64, max_file_bytes: u64) -> Result<(DedupReport, Vec<Failure>)> {
    let files = collect_files(ws, None)?;
    let (docs, failures) = load_docs(ws, &files, max_file_bytes);
    let total_entries = docs
        .iter()
        .map(|(_, text)| parse_sections(text).iter().filter(|s| !s.body.is_empty()).count())
        .sum();
    let duplicate_groups = find_duplicate_sections(&docs, threshold);
    let redundant_tokens = duplicate_groups.iter().map(|g| g.redundant_tokens).sum();
    Ok((DedupReport { total_entries, duplicate_groups, redundant_tokens }, failures))
}

pub fn run(args: &DedupArgs) -> Result<Outcome> {
    if !(0.0..=1.0).contains(&args.threshold) {
        return Err(CompactorError::InvalidArgument(format!(
            "--threshold must be within 0..1, got {}",
            args.threshold
        ))
        .into());
    }
    let (ws, config) = open_workspace(&args.workspace)?;
    let (report, failures) = scan(&ws, args.threshold, config.limits.max_file_bytes)?;

    if args.json {
        print_json(&report)?;
    } else {
        println!(
            "{} sections scanned, {} duplicate group(s), {} redundant tokens",
            report.total_entries,
            report.duplicate_groups.len(),
            report.redundant_tokens
        );
        for (i, group) in report.duplicate_groups.iter().enumerate() {
            println!("\nGroup {} (similarity {:.2}):", i + 1, group.similarity);
            for entry in &group.entries {
                println!("  {} # {}: {}", entry.file, entry.header, entry.preview);
            }
        }
    }
    report_failures(&failures);
    Ok(if report.total_entries == 0 { Outcome::NoWork } else { Outcome::Done })
}
