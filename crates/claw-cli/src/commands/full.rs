use super::{open_workspace, print_json, report_failures, tiers, Outcome};
use crate::dict::build_dictionary;
use crate::orchestrator::{compress_files, counter_for, CompressOptions};
use crate::workspace::{collect_files, workspace_tokens};
use anyhow::Result;
use clap::Args;
use claw_compactor::dedup::SIMILARITY_THRESHOLD;
use claw_core::reduction_pct;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Args)]
pub struct FullArgs {
    pub workspace: PathBuf,
    #[arg(long)]
    pub json: bool,
}

/// Compress in place, rebuild the dictionary, then report duplicates and tiers.
pub fn run(args: &FullArgs) -> Result<Outcome> {
    let (ws, config) = open_workspace(&args.workspace)?;
    let files = collect_files(&ws, None)?;
    if files.is_empty() {
        eprintln!("No memory files found.");
        return Ok(Outcome::NoWork);
    }
    let counter = counter_for(&config);
    let limit = config.limits.max_file_bytes;
    let before = workspace_tokens(&ws, &counter, limit)?;

    info!(step = "compress", files = files.len(), "full run");
    let compress = compress_files(&files, &CompressOptions::default(), &config)?;
    info!(step = "dict", "full run");
    let (dict, _, _) = build_dictionary(&ws, &config, false)?;
    info!(step = "dedup", "full run");
    let (dedup, dedup_failures) = super::dedup::scan(&ws, SIMILARITY_THRESHOLD, limit)?;
    info!(step = "tiers", "full run");
    let tiers = tiers::build(&ws, &config)?;

    let after = workspace_tokens(&ws, &counter, limit)?;
    let pct = reduction_pct(before, after);

    if args.json {
        print_json(&serde_json::json!({
            "tokens_before": before,
            "tokens_after": after,
            "reduction_pct": pct,
            "compress": compress,
            "dict": dict,
            "dedup": dedup,
            "tiers": tiers,
        }))?;
    } else {
        println!("compress: {} file(s), saved {} tokens", compress.files.len(), compress.total_saved());
        println!("dict: {} codebook entries, {} prefix placeholders", dict.codebook_entries, dict.prefix_entries);
        println!(
            "dedup: {} duplicate group(s), {} redundant tokens",
            dedup.duplicate_groups.len(),
            dedup.redundant_tokens
        );
        if let Some(tiers) = &tiers {
            for tier in &tiers.tiers {
                println!("tiers: Level {}: {}/{} tokens", tier.level, tier.tokens_used, tier.budget);
            }
        }
        println!("\nWorkspace: {before} → {after} tokens ({pct:.1}%)");
    }
    report_failures(&compress.failures);
    report_failures(&dict.failures);
    report_failures(&dedup_failures);
    Ok(Outcome::Done)
}
