use super::{config_root, print_json, report_failures, Outcome};
use crate::orchestrator::{compress_files, CompressOptions, DEFAULT_TARGET_PCT};
use crate::workspace::collect_files;
use anyhow::Result;
use clap::Args;
use claw_core::ClawConfig;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct CompressArgs {
    /// Markdown file or directory
    pub path: PathBuf,
    /// Report savings without writing anything
    #[arg(long)]
    pub dry_run: bool,
    /// Write the result here instead of in place (single file only)
    #[arg(long, value_name = "FILE")]
    pub output: Option<PathBuf>,
    /// Only files last modified at least DAYS ago
    #[arg(long, value_name = "DAYS")]
    pub older_than: Option<u64>,
    /// Rule stages only, no model prompt (the default)
    #[arg(long)]
    pub no_llm: bool,
    /// Attach a prompt for a further model-driven pass
    #[arg(long, conflicts_with = "no_llm")]
    pub llm_prompt: bool,
    /// Target size for the model prompt, in percent
    #[arg(long, default_value_t = DEFAULT_TARGET_PCT, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub target_pct: u8,
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: &CompressArgs) -> Result<Outcome> {
    let files = collect_files(&args.path, args.older_than)?;
    if files.is_empty() {
        eprintln!("No files to compress.");
        return Ok(Outcome::NoWork);
    }
    let config = ClawConfig::load_for_workspace(config_root(&args.path))?;
    let opts = CompressOptions {
        dry_run: args.dry_run,
        output: args.output.clone(),
        llm_prompt: args.llm_prompt && !args.no_llm,
        target_pct: args.target_pct,
    };
    let report = compress_files(&files, &opts, &config)?;

    if args.json {
        print_json(&report)?;
    } else {
        for f in &report.files {
            println!(
                "{}: {} → {} tokens (saved {}, {:.1}%)",
                f.file,
                f.original_tokens,
                f.compressed_tokens,
                f.saved(),
                f.reduction_pct
            );
            if let Some(prompt) = &f.llm_prompt {
                println!("\n{prompt}");
            }
        }
        println!(
            "\nTotal: {} → {} tokens (saved {}){}",
            report.total_before,
            report.total_after,
            report.total_saved(),
            if args.dry_run { " [dry run]" } else { "" }
        );
    }
    report_failures(&report.failures);
    Ok(if report.files.is_empty() { Outcome::NoWork } else { Outcome::Done })
}
