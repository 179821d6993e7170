use super::{config_root, print_json, report_failures, Outcome};
use crate::orchestrator::estimate_files;
use crate::workspace::collect_files;
use anyhow::Result;
use clap::Args;
use claw_core::ClawConfig;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct EstimateArgs {
    /// Markdown file or directory
    pub path: PathBuf,
    /// Only list files with at least N tokens
    #[arg(long, value_name = "N", default_value_t = 0)]
    pub threshold: usize,
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: &EstimateArgs) -> Result<Outcome> {
    let files = collect_files(&args.path, None)?;
    if files.is_empty() {
        eprintln!("No markdown files found.");
        return Ok(Outcome::NoWork);
    }
    let root = config_root(&args.path);
    let config = ClawConfig::load_for_workspace(root)?;
    let report = estimate_files(root, &files, args.threshold, &config);

    if args.json {
        print_json(&report)?;
    } else {
        for f in &report.files {
            println!("{:>8} tokens  {}", f.tokens, f.file);
        }
        println!("{:>8} tokens  total ({})", report.total_tokens, report.tokenizer);
    }
    report_failures(&report.failures);
    Ok(Outcome::Done)
}
