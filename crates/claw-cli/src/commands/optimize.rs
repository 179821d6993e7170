use super::{open_workspace, print_json, report_failures, Outcome};
use crate::orchestrator::optimize_files;
use crate::workspace::collect_files;
use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct OptimizeArgs {
    pub workspace: PathBuf,
    #[arg(long)]
    pub dry_run: bool,
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: &OptimizeArgs) -> Result<Outcome> {
    let (ws, config) = open_workspace(&args.workspace)?;
    let files = collect_files(&ws, None)?;
    if files.is_empty() {
        eprintln!("No files found.");
        return Ok(Outcome::NoWork);
    }
    let report = optimize_files(&ws, &files, args.dry_run, &config);

    if args.json {
        print_json(&report)?;
    } else {
        println!(
            "Tokenizer optimization: {} → {} tokens (saved {}){}",
            report.total_before,
            report.total_after,
            report.total_saved(),
            if args.dry_run { " [dry run]" } else { "" }
        );
    }
    report_failures(&report.failures);
    Ok(if report.files.is_empty() { Outcome::NoWork } else { Outcome::Done })
}
