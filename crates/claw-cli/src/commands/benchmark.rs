use super::{open_workspace, print_json, report_failures, Outcome};
use crate::benchmark::benchmark;
use anyhow::Result;
use chrono::Local;
use clap::Args;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct BenchmarkArgs {
    pub workspace: PathBuf,
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: &BenchmarkArgs) -> Result<Outcome> {
    let (ws, config) = open_workspace(&args.workspace)?;
    let report = benchmark(&ws, &config)?;
    if report.files == 0 {
        eprintln!("No files found.");
        return Ok(Outcome::NoWork);
    }

    if args.json {
        print_json(&report)?;
    } else {
        println!("=== claw-compactor Performance Report ===");
        println!("Date: {}", Local::now().format("%Y-%m-%d"));
        println!("Tokenizer: {}", report.tokenizer);
        println!("Files: {}", report.files);
        println!();
        println!("{:<16} | {:>8} | {:>8} | {:>6} | {:>6}", "Step", "Before", "After", "Saved", "%");
        println!("{}", "-".repeat(56));
        for s in &report.steps {
            println!("{:<16} | {:>8} | {:>8} | {:>6} | {:>5.1}%", s.name, s.before, s.after, s.saved, s.pct);
        }
        println!("{}", "-".repeat(56));
        println!(
            "{:<16} | {:>8} | {:>8} | {:>6} | {:>5.1}%",
            "TOTAL", report.baseline_tokens, report.total_after, report.total_saved, report.total_pct
        );
        println!();
        println!("Session transcripts: {}", report.session_transcripts);
        println!();
        println!("Recommendations:");
        for r in report.recommendations() {
            println!("  - {r}");
        }
    }
    report_failures(&report.failures);
    Ok(Outcome::Done)
}
