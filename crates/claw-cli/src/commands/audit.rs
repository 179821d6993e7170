use super::{open_workspace, print_json, report_failures, Outcome};
use crate::audit::audit_workspace;
use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct AuditArgs {
    pub workspace: PathBuf,
    /// Files untouched for this many days count as stale
    #[arg(long, value_name = "N")]
    pub stale_days: Option<u64>,
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: &AuditArgs) -> Result<Outcome> {
    let (ws, config) = open_workspace(&args.workspace)?;
    let stale_days = args.stale_days.unwrap_or(config.audit.stale_days);
    let report = audit_workspace(&ws, &config, stale_days)?;

    if args.json {
        print_json(&report)?;
    } else {
        println!("Memory Audit: {}", report.workspace);
        println!("====================");
        println!("Files:             {}", report.files.len());
        println!("Total tokens:      {}", report.total_tokens);
        println!("Stale files:       {}", report.stale_files);
        println!("Oversized files:   {}", report.oversized_files);
        println!("MEMORY.md:         {}", if report.has_memory_index { "present" } else { "missing" });
        println!("Codebook:          {}", if report.has_codebook { "present" } else { "missing" });
        println!("Prefix map:        {}", if report.has_prefix_map { "present" } else { "missing" });
        println!("Pending sessions:  {}", report.pending_sessions);
        println!("Health score:      {}/100", report.health_score);
        println!();
        println!("Recommendations:");
        for r in &report.recommendations {
            println!("  - {r}");
        }
    }
    report_failures(&report.failures);
    Ok(if report.files.is_empty() { Outcome::NoWork } else { Outcome::Done })
}
