use super::{open_workspace, print_json, report_failures, Outcome};
use crate::observe::{observe_sessions, parse_since, ObserveOptions};
use crate::orchestrator::counter_for;
use anyhow::Result;
use clap::Args;
use claw_core::config::expand_tilde;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct ObserveArgs {
    /// Only sessions modified at or after this time (RFC 3339 or YYYY-MM-DD)
    #[arg(long, value_name = "ISO8601")]
    pub since: Option<String>,
    /// Workspace receiving memory/observations
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub workspace: PathBuf,
    /// Transcript directory; defaults to the configured sessions dir
    #[arg(long, value_name = "DIR")]
    pub sessions_dir: Option<PathBuf>,
    /// Attach a prompt for model-driven extraction to each session
    #[arg(long)]
    pub llm_prompt: bool,
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: &ObserveArgs) -> Result<Outcome> {
    let since = args.since.as_deref().map(parse_since).transpose()?;
    let (ws, config) = open_workspace(&args.workspace)?;
    let sessions_dir = match &args.sessions_dir {
        Some(dir) => expand_tilde(&dir.to_string_lossy()),
        None => config.resolved_sessions_dir(),
    };
    if !sessions_dir.is_dir() {
        eprintln!("Sessions directory not found: {}", sessions_dir.display());
        return Ok(Outcome::NoWork);
    }

    let opts = ObserveOptions {
        sessions_dir,
        since,
        use_llm: args.llm_prompt,
        max_file_bytes: config.limits.max_file_bytes,
    };
    let report = observe_sessions(&ws, &opts, &counter_for(&config))?;

    if args.json {
        print_json(&report)?;
    } else {
        for s in &report.sessions {
            println!(
                "{}: {} turns, {} observation(s), {} → {} tokens",
                s.file, s.turns, s.observations, s.tokens_before, s.tokens_after
            );
            if let Some(out) = &s.output {
                println!("  → {out}");
            }
            if let Some(prompt) = &s.llm_prompt {
                println!("\n{prompt}");
            }
        }
        println!(
            "Observed {} session(s); {} already observed, {} before --since",
            report.processed(),
            report.already_observed,
            report.before_since
        );
    }
    report_failures(&report.failures);
    Ok(if report.processed() == 0 { Outcome::NoWork } else { Outcome::Done })
}
