use super::{config_root, print_json, report_failures, Outcome};
use crate::orchestrator::counter_for;
use crate::tiers::{generate_tiers, TierReport};
use crate::workspace::{collect_files, load_docs, write_atomic};
use anyhow::Result;
use clap::Args;
use claw_core::ClawConfig;
use std::path::{Path, PathBuf};

#[derive(Debug, Args)]
pub struct TiersArgs {
    /// Markdown file or directory
    pub path: PathBuf,
    /// Write summary-L0.md .. summary-L2.md here
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,
    #[arg(long)]
    pub json: bool,
}

/// Tier report over every markdown file under `path`.
pub fn build(path: &Path, config: &ClawConfig) -> Result<Option<TierReport>> {
    let files = collect_files(path, None)?;
    let (docs, failures) = load_docs(config_root(path), &files, config.limits.max_file_bytes);
    report_failures(&failures);
    if docs.is_empty() {
        return Ok(None);
    }
    Ok(Some(generate_tiers(&docs, &config.tiers.budgets, &counter_for(config))))
}

pub fn run(args: &TiersArgs) -> Result<Outcome> {
    let config = ClawConfig::load_for_workspace(config_root(&args.path))?;
    let Some(report) = build(&args.path, &config)? else {
        eprintln!("No memory files found.");
        return Ok(Outcome::NoWork);
    };

    let mut written = Vec::new();
    if let Some(dir) = &args.output_dir {
        for tier in &report.tiers {
            let dest = dir.join(format!("summary-L{}.md", tier.level));
            write_atomic(&dest, &tier.render())?;
            written.push(dest.display().to_string());
        }
    }

    if args.json {
        print_json(&serde_json::json!({
            "total_tokens": report.total_tokens,
            "total_sections": report.total_sections,
            "tiers": report.tiers,
            "written": written,
        }))?;
    } else {
        println!("{} sections, {} tokens total", report.total_sections, report.total_tokens);
        for tier in &report.tiers {
            println!(
                "Level {}: {}/{} tokens, {} section(s)",
                tier.level,
                tier.tokens_used,
                tier.budget,
                tier.sections.len()
            );
            for s in &tier.sections {
                println!("  [{:.2}] {} # {} ({} tokens)", s.priority, s.file, s.header, s.tokens);
            }
        }
        for path in &written {
            println!("Wrote {path}");
        }
    }
    Ok(Outcome::Done)
}
