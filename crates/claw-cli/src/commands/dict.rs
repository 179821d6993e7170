use super::{open_workspace, print_json, report_failures, Outcome};
use crate::dict::{apply_dictionary, build_dictionary, decompress_dictionary, ApplyReport};
use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct DictArgs {
    pub workspace: PathBuf,
    /// Also encode the memory files with the new codebook and prefix map
    #[arg(long, conflicts_with = "decompress")]
    pub apply: bool,
    /// Restore files encoded by a previous `--apply`
    #[arg(long)]
    pub decompress: bool,
    /// Report without writing anything
    #[arg(long)]
    pub dry_run: bool,
    #[arg(long)]
    pub json: bool,
}

fn print_apply(label: &str, report: &ApplyReport) {
    println!(
        "{label}: {} file(s), {} → {} tokens ({:.1}%){}",
        report.files.len(),
        report.tokens_before,
        report.tokens_after,
        report.reduction_pct,
        if report.dry_run { " [dry run]" } else { "" }
    );
}

pub fn run(args: &DictArgs) -> Result<Outcome> {
    let (ws, config) = open_workspace(&args.workspace)?;

    if args.decompress {
        let report = decompress_dictionary(&ws, &config, args.dry_run)?;
        if args.json {
            print_json(&report)?;
        } else {
            print_apply("Decompressed", &report);
        }
        report_failures(&report.failures);
        return Ok(if report.files.is_empty() { Outcome::NoWork } else { Outcome::Done });
    }

    let (build, codebook, prefix_map) = build_dictionary(&ws, &config, args.dry_run)?;
    if build.files_scanned == 0 {
        eprintln!("No markdown files found.");
        return Ok(Outcome::NoWork);
    }
    let applied = if args.apply {
        Some(apply_dictionary(&ws, &codebook, &prefix_map, &config, args.dry_run)?)
    } else {
        None
    };

    if args.json {
        print_json(&serde_json::json!({ "build": build, "apply": applied }))?;
    } else {
        println!(
            "Codebook: {} entries from {} files ({} prefix placeholders)",
            build.codebook_entries, build.files_scanned, build.prefix_entries
        );
        println!(
            "Estimated reduction: {:.1}% gross, {:.1}% net of codebook",
            build.gross_reduction_pct, build.net_reduction_pct
        );
        if build.reused {
            println!("Kept existing codebook: encoded files still depend on it");
        } else if build.dry_run {
            println!("Dry run: nothing written");
        } else {
            println!("Saved to: {}", build.codebook_path);
            println!("Prefix map: {}", build.prefix_map_path);
        }
        if let Some(report) = &applied {
            print_apply("Applied", report);
        }
    }
    report_failures(&build.failures);
    if let Some(report) = &applied {
        report_failures(&report.failures);
    }
    Ok(Outcome::Done)
}
