use claw_cli::commands::{self, exit_code_for, Outcome};
use clap::{Parser, Subcommand};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "claw-compact", version, about = "Token compression for agent memory workspaces")]
struct Cli {
    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Rule-compress a markdown file or every markdown file in a directory
    Compress(commands::compress::CompressArgs),
    /// Report near-duplicate sections across the workspace
    Dedup(commands::dedup::DedupArgs),
    /// Build tiered summaries under token budgets
    Tiers(commands::tiers::TiersArgs),
    /// Check workspace memory health
    Audit(commands::audit::AuditArgs),
    /// Build the codebook and prefix map; optionally apply or reverse them
    Dict(commands::dict::DictArgs),
    /// Apply tokenizer-level rewrites in place
    Optimize(commands::optimize::OptimizeArgs),
    /// Measure each compression step without writing anything
    Benchmark(commands::benchmark::BenchmarkArgs),
    /// Extract observations from new session transcripts
    Observe(commands::observe::ObserveArgs),
    /// Count tokens per file
    Estimate(commands::estimate::EstimateArgs),
    /// compress, dict, dedup and tiers in one go
    Full(commands::full::FullArgs),
}

fn run(command: &Command) -> anyhow::Result<Outcome> {
    match command {
        Command::Compress(args) => commands::compress::run(args),
        Command::Dedup(args) => commands::dedup::run(args),
        Command::Tiers(args) => commands::tiers::run(args),
        Command::Audit(args) => commands::audit::run(args),
        Command::Dict(args) => commands::dict::run(args),
        Command::Optimize(args) => commands::optimize::run(args),
        Command::Benchmark(args) => commands::benchmark::run(args),
        Command::Observe(args) => commands::observe::run(args),
        Command::Estimate(args) => commands::estimate::run(args),
        Command::Full(args) => commands::full::run(args),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // stderr only: stdout carries --json output.
    let default = if cli.verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(&cli.command) {
        Ok(outcome) => ExitCode::from(outcome.exit_code()),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(exit_code_for(&e))
        }
    }
}
