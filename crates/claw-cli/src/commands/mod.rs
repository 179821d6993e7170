//! One module per subcommand. Each exposes its clap arguments and a `run`
//! that prints the report and returns an [`Outcome`].

pub mod audit;
pub mod benchmark;
pub mod compress;
pub mod dedup;
pub mod dict;
pub mod estimate;
pub mod full;
pub mod observe;
pub mod optimize;
pub mod tiers;

use crate::workspace::{require_workspace, Failure};
use anyhow::Result;
use claw_core::{ClawConfig, CompactorError};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Exit status for bad arguments or a missing workspace.
pub const EXIT_USAGE: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Done,
    /// Nothing to process: empty workspace, no matching files.
    NoWork,
}

impl Outcome {
    pub fn exit_code(self) -> u8 {
        match self {
            Outcome::Done => 0,
            Outcome::NoWork => 1,
        }
    }
}

/// Map a command error to its exit status.
pub fn exit_code_for(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<CompactorError>() {
        Some(CompactorError::NotFound { .. } | CompactorError::InvalidArgument(_)) => EXIT_USAGE,
        _ => 1,
    }
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub(crate) fn report_failures(failures: &[Failure]) {
    if failures.is_empty() {
        return;
    }
    eprintln!("{} file(s) failed:", failures.len());
    for f in failures {
        eprintln!("  {} [{}]: {}", f.file, f.kind, f.message);
    }
}

/// Validate the workspace and load its config overlay.
pub(crate) fn open_workspace(path: &Path) -> Result<(PathBuf, ClawConfig)> {
    let ws = require_workspace(path)?;
    let config = ClawConfig::load_for_workspace(&ws)?;
    Ok((ws, config))
}

/// Directory whose config overlay applies to `path`.
pub(crate) fn config_root(path: &Path) -> &Path {
    if path.is_dir() {
        path
    } else {
        path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."))
    }
}
