//! Workspace orchestration for the `claw-compact` binary: file collection,
//! per-file compression, dictionary management, dedup, tiers, audit,
//! benchmark and session observation.

pub mod audit;
pub mod benchmark;
pub mod commands;
pub mod dict;
pub mod observe;
pub mod orchestrator;
pub mod tiers;
pub mod workspace;

pub use audit::{audit_workspace, AuditReport, FileAudit};
pub use benchmark::{benchmark, BenchmarkReport, BenchmarkStep};
pub use dict::{apply_dictionary, build_dictionary, decompress_dictionary, ApplyReport, DictReport};
pub use observe::{observe_sessions, parse_since, ObserveOptions, ObserveReport, ObservedSession};
pub use orchestrator::{
    compress_file, compress_files, estimate_files, optimize_files, BatchReport, CompressOptions,
    EstimateReport, FileStats,
};
pub use tiers::{generate_tiers, Tier, TierReport, TierSection};
pub use workspace::{collect_files, Failure};

#[cfg(test)]
mod tests;
