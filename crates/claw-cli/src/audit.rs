//! Workspace memory health check.

use crate::observe::load_tracker;
use crate::orchestrator::counter_for;
use crate::workspace::{
    age_days, collect_files, display_name, read_text, session_files, Failure, CODEBOOK_FILE,
    MEMORY_INDEX_FILE, PREFIX_MAP_FILE,
};
use claw_core::{ClawConfig, Result};
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Clone, Serialize)]
pub struct FileAudit {
    pub file: String,
    pub tokens: usize,
    pub age_days: u64,
    pub stale: bool,
    pub oversized: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditReport {
    pub workspace: String,
    pub files: Vec<FileAudit>,
    pub total_tokens: usize,
    pub stale_files: usize,
    pub oversized_files: usize,
    pub has_memory_index: bool,
    pub has_codebook: bool,
    pub has_prefix_map: bool,
    pub pending_sessions: usize,
    pub health_score: u8,
    pub recommendations: Vec<String>,
    pub failures: Vec<Failure>,
}

fn health_score(report: &AuditReport) -> u8 {
    let mut penalty = 0usize;
    penalty += (report.stale_files * 10).min(30);
    penalty += (report.oversized_files * 10).min(30);
    if !report.has_memory_index {
        penalty += 10;
    }
    if !report.has_codebook {
        penalty += 5;
    }
    penalty += (report.pending_sessions * 2).min(20);
    100usize.saturating_sub(penalty) as u8
}

fn recommendations(report: &AuditReport, stale_days: u64) -> Vec<String> {
    let mut out = Vec::new();
    if report.files.is_empty() {
        out.push("No memory files found".to_string());
        return out;
    }
    if report.stale_files > 0 {
        out.push(format!(
            "{} file(s) untouched for {stale_days}+ days: run `compress --older-than {stale_days}`",
            report.stale_files
        ));
    }
    if report.oversized_files > 0 {
        out.push(format!(
            "{} oversized file(s): run `tiers` to build bounded summaries",
            report.oversized_files
        ));
    }
    if !report.has_memory_index {
        out.push(format!("Create {MEMORY_INDEX_FILE} as the memory entry point"));
    }
    if !report.has_codebook {
        out.push("Run `dict` to build a codebook".to_string());
    }
    if report.pending_sessions > 0 {
        out.push(format!(
            "Run `observe` to compress {} pending session transcript(s)",
            report.pending_sessions
        ));
    }
    if out.is_empty() {
        out.push("Memory is healthy".to_string());
    }
    out
}

pub fn audit_workspace(ws: &Path, config: &ClawConfig, stale_days: u64) -> Result<AuditReport> {
    let counter = counter_for(config);
    let mut files = Vec::new();
    let mut failures = Vec::new();
    for path in collect_files(ws, None)? {
        match read_text(&path, config.limits.max_file_bytes) {
            Ok(text) => {
                let tokens = counter.count(&text);
                let age = age_days(&path);
                files.push(FileAudit {
                    file: display_name(ws, &path),
                    tokens,
                    age_days: age,
                    stale: age >= stale_days,
                    oversized: tokens > config.audit.oversized_tokens,
                });
            }
            Err(e) => failures.push(Failure::new(&path, &e)),
        }
    }

    let tracker = load_tracker(ws).unwrap_or_default();
    let pending_sessions = session_files(&config.resolved_sessions_dir())
        .iter()
        .filter(|f| {
            f.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| !tracker.contains_key(n))
        })
        .count();

    let mut report = AuditReport {
        workspace: ws.display().to_string(),
        total_tokens: files.iter().map(|f| f.tokens).sum(),
        stale_files: files.iter().filter(|f| f.stale).count(),
        oversized_files: files.iter().filter(|f| f.oversized).count(),
        files,
        has_memory_index: ws.join(MEMORY_INDEX_FILE).is_file(),
        has_codebook: ws.join(CODEBOOK_FILE).is_file(),
        has_prefix_map: ws.join(PREFIX_MAP_FILE).is_file(),
        pending_sessions,
        health_score: 0,
        recommendations: Vec::new(),
        failures,
    };
    report.health_score = health_score(&report);
    report.recommendations = recommendations(&report, stale_days);
    Ok(report)
}
