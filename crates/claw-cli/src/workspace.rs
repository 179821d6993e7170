//! Workspace layout, file collection and atomic writes.

pub use claw_compactor::write_atomic;
use claw_core::{CompactorError, Result, TokenCounter};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

pub const MEMORY_DIR: &str = "memory";
pub const MEMORY_INDEX_FILE: &str = "MEMORY.md";
pub const CODEBOOK_FILE: &str = "memory/.codebook.json";
pub use claw_compactor::layer4_rle::PREFIX_MAP_FILE;

const SECS_PER_DAY: u64 = 86_400;

/// A file the orchestrator could not process.
#[derive(Debug, Clone, Serialize)]
pub struct Failure {
    pub file: String,
    pub kind: String,
    pub message: String,
}

impl Failure {
    pub fn new(path: &Path, err: &CompactorError) -> Self {
        Self {
            file: path.display().to_string(),
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

/// An existing directory, or `NotFound`/`InvalidArgument`.
pub fn require_workspace(path: &Path) -> Result<PathBuf> {
    if !path.exists() {
        return Err(CompactorError::not_found(path));
    }
    if !path.is_dir() {
        return Err(CompactorError::InvalidArgument(format!(
            "workspace is not a directory: {}",
            path.display()
        )));
    }
    Ok(path.to_path_buf())
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_str().is_some_and(|s| s.starts_with('.'))
}

fn modified(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Whole days since the file was last modified.
pub fn age_days(path: &Path) -> u64 {
    modified(path)
        .and_then(|m| SystemTime::now().duration_since(m).ok())
        .map(|d| d.as_secs() / SECS_PER_DAY)
        .unwrap_or(0)
}

/// `target` itself if it is a file, otherwise every `*.md` below it, in
/// sorted path order. Hidden files and directories are skipped.
/// With `older_than_days`, only files last modified at least that long ago.
pub fn collect_files(target: &Path, older_than_days: Option<u64>) -> Result<Vec<PathBuf>> {
    if !target.exists() {
        return Err(CompactorError::not_found(target));
    }
    let mut files = Vec::new();
    if target.is_file() {
        files.push(target.to_path_buf());
    } else {
        for entry in WalkDir::new(target)
            .into_iter()
            .filter_entry(|e| !is_hidden(e))
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            if entry.path().extension().is_some_and(|ext| ext == "md") {
                files.push(entry.into_path());
            }
        }
    }
    if let Some(days) = older_than_days {
        let cutoff = SystemTime::now()
            .checked_sub(Duration::from_secs(days.saturating_mul(SECS_PER_DAY)))
            .unwrap_or(SystemTime::UNIX_EPOCH);
        files.retain(|f| modified(f).is_some_and(|m| m <= cutoff));
    }
    files.sort();
    debug!(target = %target.display(), count = files.len(), "collected files");
    Ok(files)
}

/// Read a file as UTF-8, replacing invalid sequences. Files above `limit`
/// bytes are refused.
pub fn read_text(path: &Path, limit: u64) -> Result<String> {
    let meta = std::fs::metadata(path).map_err(|e| CompactorError::io(path, e))?;
    if meta.len() > limit {
        return Err(CompactorError::FileTooLarge {
            path: path.to_path_buf(),
            size: meta.len(),
            limit,
        });
    }
    let bytes = std::fs::read(path).map_err(|e| CompactorError::io(path, e))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// `path` relative to `base` when possible, for reports.
pub fn display_name(base: &Path, path: &Path) -> String {
    path.strip_prefix(base).unwrap_or(path).display().to_string()
}

/// Read every file, collecting the ones that fail.
pub fn load_docs(base: &Path, files: &[PathBuf], limit: u64) -> (Vec<(String, String)>, Vec<Failure>) {
    let mut docs = Vec::new();
    let mut failures = Vec::new();
    for file in files {
        match read_text(file, limit) {
            Ok(text) => docs.push((display_name(base, file), text)),
            Err(e) => failures.push(Failure::new(file, &e)),
        }
    }
    (docs, failures)
}

/// Total tokens over the markdown files of a workspace.
pub fn workspace_tokens(ws: &Path, counter: &TokenCounter, limit: u64) -> Result<usize> {
    let files = collect_files(ws, None)?;
    let (docs, _) = load_docs(ws, &files, limit);
    Ok(docs.iter().map(|(_, text)| counter.count(text)).sum())
}

/// `*.jsonl` transcripts directly inside `dir`, sorted. Missing dir is empty.
pub fn session_files(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "jsonl"))
        .collect();
    files.sort();
    files
}
