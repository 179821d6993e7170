//! Workspace dictionary: build the codebook and prefix map, and apply or
//! reverse them across the memory files.

use crate::orchestrator::counter_for;
use crate::workspace::{
    collect_files, display_name, load_docs, read_text, write_atomic, Failure, CODEBOOK_FILE,
    PREFIX_MAP_FILE,
};
use claw_compactor::layer3_dictionary::compression_stats;
use claw_compactor::{build_codebook_with, Codebook, PrefixMap, RleCodec, TextCodec};
use claw_core::{reduction_pct, ClawConfig, CompactorError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Files currently holding encoded text, relative to the workspace.
pub const APPLIED_FILE: &str = "memory/.dict-applied.json";

#[derive(Debug, Clone, Serialize)]
pub struct DictReport {
    pub codebook_path: String,
    pub prefix_map_path: String,
    pub files_scanned: usize,
    pub codebook_entries: usize,
    pub prefix_entries: usize,
    pub codes_used: usize,
    pub gross_reduction_pct: f64,
    pub net_reduction_pct: f64,
    pub dry_run: bool,
    /// The persisted codebook was kept because encoded files still depend on it.
    pub reused: bool,
    pub failures: Vec<Failure>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ApplyReport {
    pub files: Vec<String>,
    pub tokens_before: usize,
    pub tokens_after: usize,
    pub reduction_pct: f64,
    pub dry_run: bool,
    pub failures: Vec<Failure>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct AppliedFiles {
    files: Vec<String>,
}

fn workspace_root(ws: &Path) -> String {
    ws.canonicalize().unwrap_or_else(|_| ws.to_path_buf()).display().to_string()
}

fn memory_docs(ws: &Path, config: &ClawConfig) -> Result<(Vec<PathBuf>, Vec<(String, String)>, Vec<Failure>)> {
    let applied = load_applied(ws)?;
    let files: Vec<PathBuf> = collect_files(ws, None)?
        .into_iter()
        .filter(|f| !applied.files.contains(&display_name(ws, f)))
        .collect();
    let (docs, failures) = load_docs(ws, &files, config.limits.max_file_bytes);
    Ok((files, docs, failures))
}

/// Learn a codebook and prefix map from every plain memory file and persist
/// both under `memory/`. Files already encoded are left out of the corpus.
///
/// While any file is still encoded, the persisted codebook and prefix map
/// are loaded and returned unchanged instead of being rebuilt.
pub fn build_dictionary(ws: &Path, config: &ClawConfig, dry_run: bool) -> Result<(DictReport, Codebook, PrefixMap)> {
    let (_, docs, failures) = memory_docs(ws, config)?;
    let texts: Vec<&str> = docs.iter().map(|(_, t)| t.as_str()).collect();
    let codebook_path = ws.join(CODEBOOK_FILE);
    let prefix_map_path = ws.join(PREFIX_MAP_FILE);

    let (codebook, prefix_map, reused) = match persisted_dictionary(ws)? {
        Some((codebook, prefix_map)) => (codebook, prefix_map, true),
        None => {
            let codebook = build_codebook_with(&texts, &config.dictionary);
            let root = workspace_root(ws);
            let prefix_map = RleCodec::learn(&[root.as_str()], &texts).into_prefix_map();
            if !dry_run && !docs.is_empty() {
                codebook.save(&codebook_path)?;
                prefix_map.save(&prefix_map_path)?;
            }
            (codebook, prefix_map, false)
        }
    };

    let combined = texts.join("\n");
    let stats = compression_stats(&combined, &codebook.compress(&combined), &codebook);
    info!(entries = codebook.len(), files = docs.len(), dry_run, reused, "dictionary built");

    let report = DictReport {
        codebook_path: codebook_path.display().to_string(),
        prefix_map_path: prefix_map_path.display().to_string(),
        files_scanned: docs.len(),
        codebook_entries: codebook.len(),
        prefix_entries: prefix_map.len(),
        codes_used: stats.codes_used,
        gross_reduction_pct: stats.gross_reduction_pct,
        net_reduction_pct: stats.net_reduction_pct,
        dry_run,
        reused,
        failures,
    };
    Ok((report, codebook, prefix_map))
}

/// The codebook and prefix map encoded files were written with, if any
/// file is still encoded.
fn persisted_dictionary(ws: &Path) -> Result<Option<(Codebook, PrefixMap)>> {
    let applied = load_applied(ws)?;
    if applied.files.is_empty() {
        return Ok(None);
    }
    let codebook_path = ws.join(CODEBOOK_FILE);
    let prefix_map_path = ws.join(PREFIX_MAP_FILE);
    if !codebook_path.is_file() || !prefix_map_path.is_file() {
        return Err(CompactorError::InvalidArgument(format!(
            "{} encoded file(s) listed in {APPLIED_FILE} but the dictionary is missing; restore {CODEBOOK_FILE} and {PREFIX_MAP_FILE}",
            applied.files.len()
        )));
    }
    Ok(Some((Codebook::load(&codebook_path)?, PrefixMap::load(&prefix_map_path)?)))
}

fn load_applied(ws: &Path) -> Result<AppliedFiles> {
    let path = ws.join(APPLIED_FILE);
    if !path.is_file() {
        return Ok(AppliedFiles::default());
    }
    let text = std::fs::read_to_string(&path).map_err(|e| CompactorError::io(&path, e))?;
    serde_json::from_str(&text).map_err(|e| CompactorError::parse(&path, e.to_string()))
}

fn save_applied(ws: &Path, applied: &AppliedFiles) -> Result<()> {
    write_atomic(&ws.join(APPLIED_FILE), &(serde_json::to_string_pretty(applied)? + "\n"))
}

/// Encode every plain memory file with the codebook, then the RLE codec.
/// Files containing text that would collide with a code are skipped.
pub fn apply_dictionary(
    ws: &Path,
    codebook: &Codebook,
    prefix_map: &PrefixMap,
    config: &ClawConfig,
    dry_run: bool,
) -> Result<ApplyReport> {
    let counter = counter_for(config);
    let rle = RleCodec::new(prefix_map.clone());
    let mut applied = load_applied(ws)?;
    let (files, _, _) = memory_docs(ws, config)?;
    let mut report = ApplyReport { dry_run, ..Default::default() };

    for file in &files {
        let name = display_name(ws, file);
        let result = read_text(file, config.limits.max_file_bytes).and_then(|text| {
            if !codebook.is_safe_for(&text) {
                return Err(CompactorError::InvalidArgument(format!(
                    "text collides with codebook codes: {}",
                    codebook.conflicts_in(&text).join(", ")
                )));
            }
            let encoded = rle.compress(&codebook.compress(&text));
            Ok((counter.count(&text), counter.count(&encoded), encoded))
        });
        match result {
            Ok((before, after, encoded)) => {
                if !dry_run {
                    if let Err(e) = write_atomic(file, &encoded) {
                        report.failures.push(Failure::new(file, &e));
                        continue;
                    }
                    applied.files.push(name.clone());
                }
                report.tokens_before += before;
                report.tokens_after += after;
                report.files.push(name);
            }
            Err(e) => {
                warn!(file = %file.display(), "dictionary apply skipped: {e}");
                report.failures.push(Failure::new(file, &e));
            }
        }
    }
    if !dry_run {
        applied.files.sort();
        applied.files.dedup();
        save_applied(ws, &applied)?;
    }
    report.reduction_pct = reduction_pct(report.tokens_before, report.tokens_after);
    Ok(report)
}

/// Reverse [`apply_dictionary`] using the persisted codebook and prefix map.
/// Only files recorded as encoded are touched.
pub fn decompress_dictionary(ws: &Path, config: &ClawConfig, dry_run: bool) -> Result<ApplyReport> {
    let counter = counter_for(config);
    let codebook = Codebook::load(ws.join(CODEBOOK_FILE))?;
    let rle = RleCodec::new(PrefixMap::load(ws.join(PREFIX_MAP_FILE))?);
    let mut applied = load_applied(ws)?;
    let mut report = ApplyReport { dry_run, ..Default::default() };
    let mut restored = Vec::new();

    for name in &applied.files {
        let file = ws.join(name);
        let result = read_text(&file, config.limits.max_file_bytes).and_then(|text| {
            let decoded = codebook.decompress(&rle.decompress(&text));
            if !dry_run {
                write_atomic(&file, &decoded)?;
            }
            Ok((counter.count(&text), counter.count(&decoded)))
        });
        match result {
            Ok((before, after)) => {
                report.tokens_before += before;
                report.tokens_after += after;
                report.files.push(name.clone());
                restored.push(name.clone());
            }
            Err(e) => report.failures.push(Failure::new(&file, &e)),
        }
    }
    if !dry_run {
        applied.files.retain(|f| !restored.contains(f));
        save_applied(ws, &applied)?;
    }
    report.reduction_pct = reduction_pct(report.tokens_before, report.tokens_after);
    Ok(report)
}
