use crate::audit::*;
use crate::benchmark::*;
use crate::dict::*;
use crate::observe::*;
use crate::orchestrator::*;
use crate::tiers::*;
use crate::workspace::*;
use chrono::NaiveDate;
use claw_compactor::sections::Section;
use claw_core::{ClawConfig, TokenCounter, TokenizerKind};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

const NOTES: &str = "# Notes\n- Server IP: 192.168.1.100\n- Server IP: 192.168.1.100\n🎉 done\n\n\n\n## Empty\n";

fn write(dir: &Path, rel: &str, contents: &str) -> PathBuf {
    let path = dir.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, contents).unwrap();
    path
}

fn age(path: &Path, days: u64) {
    let when = SystemTime::now() - Duration::from_secs(days * 86_400);
    File::options().write(true).open(path).unwrap().set_modified(when).unwrap();
}

/// Heuristic tokenizer, sessions read from `sessions`.
fn test_config(sessions: &Path) -> ClawConfig {
    let mut config = ClawConfig::default();
    config.tokenizer.model = TokenizerKind::Heuristic;
    config.sessions.sessions_dir = sessions.display().to_string();
    config
}

// ========== Workspace ==========

#[test]
fn test_collect_files_sorted_and_filtered() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "b.md", "b");
    write(dir.path(), "a.md", "a");
    write(dir.path(), "memory/c.md", "c");
    write(dir.path(), "notes.txt", "txt");
    write(dir.path(), ".hidden/d.md", "d");
    write(dir.path(), "memory/.codebook.json", "{}");

    let names: Vec<String> = collect_files(dir.path(), None)
        .unwrap()
        .iter()
        .map(|f| display_name(dir.path(), f))
        .collect();
    assert_eq!(names, vec!["a.md", "b.md", "memory/c.md"]);
}

#[test]
fn test_collect_single_file_and_missing() {
    let dir = TempDir::new().unwrap();
    let file = write(dir.path(), "x.md", "x");
    assert_eq!(collect_files(&file, None).unwrap(), vec![file]);

    let err = collect_files(&dir.path().join("nope"), None).unwrap_err();
    assert_eq!(err.kind(), "not_found");
}

#[test]
fn test_collect_older_than() {
    let dir = TempDir::new().unwrap();
    let old = write(dir.path(), "old.md", "old");
    write(dir.path(), "new.md", "new");
    age(&old, 30);
    assert_eq!(collect_files(dir.path(), Some(7)).unwrap(), vec![old.clone()]);
    assert!(age_days(&old) >= 29);
}

#[test]
fn test_read_text_limit() {
    let dir = TempDir::new().unwrap();
    let file = write(dir.path(), "big.md", "0123456789");
    assert_eq!(read_text(&file, 10).unwrap(), "0123456789");
    assert_eq!(read_text(&file, 5).unwrap_err().kind(), "file_too_large");
}

#[test]
fn test_write_atomic_creates_parents() {
    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("memory/observations/x.md");
    write_atomic(&dest, "hello").unwrap();
    assert_eq!(std::fs::read_to_string(&dest).unwrap(), "hello");
    write_atomic(&dest, "again").unwrap();
    assert_eq!(std::fs::read_to_string(&dest).unwrap(), "again");
}

#[test]
fn test_require_workspace() {
    let dir = TempDir::new().unwrap();
    let file = write(dir.path(), "a.md", "a");
    assert!(require_workspace(dir.path()).is_ok());
    assert_eq!(require_workspace(&file).unwrap_err().kind(), "invalid_argument");
    assert_eq!(require_workspace(&dir.path().join("missing")).unwrap_err().kind(), "not_found");
}

#[test]
fn test_session_files() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "b.jsonl", "");
    write(dir.path(), "a.jsonl", "");
    write(dir.path(), "c.json", "");
    let names: Vec<String> = session_files(dir.path())
        .iter()
        .map(|p| display_name(dir.path(), p))
        .collect();
    assert_eq!(names, vec!["a.jsonl", "b.jsonl"]);
    assert!(session_files(&dir.path().join("missing")).is_empty());
}

// ========== Compress ==========

#[test]
fn test_compress_dry_run_leaves_file() {
    let dir = TempDir::new().unwrap();
    let file = write(dir.path(), "notes.md", NOTES);
    let config = test_config(dir.path());
    let opts = CompressOptions { dry_run: true, ..Default::default() };

    let stats = compress_file(&file, &opts, &config).unwrap();
    assert!(stats.compressed_tokens < stats.original_tokens);
    assert!(stats.written_to.is_none());
    assert!(!stats.stages.is_empty());
    assert_eq!(std::fs::read_to_string(&file).unwrap(), NOTES);
}

#[test]
fn test_compress_in_place() {
    let dir = TempDir::new().unwrap();
    let file = write(dir.path(), "notes.md", NOTES);
    let config = test_config(dir.path());

    let stats = compress_file(&file, &CompressOptions::default(), &config).unwrap();
    assert_eq!(stats.written_to.as_deref(), Some(file.display().to_string().as_str()));
    let out = std::fs::read_to_string(&file).unwrap();
    assert_eq!(out.matches("192.168.1.100").count(), 1);
    assert!(!out.contains("## Empty"));
    assert!(stats.llm_prompt.is_none());

    // Already compressed: nothing further to write.
    let again = compress_file(&file, &CompressOptions::default(), &config).unwrap();
    assert!(again.written_to.is_none());
    assert_eq!(again.saved(), 0);
}

#[test]
fn test_compress_to_output_with_prompt() {
    let dir = TempDir::new().unwrap();
    let file = write(dir.path(), "notes.md", NOTES);
    let out = dir.path().join("out/notes.md");
    let config = test_config(dir.path());
    let opts = CompressOptions {
        output: Some(out.clone()),
        llm_prompt: true,
        target_pct: 30,
        ..Default::default()
    };

    let stats = compress_file(&file, &opts, &config).unwrap();
    assert_eq!(std::fs::read_to_string(&file).unwrap(), NOTES);
    assert!(out.is_file());
    assert!(stats.llm_prompt.unwrap().contains("30"));
}

#[test]
fn test_compress_files_output_needs_single_file() {
    let dir = TempDir::new().unwrap();
    let a = write(dir.path(), "a.md", NOTES);
    let b = write(dir.path(), "b.md", NOTES);
    let opts = CompressOptions { output: Some(dir.path().join("o.md")), ..Default::default() };
    let err = compress_files(&[a, b], &opts, &test_config(dir.path())).unwrap_err();
    assert_eq!(err.kind(), "invalid_argument");
}

#[test]
fn test_compress_files_collects_failures() {
    let dir = TempDir::new().unwrap();
    let small = write(dir.path(), "a.md", "# A\nshort\n");
    let big = write(dir.path(), "b.md", &"- line of filler text\n".repeat(20));
    let mut config = test_config(dir.path());
    config.limits.max_file_bytes = 100;
    let opts = CompressOptions { dry_run: true, ..Default::default() };

    let report = compress_files(&[small, big], &opts, &config).unwrap();
    assert_eq!(report.files.len(), 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].kind, "file_too_large");
    assert!(report.failures[0].file.ends_with("b.md"));
}

#[test]
fn test_optimize_files() {
    let dir = TempDir::new().unwrap();
    let file = write(dir.path(), "a.md", "Use **bold** and `word` here\n\n\n\nend");
    let config = test_config(dir.path());

    let dry = optimize_files(dir.path(), &[file.clone()], true, &config);
    assert!(dry.total_after < dry.total_before);
    assert!(std::fs::read_to_string(&file).unwrap().contains("**bold**"));

    let report = optimize_files(dir.path(), &[file.clone()], false, &config);
    assert_eq!(report.files[0].file, "a.md");
    let out = std::fs::read_to_string(&file).unwrap();
    assert!(!out.contains("**"));
    assert!(out.contains("bold"));
}

#[test]
fn test_estimate_threshold() {
    let dir = TempDir::new().unwrap();
    let a = write(dir.path(), "a.md", "tiny");
    let b = write(dir.path(), "b.md", &"word ".repeat(200));
    let report = estimate_files(dir.path(), &[a, b], 50, &test_config(dir.path()));
    assert_eq!(report.tokenizer, "heuristic");
    assert_eq!(report.files.len(), 1);
    assert_eq!(report.files[0].file, "b.md");
    assert_eq!(report.total_tokens, 1 + 250);
}

// ========== Benchmark ==========

#[test]
fn test_benchmark_steps_never_add_tokens() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "MEMORY.md", NOTES);
    write(
        dir.path(),
        "memory/infra.md",
        "## Servers\n- DB at 10.0.1.5, backup at 10.0.1.6\n- the shared storage bucket is full\n- the shared storage bucket is full\n\n| Tool | Path |\n|---|---|\n| Python | /usr/bin/python3 |\n",
    );
    write(dir.path(), "memory/log.md", "the shared storage bucket is full\n**note**: the shared storage bucket is full\n");
    let report = benchmark(dir.path(), &test_config(dir.path())).unwrap();

    assert_eq!(report.files, 3);
    let names: Vec<&str> = report.steps.iter().map(|s| s.name).collect();
    assert_eq!(names, vec!["rule_engine", "dictionary", "tokenizer_opt", "rle"]);
    let mut prev = report.baseline_tokens;
    for step in &report.steps {
        assert_eq!(step.before, prev);
        assert!(step.after <= step.before, "{} added tokens", step.name);
        prev = step.after;
    }
    assert_eq!(report.total_after, prev);
    assert!(report.total_after < report.baseline_tokens);
    assert_eq!(report.total_saved, report.baseline_tokens - report.total_after);
}

#[test]
fn test_benchmark_leaves_files_untouched() {
    let dir = TempDir::new().unwrap();
    let file = write(dir.path(), "a.md", NOTES);
    benchmark(dir.path(), &test_config(dir.path())).unwrap();
    assert_eq!(std::fs::read_to_string(file).unwrap(), NOTES);
}

#[test]
fn test_benchmark_empty_workspace() {
    let dir = TempDir::new().unwrap();
    let report = benchmark(dir.path(), &test_config(dir.path())).unwrap();
    assert_eq!(report.files, 0);
    assert_eq!(report.total_pct, 0.0);
    assert_eq!(report.recommendations(), vec!["Workspace is already well-optimized".to_string()]);
}

// ========== Tiers ==========

fn tier_docs() -> Vec<(String, String)> {
    vec![
        (
            "MEMORY.md".into(),
            "# Important Decisions\nUse postgres 16 at 10.0.1.5.\n\n## Archive\nold notes nobody reads any more, kept for history\n".into(),
        ),
        (
            "memory/log.md".into(),
            format!("# Daily log\n{}\n# Security config\nrotate keys at /etc/keys every 30 days\n", "filler words ".repeat(40)),
        ),
    ]
}

#[test]
fn test_tiers_nested_and_within_budget() {
    let today = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
    let report = generate_tiers_at(&tier_docs(), &[20, 40, 1000], &TokenCounter::heuristic(), today);
    assert_eq!(report.tiers.len(), 3);
    assert_eq!(report.total_sections, 4);

    let mut prev_used = 0;
    let mut prev_headers: Vec<String> = Vec::new();
    for tier in &report.tiers {
        assert!(tier.tokens_used <= tier.budget);
        assert!(tier.tokens_used >= prev_used);
        let headers: Vec<String> = tier.sections.iter().map(|s| s.header.clone()).collect();
        assert!(prev_headers.iter().all(|h| headers.contains(h)));
        assert!(tier.sections.windows(2).all(|w| w[0].priority >= w[1].priority));
        assert!(tier.render().starts_with(&format!("# Memory Summary L{}", tier.level)));
        prev_used = tier.tokens_used;
        prev_headers = headers;
    }
    assert_eq!(report.tiers[2].tokens_used, report.total_tokens);
}

#[test]
fn test_tiers_budget_floor() {
    let today = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
    let report = generate_tiers_at(&tier_docs(), &[500, 10, 10], &TokenCounter::heuristic(), today);
    assert!(report.tiers.iter().all(|t| t.budget == 500));
}

#[test]
fn test_section_priority() {
    let today = NaiveDate::from_ymd_opt(2026, 1, 10).unwrap();
    let section = |header: &str, body: &str| Section { header: header.into(), level: 2, body: body.into() };
    let high = section_priority(&section("Security config", "plain"), 5, today);
    let low = section_priority(&section("Archive", "plain"), 5, today);
    let plain = section_priority(&section("Notes", "plain"), 5, today);
    assert!(high > plain && plain > low);

    let recent = section_priority(&section("Notes 2026-01-09", "plain"), 5, today);
    let stale = section_priority(&section("Notes 2025-01-09", "plain"), 5, today);
    assert!(recent > stale);
    assert_eq!(stale, plain);
}

// ========== Audit ==========

#[test]
fn test_audit_flags_stale_and_missing_index() {
    let dir = TempDir::new().unwrap();
    let sessions = TempDir::new().unwrap();
    let old = write(dir.path(), "memory/old.md", "# Old\nstuff\n");
    write(dir.path(), "memory/new.md", "# New\nstuff\n");
    age(&old, 30);

    let report = audit_workspace(dir.path(), &test_config(sessions.path()), 14).unwrap();
    assert_eq!(report.files.len(), 2);
    assert_eq!(report.stale_files, 1);
    assert_eq!(report.oversized_files, 0);
    assert!(!report.has_memory_index);
    assert!(!report.has_codebook);
    assert_eq!(report.pending_sessions, 0);
    assert_eq!(report.health_score, 75);
    assert!(report.recommendations.iter().any(|r| r.contains("MEMORY.md")));
    assert!(report.recommendations.iter().any(|r| r.contains("--older-than 14")));
}

#[test]
fn test_audit_healthy_workspace() {
    let dir = TempDir::new().unwrap();
    let sessions = TempDir::new().unwrap();
    write(dir.path(), "MEMORY.md", "# Index\nsee memory/\n");
    write(dir.path(), CODEBOOK_FILE, "{}");
    let report = audit_workspace(dir.path(), &test_config(sessions.path()), 14).unwrap();
    assert!(report.has_memory_index && report.has_codebook);
    assert_eq!(report.health_score, 100);
    assert_eq!(report.recommendations, vec!["Memory is healthy".to_string()]);
}

#[test]
fn test_audit_counts_pending_sessions() {
    let dir = TempDir::new().unwrap();
    let sessions = TempDir::new().unwrap();
    write(dir.path(), "MEMORY.md", "# Index\n");
    write(sessions.path(), "a.jsonl", "");
    write(sessions.path(), "b.jsonl", "");
    write(dir.path(), TRACKER_FILE, r#"{"a.jsonl": "2026-01-01T00:00:00+00:00"}"#);
    let report = audit_workspace(dir.path(), &test_config(sessions.path()), 14).unwrap();
    assert_eq!(report.pending_sessions, 1);
    assert!(report.recommendations.iter().any(|r| r.contains("observe")));
}

// ========== Observe ==========

const SESSION: &str = concat!(
    r#"{"id":"1","role":"user","content":"please fix the build"}"#,
    "\n",
    r#"{"id":"2","role":"assistant","content":"Error: connection refused on port 5432"}"#,
    "\n",
    r#"{"id":"3","role":"assistant","content":"TODO: rotate the deploy key"}"#,
    "\n",
);

#[test]
fn test_parse_since() {
    assert_eq!(parse_since("2026-01-02").unwrap().to_rfc3339(), "2026-01-02T00:00:00+00:00");
    assert_eq!(
        parse_since("2026-01-02T03:04:05+02:00").unwrap().to_rfc3339(),
        "2026-01-02T01:04:05+00:00"
    );
    assert_eq!(parse_since("yesterday").unwrap_err().kind(), "invalid_argument");
}

#[test]
fn test_observe_writes_and_tracks() {
    let ws = TempDir::new().unwrap();
    let sessions = TempDir::new().unwrap();
    write(sessions.path(), "s1.jsonl", SESSION);
    write(sessions.path(), "quiet.jsonl", r#"{"role":"user","content":"hello there"}"#);
    let opts = ObserveOptions { sessions_dir: sessions.path().to_path_buf(), since: None, use_llm: false, max_file_bytes: 1 << 20 };
    let counter = TokenCounter::heuristic();

    let report = observe_sessions(ws.path(), &opts, &counter).unwrap();
    assert_eq!(report.processed(), 2);
    assert_eq!(report.total_tracked, 2);
    let s1 = report.sessions.iter().find(|s| s.file == "s1.jsonl").unwrap();
    assert_eq!(s1.turns, 3);
    assert_eq!(s1.observations, 2);
    let quiet = report.sessions.iter().find(|s| s.file == "quiet.jsonl").unwrap();
    assert!(quiet.output.is_none());

    let md = std::fs::read_to_string(ws.path().join(OBSERVATIONS_DIR).join("s1.md")).unwrap();
    assert!(md.starts_with("---\nsource: "));
    assert!(md.contains("count: 2"));
    assert!(md.contains("## Errors") && md.contains("5432"));
    assert!(!ws.path().join(OBSERVATIONS_DIR).join("quiet.md").exists());

    let tracker = load_tracker(ws.path()).unwrap();
    assert!(tracker.contains_key("s1.jsonl"));

    let again = observe_sessions(ws.path(), &opts, &counter).unwrap();
    assert_eq!(again.processed(), 0);
    assert_eq!(again.already_observed, 2);
}

#[test]
fn test_observe_since_filters_by_mtime() {
    let ws = TempDir::new().unwrap();
    let sessions = TempDir::new().unwrap();
    let old = write(sessions.path(), "old.jsonl", SESSION);
    write(sessions.path(), "new.jsonl", SESSION);
    age(&old, 10);
    let since = chrono::Utc::now() - chrono::Duration::days(2);
    let opts = ObserveOptions { sessions_dir: sessions.path().to_path_buf(), since: Some(since), use_llm: true, max_file_bytes: 1 << 20 };

    let report = observe_sessions(ws.path(), &opts, &TokenCounter::heuristic()).unwrap();
    assert_eq!(report.processed(), 1);
    assert_eq!(report.before_since, 1);
    assert_eq!(report.sessions[0].file, "new.jsonl");
    assert!(report.sessions[0].llm_prompt.is_some());
}

#[test]
fn test_observe_collects_bad_sessions() {
    let ws = TempDir::new().unwrap();
    let sessions = TempDir::new().unwrap();
    write(sessions.path(), "garbage.jsonl", "not json\nstill not json\n");
    let opts = ObserveOptions { sessions_dir: sessions.path().to_path_buf(), since: None, use_llm: false, max_file_bytes: 1 << 20 };
    let report = observe_sessions(ws.path(), &opts, &TokenCounter::heuristic()).unwrap();
    assert_eq!(report.processed(), 1);
    assert_eq!(report.sessions[0].turns, 0);
    assert_eq!(report.sessions[0].skipped_lines, 2);
}

#[test]
fn test_observe_records_oversized_session_as_failure() {
    let ws = TempDir::new().unwrap();
    let sessions = TempDir::new().unwrap();
    write(sessions.path(), "big.jsonl", SESSION);
    write(sessions.path(), "small.jsonl", r#"{"role":"user","content":"hi"}"#);
    let opts = ObserveOptions { sessions_dir: sessions.path().to_path_buf(), since: None, use_llm: false, max_file_bytes: 64 };

    let report = observe_sessions(ws.path(), &opts, &TokenCounter::heuristic()).unwrap();
    assert_eq!(report.processed(), 1);
    assert_eq!(report.sessions[0].file, "small.jsonl");
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].kind, "file_too_large");
    assert!(report.failures[0].file.ends_with("big.jsonl"));
    assert_eq!(report.total_tracked, 1);
}

// ========== Dictionary ==========

#[test]
fn test_dict_build_apply_decompress_round_trip() {
    let ws = TempDir::new().unwrap();
    let a_text = "# Storage\nthe shared storage bucket is full\nthe shared storage bucket is full again\n";
    let b_text = "# Ops\nwhen the shared storage bucket is full, page the on-call engineer\n";
    let a = write(ws.path(), "memory/a.md", a_text);
    let b = write(ws.path(), "memory/b.md", b_text);
    let config = test_config(ws.path());

    let (report, codebook, prefix_map) = build_dictionary(ws.path(), &config, false).unwrap();
    assert_eq!(report.files_scanned, 2);
    assert!(report.codebook_entries > 0);
    assert!(ws.path().join(CODEBOOK_FILE).is_file());
    assert!(ws.path().join(PREFIX_MAP_FILE).is_file());

    let applied = apply_dictionary(ws.path(), &codebook, &prefix_map, &config, false).unwrap();
    assert_eq!(applied.files.len(), 2);
    assert!(applied.failures.is_empty());
    assert_ne!(std::fs::read_to_string(&a).unwrap(), a_text);
    assert!(ws.path().join(APPLIED_FILE).is_file());

    // Encoded files are not fed back into the next codebook.
    let (rebuilt, _, _) = build_dictionary(ws.path(), &config, true).unwrap();
    assert_eq!(rebuilt.files_scanned, 0);

    let restored = decompress_dictionary(ws.path(), &config, false).unwrap();
    assert_eq!(restored.files.len(), 2);
    assert_eq!(std::fs::read_to_string(&a).unwrap(), a_text);
    assert_eq!(std::fs::read_to_string(&b).unwrap(), b_text);

    let (after, _, _) = build_dictionary(ws.path(), &config, true).unwrap();
    assert_eq!(after.files_scanned, 2);
}

#[test]
fn test_dict_rebuild_keeps_codebook_of_encoded_files() {
    let ws = TempDir::new().unwrap();
    let a_text = "# Backups\nthe nightly backup job rotates old archives\nthe nightly backup job rotates old archives\n";
    let a = write(ws.path(), "memory/a.md", a_text);
    let config = test_config(ws.path());

    let (_, codebook, prefix_map) = build_dictionary(ws.path(), &config, false).unwrap();
    apply_dictionary(ws.path(), &codebook, &prefix_map, &config, false).unwrap();
    let saved = std::fs::read_to_string(ws.path().join(CODEBOOK_FILE)).unwrap();

    let b_text = "keeps nightly snapshots of production data\nkeeps nightly snapshots of production data\n";
    let b = write(ws.path(), "memory/b.md", b_text);
    let (rebuilt, kept, _) = build_dictionary(ws.path(), &config, false).unwrap();
    assert!(rebuilt.reused);
    assert_eq!(rebuilt.files_scanned, 1);
    assert_eq!(kept, codebook);
    assert_eq!(std::fs::read_to_string(ws.path().join(CODEBOOK_FILE)).unwrap(), saved);

    let restored = decompress_dictionary(ws.path(), &config, false).unwrap();
    assert_eq!(restored.files, vec!["memory/a.md".to_string()]);
    assert_eq!(std::fs::read_to_string(&a).unwrap(), a_text);
    assert_eq!(std::fs::read_to_string(&b).unwrap(), b_text);

    let (fresh, _, _) = build_dictionary(ws.path(), &config, true).unwrap();
    assert!(!fresh.reused);
    assert_eq!(fresh.files_scanned, 2);
}

#[test]
fn test_dict_rebuild_without_persisted_codebook_fails() {
    let ws = TempDir::new().unwrap();
    write(ws.path(), "memory/a.md", "the nightly backup job rotates old archives\nthe nightly backup job rotates old archives\n");
    let config = test_config(ws.path());

    let (_, codebook, prefix_map) = build_dictionary(ws.path(), &config, false).unwrap();
    apply_dictionary(ws.path(), &codebook, &prefix_map, &config, false).unwrap();
    std::fs::remove_file(ws.path().join(CODEBOOK_FILE)).unwrap();

    let err = build_dictionary(ws.path(), &config, false).unwrap_err();
    assert_eq!(err.kind(), "invalid_argument");
    assert!(!ws.path().join(CODEBOOK_FILE).exists());
}

#[test]
fn test_dict_dry_run_writes_nothing() {
    let ws = TempDir::new().unwrap();
    let a_text = "the shared storage bucket is full\nthe shared storage bucket is full\n";
    let a = write(ws.path(), "a.md", a_text);
    let config = test_config(ws.path());

    let (report, codebook, prefix_map) = build_dictionary(ws.path(), &config, true).unwrap();
    assert!(report.dry_run);
    assert!(!ws.path().join(CODEBOOK_FILE).exists());

    let applied = apply_dictionary(ws.path(), &codebook, &prefix_map, &config, true).unwrap();
    assert!(applied.tokens_after <= applied.tokens_before);
    assert_eq!(std::fs::read_to_string(&a).unwrap(), a_text);
    assert!(!ws.path().join(APPLIED_FILE).exists());
}

#[test]
fn test_decompress_without_codebook_fails() {
    let ws = TempDir::new().unwrap();
    let err = decompress_dictionary(ws.path(), &test_config(ws.path()), false).unwrap_err();
    assert_eq!(err.kind(), "not_found");
}
