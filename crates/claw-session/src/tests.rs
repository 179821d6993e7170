use crate::compressor::*;
use crate::observer::*;
use crate::session::*;
use std::path::PathBuf;
use tempfile::TempDir;

fn write_session(dir: &TempDir, name: &str, lines: &[&str]) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, lines.join("\n")).unwrap();
    path
}

fn turn(id: &str, content: &str) -> Turn {
    Turn { id: id.into(), role: Role::Assistant, content: content.into() }
}

// ========== Parsing ==========

#[test]
fn test_parse_flat_and_nested_shapes() {
    let parsed = parse_session_str(concat!(
        r#"{"id":"1","role":"user","content":"hello"}"#,
        "\n",
        r#"{"type":"message","id":"m2","message":{"role":"assistant","content":[{"type":"text","text":"hi"},{"type":"toolCall","toolName":"exec","input":{"cmd":"ls"}}]}}"#,
    ));
    assert_eq!(parsed.skipped_lines, 0);
    assert_eq!(parsed.turns.len(), 2);
    assert_eq!(parsed.turns[0], Turn { id: "1".into(), role: Role::User, content: "hello".into() });
    assert_eq!(parsed.turns[1].id, "m2");
    assert_eq!(parsed.turns[1].role, Role::Assistant);
    assert_eq!(parsed.turns[1].content, "hi\nexec {\"cmd\":\"ls\"}");
}

#[test]
fn test_parse_tool_result_blocks() {
    let parsed = parse_session_str(
        r#"{"id":"t","role":"tool","content":[{"type":"toolResult","result":"Error: permission denied"}]}"#,
    );
    assert_eq!(parsed.turns[0].role, Role::Tool);
    assert_eq!(parsed.turns[0].content, "Error: permission denied");
}

#[test]
fn test_parse_openai_tool_calls() {
    let parsed = parse_session_str(
        r#"{"role":"assistant","content":null,"tool_calls":[{"function":{"name":"exec","arguments":"{\"cmd\":\"ls\"}"}}]}"#,
    );
    assert_eq!(parsed.turns.len(), 1);
    assert_eq!(parsed.turns[0].id, "line-1");
    assert_eq!(parsed.turns[0].content, "exec {\"cmd\":\"ls\"}");
}

#[test]
fn test_lines_without_role_are_skipped() {
    let parsed = parse_session_str(concat!(
        r#"{"type":"session","version":1}"#,
        "\n\n",
        r#"{"role":"user","content":"x"}"#,
    ));
    assert_eq!(parsed.turns.len(), 1);
    assert_eq!(parsed.skipped_lines, 1);
}

#[test]
fn test_role_parse() {
    assert_eq!(Role::parse("USER"), Role::User);
    assert_eq!(Role::parse("assistant"), Role::Assistant);
    assert_eq!(Role::parse("toolResult"), Role::Tool);
    assert_eq!(Role::parse("narrator"), Role::Other);
    assert_eq!(Role::Tool.to_string(), "tool");
}

#[test]
fn test_malformed_lines_skipped_and_counted() {
    let dir = TempDir::new().unwrap();
    let path = write_session(
        &dir,
        "s5.jsonl",
        &[
            r#"{"id":"1","role":"user","content":"Set PORT=8080 please"}"#,
            r#"{"id":"2","role":"assistant","content": oops"#,
            r#"{"id":"3","role":"assistant","content":"PORT=8080"}"#,
            "not json at all",
            r#"{"id":"4","role":"user","content":"thanks"}"#,
        ],
    );
    let parsed = parse_session_jsonl(&path).unwrap();
    assert_eq!(parsed.turns.len(), 3);
    assert_eq!(parsed.skipped_lines, 2);

    let summary = compress_session(&path, false).unwrap();
    assert_eq!(summary.turns, 3);
    assert_eq!(summary.skipped_lines, 2);
}

#[test]
fn test_empty_file_gives_no_turns() {
    let dir = TempDir::new().unwrap();
    let path = write_session(&dir, "empty.jsonl", &[]);
    let parsed = parse_session_jsonl(&path).unwrap();
    assert!(parsed.turns.is_empty());
    assert_eq!(parsed.skipped_lines, 0);
}

#[test]
fn test_missing_file_is_not_found() {
    let err = parse_session_jsonl("/definitely/not/here.jsonl").unwrap_err();
    assert_eq!(err.kind(), "not_found");
    assert!(compress_session("/definitely/not/here.jsonl", false).is_err());
}

#[test]
fn test_oversized_transcript_is_refused() {
    let dir = TempDir::new().unwrap();
    let path = write_session(
        &dir,
        "big.jsonl",
        &[r#"{"id":"1","role":"user","content":"Set PORT=8080 please, the old port is taken"}"#],
    );
    let size = std::fs::metadata(&path).unwrap().len();

    let err = compress_session_with(&path, false, &claw_core::TokenCounter::heuristic(), size - 1).unwrap_err();
    assert_eq!(err.kind(), "file_too_large");
    assert!(matches!(read_session(&path, size - 1), Err(claw_core::CompactorError::FileTooLarge { limit, .. }) if limit == size - 1));

    let summary = compress_session_with(&path, false, &claw_core::TokenCounter::heuristic(), size).unwrap();
    assert_eq!(summary.turns, 1);
}

// ========== Classification ==========

#[test]
fn test_classify_errors() {
    for line in [
        "Traceback (most recent call last):",
        "Error: connection refused",
        "ModuleNotFoundError: No module named 'yaml'",
        "process exited with code 2",
        "thread 'main' panicked at src/main.rs:3:5",
    ] {
        assert_eq!(classify_line(line), Some(ObservationKind::Error), "{line}");
    }
    assert_eq!(classify_line("exit code 0"), None);
}

#[test]
fn test_classify_todo_decision_config_fact() {
    assert_eq!(classify_line("TODO rotate the deploy key"), Some(ObservationKind::Todo));
    assert_eq!(classify_line("- FIXME: flaky test"), Some(ObservationKind::Todo));
    assert_eq!(classify_line("✅ Switched the cache to sqlite"), Some(ObservationKind::Decision));
    assert_eq!(classify_line("❌ Redis was too heavy"), Some(ObservationKind::Decision));
    assert_eq!(classify_line("We decided to keep Postgres"), Some(ObservationKind::Decision));
    assert_eq!(classify_line("PORT=8080"), Some(ObservationKind::Config));
    assert_eq!(classify_line("log_level: debug"), Some(ObservationKind::Config));
    assert_eq!(classify_line("Run the migration on 10.0.0.5"), Some(ObservationKind::Fact));
    assert_eq!(classify_line("Deploy to https://example.com/app"), Some(ObservationKind::Fact));
    assert_eq!(classify_line("The weather is nice today"), None);
    assert_eq!(classify_line("   "), None);
}

#[test]
fn test_classify_precedence() {
    assert_eq!(classify_line("TODO: retry after Error: timeout"), Some(ObservationKind::Error));
    assert_eq!(classify_line("TODO decided to skip"), Some(ObservationKind::Todo));
    assert_eq!(classify_line("DB=we decided to use sqlite"), Some(ObservationKind::Decision));
}

#[test]
fn test_long_config_value_is_not_config() {
    let line = format!("API_TOKEN={}", "x".repeat(70));
    assert_eq!(classify_line(&line), None);
}

// ========== Extraction ==========

#[test]
fn test_extract_keeps_turn_order_and_dedups() {
    let turns = vec![
        turn("t1", "PORT=8080\nTODO rotate keys"),
        turn("t2", "PORT=8080\nError: boom"),
    ];
    let obs = extract_observations(&turns);
    assert_eq!(obs.len(), 3);
    assert_eq!(obs[0], Observation {
        kind: ObservationKind::Config,
        content: "PORT=8080".into(),
        source_turn_id: "t1".into(),
    });
    assert_eq!(obs[1].kind, ObservationKind::Todo);
    assert_eq!(obs[2].kind, ObservationKind::Error);
    assert_eq!(obs[2].source_turn_id, "t2");
}

#[test]
fn test_extract_truncates_content() {
    let long = format!("TODO {}", "x".repeat(300));
    let obs = extract_observations(&[turn("t", &long)]);
    assert_eq!(obs[0].content.chars().count(), MAX_OBSERVATION_CHARS);
}

#[test]
fn test_extract_strips_list_markers() {
    let obs = extract_observations(&[turn("t", "- TODO write docs")]);
    assert_eq!(obs[0].content, "TODO write docs");
}

// ========== Rendering ==========

#[test]
fn test_format_front_matter_and_grouping() {
    let turns = vec![turn("t1", "PORT=8080\nTODO rotate keys\nError: boom")];
    let obs = extract_observations(&turns);
    let md = format_observations_md(&obs, "s.jsonl");
    assert!(md.starts_with("---\nsource: s.jsonl\ncount: 3\n---\n"), "{md}");
    let config = md.find("## Config").unwrap();
    let todo = md.find("## TODOs").unwrap();
    let error = md.find("## Errors").unwrap();
    assert!(config < todo && todo < error);
    assert!(!md.contains("## Decisions"));
    assert!(md.contains("PORT=8080"));
    assert!(md.contains("Error: boom"));
}

#[test]
fn test_front_matter_count_matches_rendered_bullets() {
    let turns = vec![turn("t1", "A=1\nB=2\nC=3\nD=4\nTODO rotate keys")];
    let obs = extract_observations(&turns);
    assert_eq!(obs.len(), 5);

    let md = format_observations_md(&obs, "s.jsonl");
    let (front, body) = md.trim_start_matches("---\n").split_once("---\n").unwrap();
    let bullets = body.lines().filter(|l| l.starts_with("- ")).count();
    assert!(bullets < obs.len(), "{md}");
    assert!(front.contains(&format!("count: {bullets}\n")), "{md}");
    for lit in ["A=1", "B=2", "C=3", "D=4", "TODO rotate keys"] {
        assert!(body.contains(lit), "missing {lit} in {md}");
    }
}

#[test]
fn test_observation_prompt() {
    let turns = vec![
        Turn { id: "1".into(), role: Role::User, content: "deploy it".into() },
        Turn { id: "2".into(), role: Role::Assistant, content: "   ".into() },
    ];
    let prompt = generate_observation_prompt(&turns);
    assert!(prompt.contains("<transcript>\n[user] deploy it\n</transcript>"));
    assert!(prompt.contains("decision, config, fact, todo, error"));
}

// ========== Compression ==========

fn verbose_transcript(dir: &TempDir) -> PathBuf {
    let mut lines = Vec::new();
    for i in 0..40 {
        let noise: String = (0..30)
            .map(|j| format!("drwxr-xr-x  2 agent agent 4096 Jan {j:2} file_{i}_{j}.log\\n"))
            .collect();
        lines.push(format!(
            r#"{{"id":"a{i}","role":"assistant","content":[{{"type":"toolCall","toolName":"exec","input":{{"cmd":"ls -la"}}}}]}}"#
        ));
        lines.push(format!(
            r#"{{"id":"r{i}","role":"tool","content":[{{"type":"toolResult","result":"{noise}"}}]}}"#
        ));
    }
    lines.push(r#"{"id":"u1","role":"user","content":"✅ decided to keep the logs for 14 days"}"#.into());
    lines.push(r#"{"id":"u2","role":"user","content":"TODO archive /var/log/agent/old"}"#.into());
    let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
    write_session(dir, "verbose.jsonl", &refs)
}

#[test]
fn test_compress_session_reduces_tokens() {
    let dir = TempDir::new().unwrap();
    let path = verbose_transcript(&dir);
    let summary = compress_session(&path, false).unwrap();
    assert_eq!(summary.turns, 82);
    assert_eq!(summary.observation_count(), 2);
    assert!(summary.tokens_after * 10 < summary.tokens_before, "{summary:?}");
    assert!(summary.reduction_pct >= 90.0);
    assert!(summary.markdown.contains("count: 2"));
    assert!(summary.markdown.contains("/var/log/agent/old"));
    assert!(summary.llm_prompt.is_none());
}

#[test]
fn test_compress_session_with_prompt() {
    let dir = TempDir::new().unwrap();
    let path = verbose_transcript(&dir);
    let summary = compress_session(&path, true).unwrap();
    let prompt = summary.llm_prompt.unwrap();
    assert!(prompt.contains("[tool]"));
}

#[test]
fn test_compress_session_without_observations() {
    let dir = TempDir::new().unwrap();
    let path = write_session(&dir, "quiet.jsonl", &[r#"{"role":"user","content":"hello there"}"#]);
    let summary = compress_session(&path, false).unwrap();
    assert!(summary.observations.is_empty());
    assert!(summary.markdown.is_empty());
    assert_eq!(summary.tokens_after, 0);
}
