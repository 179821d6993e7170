use claw_core::{ClawConfig, CompactorError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::Path;
use tracing::debug;

/// Message role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
    Tool,
    Other,
}

impl Role {
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "user" | "human" => Role::User,
            "assistant" | "ai" | "model" => Role::Assistant,
            "system" | "developer" => Role::System,
            "tool" | "toolresult" | "function" => Role::Tool,
            _ => Role::Other,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::System => write!(f, "system"),
            Role::Tool => write!(f, "tool"),
            Role::Other => write!(f, "other"),
        }
    }
}

/// One transcript line, flattened to text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub id: String,
    pub role: Role,
    pub content: String,
}

/// Turns of a transcript plus the number of lines that could not be used.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ParsedSession {
    pub turns: Vec<Turn>,
    pub skipped_lines: usize,
}

/// Read a transcript in one pass, refusing files over `limit` bytes.
/// Invalid UTF-8 is replaced rather than rejected.
pub fn read_session(path: &Path, limit: u64) -> Result<String> {
    let size = std::fs::metadata(path).map_err(|e| CompactorError::io(path, e))?.len();
    if size > limit {
        return Err(CompactorError::FileTooLarge { path: path.to_path_buf(), size, limit });
    }
    let bytes = std::fs::read(path).map_err(|e| CompactorError::io(path, e))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Parse a session `.jsonl` file.
///
/// Malformed lines and lines without a role are skipped and counted; only a
/// missing, unreadable or oversized file is an error.
pub fn parse_session_jsonl(path: impl AsRef<Path>) -> Result<ParsedSession> {
    let path = path.as_ref();
    let text = read_session(path, ClawConfig::default().limits.max_file_bytes)?;
    let parsed = parse_session_str(&text);
    debug!(
        path = %path.display(),
        turns = parsed.turns.len(),
        skipped = parsed.skipped_lines,
        "parsed session"
    );
    Ok(parsed)
}

pub fn parse_session_str(text: &str) -> ParsedSession {
    let mut session = ParsedSession::default();
    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let turn = serde_json::from_str::<Value>(line)
            .ok()
            .and_then(|v| turn_from_value(&v, idx + 1));
        match turn {
            Some(turn) => session.turns.push(turn),
            None => {
                debug!(line = idx + 1, "skipping session line");
                session.skipped_lines += 1;
            }
        }
    }
    session
}

/// Accepts `{id, role, content}` and `{type, id, message: {role, content}}`.
fn turn_from_value(value: &Value, line_no: usize) -> Option<Turn> {
    let obj = value.as_object()?;
    let msg = match obj.get("message") {
        Some(Value::Object(m)) => m,
        _ => obj,
    };
    let role = Role::parse(msg.get("role")?.as_str()?);

    let mut content = msg.get("content").map(content_text).unwrap_or_default();
    if let Some(Value::Array(calls)) = msg.get("tool_calls") {
        for call in calls {
            let name = call.pointer("/function/name").and_then(Value::as_str).unwrap_or("tool");
            let args = call.pointer("/function/arguments").and_then(Value::as_str).unwrap_or("");
            push_line(&mut content, &format!("{name} {args}"));
        }
    }

    let id = [msg.get("id"), obj.get("id")]
        .into_iter()
        .flatten()
        .find_map(|v| match v {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .unwrap_or_else(|| format!("line-{line_no}"));

    Some(Turn { id, role, content })
}

/// Flatten a string or a list of content blocks.
fn content_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(blocks) => {
            let mut out = String::new();
            for block in blocks {
                push_line(&mut out, &block_text(block));
            }
            out
        }
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn block_text(block: &Value) -> String {
    let Some(obj) = block.as_object() else {
        return block.as_str().map(str::to_string).unwrap_or_default();
    };
    let kind = obj.get("type").and_then(Value::as_str).unwrap_or("text");
    match kind {
        "toolCall" | "tool_use" => {
            let name = ["toolName", "name"]
                .iter()
                .find_map(|k| obj.get(*k).and_then(Value::as_str))
                .unwrap_or("tool");
            let input = obj.get("input").or_else(|| obj.get("arguments"));
            match input {
                Some(Value::String(s)) => format!("{name} {s}"),
                Some(v) => format!("{name} {v}"),
                None => name.to_string(),
            }
        }
        "toolResult" | "tool_result" => {
            let result = obj.get("result").or_else(|| obj.get("content"));
            result.map(content_text).unwrap_or_default()
        }
        _ => obj.get("text").map(content_text).unwrap_or_default(),
    }
}

fn push_line(buf: &mut String, line: &str) {
    if line.is_empty() {
        return;
    }
    if !buf.is_empty() {
        buf.push('\n');
    }
    buf.push_str(line);
}
