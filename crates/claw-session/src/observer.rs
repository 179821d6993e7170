//! Rule-based observation extraction from session turns.

use crate::session::Turn;
use claw_compactor::preserve::{find_literals, LiteralKind};
use claw_compactor::rule_compress;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::LazyLock;

/// Observation content is cut to this many characters.
pub const MAX_OBSERVATION_CHARS: usize = 200;
/// Longest value still accepted as a `KEY=VALUE` config line.
pub const MAX_CONFIG_VALUE_CHARS: usize = 60;
const PROMPT_TURN_CHARS: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObservationKind {
    Decision,
    Config,
    Fact,
    Todo,
    Error,
}

impl ObservationKind {
    /// Rendering order.
    pub const ALL: [ObservationKind; 5] = [
        Self::Decision,
        Self::Config,
        Self::Fact,
        Self::Todo,
        Self::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Decision => "decision",
            Self::Config => "config",
            Self::Fact => "fact",
            Self::Todo => "todo",
            Self::Error => "error",
        }
    }

    pub fn heading(&self) -> &'static str {
        match self {
            Self::Decision => "Decisions",
            Self::Config => "Config",
            Self::Fact => "Facts",
            Self::Todo => "TODOs",
            Self::Error => "Errors",
        }
    }
}

/// A durable fact pulled out of a transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub kind: ObservationKind,
    pub content: String,
    pub source_turn_id: String,
}

static RE_ERROR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)traceback \(most recent call last\)|\b[a-z]*error:|\bpanicked at\b|\bnon-zero exit\b|\bexit(?:ed)?(?:\s+with)?\s+(?:code|status)\s*[:=]?\s*[1-9]\d*",
    )
    .unwrap()
});
static RE_TODO: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(?:TODO|FIXME)\b").unwrap());
static RE_DECISION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bdecided to\b|\bchose\b|\buse\s").unwrap());
static RE_CONFIG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z_][A-Za-z0-9_.-]{0,39})(?:\s*=\s*|:\s+)(\S.*)$").unwrap()
});
static RE_IMPERATIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:run|install|deploy|set|add|create|open|restart|start|stop|check|copy|move|edit|update|configure|connect|ssh|curl|point|mount|build|push|pull|clone|download|upload|enable|disable|remove|delete|write|read|visit|call|send|fetch|serve|listen|bind)\b",
    )
    .unwrap()
});
static RE_LIST_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[-*+]\s+|\d+[.)]\s+|>\s*)+").unwrap());

fn strip_marker(line: &str) -> &str {
    let line = line.trim();
    match RE_LIST_MARKER.find(line) {
        Some(m) => line[m.end()..].trim_start(),
        None => line,
    }
}

fn is_config(line: &str) -> bool {
    RE_CONFIG
        .captures(line)
        .and_then(|c| c.get(2))
        .is_some_and(|v| v.as_str().trim_end().chars().count() <= MAX_CONFIG_VALUE_CHARS)
}

fn is_fact(line: &str) -> bool {
    let has_locator = find_literals(line)
        .iter()
        .any(|(kind, _)| matches!(kind, LiteralKind::Url | LiteralKind::Ipv4 | LiteralKind::Path));
    has_locator && RE_IMPERATIVE.is_match(line)
}

/// Classify one line. Precedence: error, todo, decision, config, fact.
pub fn classify_line(line: &str) -> Option<ObservationKind> {
    let body = strip_marker(line);
    if body.is_empty() {
        return None;
    }
    if RE_ERROR.is_match(body) {
        Some(ObservationKind::Error)
    } else if RE_TODO.is_match(body) {
        Some(ObservationKind::Todo)
    } else if body.starts_with(['✅', '❌']) || RE_DECISION.is_match(body) {
        Some(ObservationKind::Decision)
    } else if is_config(body) {
        Some(ObservationKind::Config)
    } else if is_fact(body) {
        Some(ObservationKind::Fact)
    } else {
        None
    }
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].trim_end().to_string(),
        None => s.to_string(),
    }
}

/// Scan every line of every turn, in turn order.
///
/// An identical `(kind, content)` pair is reported once, at its first turn.
pub fn extract_observations(turns: &[Turn]) -> Vec<Observation> {
    let mut seen: HashSet<(ObservationKind, String)> = HashSet::new();
    let mut out = Vec::new();
    for turn in turns {
        for line in turn.content.lines() {
            let Some(kind) = classify_line(line) else { continue };
            let content = truncate(strip_marker(line), MAX_OBSERVATION_CHARS);
            if seen.insert((kind, content.clone())) {
                out.push(Observation { kind, content, source_turn_id: turn.id.clone() });
            }
        }
    }
    out
}

/// Render observations as markdown: a front-matter block, then one H2 per
/// kind with a bullet per observation. The body goes through the rule
/// pipeline, which may merge bullets; `count` is the number of bullets
/// left in the rendered body.
pub fn format_observations_md(observations: &[Observation], source: &str) -> String {
    let mut body = String::new();
    for kind in ObservationKind::ALL {
        let items: Vec<&Observation> = observations.iter().filter(|o| o.kind == kind).collect();
        if items.is_empty() {
            continue;
        }
        body.push_str(&format!("## {}\n\n", kind.heading()));
        for obs in items {
            body.push_str(&format!("- {}\n", obs.content));
        }
        body.push('\n');
    }
    let body = rule_compress(&body);
    let count = body.lines().filter(|l| l.trim_start().starts_with("- ")).count();
    format!("---\nsource: {source}\ncount: {count}\n---\n\n{body}\n")
}

/// Prompt asking a language model to turn a transcript into observations.
pub fn generate_observation_prompt(turns: &[Turn]) -> String {
    let kinds: Vec<&str> = ObservationKind::ALL.iter().map(ObservationKind::as_str).collect();
    let mut transcript = String::new();
    for turn in turns.iter().filter(|t| !t.content.trim().is_empty()) {
        transcript.push_str(&format!(
            "[{}] {}\n",
            turn.role,
            truncate(turn.content.trim(), PROMPT_TURN_CHARS)
        ));
    }
    format!(
        "You are a session observation extractor. Compress the transcript below into \
         durable observations.\n\
         \n\
         Rules:\n\
         - Keep only facts: what was done, what resulted, what was decided\n\
         - Drop tool output verbosity and trivial operations\n\
         - Keep IP addresses, paths, URLs, versions and dates exactly as written\n\
         - Group bullets under one `## <kind>` header per kind ({})\n\
         \n\
         <transcript>\n{transcript}</transcript>\n",
        kinds.join(", ")
    )
}
