//! Layer 2: Tokenizer-aware formatting. Rewrites markdown so the same
//! content encodes to fewer BPE tokens.

use crate::layer1_format::{redundancy_pass, table_pass, zh_punct};
use crate::sections::{indentation, map_outside_inline_code, map_prose_lines};
use claw_core::{estimate_savings_with, SavingsReport, TokenCounter};
use regex::Regex;
use std::sync::LazyLock;

static RE_BOLD_STAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(^|[^\w*])\*\*([^\s*](?:[^*\n]*[^\s*])?)\*\*($|[^\w*])").unwrap()
});
static RE_BOLD_UNDERSCORE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(^|[^\w])__([^\s_](?:[^_\n]*[^\s_])?)__($|[^\w])").unwrap());
static RE_ITALIC_STAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(^|[^\w*])\*([^\s*](?:[^*\n]*[^\s*])?)\*($|[^\w*])").unwrap()
});
static RE_TRIVIAL_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(^|[^`])`([A-Za-z_][A-Za-z0-9_.-]{0,39})`($|[^`])").unwrap());
static RE_MULTI_SPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]{2,}").unwrap());

/// Upper bound on optimizer repetitions before giving up on a fixpoint.
const MAX_ROUNDS: usize = 4;

fn typographic(c: char) -> Option<&'static str> {
    match c {
        '\u{2013}' | '\u{2014}' | '\u{2212}' => Some("-"),
        '\u{00A0}' | '\u{2009}' | '\u{202F}' => Some(" "),
        '\u{00AB}' | '\u{00BB}' | '\u{2033}' => Some("\""),
        '\u{2032}' => Some("'"),
        _ => zh_punct(c),
    }
}

/// Remove `**bold**`, `__bold__` and `*italic*` markers outside code.
pub fn strip_bold_italic(text: &str) -> String {
    map_prose_lines(text, |line| {
        map_outside_inline_code(line, |seg| {
            let s = RE_BOLD_STAR.replace_all(seg, "$1$2$3");
            let s = RE_BOLD_UNDERSCORE.replace_all(&s, "$1$2$3");
            RE_ITALIC_STAR.replace_all(&s, "$1$2$3").into_owned()
        })
    })
}

/// Drop backticks around single identifier-like words.
pub fn strip_trivial_backticks(text: &str) -> String {
    map_prose_lines(text, |line| RE_TRIVIAL_CODE.replace_all(line, "$1$2$3").into_owned())
}

/// Map CJK and typographic punctuation to ASCII, and `•` bullets to `-`.
pub fn normalize_punctuation(text: &str) -> String {
    map_prose_lines(text, |line| {
        let indent = indentation(line);
        let rest = &line[indent.len()..];
        let rest = match rest.strip_prefix("\u{2022} ") {
            Some(item) => format!("- {item}"),
            None => rest.to_string(),
        };
        let mapped = map_outside_inline_code(&rest, |seg| {
            seg.chars().fold(String::with_capacity(seg.len()), |mut out, c| {
                match typographic(c) {
                    Some(rep) => out.push_str(rep),
                    None => out.push(c),
                }
                out
            })
        });
        format!("{indent}{mapped}")
    })
}

/// Collapse interior whitespace runs, keep indentation, then drop
/// trailing whitespace and extra blank lines.
pub fn minimize_whitespace(text: &str) -> String {
    let collapsed = map_prose_lines(text, |line| {
        let indent = indentation(line);
        format!("{indent}{}", RE_MULTI_SPACE.replace_all(&line[indent.len()..], " "))
    });
    redundancy_pass(&collapsed)
}

fn optimize_round(text: &str, aggressive: bool) -> String {
    let mut result = strip_bold_italic(text);
    result = strip_trivial_backticks(&result);
    result = normalize_punctuation(&result);
    if aggressive {
        result = table_pass(&result, true);
    }
    minimize_whitespace(&result)
}

/// Rewrite `text` for fewer tokens using the default counter.
pub fn optimize_tokens(text: &str, aggressive: bool) -> String {
    optimize_tokens_with(&TokenCounter::global(), text, aggressive)
}

/// Rewrite `text` for fewer tokens. Returns the input if the rewrite would
/// not save anything.
pub fn optimize_tokens_with(counter: &TokenCounter, text: &str, aggressive: bool) -> String {
    if text.is_empty() {
        return String::new();
    }
    let mut current = text.to_string();
    for _ in 0..MAX_ROUNDS {
        let next = optimize_round(&current, aggressive);
        if next == current {
            break;
        }
        current = next;
    }
    if counter.count(&current) > counter.count(text) {
        return text.to_string();
    }
    current
}

/// Savings of optimizing `text`, without keeping the output.
pub fn estimate_savings(text: &str, aggressive: bool) -> SavingsReport {
    let counter = TokenCounter::global();
    estimate_savings_with(&counter, text, &optimize_tokens_with(&counter, text, aggressive))
}
