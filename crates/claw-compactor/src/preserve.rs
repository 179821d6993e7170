//! Protected literals: substrings no rule stage may lose.

use regex::Regex;
use std::collections::BTreeSet;
use std::ops::Range;
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LiteralKind {
    Url,
    Ipv4,
    Date,
    Path,
    Hex,
    Number,
    Quoted,
}

static RE_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[A-Za-z][A-Za-z0-9+.-]*://[^\s<>()\[\]"'`|*]+"#).unwrap());
static RE_IPV4: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:\d{1,3}\.){3}\d{1,3}\b").unwrap());
static RE_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\d{4}-\d{2}-\d{2}(?:[T ]\d{2}:\d{2}(?::\d{2}(?:\.\d+)?)?(?:Z|[+-]\d{2}:?\d{2})?)?\b").unwrap()
});
static RE_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"~?(?:/[A-Za-z0-9_.@%+~-]+){2,}/?").unwrap());
static RE_HEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b0[xX][0-9A-Fa-f]+\b").unwrap());
static RE_NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\d+(?:[.,]\d+)*\b").unwrap());
static RE_QUOTED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"`[^`\n]+`|"[^"\n]+""#).unwrap());

fn patterns() -> [(LiteralKind, &'static Regex); 7] {
    [
        (LiteralKind::Url, &RE_URL),
        (LiteralKind::Ipv4, &RE_IPV4),
        (LiteralKind::Date, &RE_DATE),
        (LiteralKind::Path, &RE_PATH),
        (LiteralKind::Hex, &RE_HEX),
        (LiteralKind::Number, &RE_NUMBER),
        (LiteralKind::Quoted, &RE_QUOTED),
    ]
}

fn trim_url(s: &str) -> &str {
    s.trim_end_matches(['.', ',', ';', ':', '!', '?'])
}

/// Every protected literal in `text`, tagged with its kind.
pub fn find_literals(text: &str) -> Vec<(LiteralKind, String)> {
    let mut out = Vec::new();
    for (kind, re) in patterns() {
        for m in re.find_iter(text) {
            let lit = if kind == LiteralKind::Url { trim_url(m.as_str()) } else { m.as_str() };
            if !lit.is_empty() {
                out.push((kind, lit.to_string()));
            }
        }
    }
    out
}

pub fn protected_literals(text: &str) -> BTreeSet<String> {
    find_literals(text).into_iter().map(|(_, lit)| lit).collect()
}

pub fn has_protected_literal(text: &str) -> bool {
    patterns().iter().any(|(_, re)| re.is_match(text))
}

/// Literals of `before` that no longer occur anywhere in `after`.
pub fn missing_literals(before: &str, after: &str) -> Vec<String> {
    let kept = protected_literals(after);
    protected_literals(before)
        .into_iter()
        .filter(|lit| !kept.contains(lit) && !after.contains(lit.as_str()))
        .collect()
}

pub fn preserves_literals(before: &str, after: &str) -> bool {
    missing_literals(before, after).is_empty()
}

/// True when every literal of `dropped` still occurs in `kept`.
pub fn literals_covered(dropped: &str, kept: &str) -> bool {
    protected_literals(dropped).iter().all(|lit| kept.contains(lit.as_str()))
}

/// Byte ranges of URLs, paths and quoted spans in `line`, merged and sorted.
fn opaque_spans(line: &str) -> Vec<Range<usize>> {
    let mut spans: Vec<Range<usize>> = [&*RE_URL, &*RE_PATH, &*RE_QUOTED]
        .iter()
        .flat_map(|re| re.find_iter(line).map(|m| m.range()))
        .collect();
    spans.sort_by_key(|r| r.start);
    let mut merged: Vec<Range<usize>> = Vec::with_capacity(spans.len());
    for span in spans {
        match merged.last_mut() {
            Some(last) if span.start <= last.end => last.end = last.end.max(span.end),
            _ => merged.push(span),
        }
    }
    merged
}

/// Apply `f` to the parts of `line` outside URLs, paths and quoted spans.
pub fn map_unprotected(line: &str, mut f: impl FnMut(&str) -> String) -> String {
    let spans = opaque_spans(line);
    if spans.is_empty() {
        return f(line);
    }
    let mut out = String::with_capacity(line.len());
    let mut cursor = 0;
    for span in spans {
        out.push_str(&f(&line[cursor..span.start]));
        out.push_str(&line[span.clone()]);
        cursor = span.end;
    }
    out.push_str(&f(&line[cursor..]));
    out
}
