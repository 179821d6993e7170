//! Markdown structure helpers: fenced-code tracking and header sections.

use regex::Regex;
use std::sync::LazyLock;

static RE_HEADER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(#{1,6})\s+(\S.*?)\s*$").unwrap());
static RE_BULLET: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\s*)([-*+])\s+(\S.*?)\s*$").unwrap());

/// A header line and its body up to the next header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Header title without the leading `#`s. Empty for the preamble.
    pub header: String,
    /// 1-6 for headers, 0 for the preamble.
    pub level: usize,
    pub body: String,
}

/// A parsed bullet line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bullet<'a> {
    pub indent: &'a str,
    pub marker: &'a str,
    pub content: &'a str,
}

pub fn is_fence(line: &str) -> bool {
    let t = line.trim_start();
    t.starts_with("```") || t.starts_with("~~~")
}

/// Per-line flag, true for fence lines and everything between them.
/// An unclosed fence runs to the end of the document.
pub fn code_fence_mask(lines: &[&str]) -> Vec<bool> {
    let mut mask = Vec::with_capacity(lines.len());
    let mut open: Option<&str> = None;
    for line in lines {
        let t = line.trim_start();
        match open {
            Some(marker) => {
                mask.push(true);
                if t.starts_with(marker) && t[marker.len()..].trim().is_empty() {
                    open = None;
                }
            }
            None if is_fence(line) => {
                mask.push(true);
                open = Some(if t.starts_with("```") { "```" } else { "~~~" });
            }
            None => mask.push(false),
        }
    }
    mask
}

/// `(level, title)` for an ATX header line.
pub fn parse_header(line: &str) -> Option<(usize, &str)> {
    let cap = RE_HEADER.captures(line)?;
    let level = cap.get(1)?.as_str().len();
    Some((level, cap.get(2)?.as_str()))
}

pub fn parse_bullet(line: &str) -> Option<Bullet<'_>> {
    let cap = RE_BULLET.captures(line)?;
    Some(Bullet {
        indent: cap.get(1)?.as_str(),
        marker: cap.get(2)?.as_str(),
        content: cap.get(3)?.as_str(),
    })
}

/// Split `text` into sections. Headers inside fenced code are body text.
pub fn parse_sections(text: &str) -> Vec<Section> {
    if text.is_empty() {
        return Vec::new();
    }
    let lines: Vec<&str> = text.split('\n').collect();
    let mask = code_fence_mask(&lines);

    let mut sections = Vec::new();
    let mut header = String::new();
    let mut level = 0;
    let mut body: Vec<&str> = Vec::new();

    for (line, in_fence) in lines.iter().zip(mask) {
        match parse_header(line).filter(|_| !in_fence) {
            Some((lvl, title)) => {
                let text = body.join("\n").trim().to_string();
                if !header.is_empty() || !text.is_empty() {
                    sections.push(Section { header, level, body: text });
                }
                header = title.to_string();
                level = lvl;
                body.clear();
            }
            None => body.push(line),
        }
    }
    let text = body.join("\n").trim().to_string();
    if !header.is_empty() || !text.is_empty() {
        sections.push(Section { header, level, body: text });
    }
    sections
}

/// Apply `f` to every line outside fenced code. Fenced lines pass through.
pub fn map_prose_lines(text: &str, mut f: impl FnMut(&str) -> String) -> String {
    let lines: Vec<&str> = text.split('\n').collect();
    let mask = code_fence_mask(&lines);
    lines
        .iter()
        .zip(mask)
        .map(|(line, in_fence)| if in_fence { line.to_string() } else { f(line) })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Apply `f` to the parts of `line` outside inline code spans.
pub fn map_outside_inline_code(line: &str, mut f: impl FnMut(&str) -> String) -> String {
    if !line.contains('`') {
        return f(line);
    }
    let parts: Vec<&str> = line.split('`').collect();
    // An unmatched trailing backtick leaves the last part as prose.
    let paired = parts.len() % 2 == 1;
    let mut out = String::with_capacity(line.len());
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            out.push('`');
        }
        let inside_code = i % 2 == 1 && (paired || i + 1 < parts.len());
        if inside_code {
            out.push_str(part);
        } else {
            out.push_str(&f(part));
        }
    }
    out
}

/// Leading whitespace of `line`.
pub fn indentation(line: &str) -> &str {
    &line[..line.len() - line.trim_start().len()]
}
