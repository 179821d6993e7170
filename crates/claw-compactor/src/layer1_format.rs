//! Layer 1: Markdown normalization. Punctuation, emoji, duplicates, empty
//! sections, tables and bullets.
//!
//! Each public function is token-guarded: if its rewrite would cost more
//! tokens than the input, the input comes back unchanged. The `*_pass`
//! variants are unguarded and used by the rule pipeline, which applies its
//! own guard.

use crate::preserve::{has_protected_literal, literals_covered, map_unprotected};
use crate::sections::{code_fence_mask, indentation, map_prose_lines, parse_bullet, parse_header};
use claw_core::TokenCounter;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

static RE_MULTI_NEWLINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());
static RE_EMOJI: LazyLock<Regex> = LazyLock::new(|| Regex::new(
    "[\u{1F600}-\u{1F64F}\u{1F300}-\u{1F5FF}\u{1F680}-\u{1F6FF}\
     \u{1F1E0}-\u{1F1FF}\u{2702}-\u{27B0}\u{1F900}-\u{1F9FF}\
     \u{1FA00}-\u{1FA6F}\u{1FA70}-\u{1FAFF}\u{2600}-\u{26FF}\
     \u{2B50}\u{2B55}\u{2B1B}\u{2B1C}\u{FE0F}\u{200D}\u{20E3}]+"
).unwrap());
static RE_MULTI_SPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"  +").unwrap());
static RE_CHECKBOX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\[[ xX]\]").unwrap());

/// Full-width and CJK punctuation with ASCII equivalents.
const ZH_PUNCT: &[(char, &str)] = &[
    ('\u{FF0C}', ","), ('\u{3002}', "."), ('\u{FF1B}', ";"),
    ('\u{FF1A}', ":"), ('\u{FF01}', "!"), ('\u{FF1F}', "?"),
    ('\u{201C}', "\""), ('\u{201D}', "\""), ('\u{2018}', "'"), ('\u{2019}', "'"),
    ('\u{FF08}', "("), ('\u{FF09}', ")"), ('\u{3010}', "["), ('\u{3011}', "]"),
    ('\u{3001}', ","), ('\u{2026}', "..."), ('\u{FF5E}', "~"),
    ('\u{300A}', "<"), ('\u{300B}', ">"), ('\u{300C}', "\""), ('\u{300D}', "\""),
];

pub(crate) fn zh_punct(c: char) -> Option<&'static str> {
    ZH_PUNCT.iter().find(|(zh, _)| *zh == c).map(|(_, en)| *en)
}

/// Keep `candidate` only if it costs no more tokens than `original`.
fn guarded(original: &str, candidate: String) -> String {
    if candidate == original {
        return candidate;
    }
    let counter = TokenCounter::global();
    if counter.count(&candidate) > counter.count(original) {
        original.to_string()
    } else {
        candidate
    }
}

fn replace_chars(segment: &str, map: impl Fn(char) -> Option<&'static str>) -> String {
    let mut out = String::with_capacity(segment.len());
    for c in segment.chars() {
        match map(c) {
            Some(rep) => out.push_str(rep),
            None => out.push(c),
        }
    }
    out
}

// ---------- punctuation ----------

pub fn normalize_cjk_punct(text: &str) -> String {
    guarded(text, cjk_punct_pass(text))
}

pub(crate) fn cjk_punct_pass(text: &str) -> String {
    if !text.chars().any(|c| zh_punct(c).is_some() || c == '\u{2014}') {
        return text.to_string();
    }
    map_prose_lines(text, |line| {
        map_unprotected(line, |seg| replace_chars(&seg.replace("\u{2014}\u{2014}", "--"), zh_punct))
    })
}

// ---------- whitespace ----------

/// Collapse 3+ newlines to one blank line and strip trailing whitespace.
pub fn strip_markdown_redundancy(text: &str) -> String {
    guarded(text, redundancy_pass(text))
}

pub(crate) fn redundancy_pass(text: &str) -> String {
    let trimmed = text.split('\n').map(str::trim_end).collect::<Vec<_>>().join("\n");
    RE_MULTI_NEWLINE
        .replace_all(&trimmed, "\n\n")
        .trim_start_matches('\n')
        .trim_end()
        .to_string()
}

// ---------- duplicate lines ----------

/// Fences, rules, table separators and front-matter delimiters.
fn is_structural_line(trimmed: &str) -> bool {
    trimmed.chars().all(|c| matches!(c, '-' | '*' | '_' | '=' | '|' | ':' | '`' | '~' | '+' | ' '))
}

/// Remove repeated non-blank lines, keeping the first occurrence.
pub fn remove_duplicate_lines(text: &str) -> String {
    guarded(text, duplicate_lines_pass(text))
}

pub(crate) fn duplicate_lines_pass(text: &str) -> String {
    let lines: Vec<&str> = text.split('\n').collect();
    let mask = code_fence_mask(&lines);
    let mut seen: HashSet<&str> = HashSet::new();
    let mut out: Vec<&str> = Vec::with_capacity(lines.len());

    for (line, in_fence) in lines.iter().copied().zip(mask) {
        let trimmed = line.trim();
        if in_fence || (!trimmed.is_empty() && is_structural_line(trimmed)) {
            out.push(line);
            continue;
        }
        if trimmed.is_empty() {
            if out.last().is_some_and(|prev| prev.trim().is_empty()) {
                continue;
            }
            out.push(line);
            continue;
        }
        if seen.insert(trimmed) {
            out.push(line);
        }
    }
    out.join("\n")
}

// ---------- empty sections ----------

/// Drop headers whose body is blank and that have no surviving subsection.
pub fn remove_empty_sections(text: &str) -> String {
    guarded(text, empty_sections_pass(text))
}

pub(crate) fn empty_sections_pass(text: &str) -> String {
    let lines: Vec<&str> = text.split('\n').collect();
    let mask = code_fence_mask(&lines);
    let headers: Vec<(usize, usize)> = lines
        .iter()
        .enumerate()
        .filter(|(i, _)| !mask[*i])
        .filter_map(|(i, line)| parse_header(line).map(|(level, _)| (i, level)))
        .collect();
    if headers.is_empty() {
        return text.to_string();
    }

    let mut keep = vec![true; headers.len()];
    for k in (0..headers.len()).rev() {
        let (idx, level) = headers[k];
        let body_end = headers.get(k + 1).map_or(lines.len(), |(next, _)| *next);
        let body_blank = lines[idx + 1..body_end].iter().all(|l| l.trim().is_empty());
        let has_child = headers[k + 1..]
            .iter()
            .zip(&keep[k + 1..])
            .take_while(|((_, lvl), _)| *lvl > level)
            .any(|(_, kept)| *kept);
        keep[k] = !body_blank || has_child || has_protected_literal(lines[idx]);
    }

    let mut drop = vec![false; lines.len()];
    for (k, (idx, _)) in headers.iter().enumerate() {
        if keep[k] {
            continue;
        }
        let body_end = headers.get(k + 1).map_or(lines.len(), |(next, _)| *next);
        for flag in &mut drop[*idx..body_end] {
            *flag = true;
        }
    }
    lines
        .iter()
        .zip(drop)
        .filter(|(_, dropped)| !dropped)
        .map(|(line, _)| *line)
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------- emoji ----------

pub fn strip_emoji(text: &str) -> String {
    guarded(text, emoji_pass(text))
}

pub(crate) fn emoji_pass(text: &str) -> String {
    if !RE_EMOJI.is_match(text) {
        return text.to_string();
    }
    map_prose_lines(text, |line| {
        if !RE_EMOJI.is_match(line) {
            return line.to_string();
        }
        let indent = indentation(line);
        let rest = map_unprotected(&line[indent.len()..], |seg| {
            RE_MULTI_SPACE.replace_all(&RE_EMOJI.replace_all(seg, ""), " ").into_owned()
        });
        let rest = RE_MULTI_SPACE.replace_all(rest.trim(), " ");
        if rest.is_empty() {
            String::new()
        } else {
            format!("{indent}{rest}")
        }
    })
}

// ---------- tables ----------

fn is_table_separator(line: &str) -> bool {
    let t = line.trim();
    t.contains('|') && t.contains('-') && t.chars().all(|c| matches!(c, '|' | ':' | '-' | ' ' | '\t'))
}

fn split_cells(line: &str) -> Vec<String> {
    let t = line.trim();
    let t = t.strip_prefix('|').unwrap_or(t);
    let t = t.strip_suffix('|').unwrap_or(t);
    t.split('|').map(|c| c.trim().to_string()).collect()
}

fn fold_row(headers: &[String], row: &[String]) -> Option<String> {
    let cell = |i: usize| row.get(i).map(String::as_str).unwrap_or("");
    if row.iter().all(|c| c.is_empty()) {
        return None;
    }
    let line = match headers.len() {
        1 => format!("- {}", cell(0)),
        2 if cell(1).is_empty() => format!("- {}", cell(0)),
        2 if cell(0).is_empty() => format!("- {}", cell(1)),
        2 => format!("- {}: {}", cell(0), cell(1)),
        _ => {
            let attrs = (1..headers.len().max(row.len()))
                .filter(|i| !cell(*i).is_empty())
                .map(|i| match headers.get(i).filter(|h| !h.is_empty()) {
                    Some(h) => format!("{h}={}", cell(i)),
                    None => cell(i).to_string(),
                })
                .collect::<Vec<_>>()
                .join(", ");
            match (cell(0).is_empty(), attrs.is_empty()) {
                (true, _) => format!("- {attrs}"),
                (false, true) => format!("- {}", cell(0)),
                (false, false) => format!("- {}: {attrs}", cell(0)),
            }
        }
    };
    Some(line)
}

fn fold_wide_single_row(headers: &[String], row: &[String]) -> Option<String> {
    let pairs = headers
        .iter()
        .zip(row)
        .filter(|(_, v)| !v.is_empty())
        .map(|(h, v)| if h.is_empty() { v.clone() } else { format!("{h}={v}") })
        .collect::<Vec<_>>();
    (!pairs.is_empty()).then(|| format!("- {}", pairs.join(", ")))
}

/// Rewrite narrow markdown tables (1-3 columns) as bullet lists.
pub fn compress_table_to_kv(text: &str) -> String {
    guarded(text, table_pass(text, false))
}

/// Fold tables outside fenced code. With `fold_single_row`, wide tables
/// holding exactly one data row also become a single bullet.
pub(crate) fn table_pass(text: &str, fold_single_row: bool) -> String {
    if !text.contains('|') {
        return text.to_string();
    }
    let lines: Vec<&str> = text.split('\n').collect();
    let mask = code_fence_mask(&lines);
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    let mut i = 0;

    while i < lines.len() {
        let is_table = !mask[i]
            && lines[i].contains('|')
            && i + 1 < lines.len()
            && !mask[i + 1]
            && is_table_separator(lines[i + 1]);
        if !is_table {
            out.push(lines[i].to_string());
            i += 1;
            continue;
        }

        let headers = split_cells(lines[i]);
        let mut end = i + 2;
        let mut rows = Vec::new();
        while end < lines.len() && !mask[end] && lines[end].contains('|') && !lines[end].trim().is_empty() {
            rows.push(split_cells(lines[end]));
            end += 1;
        }

        let indent = indentation(lines[i]);
        let folded: Option<Vec<String>> = match (headers.len(), rows.len()) {
            (_, 0) => None,
            (1..=3, _) => {
                let mut bullets = Vec::with_capacity(rows.len() + 1);
                if headers.len() == 2 && has_protected_literal(lines[i]) {
                    bullets.extend(fold_row(&headers, &headers));
                }
                bullets.extend(rows.iter().filter_map(|row| fold_row(&headers, row)));
                Some(bullets)
            }
            (_, 1) if fold_single_row => fold_wide_single_row(&headers, &rows[0]).map(|b| vec![b]),
            _ => None,
        };

        match folded {
            Some(bullets) => out.extend(bullets.into_iter().map(|b| format!("{indent}{b}"))),
            None => out.extend(lines[i..end].iter().map(|l| l.to_string())),
        }
        i = end;
    }
    out.join("\n")
}

// ---------- bullets ----------

/// `1 - levenshtein / max_len`, over characters. Two empty strings score 1.
pub fn levenshtein_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let max_len = a.len().max(b.len());
    if max_len == 0 {
        return 1.0;
    }
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut cur = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        cur[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            cur[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(cur[j] + 1);
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    1.0 - prev[b.len()] as f64 / max_len as f64
}

fn similar(a: &str, b: &str, threshold: f64) -> bool {
    let (la, lb) = (a.chars().count(), b.chars().count());
    let max_len = la.max(lb);
    if max_len == 0 {
        return true;
    }
    // Length difference alone bounds the ratio from above.
    if 1.0 - la.abs_diff(lb) as f64 / max_len as f64 + f64::EPSILON < threshold {
        return false;
    }
    levenshtein_ratio(a, b) >= threshold
}

/// Collapse runs of adjacent, near-identical bullets into the longest one.
pub fn merge_similar_bullets(text: &str, threshold: f64) -> String {
    guarded(text, similar_bullets_pass(text, threshold))
}

pub(crate) fn similar_bullets_pass(text: &str, threshold: f64) -> String {
    let lines: Vec<&str> = text.split('\n').collect();
    let mask = code_fence_mask(&lines);
    let mut out: Vec<&str> = Vec::with_capacity(lines.len());
    // (indent, content, line) of the current cluster's survivor.
    let mut kept: Option<(&str, &str, &str)> = None;

    for (line, in_fence) in lines.iter().copied().zip(mask) {
        let bullet = if in_fence { None } else { parse_bullet(line) };
        let Some(b) = bullet else {
            out.extend(kept.take().map(|(_, _, l)| l));
            out.push(line);
            continue;
        };
        match kept {
            Some((indent, content, _)) if indent == b.indent && similar(content, b.content, threshold) => {
                let longer = b.content.chars().count() > content.chars().count();
                if longer && literals_covered(content, b.content) {
                    kept = Some((b.indent, b.content, line));
                } else if !longer && literals_covered(b.content, content) {
                    // Dropped; the survivor already says it.
                } else {
                    out.extend(kept.replace((b.indent, b.content, line)).map(|(_, _, l)| l));
                }
            }
            _ => {
                out.extend(kept.replace((b.indent, b.content, line)).map(|(_, _, l)| l));
            }
        }
    }
    out.extend(kept.map(|(_, _, l)| l));
    out.join("\n")
}

/// Join runs of three or more very short bullets into comma lists.
pub fn merge_short_bullets(text: &str, short_chars: usize, max_merges: usize) -> String {
    guarded(text, short_bullets_pass(text, short_chars, max_merges))
}

pub(crate) fn short_bullets_pass(text: &str, short_chars: usize, max_merges: usize) -> String {
    let lines: Vec<&str> = text.split('\n').collect();
    let mask = code_fence_mask(&lines);
    let chunk_len = max_merges + 1;
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    let mut run: Vec<(&str, &str, &str, &str)> = Vec::new(); // (indent, marker, content, line)

    let flush = |run: &mut Vec<(&str, &str, &str, &str)>, out: &mut Vec<String>| {
        if run.len() >= 3 && chunk_len > 1 {
            for chunk in run.chunks(chunk_len) {
                if chunk.len() == 1 {
                    out.push(chunk[0].3.to_string());
                } else {
                    let (indent, marker, _, _) = chunk[0];
                    let joined = chunk.iter().map(|(_, _, c, _)| *c).collect::<Vec<_>>().join(", ");
                    out.push(format!("{indent}{marker} {joined}"));
                }
            }
        } else {
            out.extend(run.iter().map(|(_, _, _, l)| l.to_string()));
        }
        run.clear();
    };

    for (line, in_fence) in lines.iter().copied().zip(mask) {
        let short = (if in_fence { None } else { parse_bullet(line) })
            .filter(|b| b.content.chars().count() < short_chars && !RE_CHECKBOX.is_match(b.content));
        match short {
            Some(b) => {
                if run.first().is_some_and(|(indent, ..)| *indent != b.indent) {
                    flush(&mut run, &mut out);
                }
                run.push((b.indent, b.marker, b.content, line));
            }
            None => {
                flush(&mut run, &mut out);
                out.push(line.to_string());
            }
        }
    }
    flush(&mut run, &mut out);
    out.join("\n")
}
