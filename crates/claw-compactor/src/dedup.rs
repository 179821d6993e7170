//! Near-duplicate detection via shingle hashing, across sections of many files.

use crate::sections::parse_sections;
use serde::Serialize;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};

pub const SHINGLE_SIZE: usize = 3;
pub const SIMILARITY_THRESHOLD: f64 = 0.6;
const PREVIEW_CHARS: usize = 80;

/// Hashes of every `k`-word window, case-folded. Texts shorter than `k`
/// words hash as a single window.
pub fn shingles(text: &str, k: usize) -> HashSet<u64> {
    let words: Vec<String> = text.split_whitespace().map(str::to_lowercase).collect();
    match words.len() {
        0 => HashSet::new(),
        n if n < k.max(1) => HashSet::from([hash_words(&words)]),
        _ => words.windows(k.max(1)).map(hash_words).collect(),
    }
}

fn hash_words(words: &[String]) -> u64 {
    let mut hasher = DefaultHasher::new();
    words.hash(&mut hasher);
    hasher.finish()
}

/// Jaccard similarity of two shingle sets. Two empty sets are identical.
pub fn jaccard(a: &HashSet<u64>, b: &HashSet<u64>) -> f64 {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => 1.0,
        (true, false) | (false, true) => 0.0,
        _ => a.intersection(b).count() as f64 / a.union(b).count() as f64,
    }
}

/// Indices of entries that are near-duplicates of the first one, with the
/// mean similarity of the others to it.
#[derive(Debug, Clone, Serialize)]
pub struct DupGroup {
    pub indices: Vec<usize>,
    pub similarity: f64,
}

pub fn find_duplicates(entries: &[&str]) -> Vec<DupGroup> {
    find_duplicates_with_params(entries, SIMILARITY_THRESHOLD, SHINGLE_SIZE)
}

/// Greedy clustering: each unclaimed entry collects every later unclaimed
/// entry at or above `threshold`.
pub fn find_duplicates_with_params(entries: &[&str], threshold: f64, k: usize) -> Vec<DupGroup> {
    let sets: Vec<HashSet<u64>> = entries.iter().map(|e| shingles(e, k)).collect();
    let mut claimed = vec![false; entries.len()];
    let mut groups = Vec::new();

    for i in 0..sets.len() {
        if claimed[i] || sets[i].is_empty() {
            continue;
        }
        let matches: Vec<(usize, f64)> = (i + 1..sets.len())
            .filter(|&j| !claimed[j])
            .map(|j| (j, jaccard(&sets[i], &sets[j])))
            .filter(|&(_, sim)| sim >= threshold)
            .collect();
        if matches.is_empty() {
            continue;
        }
        let similarity = matches.iter().map(|(_, sim)| sim).sum::<f64>() / matches.len() as f64;
        let mut indices = vec![i];
        indices.extend(matches.iter().map(|&(j, _)| j));
        for &j in &indices {
            claimed[j] = true;
        }
        groups.push(DupGroup { indices, similarity });
    }
    groups
}

/// A section's location within the scanned files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionRef {
    pub file: String,
    pub header: String,
    pub preview: String,
}

/// A cluster of near-identical sections.
#[derive(Debug, Clone, Serialize)]
pub struct DuplicateCluster {
    pub similarity: f64,
    pub entries: Vec<SectionRef>,
    /// Tokens recoverable by keeping only the first member.
    pub redundant_tokens: usize,
}

/// Compare every section of every `(name, text)` document and report
/// clusters of near-duplicates.
pub fn find_duplicate_sections(docs: &[(String, String)], threshold: f64) -> Vec<DuplicateCluster> {
    let counter = claw_core::TokenCounter::global();
    let mut refs = Vec::new();
    let mut bodies = Vec::new();
    for (name, text) in docs {
        for section in parse_sections(text) {
            if section.body.is_empty() {
                continue;
            }
            let preview = section.body.lines().next().unwrap_or("").chars().take(PREVIEW_CHARS).collect();
            refs.push(SectionRef { file: name.clone(), header: section.header, preview });
            bodies.push(section.body);
        }
    }
    let entries: Vec<&str> = bodies.iter().map(String::as_str).collect();
    find_duplicates_with_params(&entries, threshold, SHINGLE_SIZE)
        .into_iter()
        .map(|g| DuplicateCluster {
            similarity: (g.similarity * 1000.0).round() / 1000.0,
            redundant_tokens: g.indices[1..].iter().map(|&i| counter.count(entries[i])).sum(),
            entries: g.indices.iter().map(|&i| refs[i].clone()).collect(),
        })
        .collect()
}
