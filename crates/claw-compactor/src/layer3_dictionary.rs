//! Layer 3: Dictionary encoding. High-frequency phrases map to short
//! `$XX` codes; decoding restores the text byte for byte.

use crate::codec::{load_json, save_json, TextCodec};
use claw_core::{CompactorError, DictionaryConfig, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::LazyLock;
use tracing::debug;

pub const MIN_PHRASE_LEN: usize = 6;
/// Code prefixes owned by the RLE layer.
pub const RESERVED_PREFIXES: &[&str] = &["$WS", "$IP"];

static RE_CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\$[A-Z]{2,3}$").unwrap());
static RE_CODE_IN_TEXT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$[A-Z]{2,}").unwrap());
static RE_IP_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,3}\.\d{1,3}\.\d{1,3}\.)\d{1,3}\b").unwrap());
static RE_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:/[A-Za-z0-9_.~-]+){3,}").unwrap());

fn is_reserved(code: &str) -> bool {
    RESERVED_PREFIXES.iter().any(|p| code.starts_with(p))
}

/// Every `$XX` and `$XXX` a decoder could read inside `text`.
fn code_like_prefixes(text: &str) -> HashSet<&str> {
    let mut found = HashSet::new();
    for m in RE_CODE_IN_TEXT.find_iter(text) {
        let s = m.as_str();
        found.insert(&s[..3]);
        if s.len() >= 4 {
            found.insert(&s[..4]);
        }
    }
    found
}

fn letters() -> impl Iterator<Item = char> + Clone {
    (b'A'..=b'Z').map(char::from)
}

fn two_letter_codes(taken: &HashSet<String>) -> Vec<String> {
    letters()
        .flat_map(|a| letters().map(move |b| format!("${a}{b}")))
        .filter(|c| !is_reserved(c) && !taken.contains(c))
        .collect()
}

/// Generate `n` codes of one width, in lexicographic order, skipping
/// reserved prefixes and anything in `taken`. Width is 2 letters when
/// that suffices, otherwise 3.
pub fn generate_codes(n: usize, taken: &HashSet<String>) -> Vec<String> {
    let two = two_letter_codes(taken);
    if n <= two.len() {
        return two.into_iter().take(n).collect();
    }
    letters()
        .flat_map(|a| letters().flat_map(move |b| letters().map(move |c| format!("${a}{b}{c}"))))
        .filter(|c| !is_reserved(c) && !taken.contains(c))
        .take(n)
        .collect()
}

/// Extract word n-grams of at least `MIN_PHRASE_LEN` chars.
fn tokenize_ngrams(text: &str, min_n: usize, max_n: usize) -> HashMap<String, usize> {
    let mut counter: HashMap<String, usize> = HashMap::new();
    let words: Vec<&str> = text.split_whitespace().collect();
    for n in min_n..=max_n {
        for window in words.windows(n) {
            let gram = window.join(" ");
            if gram.chars().count() >= MIN_PHRASE_LEN {
                *counter.entry(gram).or_insert(0) += 1;
            }
        }
    }
    counter
}

/// Directory prefixes of at least three components, counted per occurrence.
fn path_prefixes(text: &str) -> HashMap<String, usize> {
    let mut counter: HashMap<String, usize> = HashMap::new();
    for m in RE_PATH.find_iter(text) {
        let parts: Vec<&str> = m.as_str().split('/').collect();
        // parts[0] is empty for the leading slash.
        for depth in 4..=parts.len() {
            *counter.entry(parts[..depth].join("/")).or_insert(0) += 1;
        }
    }
    counter
}

/// `a.b.c.` prefixes of IPv4 addresses.
fn ip_prefixes(text: &str) -> HashMap<String, usize> {
    let mut counter: HashMap<String, usize> = HashMap::new();
    for cap in RE_IP_PREFIX.captures_iter(text) {
        if let Some(prefix) = cap.get(1) {
            *counter.entry(prefix.as_str().to_string()).or_insert(0) += 1;
        }
    }
    counter
}

/// Phrase-to-code mapping. Serialized as `{phrase: code}` with sorted keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Codebook {
    entries: BTreeMap<String, String>,
}

impl Codebook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(code, phrase)` pairs, validating codes and uniqueness.
    pub fn from_codes<I, C, P>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (C, P)>,
        C: Into<String>,
        P: Into<String>,
    {
        let mut entries = BTreeMap::new();
        let mut codes = HashSet::new();
        for (code, phrase) in pairs {
            let (code, phrase) = (code.into(), phrase.into());
            if !RE_CODE.is_match(&code) {
                return Err(CompactorError::InvalidArgument(format!("malformed code {code:?}")));
            }
            if phrase.is_empty() {
                return Err(CompactorError::InvalidArgument(format!("empty phrase for {code}")));
            }
            if !codes.insert(code.clone()) || entries.insert(phrase.clone(), code).is_some() {
                return Err(CompactorError::InvalidArgument(format!("duplicate entry for {phrase:?}")));
            }
        }
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn code_for(&self, phrase: &str) -> Option<&str> {
        self.entries.get(phrase).map(String::as_str)
    }

    pub fn phrase_for(&self, code: &str) -> Option<&str> {
        self.entries.iter().find(|(_, c)| *c == code).map(|(p, _)| p.as_str())
    }

    /// `(phrase, code)` pairs in phrase order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(p, c)| (p.as_str(), c.as_str()))
    }

    /// `{code: phrase}`, the reverse view.
    pub fn to_code_map(&self) -> BTreeMap<String, String> {
        self.entries.iter().map(|(p, c)| (c.clone(), p.clone())).collect()
    }

    /// `(code, phrase)` from one persisted pair, whichever side holds the code.
    fn orient(key: String, value: String) -> (String, String) {
        if RE_CODE.is_match(&key) {
            (key, value)
        } else {
            (value, key)
        }
    }

    /// Codes of this book already present verbatim in `text`. Decoding such
    /// text would expand them, so it is not safe to encode.
    pub fn conflicts_in(&self, text: &str) -> Vec<String> {
        let codes: HashSet<&str> = self.entries.values().map(String::as_str).collect();
        let mut found: Vec<String> = code_like_prefixes(text)
            .into_iter()
            .filter(|c| codes.contains(c))
            .map(str::to_string)
            .collect();
        found.sort();
        found
    }

    pub fn is_safe_for(&self, text: &str) -> bool {
        self.conflicts_in(text).is_empty()
    }

    /// Single-pass alternation, longest alternative first.
    fn alternation<'a>(keys: impl Iterator<Item = &'a str>) -> Option<Regex> {
        let mut keys: Vec<&str> = keys.collect();
        if keys.is_empty() {
            return None;
        }
        keys.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
        let pattern = keys.iter().map(|k| regex::escape(k)).collect::<Vec<_>>().join("|");
        Regex::new(&pattern).ok()
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        save_json(&self.entries, path.as_ref())
    }

    /// Load a codebook. Accepts `{phrase: code}`, the older `{code: phrase}`
    /// and the versioned `{"version": 1, "entries": {code: phrase}}` layout.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw: serde_json::Value = load_json(path)?;
        let map = raw.get("entries").filter(|e| e.is_object()).unwrap_or(&raw);
        let obj = map
            .as_object()
            .ok_or_else(|| CompactorError::parse(path, "codebook must be a JSON object"))?;
        let mut pairs = Vec::with_capacity(obj.len());
        for (key, value) in obj {
            let value = value
                .as_str()
                .ok_or_else(|| CompactorError::parse(path, format!("value for {key} is not a string")))?;
            pairs.push(Self::orient(key.clone(), value.to_string()));
        }
        Self::from_codes(pairs).map_err(|e| CompactorError::parse(path, e.to_string()))
    }
}

impl Serialize for Codebook {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.entries.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Codebook {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let map = BTreeMap::<String, String>::deserialize(deserializer)?;
        Self::from_codes(map.into_iter().map(|(k, v)| Self::orient(k, v))).map_err(serde::de::Error::custom)
    }
}

impl TextCodec for Codebook {
    fn name(&self) -> &'static str {
        "dictionary"
    }

    fn compress(&self, text: &str) -> String {
        if text.is_empty() {
            return String::new();
        }
        match Self::alternation(self.entries.keys().map(String::as_str)) {
            Some(re) => re
                .replace_all(text, |caps: &regex::Captures| {
                    self.entries.get(&caps[0]).cloned().unwrap_or_else(|| caps[0].to_string())
                })
                .into_owned(),
            None => text.to_string(),
        }
    }

    fn decompress(&self, text: &str) -> String {
        if text.is_empty() {
            return String::new();
        }
        let by_code: HashMap<&str, &str> =
            self.entries.iter().map(|(p, c)| (c.as_str(), p.as_str())).collect();
        match Self::alternation(by_code.keys().copied()) {
            Some(re) => re
                .replace_all(text, |caps: &regex::Captures| {
                    by_code.get(&caps[0]).copied().unwrap_or(&caps[0]).to_string()
                })
                .into_owned(),
            None => text.to_string(),
        }
    }
}

/// Build a codebook from text samples with default parameters.
pub fn build_codebook(texts: &[&str]) -> Codebook {
    build_codebook_with(texts, &DictionaryConfig::default())
}

pub fn build_codebook_with_params(texts: &[&str], min_freq: usize, max_entries: usize) -> Codebook {
    build_codebook_with(texts, &DictionaryConfig { min_freq, max_entries, ..Default::default() })
}

/// Rank candidate phrases by `(len - code_len) * freq` and assign codes in
/// rank order. Codes already present in the corpus are never issued.
pub fn build_codebook_with(texts: &[&str], config: &DictionaryConfig) -> Codebook {
    if texts.is_empty() || config.max_entries == 0 {
        return Codebook::new();
    }

    let corpus_bytes: usize = texts.iter().map(|t| t.len()).sum();
    let use_ngrams = corpus_bytes <= config.max_ngram_corpus_bytes;
    if !use_ngrams {
        debug!("corpus of {corpus_bytes} bytes above n-gram ceiling, using prefixes only");
    }

    let mut combined: HashMap<String, usize> = HashMap::new();
    let mut taken: HashSet<String> = HashSet::new();
    for text in texts {
        if use_ngrams {
            for (gram, count) in tokenize_ngrams(text, 2, 5) {
                *combined.entry(gram).or_insert(0) += count;
            }
        }
        taken.extend(code_like_prefixes(text).into_iter().map(str::to_string));
    }
    let mut prefixes: HashMap<String, usize> = HashMap::new();
    for text in texts {
        for (prefix, count) in path_prefixes(text).into_iter().chain(ip_prefixes(text)) {
            *prefixes.entry(prefix).or_insert(0) += count;
        }
    }
    for (prefix, count) in prefixes {
        let slot = combined.entry(prefix).or_insert(0);
        *slot = (*slot).max(count);
    }

    let mut candidates: Vec<(String, usize)> = combined
        .into_iter()
        .filter(|(phrase, count)| {
            *count >= config.min_freq && phrase.chars().count() >= MIN_PHRASE_LEN && !phrase.contains('$')
        })
        .collect();

    let wanted = candidates.len().min(config.max_entries);
    let code_len = if wanted <= two_letter_codes(&taken).len() { 3 } else { 4 };

    let score = |phrase: &str, count: usize| phrase.chars().count().saturating_sub(code_len) * count;
    candidates.sort_by(|a, b| score(&b.0, b.1).cmp(&score(&a.0, a.1)).then_with(|| a.0.cmp(&b.0)));

    let mut chosen: Vec<String> = Vec::new();
    for (phrase, _) in candidates {
        if phrase.chars().count() <= code_len {
            continue;
        }
        let overlaps = chosen
            .iter()
            .any(|existing| phrase.contains(existing.as_str()) || existing.contains(phrase.as_str()));
        if overlaps {
            continue;
        }
        chosen.push(phrase);
        if chosen.len() >= config.max_entries {
            break;
        }
    }

    let codes = generate_codes(chosen.len(), &taken);
    let entries = chosen.into_iter().zip(codes).collect();
    Codebook { entries }
}

/// Encode `text` with `codebook`.
pub fn compress_text(text: &str, codebook: &Codebook) -> String {
    codebook.compress(text)
}

/// Expand every code in `text`. Unknown codes pass through.
pub fn decompress_text(text: &str, codebook: &Codebook) -> String {
    codebook.decompress(text)
}

/// Before/after accounting for an encoding, including codebook overhead.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DictionaryStats {
    pub original_chars: usize,
    pub compressed_chars: usize,
    pub codebook_entries: usize,
    pub codes_used: usize,
    pub gross_reduction_pct: f64,
    pub net_reduction_pct: f64,
}

pub fn compression_stats(original: &str, compressed: &str, codebook: &Codebook) -> DictionaryStats {
    let original_chars = original.chars().count();
    let compressed_chars = compressed.chars().count();
    let overhead: usize = codebook.iter().map(|(p, c)| p.chars().count() + c.len() + 2).sum();
    let codes_used = codebook.iter().filter(|(_, code)| compressed.contains(code)).count();
    let pct = |after: usize| {
        if original_chars == 0 {
            0.0
        } else {
            let p = (original_chars as f64 - after as f64) / original_chars as f64 * 100.0;
            (p * 10.0).round() / 10.0
        }
    };
    DictionaryStats {
        original_chars,
        compressed_chars,
        codebook_entries: codebook.len(),
        codes_used,
        gross_reduction_pct: pct(compressed_chars),
        net_reduction_pct: pct(compressed_chars + overhead),
    }
}
