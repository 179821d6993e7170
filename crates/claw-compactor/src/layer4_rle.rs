//! Layer 4: Structural run-length encoding. Workspace roots become `$WS`
//! placeholders and recurring IPv4 /24 families become `$IPn` prefixes.
//!
//! Every literal `$` is escaped as `$$` before substitution, so any text
//! round-trips.

use crate::codec::{load_json, save_json, TextCodec};
use claw_core::{CompactorError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::LazyLock;

pub const WORKSPACE_PLACEHOLDER: &str = "$WS";
pub const IP_PLACEHOLDER: &str = "$IP";
/// Default location of the persisted map, relative to the workspace.
pub const PREFIX_MAP_FILE: &str = "memory/.prefixmap.json";

static RE_IPV4: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,3}\.\d{1,3}\.\d{1,3}\.)(\d{1,3})\b").unwrap());

fn is_path_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '~' | '-')
}

/// Placeholder → expansion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrefixMap {
    entries: BTreeMap<String, String>,
}

impl PrefixMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// `$WS`, `$WS1`, ... for each non-empty root, in the order given.
    pub fn for_roots(roots: &[&str]) -> Self {
        let mut map = Self::new();
        let usable = roots
            .iter()
            .map(|r| r.trim_end_matches('/'))
            .filter(|r| !r.is_empty() && !r.contains('$'));
        for (i, root) in usable.enumerate() {
            let key = if i == 0 { WORKSPACE_PLACEHOLDER.to_string() } else { format!("{WORKSPACE_PLACEHOLDER}{i}") };
            map.entries.insert(key, root.to_string());
        }
        map
    }

    pub fn insert(&mut self, placeholder: impl Into<String>, expansion: impl Into<String>) {
        self.entries.insert(placeholder.into(), expansion.into());
    }

    pub fn get(&self, placeholder: &str) -> Option<&str> {
        self.entries.get(placeholder).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn roots(&self) -> Vec<(&str, &str)> {
        let mut roots: Vec<(&str, &str)> =
            self.iter().filter(|(k, v)| k.starts_with(WORKSPACE_PLACEHOLDER) && !v.is_empty()).collect();
        roots.sort_by(|a, b| b.1.len().cmp(&a.1.len()));
        roots
    }

    fn ip_families(&self) -> HashMap<&str, &str> {
        self.iter()
            .filter(|(k, _)| k.starts_with(IP_PLACEHOLDER))
            .map(|(k, v)| (v, k))
            .collect()
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        save_json(self, path.as_ref())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let map: Self = load_json(path)?;
        if let Some(bad) = map.entries.keys().find(|k| !k.starts_with('$')) {
            return Err(CompactorError::parse(path, format!("placeholder {bad:?} must start with '$'")));
        }
        Ok(map)
    }
}

pub fn escape_dollars(text: &str) -> String {
    text.replace('$', "$$")
}

/// Replace every root in one left-to-right pass, longest root first at each
/// position, where the following char does not continue a path segment.
/// Emitted placeholders are never rescanned.
fn substitute_roots(text: &str, roots: &[(&str, &str)]) -> String {
    if roots.is_empty() {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(c) = rest.chars().next() {
        let hit = roots.iter().find(|(_, root)| {
            rest.starts_with(root) && !rest[root.len()..].chars().next().is_some_and(is_path_char)
        });
        match hit {
            Some((placeholder, root)) => {
                out.push_str(placeholder);
                rest = &rest[root.len()..];
            }
            None => {
                out.push(c);
                rest = &rest[c.len_utf8()..];
            }
        }
    }
    out
}

/// Expand placeholders and `$$` escapes in one left-to-right pass.
pub fn expand(text: &str, map: &PrefixMap) -> String {
    if !text.contains('$') {
        return text.to_string();
    }
    let mut keys: Vec<&str> = map.entries.keys().map(String::as_str).collect();
    keys.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
    let pattern = std::iter::once(r"\$\$".to_string())
        .chain(keys.iter().map(|k| regex::escape(k)))
        .collect::<Vec<_>>()
        .join("|");
    let Ok(re) = Regex::new(&pattern) else {
        return text.to_string();
    };
    re.replace_all(text, |caps: &regex::Captures| match &caps[0] {
        "$$" => "$".to_string(),
        key => map.get(key).unwrap_or(key).to_string(),
    })
    .into_owned()
}

/// Encoder holding a fixed placeholder map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RleCodec {
    map: PrefixMap,
}

impl RleCodec {
    pub fn new(map: PrefixMap) -> Self {
        Self { map }
    }

    /// Learn workspace roots and every /24 family seen at least twice
    /// across `texts`. Families are numbered in first-occurrence order.
    pub fn learn(roots: &[&str], texts: &[&str]) -> Self {
        let mut map = PrefixMap::for_roots(roots);
        let mut order: Vec<&str> = Vec::new();
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for text in texts {
            for cap in RE_IPV4.captures_iter(text) {
                let Some(prefix) = cap.get(1).map(|m| m.as_str()) else { continue };
                let count = counts.entry(prefix).or_insert(0);
                if *count == 0 {
                    order.push(prefix);
                }
                *count += 1;
            }
        }
        let families: Vec<&str> = order.into_iter().filter(|p| counts[p] >= 2).collect();
        let width = families.len().saturating_sub(1).to_string().len();
        for (i, prefix) in families.iter().enumerate() {
            map.insert(format!("{IP_PLACEHOLDER}{i:0width$}"), *prefix);
        }
        Self { map }
    }

    pub fn prefix_map(&self) -> &PrefixMap {
        &self.map
    }

    pub fn into_prefix_map(self) -> PrefixMap {
        self.map
    }
}

impl TextCodec for RleCodec {
    fn name(&self) -> &'static str {
        "rle"
    }

    fn compress(&self, text: &str) -> String {
        let mut out = substitute_roots(&escape_dollars(text), &self.map.roots());
        let families = self.map.ip_families();
        if !families.is_empty() {
            out = RE_IPV4
                .replace_all(&out, |caps: &regex::Captures| match families.get(&caps[1]) {
                    Some(placeholder) => format!("{placeholder}{}", &caps[2]),
                    None => caps[0].to_string(),
                })
                .into_owned();
        }
        out
    }

    fn decompress(&self, text: &str) -> String {
        expand(text, &self.map)
    }
}

/// Replace workspace roots with `$WS`, `$WS1`, ...
pub fn compress_paths(text: &str, roots: &[&str]) -> String {
    RleCodec::new(PrefixMap::for_roots(roots)).compress(text)
}

pub fn decompress_paths(text: &str, root: &str) -> String {
    expand(text, &PrefixMap::for_roots(&[root]))
}

/// Factor recurring /24 prefixes into `$IPn` placeholders.
pub fn compress_ip_families(text: &str) -> (String, PrefixMap) {
    let codec = RleCodec::learn(&[], &[text]);
    let out = codec.compress(text);
    (out, codec.into_prefix_map())
}

pub fn decompress_ip_families(text: &str, map: &PrefixMap) -> String {
    expand(text, map)
}
