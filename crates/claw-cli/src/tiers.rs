//! Tiered summaries: nested section selections under growing token budgets.

use chrono::{NaiveDate, Utc};
use claw_compactor::preserve::find_literals;
use claw_compactor::sections::{parse_sections, Section};
use claw_core::TokenCounter;
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::LazyLock;

const HIGH_KEYWORDS: &[&str] = &[
    "decision", "important", "critical", "config", "setup", "credential", "security", "todo",
    "active", "current", "priority", "rule", "preference", "key",
];
const LOW_KEYWORDS: &[&str] = &["archive", "old", "deprecated", "log", "history", "misc", "scratch"];
const RECENCY_WINDOW_DAYS: i64 = 90;

static RE_HEADER_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{4}-\d{2}-\d{2})\b").unwrap());

#[derive(Debug, Clone, Serialize)]
pub struct TierSection {
    pub file: String,
    pub header: String,
    pub level: usize,
    pub tokens: usize,
    pub priority: f64,
    #[serde(skip)]
    pub body: String,
}

impl TierSection {
    fn render(&self) -> String {
        if self.level == 0 {
            self.body.clone()
        } else if self.body.is_empty() {
            format!("{} {}", "#".repeat(self.level), self.header)
        } else {
            format!("{} {}\n\n{}", "#".repeat(self.level), self.header, self.body)
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Tier {
    pub level: usize,
    pub budget: usize,
    pub tokens_used: usize,
    pub sections: Vec<TierSection>,
}

impl Tier {
    /// Markdown for the tier, sections in priority order.
    pub fn render(&self) -> String {
        let mut out = format!("# Memory Summary L{}\n", self.level);
        for section in &self.sections {
            out.push('\n');
            out.push_str(&section.render());
            out.push('\n');
        }
        out
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TierReport {
    pub total_tokens: usize,
    pub total_sections: usize,
    pub tiers: Vec<Tier>,
}

fn words(header: &str) -> Vec<String> {
    header
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Score a section: header keywords, header depth, literal density and the
/// recency of any date in the header.
pub fn section_priority(section: &Section, tokens: usize, today: NaiveDate) -> f64 {
    let words = words(&section.header);
    let has = |list: &[&str]| words.iter().any(|w| list.contains(&w.as_str()));
    let mut score = 0.0;
    if has(HIGH_KEYWORDS) {
        score += 3.0;
    }
    if has(LOW_KEYWORDS) {
        score -= 2.0;
    }
    score += match section.level {
        0 => 2.0,
        n => (7 - n.min(6)) as f64 * 0.5,
    };
    let literals = find_literals(&section.body).len();
    score += (literals as f64 / tokens.max(1) as f64 * 20.0).min(3.0);
    if let Some(date) = RE_HEADER_DATE
        .captures(&section.header)
        .and_then(|c| NaiveDate::parse_from_str(&c[1], "%Y-%m-%d").ok())
    {
        let age = (today - date).num_days().clamp(0, RECENCY_WINDOW_DAYS);
        score += 3.0 * (1.0 - age as f64 / RECENCY_WINDOW_DAYS as f64);
    }
    (score * 100.0).round() / 100.0
}

/// Split `(file, text)` documents into sections and select tiers.
///
/// Each tier keeps the previous tier's selection and adds sections in
/// priority order while they fit, so tiers are nested and token usage
/// never shrinks from one tier to the next.
pub fn generate_tiers(docs: &[(String, String)], budgets: &[usize], counter: &TokenCounter) -> TierReport {
    generate_tiers_at(docs, budgets, counter, Utc::now().date_naive())
}

pub fn generate_tiers_at(
    docs: &[(String, String)],
    budgets: &[usize],
    counter: &TokenCounter,
    today: NaiveDate,
) -> TierReport {
    let mut sections = Vec::new();
    for (file, text) in docs {
        for section in parse_sections(text) {
            if section.header.is_empty() && section.body.is_empty() {
                continue;
            }
            let mut entry = TierSection {
                file: file.clone(),
                header: section.header.clone(),
                level: section.level,
                tokens: 0,
                priority: 0.0,
                body: section.body.clone(),
            };
            entry.tokens = counter.count(&entry.render());
            entry.priority = section_priority(&section, entry.tokens, today);
            sections.push(entry);
        }
    }

    let mut order: Vec<usize> = (0..sections.len()).collect();
    order.sort_by(|&a, &b| sections[b].priority.total_cmp(&sections[a].priority).then(a.cmp(&b)));

    let mut selected: HashSet<usize> = HashSet::new();
    let mut used = 0;
    let mut floor = 0;
    let mut tiers = Vec::new();
    for (level, &budget) in budgets.iter().enumerate() {
        let budget = budget.max(floor);
        floor = budget;
        for &i in &order {
            if !selected.contains(&i) && used + sections[i].tokens <= budget {
                selected.insert(i);
                used += sections[i].tokens;
            }
        }
        tiers.push(Tier {
            level,
            budget,
            tokens_used: used,
            sections: order.iter().filter(|i| selected.contains(*i)).map(|&i| sections[i].clone()).collect(),
        });
    }

    TierReport {
        total_tokens: sections.iter().map(|s| s.tokens).sum(),
        total_sections: sections.len(),
        tiers,
    }
}
