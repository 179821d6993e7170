//! Compression pipeline: the guarded rule stages, then optional
//! tokenizer optimization and reversible encodings.

use crate::codec::TextCodec;
use crate::layer1_format as fmt;
use crate::layer2_tokenizer::optimize_tokens_with;
use crate::layer3_dictionary::{build_codebook_with, Codebook};
use crate::layer4_rle::{PrefixMap, RleCodec};
use crate::preserve::missing_literals;
use claw_core::{reduction_pct, DictionaryConfig, RuleConfig, StageStats, TokenCounter};
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// One deterministic rewrite of the rule pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleStage {
    CjkPunct,
    Redundancy,
    DuplicateLines,
    EmptySections,
    TableToKv,
    Emoji,
    SimilarBullets,
    ShortBullets,
    FinalCleanup,
}

impl RuleStage {
    pub const ORDER: [RuleStage; 9] = [
        Self::CjkPunct,
        Self::Redundancy,
        Self::DuplicateLines,
        Self::EmptySections,
        Self::TableToKv,
        Self::Emoji,
        Self::SimilarBullets,
        Self::ShortBullets,
        Self::FinalCleanup,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::CjkPunct => "cjk_punct",
            Self::Redundancy => "redundancy",
            Self::DuplicateLines => "duplicate_lines",
            Self::EmptySections => "empty_sections",
            Self::TableToKv => "table_to_kv",
            Self::Emoji => "emoji",
            Self::SimilarBullets => "similar_bullets",
            Self::ShortBullets => "short_bullets",
            Self::FinalCleanup => "final_cleanup",
        }
    }

    fn apply(&self, text: &str, config: &RuleConfig) -> String {
        match self {
            Self::CjkPunct => fmt::cjk_punct_pass(text),
            Self::Redundancy | Self::FinalCleanup => fmt::redundancy_pass(text),
            Self::DuplicateLines => fmt::duplicate_lines_pass(text),
            Self::EmptySections => fmt::empty_sections_pass(text),
            Self::TableToKv => fmt::table_pass(text, false),
            Self::Emoji => fmt::emoji_pass(text),
            Self::SimilarBullets => fmt::similar_bullets_pass(text, config.similarity_threshold),
            Self::ShortBullets => {
                fmt::short_bullets_pass(text, config.short_bullet_chars, config.max_short_merges)
            }
        }
    }
}

/// Output of a rule pipeline run.
#[derive(Debug, Clone)]
pub struct RuleOutput {
    pub output: String,
    pub tokens_in: usize,
    pub tokens_out: usize,
    /// Per-stage totals across all passes, in stage order.
    pub stages: Vec<StageStats>,
    pub passes: usize,
}

/// The deterministic rule stages, applied in order until nothing changes.
///
/// A stage result is discarded when it would raise the token count or drop
/// a protected literal, so every run is monotone and literal-preserving.
#[derive(Debug, Clone)]
pub struct RulePipeline {
    config: RuleConfig,
    counter: TokenCounter,
}

impl Default for RulePipeline {
    fn default() -> Self {
        Self::new(RuleConfig::default(), TokenCounter::global())
    }
}

impl RulePipeline {
    pub fn new(config: RuleConfig, counter: TokenCounter) -> Self {
        Self { config, counter }
    }

    pub fn config(&self) -> &RuleConfig {
        &self.config
    }

    fn stages(&self) -> impl Iterator<Item = RuleStage> + '_ {
        RuleStage::ORDER
            .into_iter()
            .filter(|s| *s != RuleStage::Emoji || self.config.enable_emoji_strip)
    }

    pub fn run(&self, text: &str) -> RuleOutput {
        let tokens_in = self.counter.count(text);
        let mut current = text.to_string();
        let mut current_tokens = tokens_in;
        let mut stages: Vec<StageStats> = self
            .stages()
            .map(|s| StageStats {
                stage_name: s.name().to_string(),
                tokens_in,
                tokens_out: tokens_in,
                bytes_in: text.len(),
                bytes_out: text.len(),
                wall_time_ms: 0.0,
            })
            .collect();
        let mut passes = 0;

        while passes < self.config.max_passes.max(1) && !current.is_empty() {
            passes += 1;
            let before = current.clone();
            for (stage, stats) in self.stages().zip(stages.iter_mut()) {
                let start = Instant::now();
                if passes == 1 {
                    stats.tokens_in = current_tokens;
                    stats.bytes_in = current.len();
                }
                let candidate = stage.apply(&current, &self.config);
                if candidate != current {
                    let candidate_tokens = self.counter.count(&candidate);
                    if candidate_tokens > current_tokens {
                        trace!(stage = stage.name(), "rejected: token increase");
                    } else if let Some(lost) = missing_literals(&current, &candidate).first() {
                        trace!(stage = stage.name(), literal = %lost, "rejected: protected literal lost");
                    } else {
                        current = candidate;
                        current_tokens = candidate_tokens;
                    }
                }
                stats.tokens_out = current_tokens;
                stats.bytes_out = current.len();
                stats.wall_time_ms += start.elapsed().as_secs_f64() * 1000.0;
            }
            if current == before {
                break;
            }
        }

        debug!(tokens_in, tokens_out = current_tokens, passes, "rule pipeline done");
        RuleOutput { output: current, tokens_in, tokens_out: current_tokens, stages, passes }
    }
}

/// Apply the rule pipeline with default settings.
pub fn rule_compress(text: &str) -> String {
    RulePipeline::default().run(text).output
}

pub fn rule_compress_with(text: &str, config: &RuleConfig) -> String {
    RulePipeline::new(config.clone(), TokenCounter::global()).run(text).output
}

/// Instructions asking a language model to compress `text` to roughly
/// `target_pct` percent of its size without losing facts.
pub fn generate_llm_prompt(text: &str, target_pct: u8) -> String {
    format!(
        "Rewrite the memory notes below in about {target_pct}% of their current length.\n\
         \n\
         Rules:\n\
         - Keep every fact, decision, number, date, IP address, path, URL and identifier exactly as written\n\
         - Remove filler, repetition and decoration that carries no information\n\
         - Merge related bullets and prefer `key: value` lines over prose\n\
         - Answer with the rewritten markdown only\n\
         \n\
         <notes>\n{text}\n</notes>\n"
    )
}

/// Compression level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionLevel {
    /// Rule stages only. Lossy but literal-preserving.
    #[default]
    Rule,
    /// Rules plus tokenizer-aware formatting.
    Optimized,
    /// Everything above plus reversible dictionary and RLE encoding.
    Encoded,
}

/// Compression result with statistics.
#[derive(Debug, Clone, Serialize)]
pub struct CompressionResult {
    pub output: String,
    pub tokens_in: usize,
    pub tokens_out: usize,
    pub reduction_pct: f64,
    pub level: CompressionLevel,
    pub stages: Vec<StageStats>,
    /// Present when the dictionary layer was applied.
    pub codebook: Option<Codebook>,
    /// Present when the RLE layer was applied.
    pub prefix_map: Option<PrefixMap>,
}

impl CompressionResult {
    pub fn ratio(&self) -> f64 {
        if self.tokens_in == 0 { return 1.0; }
        self.tokens_out as f64 / self.tokens_in as f64
    }
}

/// The main compactor pipeline.
#[derive(Debug, Clone)]
pub struct CompactorPipeline {
    pub level: CompressionLevel,
    rules: RuleConfig,
    dictionary: DictionaryConfig,
    counter: TokenCounter,
    codebook: Option<Codebook>,
    roots: Vec<String>,
}

impl CompactorPipeline {
    pub fn new(level: CompressionLevel) -> Self {
        Self {
            level,
            rules: RuleConfig::default(),
            dictionary: DictionaryConfig::default(),
            counter: TokenCounter::global(),
            codebook: None,
            roots: Vec::new(),
        }
    }

    pub fn rule() -> Self { Self::new(CompressionLevel::Rule) }
    pub fn optimized() -> Self { Self::new(CompressionLevel::Optimized) }
    pub fn encoded() -> Self { Self::new(CompressionLevel::Encoded) }

    pub fn with_rules(mut self, rules: RuleConfig) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_dictionary(mut self, dictionary: DictionaryConfig) -> Self {
        self.dictionary = dictionary;
        self
    }

    pub fn with_counter(mut self, counter: TokenCounter) -> Self {
        self.counter = counter;
        self
    }

    /// Encode with a fixed codebook instead of learning one per input.
    pub fn with_codebook(mut self, codebook: Codebook) -> Self {
        self.codebook = Some(codebook);
        self
    }

    /// Workspace roots for the RLE layer.
    pub fn with_roots(mut self, roots: Vec<String>) -> Self {
        self.roots = roots;
        self
    }

    fn timed(
        &self,
        name: &str,
        input: &str,
        f: impl FnOnce(&str) -> String,
    ) -> (String, StageStats) {
        let start = Instant::now();
        let output = f(input);
        let elapsed: Duration = start.elapsed();
        let stats = StageStats::measure(name, &self.counter, input, &output, elapsed);
        (output, stats)
    }

    /// Compress text through the pipeline.
    pub fn compress(&self, text: &str) -> CompressionResult {
        let rules = RulePipeline::new(self.rules.clone(), self.counter).run(text);
        let tokens_in = rules.tokens_in;
        let mut stages = rules.stages;
        let mut result = rules.output;
        let mut codebook = None;
        let mut prefix_map = None;

        if matches!(self.level, CompressionLevel::Optimized | CompressionLevel::Encoded) {
            let (out, stats) =
                self.timed("tokenizer_opt", &result, |s| optimize_tokens_with(&self.counter, s, false));
            result = out;
            stages.push(stats);
        }

        if matches!(self.level, CompressionLevel::Encoded) {
            let cb = match &self.codebook {
                Some(cb) if cb.is_safe_for(&result) => Some(cb.clone()),
                Some(_) => None,
                None => Some(build_codebook_with(&[result.as_str()], &self.dictionary))
                    .filter(|cb| !cb.is_empty()),
            };
            if let Some(cb) = cb {
                let (out, stats) = self.timed("dictionary", &result, |s| cb.compress(s));
                if stats.tokens_out <= stats.tokens_in {
                    result = out;
                    stages.push(stats);
                    codebook = Some(cb);
                }
            }

            let roots: Vec<&str> = self.roots.iter().map(String::as_str).collect();
            let rle = RleCodec::learn(&roots, &[result.as_str()]);
            let (out, stats) = self.timed("rle", &result, |s| rle.compress(s));
            if stats.tokens_out <= stats.tokens_in && out != result {
                result = out;
                stages.push(stats);
                prefix_map = Some(rle.into_prefix_map());
            }
        }

        let tokens_out = self.counter.count(&result);
        CompressionResult {
            output: result,
            tokens_in,
            tokens_out,
            reduction_pct: reduction_pct(tokens_in, tokens_out),
            level: self.level,
            stages,
            codebook,
            prefix_map,
        }
    }

    /// Undo the reversible layers. Rule and tokenizer stages are lossy and
    /// stay applied.
    pub fn decompress(&self, text: &str, codebook: Option<&Codebook>, prefix_map: Option<&PrefixMap>) -> String {
        let mut result = text.to_string();
        if let Some(map) = prefix_map {
            result = RleCodec::new(map.clone()).decompress(&result);
        }
        if let Some(cb) = codebook {
            result = cb.decompress(&result);
        }
        result
    }
}

impl Default for CompactorPipeline {
    fn default() -> Self {
        Self::new(CompressionLevel::Rule)
    }
}
