//! Tokenizer facade: exact BPE counts via tiktoken, with a calibrated
//! character heuristic when no BPE table is available.

use crate::error::{CompactorError, Result};
use serde::{Deserialize, Serialize};
use std::sync::{LazyLock, OnceLock};
use tiktoken_rs::CoreBPE;
use tracing::{debug, warn};

/// Characters per token for the heuristic. Within ±15% of cl100k on
/// ASCII-heavy markdown.
pub const HEURISTIC_CHARS_PER_TOKEN: usize = 4;

/// BPE table selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenizerKind {
    #[default]
    Cl100kBase,
    O200kBase,
    P50kBase,
    Heuristic,
}

impl TokenizerKind {
    /// Interpret a `TOKENIZER_MODEL` value. Unknown hints map to the default.
    pub fn from_hint(hint: &str) -> Self {
        match hint.trim().to_ascii_lowercase().as_str() {
            "cl100k_base" | "cl100k" | "gpt-4" | "gpt-3.5-turbo" => Self::Cl100kBase,
            "o200k_base" | "o200k" | "gpt-4o" | "gpt-4.1" => Self::O200kBase,
            "p50k_base" | "p50k" => Self::P50kBase,
            "heuristic" | "none" | "chars" => Self::Heuristic,
            other => {
                debug!("unknown TOKENIZER_MODEL hint {other:?}, using cl100k_base");
                Self::default()
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cl100kBase => "cl100k_base",
            Self::O200kBase => "o200k_base",
            Self::P50kBase => "p50k_base",
            Self::Heuristic => "heuristic",
        }
    }
}

static CL100K: OnceLock<Option<CoreBPE>> = OnceLock::new();
static O200K: OnceLock<Option<CoreBPE>> = OnceLock::new();
static P50K: OnceLock<Option<CoreBPE>> = OnceLock::new();

fn init_table(kind: TokenizerKind, loaded: anyhow::Result<CoreBPE>) -> Option<CoreBPE> {
    match loaded {
        Ok(bpe) => Some(bpe),
        Err(e) => {
            warn!("failed to load {} table, falling back to heuristic: {e}", kind.as_str());
            None
        }
    }
}

fn bpe_table(kind: TokenizerKind) -> Option<&'static CoreBPE> {
    match kind {
        TokenizerKind::Cl100kBase => CL100K
            .get_or_init(|| init_table(kind, tiktoken_rs::cl100k_base()))
            .as_ref(),
        TokenizerKind::O200kBase => O200K
            .get_or_init(|| init_table(kind, tiktoken_rs::o200k_base()))
            .as_ref(),
        TokenizerKind::P50kBase => P50K
            .get_or_init(|| init_table(kind, tiktoken_rs::p50k_base()))
            .as_ref(),
        TokenizerKind::Heuristic => None,
    }
}

/// Cheap handle selecting a token counting strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenCounter {
    kind: TokenizerKind,
}

impl TokenCounter {
    /// Counter for `kind`; degrades to the heuristic if the table fails to load.
    pub fn new(kind: TokenizerKind) -> Self {
        if kind != TokenizerKind::Heuristic && bpe_table(kind).is_none() {
            return Self::heuristic();
        }
        Self { kind }
    }

    pub fn heuristic() -> Self {
        Self { kind: TokenizerKind::Heuristic }
    }

    /// Counter selected by the `TOKENIZER_MODEL` environment hint.
    pub fn from_env() -> Self {
        let kind = std::env::var("TOKENIZER_MODEL")
            .map(|hint| TokenizerKind::from_hint(&hint))
            .unwrap_or_default();
        Self::new(kind)
    }

    /// The process-wide default counter.
    pub fn global() -> Self {
        *DEFAULT_COUNTER
    }

    pub fn kind(&self) -> TokenizerKind {
        self.kind
    }

    pub fn is_bpe(&self) -> bool {
        self.kind != TokenizerKind::Heuristic
    }

    pub fn name(&self) -> &'static str {
        self.kind.as_str()
    }

    pub fn count(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        match bpe_table(self.kind) {
            Some(bpe) => bpe.encode_ordinary(text).len(),
            None => heuristic_tokens(text),
        }
    }
}

impl Default for TokenCounter {
    fn default() -> Self {
        Self::global()
    }
}

static DEFAULT_COUNTER: LazyLock<TokenCounter> = LazyLock::new(TokenCounter::from_env);

/// `ceil(chars / 4)`.
pub fn heuristic_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(HEURISTIC_CHARS_PER_TOKEN)
}

/// Token count of `text` using the default counter. Empty text is 0.
pub fn estimate_tokens(text: &str) -> usize {
    TokenCounter::global().count(text)
}

/// Token count of raw bytes. Fails when the bytes are not UTF-8 text.
pub fn try_estimate_tokens(bytes: &[u8]) -> Result<usize> {
    let text = std::str::from_utf8(bytes).map_err(|e| {
        CompactorError::TokenEstimation(format!("input is not UTF-8 text: {e}"))
    })?;
    Ok(estimate_tokens(text))
}

/// Whether the default counter uses a BPE table.
pub fn using_tokenizer() -> bool {
    TokenCounter::global().is_bpe()
}

pub fn tokenizer_name() -> &'static str {
    TokenCounter::global().name()
}

/// Before/after token accounting for a rewrite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavingsReport {
    pub original_tokens: usize,
    pub optimized_tokens: usize,
    pub original_chars: usize,
    pub optimized_chars: usize,
    pub token_reduction_pct: f64,
}

pub fn estimate_savings(original: &str, optimized: &str) -> SavingsReport {
    estimate_savings_with(&TokenCounter::global(), original, optimized)
}

pub fn estimate_savings_with(counter: &TokenCounter, original: &str, optimized: &str) -> SavingsReport {
    let original_tokens = counter.count(original);
    let optimized_tokens = counter.count(optimized);
    SavingsReport {
        original_tokens,
        optimized_tokens,
        original_chars: original.chars().count(),
        optimized_chars: optimized.chars().count(),
        token_reduction_pct: reduction_pct(original_tokens, optimized_tokens),
    }
}

/// Percentage saved, rounded to one decimal. Zero when `before` is zero.
pub fn reduction_pct(before: usize, after: usize) -> f64 {
    if before == 0 {
        return 0.0;
    }
    let pct = (before as f64 - after as f64) / before as f64 * 100.0;
    (pct * 10.0).round() / 10.0
}
