//! Shared foundations for claw-compactor: errors, configuration, the
//! tokenizer facade and stage statistics.

pub mod config;
pub mod error;
pub mod tokens;
pub mod types;

pub use config::{ClawConfig, DictionaryConfig, RuleConfig};
pub use error::{CompactorError, Result};
pub use tokens::{
    estimate_savings, estimate_savings_with, estimate_tokens, reduction_pct, tokenizer_name,
    try_estimate_tokens, using_tokenizer, SavingsReport, TokenCounter, TokenizerKind,
};
pub use types::StageStats;
