use crate::error::{CompactorError, Result};
use crate::tokens::TokenizerKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name of the optional per-workspace config overlay.
pub const CONFIG_FILE_NAME: &str = ".claw-compactor.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClawConfig {
    pub tokenizer: TokenizerConfig,
    pub limits: LimitsConfig,
    pub rules: RuleConfig,
    pub dictionary: DictionaryConfig,
    pub sessions: SessionsConfig,
    pub tiers: TiersConfig,
    pub audit: AuditConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenizerConfig {
    pub model: TokenizerKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_file_bytes: u64,
}

/// Tunables for the rule pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RuleConfig {
    /// Normalised Levenshtein ratio at which adjacent bullets are merged.
    pub similarity_threshold: f64,
    /// Bullets with fewer characters than this count as short.
    pub short_bullet_chars: usize,
    /// Maximum merges per collapsed short-bullet line.
    pub max_short_merges: usize,
    pub enable_emoji_strip: bool,
    /// Upper bound on repetitions of the stage sequence.
    pub max_passes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DictionaryConfig {
    pub min_freq: usize,
    pub max_entries: usize,
    /// Above this corpus size the codebook is built from path/IP prefixes only.
    pub max_ngram_corpus_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionsConfig {
    pub sessions_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TiersConfig {
    pub budgets: [usize; 3],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub stale_days: u64,
    pub oversized_tokens: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self { max_file_bytes: 50 * 1024 * 1024 }
    }
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.80,
            short_bullet_chars: 8,
            max_short_merges: 3,
            enable_emoji_strip: true,
            max_passes: 8,
        }
    }
}

impl Default for DictionaryConfig {
    fn default() -> Self {
        Self {
            min_freq: 2,
            max_entries: 256,
            max_ngram_corpus_bytes: 4 * 1024 * 1024,
        }
    }
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self { sessions_dir: "~/.openclaw/sessions".into() }
    }
}

impl Default for TiersConfig {
    fn default() -> Self {
        Self { budgets: [200, 800, 2000] }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self { stale_days: 14, oversized_tokens: 4000 }
    }
}

impl ClawConfig {
    /// Load `<workspace>/.claw-compactor.json` if present, then apply env overrides.
    pub fn load_for_workspace(workspace: impl AsRef<Path>) -> Result<Self> {
        let path = workspace.as_ref().join(CONFIG_FILE_NAME);
        let mut config = if path.is_file() {
            Self::load_from(&path)?
        } else {
            debug!("no config file at {}, using defaults", path.display());
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse a JSON config file. Missing sections take their defaults.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| CompactorError::io(path, e))?;
        serde_json::from_str(&contents).map_err(|e| CompactorError::parse(path, e.to_string()))
    }

    /// Apply `TOKENIZER_MODEL` and `CLAW_SESSIONS_DIR`.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("TOKENIZER_MODEL") {
            self.tokenizer.model = TokenizerKind::from_hint(&val);
        }
        if let Ok(val) = std::env::var("CLAW_SESSIONS_DIR") {
            self.sessions.sessions_dir = val;
        }
    }

    pub fn resolved_sessions_dir(&self) -> PathBuf {
        expand_tilde(&self.sessions.sessions_dir)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
