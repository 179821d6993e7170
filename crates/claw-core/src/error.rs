use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompactorError {
    #[error("Path not found: {}", path.display())]
    NotFound { path: PathBuf },
    #[error("Parse error in {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },
    #[error("Token estimation failed: {0}")]
    TokenEstimation(String),
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("File too large: {} is {size} bytes (limit {limit})", path.display())]
    FileTooLarge { path: PathBuf, size: u64, limit: u64 },
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CompactorError {
    pub fn not_found(path: impl AsRef<Path>) -> Self {
        Self::NotFound { path: path.as_ref().to_path_buf() }
    }

    pub fn parse(path: impl AsRef<Path>, message: impl Into<String>) -> Self {
        Self::Parse { path: path.as_ref().to_path_buf(), message: message.into() }
    }

    /// Wrap an I/O error with the offending path. Missing files become `NotFound`.
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        let path = path.as_ref().to_path_buf();
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound { path }
        } else {
            Self::Io { path, source }
        }
    }

    /// Short machine-readable kind, used in JSON failure reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Parse { .. } | Self::Serialization(_) => "parse_error",
            Self::TokenEstimation(_) => "token_estimation",
            Self::Io { .. } => "io_failure",
            Self::FileTooLarge { .. } => "file_too_large",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::Other(_) => "other",
        }
    }
}

pub type Result<T> = std::result::Result<T, CompactorError>;
