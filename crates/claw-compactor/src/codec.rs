//! Reversible text codecs and their JSON persistence.

use claw_core::{CompactorError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

/// A lossless text transform: `decompress(compress(s)) == s`.
pub trait TextCodec {
    fn name(&self) -> &'static str;
    fn compress(&self, text: &str) -> String;
    fn decompress(&self, text: &str) -> String;

    fn round_trips(&self, text: &str) -> bool {
        self.decompress(&self.compress(text)) == text
    }
}

/// Write through a temp file in the destination directory, then rename over
/// the destination. Readers see either the old contents or the new.
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(|e| CompactorError::io(dir, e))?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| CompactorError::io(dir, e))?;
    tmp.write_all(contents.as_bytes()).map_err(|e| CompactorError::io(path, e))?;
    tmp.persist(path).map_err(|e| CompactorError::io(path, e.error))?;
    Ok(())
}

/// Write `value` as pretty, key-sorted UTF-8 JSON, creating parent dirs.
pub(crate) fn save_json<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    write_atomic(path, &(json + "\n"))
}

pub(crate) fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = std::fs::read_to_string(path).map_err(|e| CompactorError::io(path, e))?;
    serde_json::from_str(&contents).map_err(|e| CompactorError::parse(path, e.to_string()))
}
