//! Session transcripts: JSONL parsing, observation extraction and
//! compression into observation markdown.

pub mod compressor;
pub mod observer;
pub mod session;

pub use compressor::{compress_session, compress_session_with, SessionSummary};
pub use observer::{
    classify_line, extract_observations, format_observations_md, generate_observation_prompt,
    Observation, ObservationKind,
};
pub use session::{parse_session_jsonl, parse_session_str, read_session, ParsedSession, Role, Turn};

#[cfg(test)]
mod tests;
