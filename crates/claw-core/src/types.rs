use crate::tokens::{reduction_pct, TokenCounter};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Measurement of one pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageStats {
    pub stage_name: String,
    pub tokens_in: usize,
    pub tokens_out: usize,
    pub bytes_in: usize,
    pub bytes_out: usize,
    pub wall_time_ms: f64,
}

impl StageStats {
    pub fn measure(
        stage_name: impl Into<String>,
        counter: &TokenCounter,
        input: &str,
        output: &str,
        elapsed: Duration,
    ) -> Self {
        Self {
            stage_name: stage_name.into(),
            tokens_in: counter.count(input),
            tokens_out: counter.count(output),
            bytes_in: input.len(),
            bytes_out: output.len(),
            wall_time_ms: elapsed.as_secs_f64() * 1000.0,
        }
    }

    pub fn tokens_saved(&self) -> usize {
        self.tokens_in.saturating_sub(self.tokens_out)
    }

    pub fn reduction_pct(&self) -> f64 {
        reduction_pct(self.tokens_in, self.tokens_out)
    }
}
