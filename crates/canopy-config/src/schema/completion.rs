//! Completion loop settings: iteration budget and context truncation.

use serde::{Deserialize, Serialize};

/// Settings for the LLM tool-calling loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    /// Iteration budget when tools are offered (valid range: 1-50).
    /// Completions without tools always run exactly once.
    pub max_iterations: u32,
    pub truncation: TruncationConfig,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            truncation: TruncationConfig::default(),
        }
    }
}

/// Bounds on the message list sent to the LLM.
///
/// Above `max_messages`, the first `keep_first` and last `keep_last`
/// messages are kept and the middle is collapsed into a single note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TruncationConfig {
    pub max_messages: usize,
    pub keep_first: usize,
    pub keep_last: usize,
}

impl Default for TruncationConfig {
    fn default() -> Self {
        Self {
            max_messages: 20,
            keep_first: 3,
            keep_last: 16,
        }
    }
}
