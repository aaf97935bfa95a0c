//! Session runtime settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Minimum time a flush may keep running after its caller was
    /// cancelled, in milliseconds (valid range: 100-60000).
    pub flush_grace_ms: u64,
    /// Messages buffered per live subscriber before the oldest are
    /// dropped (valid range: 1-65536).
    pub subscriber_capacity: usize,
    /// Maximum length of a title derived from the first prompt
    /// (valid range: 10-500).
    pub title_max_chars: usize,
    /// Project guidance shown to the model ahead of each question.
    /// Empty = none.
    pub ai_instructions: String,
}

impl SessionConfig {
    pub fn flush_grace(&self) -> Duration {
        Duration::from_millis(self.flush_grace_ms)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            flush_grace_ms: 5000,
            subscriber_capacity: 256,
            title_max_chars: 80,
            ai_instructions: String::new(),
        }
    }
}
