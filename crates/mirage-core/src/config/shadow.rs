//! Shadow path configuration: the generative backend and what it is asked for.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the shadow path and its generative backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShadowConfig {
    /// Base URL of the Ollama-compatible generation API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Number of fabricated records requested per attack.
    #[serde(default = "default_record_count")]
    pub record_count: usize,

    /// Upper bound on a single generation call, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Ask the backend for a streamed response instead of a single blob.
    #[serde(default)]
    pub stream: bool,

    /// Locale for fabricated names, e.g. "Korean". Keys stay English.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_locale: Option<String>,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            record_count: default_record_count(),
            timeout_ms: default_timeout_ms(),
            stream: false,
            name_locale: None,
        }
    }
}

impl ShadowConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_model() -> String {
    "llama3".to_string()
}

fn default_record_count() -> usize {
    10
}

fn default_timeout_ms() -> u64 {
    30_000
}
