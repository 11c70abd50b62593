//! Classification and real-path policy configuration.

use serde::{Deserialize, Serialize};

/// Signature set used by the classifier.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Replaces the built-in signature set when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signatures: Option<Vec<String>>,

    /// Appended to the active signature set.
    #[serde(default)]
    pub extra_signatures: Vec<String>,
}

/// Read-only gate of the real path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealPathConfig {
    /// Statements must start with one of these keywords to reach the store.
    #[serde(default = "default_read_keywords")]
    pub read_keywords: Vec<String>,
}

impl Default for RealPathConfig {
    fn default() -> Self {
        Self {
            read_keywords: default_read_keywords(),
        }
    }
}

fn default_read_keywords() -> Vec<String> {
    ["SELECT", "WITH", "SHOW", "EXPLAIN"]
        .into_iter()
        .map(String::from)
        .collect()
}
