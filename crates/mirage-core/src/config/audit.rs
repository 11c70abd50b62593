//! Audit channel configuration.

use serde::{Deserialize, Serialize};

/// Where audit events go.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuditOutput {
    /// JSON lines on stdout.
    #[default]
    Console,
    /// JSON lines appended to `file_path`.
    File,
    /// Both console and file.
    Dual,
    /// Discard events.
    None,
}

/// How the caller's address is recorded in audit events.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    /// Host part of the address masked.
    #[default]
    Obfuscated,
    /// Random private address, unrelated to the real peer.
    Synthetic,
    /// Address recorded unchanged.
    Raw,
}

/// Configuration for audit logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Whether audit logging is enabled.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default)]
    pub output: AuditOutput,

    /// File path (for file and dual output).
    #[serde(default = "default_file_path")]
    pub file_path: String,

    /// Multi-line JSON on the console.
    #[serde(default)]
    pub pretty: bool,

    /// Maximum number of query characters kept in `query_signature`.
    #[serde(default = "default_signature_max_len")]
    pub signature_max_len: usize,

    #[serde(default)]
    pub source_mode: SourceMode,

    /// Recent events kept in memory for audit queries in `file` and `dual`
    /// output. The file keeps everything. Zero disables the index.
    #[serde(default = "default_index_retention")]
    pub index_retention: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            output: AuditOutput::default(),
            file_path: default_file_path(),
            pretty: false,
            signature_max_len: default_signature_max_len(),
            source_mode: SourceMode::default(),
            index_retention: default_index_retention(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_file_path() -> String {
    "audit.log".to_string()
}

fn default_index_retention() -> usize {
    1000
}

fn default_signature_max_len() -> usize {
    50
}
