//! Configuration types for Mirage.
//!
//! Everything is loaded from a single YAML file (`mirage.yaml`). Every
//! section is optional and falls back to defaults, so an empty file yields a
//! working configuration against a local PostgreSQL and a local Ollama.

pub mod audit;
pub mod policy;
pub mod proxy;
pub mod shadow;
pub mod upstream;

use crate::schema::SchemaDescriptor;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub use audit::{AuditConfig, AuditOutput, SourceMode};
pub use policy::{ClassifierConfig, RealPathConfig};
pub use proxy::{HttpConfig, ProxyConfig};
pub use shadow::ShadowConfig;
pub use upstream::UpstreamConfig;

/// Complete Mirage configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MirageConfig {
    /// Upstream PostgreSQL store.
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Shape of the store, used by both execution paths.
    #[serde(default)]
    pub schema: SchemaDescriptor,

    #[serde(default)]
    pub classifier: ClassifierConfig,

    #[serde(default)]
    pub real_path: RealPathConfig,

    #[serde(default)]
    pub shadow: ShadowConfig,

    /// Postgres wire front end.
    #[serde(default)]
    pub proxy: ProxyConfig,

    /// HTTP/JSON front end.
    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub audit: AuditConfig,
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl MirageConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(ConfigError::from)
    }

    /// Check cross-field constraints that serde defaults cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(signatures) = &self.classifier.signatures {
            let usable = signatures
                .iter()
                .chain(&self.classifier.extra_signatures)
                .any(|s| !s.trim().is_empty());
            if !usable {
                return Err(ConfigError::Config(
                    "classifier.signatures must contain at least one non-empty signature"
                        .to_string(),
                ));
            }
        }

        if self
            .real_path
            .read_keywords
            .iter()
            .all(|k| k.trim().is_empty())
        {
            return Err(ConfigError::Config(
                "real_path.read_keywords must contain at least one keyword".to_string(),
            ));
        }

        if self.shadow.record_count == 0 {
            return Err(ConfigError::Config(
                "shadow.record_count must be greater than zero".to_string(),
            ));
        }

        if self.shadow.timeout_ms == 0 {
            return Err(ConfigError::Config(
                "shadow.timeout_ms must be greater than zero".to_string(),
            ));
        }

        if self.upstream.query_timeout_ms == 0 {
            return Err(ConfigError::Config(
                "upstream.query_timeout_ms must be greater than zero".to_string(),
            ));
        }

        if self.audit.signature_max_len == 0 {
            return Err(ConfigError::Config(
                "audit.signature_max_len must be greater than zero".to_string(),
            ));
        }

        if !self.proxy.enabled && !self.http.enabled {
            return Err(ConfigError::Config(
                "at least one of proxy.enabled or http.enabled must be true".to_string(),
            ));
        }

        Ok(())
    }
}
