//! `mirage check` command implementation.
//!
//! Validates a configuration file:
//! - JSON Schema validation against `schemas/MirageConfig.schema.json`
//! - Semantic validation (`MirageConfig::validate`)
//! - Warnings for risky but legal settings

use anyhow::{Context, Result};
use mirage_core::{AuditOutput, MirageConfig, SourceMode};
use serde_json::Value as JsonValue;
use std::fs;
use std::path::Path;

/// Embedded so validation works without the repository checkout.
const CONFIG_SCHEMA: &str = include_str!("../../../../schemas/MirageConfig.schema.json");

/// Severity level for check results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Warning => write!(f, "WARN"),
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

/// A single check finding.
#[derive(Debug, Clone)]
pub struct CheckFinding {
    pub severity: Severity,
    pub category: &'static str,
    pub message: String,
}

impl CheckFinding {
    fn error(category: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            category,
            message: message.into(),
        }
    }

    fn warning(category: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            category,
            message: message.into(),
        }
    }
}

/// Results from running all checks.
#[derive(Debug, Default)]
pub struct CheckResults {
    pub findings: Vec<CheckFinding>,
    /// The parsed configuration, when it parsed.
    pub config: Option<MirageConfig>,
}

impl CheckResults {
    pub fn has_errors(&self) -> bool {
        self.findings.iter().any(|f| f.severity == Severity::Error)
    }

    pub fn error_count(&self) -> usize {
        self.findings
            .iter()
            .filter(|f| f.severity == Severity::Error)
            .count()
    }
}

/// Run every check against the YAML text of a configuration file.
pub fn check_content(content: &str) -> CheckResults {
    let mut results = CheckResults::default();

    match schema_findings(content) {
        Ok(findings) => results.findings.extend(findings),
        Err(e) => results
            .findings
            .push(CheckFinding::error("syntax", format!("{:#}", e))),
    }

    match MirageConfig::from_yaml(content) {
        Ok(config) => {
            if let Err(e) = config.validate() {
                results.findings.push(CheckFinding::error("semantic", e.to_string()));
            }
            results.findings.extend(warnings(&config));
            results.config = Some(config);
        }
        Err(e) => results
            .findings
            .push(CheckFinding::error("semantic", e.to_string())),
    }

    results
}

fn schema_findings(content: &str) -> Result<Vec<CheckFinding>> {
    let instance: JsonValue = match serde_yaml::from_str::<JsonValue>(content)
        .context("configuration is not valid YAML")?
    {
        JsonValue::Null => JsonValue::Object(Default::default()),
        other => other,
    };

    let schema: JsonValue =
        serde_json::from_str(CONFIG_SCHEMA).context("embedded configuration schema is invalid")?;
    let validator = jsonschema::draft202012::options()
        .build(&schema)
        .map_err(|e| anyhow::anyhow!("embedded configuration schema does not compile: {}", e))?;

    Ok(validator
        .iter_errors(&instance)
        .map(|e| {
            let path = e.instance_path().to_string();
            let location = if path.is_empty() { "/".to_string() } else { path };
            CheckFinding::error("schema", format!("{}: {}", location, e))
        })
        .collect())
}

fn warnings(config: &MirageConfig) -> Vec<CheckFinding> {
    let mut found = Vec::new();

    if config.proxy.enabled && config.proxy.password.is_none() {
        found.push(CheckFinding::warning(
            "proxy",
            "proxy.password is not set; any password is accepted",
        ));
    }

    if config.upstream.password.is_some() && !config.upstream.uses_env_credentials() {
        found.push(CheckFinding::warning(
            "upstream",
            "upstream.password is stored in the file; prefer password_env or database_url_env",
        ));
    }

    if config.audit.source_mode == SourceMode::Raw {
        found.push(CheckFinding::warning(
            "audit",
            "audit.source_mode is raw; caller addresses are logged unmasked",
        ));
    }

    if !config.audit.enabled || config.audit.output == AuditOutput::None {
        found.push(CheckFinding::warning(
            "audit",
            "audit events are discarded; diverted requests will leave no trace",
        ));
    }

    found
}

/// `mirage check --config <path>`
pub fn run(path: &Path) -> Result<()> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let results = check_content(&content);

    for finding in &results.findings {
        println!("[{}] {}: {}", finding.severity, finding.category, finding.message);
    }

    if results.has_errors() {
        anyhow::bail!(
            "{} has {} error(s)",
            path.display(),
            results.error_count()
        );
    }

    if let Some(config) = &results.config {
        print_summary(config);
    }
    println!("✓ {} is valid", path.display());
    Ok(())
}

fn print_summary(config: &MirageConfig) {
    println!("upstream:   {}", config.upstream.redacted_target());
    for table in config.schema.tables() {
        println!("schema:     {}", table.describe());
    }
    println!(
        "shadow:     {} model={} records={} timeout={}ms",
        config.shadow.base_url,
        config.shadow.model,
        config.shadow.record_count,
        config.shadow.timeout_ms
    );
    if config.proxy.enabled {
        println!("proxy:      {}", config.proxy.listen_address());
    }
    if config.http.enabled {
        println!("http:       {}", config.http.bind);
    }
    println!(
        "audit:      {:?} (source_mode={:?})",
        config.audit.output, config.audit.source_mode
    );
}
