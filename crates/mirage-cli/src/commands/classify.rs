//! `mirage classify` - show how a query would be routed, without executing it.

use anyhow::Result;
use mirage_core::{MirageConfig, Query, Verdict};
use mirage_policy::{ClassificationPolicy, ReadOnlyGate};
use serde_json::{Value as JsonValue, json};

/// Which path a query would take.
fn path_for(verdict: &Verdict, gate: &ReadOnlyGate, sql: &str) -> &'static str {
    if verdict.is_malicious() {
        "shadow"
    } else if gate.permits(sql) {
        "real"
    } else {
        "rejected"
    }
}

/// Classify `sql` under the policies of `config`.
pub fn explain(config: &MirageConfig, sql: &str) -> JsonValue {
    let policy = ClassificationPolicy::from_config(&config.classifier);
    let gate = ReadOnlyGate::from_config(&config.real_path);
    let verdict = policy.classify(&Query::new(sql));
    let path = path_for(&verdict, &gate, sql);

    json!({
        "classification": verdict.classification,
        "matched": verdict.matched,
        "path": path,
        "table": config.schema.resolve_table(sql).name,
    })
}

pub fn run(config: &MirageConfig, sql: &str) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&explain(config, sql))?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_injection_goes_to_shadow() {
        let out = explain(&MirageConfig::default(), "SELECT * FROM users WHERE id = 1 OR 1=1");
        assert_eq!(out["classification"], "MALICIOUS");
        assert_eq!(out["path"], "shadow");
        assert_eq!(out["matched"], json!(["OR 1=1"]));
    }

    #[test]
    fn test_benign_read_goes_to_real() {
        let out = explain(&MirageConfig::default(), "SELECT * FROM users WHERE id = 1");
        assert_eq!(out["classification"], "BENIGN");
        assert_eq!(out["path"], "real");
        assert_eq!(out["table"], "users");
    }

    #[test]
    fn test_benign_write_is_rejected() {
        let out = explain(&MirageConfig::default(), "DELETE FROM users WHERE id = 1");
        assert_eq!(out["path"], "rejected");
    }
}
