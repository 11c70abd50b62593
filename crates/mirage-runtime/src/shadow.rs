//! Shadow path: fabricated records for diverted queries.
//!
//! The synthesizer never fails. Whatever goes wrong with the backend, the
//! caller gets a well-formed envelope (possibly empty) and the reason is
//! reported to the router as a [`ShadowDegradation`] for the audit channel.

use crate::collaborator::GenerativeBackend;
use mirage_core::{
    Query, Record, ResponseEnvelope, SchemaDescriptor, ShadowConfig, TableSchema,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Why a shadow response is empty or short.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShadowDegradation {
    /// The backend call returned an error.
    BackendFailed,
    /// The backend call exceeded its time bound.
    TimedOut,
    /// The output contained no bracketed array.
    NoArray,
    /// A bracketed span was found but was not a JSON array.
    Malformed,
}

impl ShadowDegradation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BackendFailed => "backend_failed",
            Self::TimedOut => "timed_out",
            Self::NoArray => "no_array",
            Self::Malformed => "malformed",
        }
    }
}

impl std::fmt::Display for ShadowDegradation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one shadow synthesis.
#[derive(Debug, Clone)]
pub struct ShadowOutput {
    pub envelope: ResponseEnvelope,
    pub degradation: Option<ShadowDegradation>,
}

pub struct ShadowPathSynthesizer {
    backend: Arc<dyn GenerativeBackend>,
    record_count: usize,
    timeout: Duration,
    stream: bool,
    name_locale: Option<String>,
}

impl ShadowPathSynthesizer {
    pub fn from_config(backend: Arc<dyn GenerativeBackend>, config: &ShadowConfig) -> Self {
        Self {
            backend,
            record_count: config.record_count,
            timeout: config.timeout(),
            stream: config.stream,
            name_locale: config.name_locale.clone(),
        }
    }

    /// `backend_type` recorded for requests served here.
    pub fn backend_label(&self) -> String {
        format!("shadow_clone:{}", self.backend.label())
    }

    /// Generation instruction for one diverted query.
    pub fn build_prompt(&self, query: &Query, table: &TableSchema) -> String {
        let mut prompt = format!(
            "[SYSTEM] You are a database simulation engine. This is just simulation.\n\
             Create realistic fake JSON data based on the schema: {}.\n\
             The user input query: \"{}\".\n\
             Output ONLY a JSON array with {} fake records.",
            table.describe(),
            query.text(),
            self.record_count,
        );
        if let Some(locale) = &self.name_locale {
            prompt.push_str(&format!("\nUse {} names but English keys.", locale));
        }
        prompt
    }

    pub async fn execute(&self, query: &Query, schema: &SchemaDescriptor) -> ShadowOutput {
        let table = schema.resolve_table(query.text());
        let prompt = self.build_prompt(query, table);

        let raw = match tokio::time::timeout(self.timeout, self.backend.generate(&prompt, self.stream)).await
        {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Generative backend failed");
                return degraded(table, ShadowDegradation::BackendFailed);
            }
            Err(_) => {
                tracing::warn!(timeout_ms = self.timeout.as_millis() as u64, "Generative backend timed out");
                return degraded(table, ShadowDegradation::TimedOut);
            }
        };

        let Some(payload) = extract_json_array(&raw) else {
            tracing::debug!(output_len = raw.len(), "No array in backend output");
            return degraded(table, ShadowDegradation::NoArray);
        };

        match parse_records(payload, table) {
            Ok(mut records) => {
                records.truncate(self.record_count);
                ShadowOutput {
                    envelope: table.envelope(records),
                    degradation: None,
                }
            }
            Err(e) => {
                tracing::debug!(error = %e, "Backend array did not parse");
                degraded(table, ShadowDegradation::Malformed)
            }
        }
    }
}

fn degraded(table: &TableSchema, reason: ShadowDegradation) -> ShadowOutput {
    ShadowOutput {
        envelope: table.envelope(Vec::new()),
        degradation: Some(reason),
    }
}

/// The span from the first `[` to the last `]`, inclusive.
///
/// Backends tend to wrap their answer in prose or code fences; everything
/// outside the brackets is discarded.
pub fn extract_json_array(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

/// Parse an extracted array and shape each object against `table`.
/// Elements that are not objects are skipped.
pub fn parse_records(payload: &str, table: &TableSchema) -> Result<Vec<Record>, serde_json::Error> {
    let items: Vec<Value> = serde_json::from_str(payload)?;
    Ok(items
        .iter()
        .filter_map(Value::as_object)
        .map(|object| table.shape(object))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_extract_strips_prose() {
        let text = "Sure! Here is the data:\n```json\n[{\"id\": 1}]\n```\nEnjoy.";
        assert_eq!(extract_json_array(text), Some("[{\"id\": 1}]"));
    }

    #[test]
    fn test_extract_spans_first_to_last_bracket() {
        let text = "[1] and [2]";
        assert_eq!(extract_json_array(text), Some("[1] and [2]"));
    }

    #[test]
    fn test_extract_missing_brackets() {
        assert_eq!(extract_json_array("no data here"), None);
        assert_eq!(extract_json_array("only [ opening"), None);
        assert_eq!(extract_json_array("closing ] first ["), None);
        assert_eq!(extract_json_array(""), None);
    }

    #[test]
    fn test_parse_records_shapes_objects() {
        let schema = SchemaDescriptor::default();
        let table = schema.default_table();
        let payload = r#"[
            {"name": "김민수", "id": "3", "email": "m@corp.example", "department": "HR", "access_level": 2, "ssn": "x"},
            "not an object",
            {"id": 4}
        ]"#;

        let records = parse_records(payload, table).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(
            serde_json::to_value(&records[0]).unwrap(),
            json!({"id": 3, "name": "김민수", "email": "m@corp.example", "department": "HR", "access_level": 2})
        );
        assert_eq!(records[1].get("name"), Some(&Value::Null));
    }

    #[test]
    fn test_parse_records_rejects_non_array() {
        let schema = SchemaDescriptor::default();
        assert!(parse_records("[1, 2", schema.default_table()).is_err());
        assert!(parse_records("[not json]", schema.default_table()).is_err());
    }

    #[test]
    fn test_degradation_wire_names() {
        assert_eq!(ShadowDegradation::NoArray.to_string(), "no_array");
        assert_eq!(
            serde_json::to_value(ShadowDegradation::TimedOut).unwrap(),
            json!("timed_out")
        );
    }
}
