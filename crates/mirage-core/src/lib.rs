//! # mirage-core
//!
//! Shared data model for the Mirage query-interception layer.
//!
//! Every inbound request is a [`Query`]. The classification policy turns it
//! into a [`Verdict`], one of the two execution paths produces
//! [`Record`]s shaped by the [`SchemaDescriptor`], and the caller receives a
//! [`ResponseEnvelope`] or one of the two caller-visible
//! [`ExecutionError`]s.
//!
//! A `ResponseEnvelope` carries no trace of which path produced it. That
//! information only exists in the audit channel.

pub mod config;
pub mod schema;

use chrono::{DateTime, Utc};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;

pub use config::{
    AuditConfig, AuditOutput, ClassifierConfig, ConfigError, HttpConfig, MirageConfig,
    ProxyConfig, RealPathConfig, ShadowConfig, SourceMode, UpstreamConfig,
};
pub use schema::{ColumnDef, ColumnType, FieldSource, SchemaDescriptor, SchemaError, TableSchema};

/// An inbound request: raw query text plus its arrival time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    text: String,
    received_at: DateTime<Utc>,
}

impl Query {
    /// Create a query stamped with the current time.
    pub fn new(text: impl Into<String>) -> Self {
        Self::received_at(text, Utc::now())
    }

    /// Create a query with an explicit arrival time.
    pub fn received_at(text: impl Into<String>, received_at: DateTime<Utc>) -> Self {
        Self {
            text: text.into(),
            received_at,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn arrival(&self) -> DateTime<Utc> {
        self.received_at
    }

    /// Upper-cased text, the form every signature is matched against.
    pub fn normalized(&self) -> String {
        self.text.to_uppercase()
    }
}

/// Outcome of classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Classification {
    Benign,
    Malicious,
}

/// Classification plus the signatures that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub classification: Classification,
    /// Matched signatures, in signature-set order. Empty for benign queries.
    #[serde(default)]
    pub matched: Vec<String>,
}

impl Verdict {
    pub fn benign() -> Self {
        Self {
            classification: Classification::Benign,
            matched: Vec::new(),
        }
    }

    pub fn malicious(matched: Vec<String>) -> Self {
        Self {
            classification: Classification::Malicious,
            matched,
        }
    }

    pub fn is_malicious(&self) -> bool {
        self.classification == Classification::Malicious
    }
}

/// One row, real or fabricated.
///
/// Fields always follow the declared column order of the table that shaped
/// the record. Records are only built through [`TableSchema::shape`], so the
/// real and shadow paths cannot drift apart in structure.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    pub(crate) fn from_fields(fields: Vec<(String, Value)>) -> Self {
        Self { fields }
    }

    /// Field names in order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    /// Field values in order.
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.fields.iter().map(|(_, value)| value)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// What the caller receives on success: an ordered sequence of records.
///
/// Serializes as a bare JSON array. The column header is kept alongside so
/// wire front ends can describe an empty result with the same columns as a
/// populated one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseEnvelope {
    columns: Vec<String>,
    records: Vec<Record>,
}

impl ResponseEnvelope {
    pub(crate) fn new(columns: Vec<String>, records: Vec<Record>) -> Self {
        Self { columns, records }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Serialize for ResponseEnvelope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.records.len()))?;
        for record in &self.records {
            seq.serialize_element(record)?;
        }
        seq.end()
    }
}

/// A row as handed back by the store collaborator: column names with values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreRow {
    columns: Vec<(String, Value)>,
}

impl StoreRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: Value) {
        self.columns.push((name.into(), value));
    }

    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.push(name, value);
        self
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl FieldSource for StoreRow {
    fn field(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .or_else(|| {
                self.columns
                    .iter()
                    .find(|(column, _)| column.eq_ignore_ascii_case(name))
            })
            .map(|(_, value)| value)
    }
}

/// The only errors a caller can ever observe.
///
/// Messages deliberately read like ordinary database errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
    /// A non-read statement was sent while the store is read-only.
    #[error("ERROR: read-only mode, statement not permitted")]
    WriteNotPermitted,

    /// The store failed to execute the statement.
    #[error("database error: {0}")]
    BackendExecution(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_normalized_is_uppercase() {
        let query = Query::new("select * from users where email = 'a' or 1=1");
        assert_eq!(
            query.normalized(),
            "SELECT * FROM USERS WHERE EMAIL = 'A' OR 1=1"
        );
    }

    #[test]
    fn test_verdict_serialization() {
        let verdict = Verdict::malicious(vec!["OR 1=1".to_string()]);
        let value = serde_json::to_value(&verdict).unwrap();
        assert_eq!(value["classification"], "MALICIOUS");
        assert_eq!(value["matched"], json!(["OR 1=1"]));
        assert!(!Verdict::benign().is_malicious());
    }

    #[test]
    fn test_record_serializes_in_field_order() {
        let record = Record::from_fields(vec![
            ("id".to_string(), json!(1)),
            ("name".to_string(), json!("Kim")),
            ("access_level".to_string(), json!(2)),
        ]);
        let text = serde_json::to_string(&record).unwrap();
        assert_eq!(text, r#"{"id":1,"name":"Kim","access_level":2}"#);
    }

    #[test]
    fn test_envelope_serializes_as_bare_array() {
        let envelope = ResponseEnvelope::new(vec!["id".to_string()], Vec::new());
        assert_eq!(serde_json::to_string(&envelope).unwrap(), "[]");
        assert_eq!(envelope.columns(), ["id".to_string()]);
    }

    #[test]
    fn test_store_row_lookup_falls_back_to_case_insensitive() {
        let row = StoreRow::new().with("Email", json!("a@b.c"));
        assert_eq!(row.field("email"), Some(&json!("a@b.c")));
        assert_eq!(row.field("missing"), None);
    }

    #[test]
    fn test_execution_error_messages_are_plain() {
        let msg = ExecutionError::WriteNotPermitted.to_string();
        assert!(msg.contains("read-only"));
        let msg = ExecutionError::BackendExecution("relation \"x\" does not exist".into())
            .to_string();
        assert!(msg.starts_with("database error"));
    }
}
