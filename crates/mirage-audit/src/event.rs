//! Audit event types.
//!
//! One structured event per handled request, SIEM style.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Which branch handled the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEventKind {
    /// Benign query served by the real store (including rejected writes).
    Normal,
    /// Malicious query diverted to the shadow path.
    AttackRedirect,
}

impl std::fmt::Display for AuditEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Normal => write!(f, "NORMAL"),
            Self::AttackRedirect => write!(f, "ATTACK_REDIRECT"),
        }
    }
}

/// Outcome status recorded for operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuditStatus {
    #[serde(rename = "200 OK")]
    Ok,
    /// Write attempted against the read-only store.
    #[serde(rename = "403 READ_ONLY")]
    ReadOnly,
    /// The real store failed to execute the statement.
    #[serde(rename = "502 BACKEND_ERROR")]
    BackendError,
}

impl std::fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "200 OK"),
            Self::ReadOnly => write!(f, "403 READ_ONLY"),
            Self::BackendError => write!(f, "502 BACKEND_ERROR"),
        }
    }
}

/// An audit event. Write-once: built by [`AuditEventBuilder`] and never
/// modified afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event ID.
    pub event_id: Uuid,

    /// When the event was recorded.
    pub timestamp: DateTime<Utc>,

    pub event_type: AuditEventKind,

    /// Caller identifier, already obfuscated according to configuration.
    pub source_ip: String,

    /// Truncated query text.
    pub query_signature: String,

    /// Which path served the request, e.g. `real_store:postgres`.
    pub backend_type: String,

    /// Handling latency, rounded to two decimals.
    pub process_time_ms: f64,

    pub status: AuditStatus,

    /// Records returned to the caller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_count: Option<u64>,

    /// Signatures that diverted the request.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matched_signatures: Vec<String>,

    /// Why a shadow response came back empty, if it did.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degraded: Option<String>,

    /// Error message for failed real-path requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AuditEvent {
    pub fn builder(kind: AuditEventKind, backend_type: impl Into<String>) -> AuditEventBuilder {
        AuditEventBuilder::new(kind, backend_type)
    }

    /// Format the event as a human-readable log line.
    ///
    /// Format: `[timestamp] EVENT_TYPE status=... backend=... source=... sig="..."`
    pub fn to_log_line(&self) -> String {
        let mut line = format!(
            "[{}] {} status=\"{}\" backend={} source={} time_ms={} sig=\"{}\"",
            self.timestamp.format("%Y-%m-%dT%H:%M:%S%.3fZ"),
            self.event_type,
            self.status,
            self.backend_type,
            self.source_ip,
            self.process_time_ms,
            self.query_signature.replace('"', "'"),
        );

        if let Some(rows) = self.row_count {
            line.push_str(&format!(" rows={}", rows));
        }

        if !self.matched_signatures.is_empty() {
            line.push_str(&format!(" matched=[{}]", self.matched_signatures.join(",")));
        }

        if let Some(ref degraded) = self.degraded {
            line.push_str(&format!(" degraded={}", degraded));
        }

        if let Some(ref error) = self.error {
            line.push_str(&format!(" error=\"{}\"", error.replace('"', "'")));
        }

        line
    }
}

/// Builder for creating audit events.
#[derive(Debug)]
pub struct AuditEventBuilder {
    event: AuditEvent,
}

impl AuditEventBuilder {
    pub fn new(kind: AuditEventKind, backend_type: impl Into<String>) -> Self {
        Self {
            event: AuditEvent {
                event_id: Uuid::new_v4(),
                timestamp: Utc::now(),
                event_type: kind,
                source_ip: "unknown".to_string(),
                query_signature: String::new(),
                backend_type: backend_type.into(),
                process_time_ms: 0.0,
                status: AuditStatus::Ok,
                row_count: None,
                matched_signatures: Vec::new(),
                degraded: None,
                error: None,
            },
        }
    }

    /// Stamp the event with the request's arrival time.
    pub fn timestamp(mut self, at: DateTime<Utc>) -> Self {
        self.event.timestamp = at;
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.event.source_ip = source.into();
        self
    }

    /// Set the (already truncated) query signature.
    pub fn query_signature(mut self, signature: impl Into<String>) -> Self {
        self.event.query_signature = signature.into();
        self
    }

    pub fn latency(mut self, latency: Duration) -> Self {
        let ms = latency.as_secs_f64() * 1000.0;
        self.event.process_time_ms = (ms * 100.0).round() / 100.0;
        self
    }

    pub fn status(mut self, status: AuditStatus) -> Self {
        self.event.status = status;
        self
    }

    pub fn row_count(mut self, count: u64) -> Self {
        self.event.row_count = Some(count);
        self
    }

    pub fn matched_signatures(mut self, signatures: Vec<String>) -> Self {
        self.event.matched_signatures = signatures;
        self
    }

    pub fn degraded(mut self, reason: impl Into<String>) -> Self {
        self.event.degraded = Some(reason.into());
        self
    }

    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.event.error = Some(error.into());
        self
    }

    pub fn build(self) -> AuditEvent {
        self.event
    }
}

/// Truncate query text for the audit channel.
///
/// Whitespace runs collapse to single spaces. At most `max_len` characters
/// are kept; `...` marks a cut.
pub fn query_signature(text: &str, max_len: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    match collapsed.char_indices().nth(max_len) {
        Some((cut, _)) => format!("{}...", &collapsed[..cut]),
        None => collapsed,
    }
}
