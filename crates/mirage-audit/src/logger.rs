//! Audit logger implementation.
//!
//! Provides the `AuditLogger` the router writes through. Recording never
//! fails the request: storage errors are reported via `tracing` and dropped.

use chrono::{DateTime, Utc};
use mirage_core::{AuditConfig, AuditOutput, Query};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::error::AuditError;
use crate::event::{AuditEvent, AuditEventBuilder, AuditEventKind, query_signature};
use crate::source::SourceTagger;
use crate::storage::{AuditStorage, ConsoleStorage, DualStorage, FileStorage, NullStorage};

/// The main audit logger.
pub struct AuditLogger {
    config: AuditConfig,
    storage: Arc<dyn AuditStorage>,
    tagger: SourceTagger,
}

impl AuditLogger {
    /// Create a new audit logger with the given configuration.
    pub fn new(config: AuditConfig) -> Result<Self, AuditError> {
        let storage: Arc<dyn AuditStorage> = if !config.enabled {
            Arc::new(NullStorage::new())
        } else {
            match config.output {
                AuditOutput::Console if config.pretty => Arc::new(ConsoleStorage::pretty()),
                AuditOutput::Console => Arc::new(ConsoleStorage::new()),
                AuditOutput::File => Arc::new(FileStorage::with_retention(
                    &config.file_path,
                    config.index_retention,
                )?),
                AuditOutput::Dual => Arc::new(DualStorage::new(
                    &config.file_path,
                    config.pretty,
                    config.index_retention,
                )?),
                AuditOutput::None => Arc::new(NullStorage::new()),
            }
        };

        Ok(Self::with_storage(config, storage))
    }

    /// Create a logger with a custom storage backend.
    pub fn with_storage(config: AuditConfig, storage: Arc<dyn AuditStorage>) -> Self {
        let tagger = SourceTagger::new(config.source_mode);
        Self {
            config,
            storage,
            tagger,
        }
    }

    /// Create a disabled (no-op) logger.
    pub fn disabled() -> Self {
        Self::with_storage(
            AuditConfig {
                enabled: false,
                ..Default::default()
            },
            Arc::new(NullStorage::new()),
        )
    }

    /// Create a console-only logger (useful for development).
    pub fn console_only() -> Self {
        Self::with_storage(AuditConfig::default(), Arc::new(ConsoleStorage::new()))
    }

    /// Check if logging is enabled.
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    /// Query text as it appears in `query_signature`.
    pub fn signature_of(&self, text: &str) -> String {
        query_signature(text, self.config.signature_max_len)
    }

    /// Caller identifier as it appears in `source_ip`.
    pub fn source_tag(&self, peer: Option<IpAddr>) -> String {
        self.tagger.tag(peer)
    }

    /// Start an event with the fields every request carries. The event is
    /// stamped with the query's arrival, not with the time it is written.
    pub fn event(
        &self,
        kind: AuditEventKind,
        query: &Query,
        latency: Duration,
        peer: Option<IpAddr>,
        backend_type: &str,
    ) -> AuditEventBuilder {
        AuditEvent::builder(kind, backend_type)
            .timestamp(query.arrival())
            .source(self.source_tag(peer))
            .query_signature(self.signature_of(query.text()))
            .latency(latency)
    }

    /// Write a finished event. Never fails.
    pub async fn record(&self, event: AuditEvent) {
        if !self.config.enabled {
            return;
        }

        tracing::info!(
            target: "mirage::audit",
            event_id = %event.event_id,
            event_type = %event.event_type,
            backend = %event.backend_type,
            status = %event.status,
            process_time_ms = event.process_time_ms,
            "Audit event"
        );

        let event_id = event.event_id;
        if let Err(e) = self.storage.store(event).await {
            tracing::warn!(%event_id, error = %e, "Failed to store audit event");
        }
    }

    /// Build and write an event with no outcome details beyond `200 OK`.
    pub async fn log_event(
        &self,
        kind: AuditEventKind,
        query: &str,
        latency: Duration,
        peer: Option<IpAddr>,
        backend_type: &str,
    ) {
        let event = self
            .event(kind, &Query::new(query), latency, peer, backend_type)
            .build();
        self.record(event).await;
    }

    /// Query audit events.
    pub async fn query(&self, filter: AuditFilter) -> Result<Vec<AuditEvent>, AuditError> {
        self.storage.query(filter).await
    }

    /// Most recent diverted requests.
    pub async fn recent_attacks(&self, limit: usize) -> Result<Vec<AuditEvent>, AuditError> {
        self.query(AuditFilter {
            event_type: Some(AuditEventKind::AttackRedirect),
            limit: Some(limit),
            ..Default::default()
        })
        .await
    }
}

/// Filter for querying audit events.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    /// Filter by event type.
    pub event_type: Option<AuditEventKind>,
    /// Filter by start time.
    pub start_time: Option<DateTime<Utc>>,
    /// Filter by end time.
    pub end_time: Option<DateTime<Utc>>,
    /// Maximum number of results.
    pub limit: Option<usize>,
}

impl AuditFilter {
    pub fn matches(&self, event: &AuditEvent) -> bool {
        if self.event_type.is_some_and(|kind| kind != event.event_type) {
            return false;
        }
        if self.start_time.is_some_and(|start| event.timestamp < start) {
            return false;
        }
        if self.end_time.is_some_and(|end| event.timestamp > end) {
            return false;
        }
        true
    }

    /// Matching events, newest first, cut to `limit`.
    pub fn apply<'a>(&self, events: impl DoubleEndedIterator<Item = &'a AuditEvent>) -> Vec<AuditEvent> {
        events
            .rev()
            .filter(|e| self.matches(e))
            .take(self.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }
}
