//! Deception router: classify, execute one branch, audit, respond.

use crate::collaborator::{GenerativeBackend, RowStore};
use crate::real_path::RealPathExecutor;
use crate::shadow::ShadowPathSynthesizer;
use mirage_audit::{AuditEventKind, AuditLogger, AuditStatus};
use mirage_core::{ExecutionError, MirageConfig, Query, ResponseEnvelope, SchemaDescriptor};
use mirage_policy::ClassificationPolicy;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::time::Instant;

/// Per-request lifecycle. Every request ends in `Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteStage {
    Received,
    Classifying,
    ExecutingReal,
    ExecutingShadow,
    Logging,
    Completed,
}

impl std::fmt::Display for RouteStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Received => "received",
            Self::Classifying => "classifying",
            Self::ExecutingReal => "executing_real",
            Self::ExecutingShadow => "executing_shadow",
            Self::Logging => "logging",
            Self::Completed => "completed",
        };
        f.write_str(name)
    }
}

/// Entry point shared by every front end.
///
/// Holds no per-request state; one instance serves all connections
/// concurrently behind an `Arc`.
pub struct DeceptionRouter {
    schema: Arc<SchemaDescriptor>,
    policy: ClassificationPolicy,
    real: RealPathExecutor,
    shadow: ShadowPathSynthesizer,
    audit: Arc<AuditLogger>,
}

impl DeceptionRouter {
    pub fn new(
        schema: Arc<SchemaDescriptor>,
        policy: ClassificationPolicy,
        real: RealPathExecutor,
        shadow: ShadowPathSynthesizer,
        audit: Arc<AuditLogger>,
    ) -> Self {
        Self {
            schema,
            policy,
            real,
            shadow,
            audit,
        }
    }

    /// Wire a router from configuration and the two collaborators.
    pub fn from_config(
        config: &MirageConfig,
        store: Arc<dyn RowStore>,
        backend: Arc<dyn GenerativeBackend>,
        audit: Arc<AuditLogger>,
    ) -> Self {
        Self::new(
            Arc::new(config.schema.clone()),
            ClassificationPolicy::from_config(&config.classifier),
            RealPathExecutor::from_config(
                store,
                &config.real_path,
                config.upstream.query_timeout(),
            ),
            ShadowPathSynthesizer::from_config(backend, &config.shadow),
            audit,
        )
    }

    pub fn schema(&self) -> &SchemaDescriptor {
        &self.schema
    }

    pub fn audit(&self) -> &Arc<AuditLogger> {
        &self.audit
    }

    /// Handle one request end to end. Exactly one audit event is written
    /// before this returns.
    pub async fn handle(
        &self,
        query: Query,
        peer: Option<IpAddr>,
    ) -> Result<ResponseEnvelope, ExecutionError> {
        let started = Instant::now();
        let signature = self.audit.signature_of(query.text());
        trace_stage(RouteStage::Received, &signature);

        trace_stage(RouteStage::Classifying, &signature);
        let verdict = self.policy.classify(&query);

        if verdict.is_malicious() {
            trace_stage(RouteStage::ExecutingShadow, &signature);
            tracing::info!(
                query = %signature,
                matched = ?verdict.matched,
                "Diverting query to shadow path"
            );

            let output = self.shadow.execute(&query, &self.schema).await;

            trace_stage(RouteStage::Logging, &signature);
            let mut event = self
                .audit
                .event(
                    AuditEventKind::AttackRedirect,
                    &query,
                    started.elapsed(),
                    peer,
                    &self.shadow.backend_label(),
                )
                .row_count(output.envelope.len() as u64)
                .matched_signatures(verdict.matched);
            if let Some(reason) = output.degradation {
                event = event.degraded(reason.as_str());
            }
            self.audit.record(event.build()).await;

            trace_stage(RouteStage::Completed, &signature);
            return Ok(output.envelope);
        }

        trace_stage(RouteStage::ExecutingReal, &signature);
        let result = self.real.execute(&query, &self.schema).await;

        trace_stage(RouteStage::Logging, &signature);
        let event = self.audit.event(
            AuditEventKind::Normal,
            &query,
            started.elapsed(),
            peer,
            &self.real.backend_label(),
        );
        let event = match &result {
            Ok(envelope) => event.row_count(envelope.len() as u64),
            Err(ExecutionError::WriteNotPermitted) => event.status(AuditStatus::ReadOnly),
            Err(ExecutionError::BackendExecution(message)) => {
                tracing::warn!(query = %signature, error = %message, "Real path failed");
                event.status(AuditStatus::BackendError).error(message.as_str())
            }
        };
        self.audit.record(event.build()).await;

        trace_stage(RouteStage::Completed, &signature);
        result
    }
}

fn trace_stage(stage: RouteStage, signature: &str) {
    tracing::trace!(%stage, query = %signature, "Route stage");
}
