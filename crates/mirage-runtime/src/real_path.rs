//! Real path: read-only execution against the store.

use crate::collaborator::{RowStore, StoreError};
use mirage_core::{ExecutionError, Query, RealPathConfig, ResponseEnvelope, SchemaDescriptor};
use mirage_policy::ReadOnlyGate;
use std::sync::Arc;
use std::time::Duration;

/// Runs benign queries against the store.
///
/// Never writes audit events; the router does that.
pub struct RealPathExecutor {
    store: Arc<dyn RowStore>,
    gate: ReadOnlyGate,
    timeout: Duration,
}

impl RealPathExecutor {
    pub fn new(store: Arc<dyn RowStore>, gate: ReadOnlyGate, timeout: Duration) -> Self {
        Self {
            store,
            gate,
            timeout,
        }
    }

    pub fn from_config(store: Arc<dyn RowStore>, config: &RealPathConfig, timeout: Duration) -> Self {
        Self::new(store, ReadOnlyGate::from_config(config), timeout)
    }

    /// `backend_type` recorded for requests served here.
    pub fn backend_label(&self) -> String {
        format!("real_store:{}", self.store.label())
    }

    pub async fn execute(
        &self,
        query: &Query,
        schema: &SchemaDescriptor,
    ) -> Result<ResponseEnvelope, ExecutionError> {
        if !self.gate.permits(query.text()) {
            tracing::debug!("Statement rejected by read-only gate");
            return Err(ExecutionError::WriteNotPermitted);
        }

        let table = schema.resolve_table(query.text());

        let rows = match tokio::time::timeout(self.timeout, self.store.fetch(query.text())).await {
            Ok(Ok(rows)) => rows,
            Ok(Err(e)) => return Err(ExecutionError::BackendExecution(e.to_string())),
            Err(_) => {
                let e = StoreError::Timeout(self.timeout);
                return Err(ExecutionError::BackendExecution(e.to_string()));
            }
        };

        tracing::debug!(table = %table.name, rows = rows.len(), "Store returned rows");

        let records = rows.iter().map(|row| table.shape(row)).collect();
        Ok(table.envelope(records))
    }
}
