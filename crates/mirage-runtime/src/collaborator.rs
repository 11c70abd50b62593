//! External collaborators: the real store and the generative backend.
//!
//! Both are injected as trait objects so front ends and tests can swap
//! implementations without touching the router.

use async_trait::async_trait;
use mirage_core::StoreRow;
use std::time::Duration;
use thiserror::Error;

/// Failure reported by a [`RowStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("{0}")]
    Query(String),

    #[error("statement timed out after {0:?}")]
    Timeout(Duration),
}

/// Failure reported by a [`GenerativeBackend`].
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected response body: {0}")]
    Decode(String),
}

/// The real, read-only data store.
#[async_trait]
pub trait RowStore: Send + Sync {
    /// Run a read statement and return its rows in store order.
    async fn fetch(&self, sql: &str) -> Result<Vec<StoreRow>, StoreError>;

    /// Short name used in audit `backend_type`, e.g. `postgres`.
    fn label(&self) -> String;
}

/// Text-in, text-out generator used to fabricate records.
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    /// Run one generation. `stream` selects the backend's streaming mode;
    /// the result is always the complete text.
    async fn generate(&self, prompt: &str, stream: bool) -> Result<String, BackendError>;

    /// Short name used in audit `backend_type`, e.g. `ollama/llama3`.
    fn label(&self) -> String;
}
