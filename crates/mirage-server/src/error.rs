//! Error types for the HTTP front end.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use mirage_core::ExecutionError;
use thiserror::Error;

/// Errors that can occur while running the HTTP server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to the configured address.
    #[error("failed to bind to {address}: {source}")]
    BindFailed {
        address: String,
        source: std::io::Error,
    },

    /// The server stopped with an I/O error.
    #[error("http server failed: {0}")]
    Serve(#[source] std::io::Error),
}

/// Caller-visible failure of `POST /query`.
#[derive(Debug)]
pub struct QueryFailure(pub ExecutionError);

impl IntoResponse for QueryFailure {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ExecutionError::WriteNotPermitted => StatusCode::FORBIDDEN,
            ExecutionError::BackendExecution(_) => StatusCode::BAD_GATEWAY,
        };

        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}

impl From<ExecutionError> for QueryFailure {
    fn from(e: ExecutionError) -> Self {
        Self(e)
    }
}
