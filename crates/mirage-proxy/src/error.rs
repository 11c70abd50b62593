//! Error types for the proxy crate.

use thiserror::Error;

/// Errors that can occur in the Postgres front end.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Failed to bind to the listen address.
    #[error("failed to bind to {address}: {source}")]
    BindFailed {
        address: String,
        source: std::io::Error,
    },

    /// Failed to read the bound address back from the listener.
    #[error("listener error: {0}")]
    Listener(#[source] std::io::Error),
}
