//! Errors raised by audit storage backends.
//!
//! None of these reach a caller: `AuditLogger::record` reports them as
//! warnings and carries on.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("cannot open audit file {}: {source}", path.display())]
    OpenFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("audit {0} lock poisoned")]
    LockPoisoned(&'static str),

    #[error("cannot encode audit event: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("audit write failed: {0}")]
    Write(#[from] std::io::Error),
}
