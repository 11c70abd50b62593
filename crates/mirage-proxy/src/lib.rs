//! # mirage-proxy
//!
//! Postgres wire protocol front end for Mirage.
//!
//! Clients connect with any Postgres driver. Each simple query is handed to
//! the [`DeceptionRouter`](mirage_runtime::DeceptionRouter); records come back
//! as a `TEXT` row set whose columns follow the resolved table, and the two
//! caller-visible errors become ordinary `ERROR` responses.
//!
//! ```text
//!   Client
//!     │  Postgres wire protocol
//!     ▼
//! ┌──────────────────┐
//! │  Mirage proxy    │
//! │  1. Classify     │  ← mirage-policy
//! │  2. Real/Shadow  │  ← mirage-runtime
//! │  3. Audit        │  ← mirage-audit
//! └──────────────────┘
//! ```

pub mod error;
pub mod handler;
pub mod proxy;

pub use error::ProxyError;
pub use handler::{
    MirageQueryHandler, MirageServerHandlers, PasswordStartupHandler, SQLSTATE_INTERNAL,
    SQLSTATE_READ_ONLY, SessionContext, error_info, text_rows,
};
pub use proxy::MirageProxy;
