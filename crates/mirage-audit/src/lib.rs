//! # mirage-audit
//!
//! Security audit channel for Mirage.
//!
//! Every handled request produces exactly one [`AuditEvent`], whichever path
//! served it. The event is the only place where the true origin of a
//! response is recorded.
//!
//! ## Event Format
//!
//! | Field | Meaning |
//! |-------|---------|
//! | `timestamp` | When the event was recorded (RFC 3339) |
//! | `event_type` | `NORMAL` or `ATTACK_REDIRECT` |
//! | `source_ip` | Obfuscated, synthetic or raw caller address |
//! | `query_signature` | Query text truncated to a fixed length |
//! | `backend_type` | Which path served the request |
//! | `process_time_ms` | End-to-end handling time |
//! | `status` | `200 OK`, `403 READ_ONLY` or `502 BACKEND_ERROR` |
//!
//! - **Console output**: JSON Lines on stdout (optionally pretty-printed)
//! - **File output**: JSON Lines appended to a file
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use mirage_audit::{AuditEventKind, AuditLogger};
//! use std::time::Duration;
//!
//! # async fn example() {
//! let logger = AuditLogger::console_only();
//! logger
//!     .log_event(
//!         AuditEventKind::Normal,
//!         "SELECT * FROM users WHERE id = 1",
//!         Duration::from_millis(3),
//!         None,
//!         "real_store:postgres",
//!     )
//!     .await;
//! # }
//! ```

pub mod error;
pub mod event;
pub mod logger;
pub mod source;
pub mod storage;

pub use error::AuditError;
pub use event::{AuditEvent, AuditEventBuilder, AuditEventKind, AuditStatus, query_signature};
pub use logger::{AuditFilter, AuditLogger};
pub use source::SourceTagger;
pub use storage::{
    AuditStorage, ConsoleStorage, DEFAULT_INDEX_RETENTION, DualStorage, FileStorage, MemoryStorage,
    NullStorage,
};
