//! # mirage-runtime
//!
//! Request handling for Mirage.
//!
//! A [`DeceptionRouter`] classifies each query and sends it down exactly one
//! path:
//!
//! - **Real path** ([`RealPathExecutor`]): read-only execution against the
//!   [`RowStore`]. Writes are refused with `WriteNotPermitted`; store failures
//!   surface as `BackendExecution`.
//! - **Shadow path** ([`ShadowPathSynthesizer`]): a [`GenerativeBackend`]
//!   fabricates records shaped like the real table. Failures degrade to an
//!   empty result, never to an error.
//!
//! Either way the router writes one audit event and returns a response with
//! the same shape.

pub mod collaborator;
pub mod real_path;
pub mod router;
pub mod shadow;

pub use collaborator::{BackendError, GenerativeBackend, RowStore, StoreError};
pub use real_path::RealPathExecutor;
pub use router::{DeceptionRouter, RouteStage};
pub use shadow::{
    ShadowDegradation, ShadowOutput, ShadowPathSynthesizer, extract_json_array, parse_records,
};
