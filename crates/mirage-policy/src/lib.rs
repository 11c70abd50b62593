//! Mirage Policy
//!
//! Two decisions are made before a query touches anything:
//!
//! - [`ClassificationPolicy`] labels the query benign or malicious by
//!   substring signatures over the upper-cased text. Matching is permissive
//!   on purpose: a false positive costs one fabricated response, a false
//!   negative exposes real data.
//! - [`ReadOnlyGate`] decides whether a benign query may reach the store.

pub mod classifier;
pub mod read_only;

pub use classifier::{ClassificationPolicy, DEFAULT_SIGNATURES, SignatureSet};
pub use read_only::ReadOnlyGate;
