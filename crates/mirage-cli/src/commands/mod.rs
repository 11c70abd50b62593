//! CLI command implementations for Mirage.

pub mod check;
pub mod classify;
pub mod serve;
