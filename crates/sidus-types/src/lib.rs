//! Shared domain types for Sidus.
//!
//! This crate contains the types used across the Sidus runtime: type keys
//! for registration-time injection metadata, the startup error taxonomy,
//! runtime configuration, and the standard value objects that flow through
//! task pipelines.
//!
//! Zero runtime dependencies -- only serde and thiserror.

pub mod config;
pub mod error;
pub mod ty;
pub mod value;
