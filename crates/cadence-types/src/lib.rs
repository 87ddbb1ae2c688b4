//! Shared domain types for Cadence.
//!
//! This crate contains the domain types used across the orchestration core:
//! engagement events, conversation records, quota snapshots, the API-call
//! audit record, runtime configuration, and the error taxonomy.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod api_call;
pub mod config;
pub mod conversation;
pub mod engagement;
pub mod error;
pub mod quota;
