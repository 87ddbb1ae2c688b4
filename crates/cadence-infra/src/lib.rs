//! Infrastructure layer for Cadence.
//!
//! Contains implementations of the collaborator traits defined in
//! `cadence-core`: SQLite storage, the HTTP social platform client, the
//! OpenAI-compatible content generator, and the TOML/env config loader.

pub mod config;
pub mod generation;
pub mod social;
pub mod sqlite;
