//! Orchestration core and collaborator trait definitions for Cadence.
//!
//! This crate defines the "ports" (repository and platform traits) that the
//! infrastructure layer implements, plus the rate limiting, retry, dedup and
//! polling logic built on top of them. It depends only on `cadence-types` --
//! never on `cadence-infra` or any database/HTTP crate.

pub mod client;
pub mod clock;
pub mod generation;
pub mod orchestrator;
pub mod quota;
pub mod repository;
pub mod rules;
pub mod tracker;

#[cfg(test)]
pub(crate) mod testing;
