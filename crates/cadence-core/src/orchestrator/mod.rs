//! Engagement polling cycle.
//!
//! - `EngagementOrchestrator`: one quota-checked fetch/filter/respond/record cycle
//! - `PollingScheduler`: runs cycles on a fixed interval until shutdown

pub mod engine;
pub mod report;
pub mod scheduler;

pub use engine::{EngagementOrchestrator, OrchestratorSettings};
pub use report::{CycleError, CycleOutcome, CyclePhase, CycleReport};
pub use scheduler::{CycleRunner, PollingScheduler, PollingSummary};
