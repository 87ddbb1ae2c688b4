//! Repository trait definitions (ports).
//!
//! These traits define the storage interface that the infrastructure layer
//! (cadence-infra) implements. The core crate never depends on any specific
//! storage technology.

pub mod api_call;
pub mod conversation;
pub mod engagement;

pub use api_call::ApiCallLog;
pub use conversation::ConversationRepository;
pub use engagement::{BacklogFilter, EngagementRepository};
