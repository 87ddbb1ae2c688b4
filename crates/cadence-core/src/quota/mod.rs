//! Outbound call budgeting.
//!
//! - `TokenBucket`: continuously refilled, capped counter consumed per call
//! - `QuotaMonitor`: daily bucket plus emergency mode and server rate-limit cooldown

pub mod bucket;
pub mod monitor;

pub use bucket::TokenBucket;
pub use monitor::QuotaMonitor;

/// Milliseconds in one day; a daily quota refills over this window.
pub const MS_PER_DAY: f64 = 86_400_000.0;
