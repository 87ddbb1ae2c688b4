//! Token bucket rate limiter.
//!
//! Tokens are fractional and replenish continuously at a fixed rate up to the
//! bucket capacity. State lives only in memory and starts full, so a restart
//! forgets earlier consumption; server 429 responses remain the backstop.

use std::sync::Mutex;

use crate::clock::SharedClock;

use super::MS_PER_DAY;

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill_ms: i64,
}

/// Thread-safe token bucket.
///
/// The refill, compare and deduct steps of [`consume`](Self::consume) run
/// inside one critical section, so concurrent callers (fetching and posting)
/// can share a bucket without over-spending it.
pub struct TokenBucket {
    capacity: u32,
    refill_per_ms: f64,
    clock: SharedClock,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// Create a full bucket.
    pub fn new(capacity: u32, refill_per_ms: f64, clock: SharedClock) -> Self {
        let now = clock.now_ms();
        Self {
            capacity,
            refill_per_ms: refill_per_ms.max(0.0),
            clock,
            state: Mutex::new(BucketState {
                tokens: capacity as f64,
                last_refill_ms: now,
            }),
        }
    }

    /// A bucket whose whole capacity refills over one day.
    pub fn daily(capacity: u32, clock: SharedClock) -> Self {
        Self::new(capacity, capacity as f64 / MS_PER_DAY, clock)
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn refill_per_ms(&self) -> f64 {
        self.refill_per_ms
    }

    /// Take `n` tokens if that many are available.
    ///
    /// Returns `false` and leaves the count untouched otherwise; there is no
    /// partial consumption.
    pub fn consume(&self, n: u32) -> bool {
        let mut state = self.state.lock().expect("token bucket lock poisoned");
        self.refill(&mut state);

        let wanted = n as f64;
        if state.tokens >= wanted {
            state.tokens -= wanted;
            true
        } else {
            false
        }
    }

    /// Whole tokens currently available.
    pub fn remaining(&self) -> u32 {
        let mut state = self.state.lock().expect("token bucket lock poisoned");
        self.refill(&mut state);
        state.tokens.floor() as u32
    }

    fn refill(&self, state: &mut BucketState) {
        let now = self.clock.now_ms();
        // A clock stepping backwards must not drain the bucket.
        let elapsed = (now - state.last_refill_ms).max(0) as f64;
        state.tokens = (state.tokens + elapsed * self.refill_per_ms).min(self.capacity as f64);
        state.last_refill_ms = now;
    }
}

impl std::fmt::Debug for TokenBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenBucket")
            .field("capacity", &self.capacity)
            .field("refill_per_ms", &self.refill_per_ms)
            .finish_non_exhaustive()
    }
}
