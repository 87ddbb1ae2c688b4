//! Daily quota monitor with emergency mode and server rate-limit cooldown.
//!
//! Wraps a daily [`TokenBucket`] and remembers the most recent 429 reset time.
//! A cancellable one-shot timer clears the cooldown when the reset time is
//! reached; a newer 429 replaces the pending timer rather than stacking a
//! second one.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use cadence_types::quota::{Admission, QuotaSnapshot};
use tokio::task::JoinHandle;

use crate::clock::SharedClock;

use super::bucket::TokenBucket;

#[derive(Debug, Default)]
struct RateLimitState {
    is_rate_limited: bool,
    reset_at_ms: Option<i64>,
}

impl RateLimitState {
    fn clear(&mut self) {
        self.is_rate_limited = false;
        self.reset_at_ms = None;
    }
}

/// Tracks remaining daily budget and server-reported rate limits.
///
/// Callers must check [`admit`](Self::admit) before any outbound call and skip
/// the call (not queue it) unless it returns [`Admission::Allowed`].
pub struct QuotaMonitor {
    bucket: TokenBucket,
    emergency_threshold: u32,
    default_cooldown: Duration,
    clock: SharedClock,
    rate_limit: Arc<Mutex<RateLimitState>>,
    reset_timer: Mutex<Option<JoinHandle<()>>>,
}

impl QuotaMonitor {
    /// Create a monitor with a full daily bucket of `daily_quota` tokens.
    pub fn new(
        daily_quota: u32,
        emergency_threshold: u32,
        default_cooldown: Duration,
        clock: SharedClock,
    ) -> Self {
        Self {
            bucket: TokenBucket::daily(daily_quota, clock.clone()),
            emergency_threshold,
            default_cooldown,
            clock,
            rate_limit: Arc::new(Mutex::new(RateLimitState::default())),
            reset_timer: Mutex::new(None),
        }
    }

    /// The clock driving refill and rate-limit expiry.
    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    /// Take `n` tokens from the daily bucket.
    pub fn consume(&self, n: u32) -> bool {
        self.bucket.consume(n)
    }

    /// Whole tokens left in the daily bucket.
    pub fn remaining(&self) -> u32 {
        self.bucket.remaining()
    }

    /// True when the remaining budget is below the emergency threshold.
    pub fn is_emergency_mode(&self) -> bool {
        self.remaining() < self.emergency_threshold
    }

    /// True while a server-reported rate limit has not yet reset.
    ///
    /// Clears the flag itself once the clock reaches the reset time, so the
    /// answer is correct even if the reset timer has not fired yet.
    pub fn is_rate_limited(&self) -> bool {
        let mut state = self.rate_limit.lock().expect("rate limit lock poisoned");
        if state.is_rate_limited {
            if let Some(reset_at) = state.reset_at_ms {
                if self.clock.now_ms() >= reset_at {
                    tracing::info!(reset_at_ms = reset_at, "rate limit window elapsed");
                    state.clear();
                }
            }
        }
        state.is_rate_limited
    }

    /// Epoch milliseconds at which the current rate limit lifts.
    pub fn rate_limit_reset_at(&self) -> Option<i64> {
        if self.is_rate_limited() {
            self.rate_limit
                .lock()
                .expect("rate limit lock poisoned")
                .reset_at_ms
        } else {
            None
        }
    }

    /// Decide whether an outbound call may proceed now.
    pub fn admit(&self) -> Admission {
        if self.is_rate_limited() {
            let reset_at_ms = self.rate_limit_reset_at().unwrap_or_else(|| self.clock.now_ms());
            return Admission::RateLimited { reset_at_ms };
        }
        let remaining = self.remaining();
        if remaining < self.emergency_threshold {
            return Admission::Emergency { remaining };
        }
        Admission::Allowed
    }

    /// Record a 429 response.
    ///
    /// `reset_epoch_secs` is the server's reset time; when absent the default
    /// cooldown is applied from now.
    pub fn record_rate_limit_response(&self, reset_epoch_secs: Option<i64>) {
        let now = self.clock.now_ms();
        let reset_at_ms = match reset_epoch_secs {
            Some(secs) => secs.saturating_mul(1000),
            None => now + self.default_cooldown.as_millis() as i64,
        };

        {
            let mut state = self.rate_limit.lock().expect("rate limit lock poisoned");
            state.is_rate_limited = true;
            state.reset_at_ms = Some(reset_at_ms);
        }

        tracing::warn!(
            reset_at_ms,
            wait_ms = (reset_at_ms - now).max(0),
            "server rate limit recorded, outbound calls paused"
        );

        self.schedule_reset(reset_at_ms, Duration::from_millis((reset_at_ms - now).max(0) as u64));
    }

    fn schedule_reset(&self, reset_at_ms: i64, wait: Duration) {
        let mut timer = self.reset_timer.lock().expect("reset timer lock poisoned");
        if let Some(previous) = timer.take() {
            previous.abort();
        }

        // Without a runtime the flag still clears lazily in `is_rate_limited`.
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };

        let rate_limit = Arc::clone(&self.rate_limit);
        *timer = Some(handle.spawn(async move {
            tokio::time::sleep(wait).await;
            let mut state = rate_limit.lock().expect("rate limit lock poisoned");
            if state.reset_at_ms == Some(reset_at_ms) {
                state.clear();
                tracing::info!(reset_at_ms, "rate limit reset, outbound calls resumed");
            }
        }));
    }

    /// Point-in-time view for status output.
    pub fn snapshot(&self) -> QuotaSnapshot {
        let is_rate_limited = self.is_rate_limited();
        let rate_limit_reset_at = self.rate_limit_reset_at();
        let remaining_tokens = self.remaining();
        QuotaSnapshot {
            capacity: self.bucket.capacity(),
            remaining_tokens,
            emergency_threshold: self.emergency_threshold,
            is_emergency_mode: remaining_tokens < self.emergency_threshold,
            is_rate_limited,
            rate_limit_reset_at,
        }
    }
}

impl Drop for QuotaMonitor {
    fn drop(&mut self) {
        if let Ok(mut timer) = self.reset_timer.lock() {
            if let Some(handle) = timer.take() {
                handle.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    const START_MS: i64 = 1_700_000_000_000;

    fn monitor(quota: u32, threshold: u32) -> (QuotaMonitor, ManualClock) {
        let clock = ManualClock::new(START_MS);
        let monitor = QuotaMonitor::new(
            quota,
            threshold,
            Duration::from_secs(900),
            Arc::new(clock.clone()),
        );
        (monitor, clock)
    }

    #[test]
    fn admits_when_budget_is_healthy() {
        let (monitor, _clock) = monitor(250, 30);
        assert_eq!(monitor.admit(), Admission::Allowed);
        assert!(!monitor.is_emergency_mode());
    }

    #[test]
    fn emergency_mode_below_threshold() {
        let (monitor, _clock) = monitor(250, 30);
        assert!(monitor.consume(220));
        assert_eq!(monitor.remaining(), 30);
        assert!(!monitor.is_emergency_mode());

        assert!(monitor.consume(1));
        assert!(monitor.is_emergency_mode());
        assert_eq!(monitor.admit(), Admission::Emergency { remaining: 29 });
    }

    #[test]
    fn rate_limit_blocks_until_reset() {
        let (monitor, clock) = monitor(250, 30);
        let reset_secs = START_MS / 1000 + 60;
        monitor.record_rate_limit_response(Some(reset_secs));
        assert!(monitor.is_rate_limited());

        clock.advance(Duration::from_secs(30));
        assert_eq!(
            monitor.admit(),
            Admission::RateLimited {
                reset_at_ms: reset_secs * 1000
            }
        );

        clock.advance(Duration::from_secs(31));
        assert_eq!(monitor.admit(), Admission::Allowed);
        assert!(!monitor.is_rate_limited());
        assert_eq!(monitor.rate_limit_reset_at(), None);
    }

    #[test]
    fn missing_reset_uses_default_cooldown() {
        let (monitor, clock) = monitor(250, 30);
        monitor.record_rate_limit_response(None);
        assert_eq!(monitor.rate_limit_reset_at(), Some(START_MS + 900_000));

        clock.advance(Duration::from_secs(899));
        assert!(monitor.is_rate_limited());
        clock.advance(Duration::from_secs(1));
        assert!(!monitor.is_rate_limited());
    }

    #[test]
    fn snapshot_reports_state() {
        let (monitor, _clock) = monitor(100, 10);
        monitor.consume(95);
        monitor.record_rate_limit_response(Some(START_MS / 1000 + 10));

        let snap = monitor.snapshot();
        assert_eq!(snap.capacity, 100);
        assert_eq!(snap.remaining_tokens, 5);
        assert_eq!(snap.emergency_threshold, 10);
        assert!(snap.is_emergency_mode);
        assert!(snap.is_rate_limited);
        assert_eq!(snap.rate_limit_reset_at, Some(START_MS + 10_000));
    }

    #[tokio::test(start_paused = true)]
    async fn reset_timer_clears_flag_at_deadline() {
        let (monitor, _clock) = monitor(250, 30);
        monitor.record_rate_limit_response(Some(START_MS / 1000 + 60));

        tokio::time::advance(Duration::from_secs(59)).await;
        settle().await;
        assert!(monitor.is_rate_limited());

        tokio::time::advance(Duration::from_secs(2)).await;
        settle().await;
        // The manual clock never moved, so only the timer could have cleared it.
        assert!(!monitor.is_rate_limited());
    }

    #[tokio::test(start_paused = true)]
    async fn newer_rate_limit_replaces_pending_timer() {
        let (monitor, _clock) = monitor(250, 30);
        monitor.record_rate_limit_response(Some(START_MS / 1000 + 60));
        monitor.record_rate_limit_response(Some(START_MS / 1000 + 120));

        tokio::time::advance(Duration::from_secs(61)).await;
        settle().await;
        assert!(monitor.is_rate_limited(), "first timer must not clear the newer limit");
        assert_eq!(monitor.rate_limit_reset_at(), Some(START_MS + 120_000));

        tokio::time::advance(Duration::from_secs(60)).await;
        settle().await;
        assert!(!monitor.is_rate_limited());
    }

    async fn settle() {
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
    }
}
