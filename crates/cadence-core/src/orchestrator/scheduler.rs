//! Fixed-interval polling loop.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::report::{CycleError, CycleReport};

/// Anything that can run one engagement cycle.
pub trait CycleRunner: Send + Sync {
    fn run_cycle(
        &self,
        shutdown: &CancellationToken,
    ) -> impl std::future::Future<Output = Result<CycleReport, CycleError>> + Send;
}

/// Totals across the cycles a scheduler ran.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PollingSummary {
    pub cycles: usize,
    /// Cycles skipped for quota or rate-limit reasons.
    pub skipped_cycles: usize,
    /// Cycles that ended with a storage error.
    pub failed_cycles: usize,
    pub replied: usize,
}

/// Runs cycles every `interval` until cancelled.
///
/// Cancellation is observed between cycles; an in-flight cycle decides for
/// itself where to stop. Ticks missed while a slow cycle runs are skipped.
pub struct PollingScheduler<R> {
    runner: Arc<R>,
    interval: Duration,
}

impl<R: CycleRunner> PollingScheduler<R> {
    pub fn new(runner: Arc<R>, interval: Duration) -> Self {
        Self { runner, interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Poll until `shutdown` is cancelled or a fatal platform error occurs.
    pub async fn run(&self, shutdown: &CancellationToken) -> Result<PollingSummary, CycleError> {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut summary = PollingSummary::default();

        tracing::info!(interval_secs = self.interval.as_secs(), "polling scheduler started");

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match self.runner.run_cycle(shutdown).await {
                Ok(report) => {
                    summary.cycles += 1;
                    summary.replied += report.replied;
                    if report.outcome.is_skipped() {
                        summary.skipped_cycles += 1;
                    }
                }
                Err(CycleError::Fatal(e)) => {
                    tracing::error!(error = %e, "fatal platform error, stopping scheduler");
                    return Err(CycleError::Fatal(e));
                }
                Err(CycleError::AlreadyRunning) => {
                    tracing::warn!("previous cycle still running, tick skipped");
                }
                Err(e) => {
                    summary.cycles += 1;
                    summary.failed_cycles += 1;
                    tracing::error!(error = %e, "engagement cycle failed");
                }
            }
        }

        tracing::info!(
            cycles = summary.cycles,
            replied = summary.replied,
            "polling scheduler stopped"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use cadence_types::error::{ApiError, RepositoryError};

    use super::*;
    use crate::orchestrator::report::CycleOutcome;

    /// Replays scripted cycle results, then reports empty cycles.
    #[derive(Default)]
    struct ScriptedRunner {
        results: Mutex<Vec<Result<CycleReport, CycleError>>>,
        calls: Mutex<usize>,
    }

    impl ScriptedRunner {
        fn with(mut results: Vec<Result<CycleReport, CycleError>>) -> Self {
            results.reverse();
            Self {
                results: Mutex::new(results),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    impl CycleRunner for ScriptedRunner {
        async fn run_cycle(&self, _shutdown: &CancellationToken) -> Result<CycleReport, CycleError> {
            *self.calls.lock().unwrap() += 1;
            self.results
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Ok(CycleReport::default()))
        }
    }

    fn replied(n: usize) -> Result<CycleReport, CycleError> {
        Ok(CycleReport {
            replied: n,
            ..Default::default()
        })
    }

    #[tokio::test(start_paused = true)]
    async fn runs_a_cycle_per_interval_until_cancelled() {
        let runner = Arc::new(ScriptedRunner::with(vec![
            replied(1),
            Ok(CycleReport::skipped(CycleOutcome::SkippedEmergency {
                remaining: 10,
            })),
            replied(2),
        ]));
        let scheduler = PollingScheduler::new(Arc::clone(&runner), Duration::from_secs(300));
        let shutdown = CancellationToken::new();

        let handle = tokio::spawn({
            let shutdown = shutdown.clone();
            async move { scheduler.run(&shutdown).await }
        });

        // Ticks at 0s, 300s and 600s.
        tokio::time::sleep(Duration::from_secs(650)).await;
        shutdown.cancel();
        let summary = handle.await.unwrap().unwrap();

        assert_eq!(runner.calls(), 3);
        assert_eq!(
            summary,
            PollingSummary {
                cycles: 3,
                skipped_cycles: 1,
                failed_cycles: 0,
                replied: 3,
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_error_stops_the_loop() {
        let runner = Arc::new(ScriptedRunner::with(vec![
            replied(1),
            Err(CycleError::Fatal(ApiError::Auth("revoked".to_string()))),
            replied(1),
        ]));
        let scheduler = PollingScheduler::new(Arc::clone(&runner), Duration::from_secs(60));

        let err = scheduler.run(&CancellationToken::new()).await.unwrap_err();

        assert!(matches!(err, CycleError::Fatal(ApiError::Auth(_))));
        assert_eq!(runner.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn storage_errors_do_not_stop_the_loop() {
        let runner = Arc::new(ScriptedRunner::with(vec![
            Err(CycleError::Repository(RepositoryError::Connection)),
            replied(1),
        ]));
        let scheduler = PollingScheduler::new(Arc::clone(&runner), Duration::from_secs(60));
        let shutdown = CancellationToken::new();

        let handle = tokio::spawn({
            let shutdown = shutdown.clone();
            async move { scheduler.run(&shutdown).await }
        });
        tokio::time::sleep(Duration::from_secs(90)).await;
        shutdown.cancel();
        let summary = handle.await.unwrap().unwrap();

        assert_eq!(summary.cycles, 2);
        assert_eq!(summary.failed_cycles, 1);
        assert_eq!(summary.replied, 1);
    }

    #[tokio::test]
    async fn cancelled_before_start_runs_nothing() {
        let runner = Arc::new(ScriptedRunner::default());
        let scheduler = PollingScheduler::new(Arc::clone(&runner), Duration::from_secs(60));
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        let summary = scheduler.run(&shutdown).await.unwrap();

        assert_eq!(summary, PollingSummary::default());
        assert_eq!(runner.calls(), 0);
    }
}
