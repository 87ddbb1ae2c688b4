//! EngagementOrchestrator: one polling cycle, end to end.
//!
//! A cycle moves through `QuotaCheck -> Fetching -> Filtering -> Responding
//! -> Recording` and back to `Idle`. Skipping a cycle for quota reasons is a
//! normal outcome. Only authentication/permission failures and storage
//! errors surface as [`CycleError`].

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use cadence_types::api_call::ApiCall;
use cadence_types::conversation::ConversationRecord;
use cadence_types::engagement::{EngagementEvent, EngagementQuery, PostRequest, compare_ids};
use cadence_types::error::{ApiError, RepositoryError};
use cadence_types::quota::Admission;
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::report::{CycleError, CycleOutcome, CyclePhase, CycleReport};
use super::scheduler::CycleRunner;
use crate::client::{RetryingClient, SocialApi};
use crate::generation::{GenerationChain, GenerationContext};
use crate::quota::QuotaMonitor;
use crate::repository::{ApiCallLog, BacklogFilter, ConversationRepository, EngagementRepository};
use crate::rules::EngagementRules;
use crate::tracker::ConversationTracker;

const COMPONENT: &str = "orchestrator";

/// Per-agent knobs for the polling cycle.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub persona: String,
    pub search_query: String,
    /// Key under which the `since_id` cursor is persisted.
    pub cursor_source: String,
    pub max_replies_per_cycle: usize,
    /// Prior exchanges with the same actor passed to generation.
    pub memory_limit: usize,
    /// How far back stored, unanswered events are picked up again.
    pub backlog_window: chrono::Duration,
    pub backlog_limit: i64,
    /// Rejected posts after which an event is no longer retried.
    pub max_post_failures: u32,
}

impl OrchestratorSettings {
    pub fn new(persona: impl Into<String>, search_query: impl Into<String>) -> Self {
        let search_query = search_query.into();
        Self {
            persona: persona.into(),
            cursor_source: format!("search:{search_query}"),
            search_query,
            max_replies_per_cycle: 10,
            memory_limit: 5,
            backlog_window: chrono::Duration::hours(24),
            backlog_limit: 50,
            max_post_failures: 3,
        }
    }

    pub fn with_max_replies(mut self, max_replies_per_cycle: usize) -> Self {
        self.max_replies_per_cycle = max_replies_per_cycle;
        self
    }

    pub fn with_max_post_failures(mut self, max_post_failures: u32) -> Self {
        self.max_post_failures = max_post_failures;
        self
    }
}

/// Clears the run flag when a cycle ends, however it ends.
struct RunGuard<'a>(&'a AtomicBool);

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Drives the fetch/filter/respond/record cycle.
///
/// Collaborators are injected; the orchestrator owns no global state apart
/// from its run flag and phase channel.
pub struct EngagementOrchestrator<A, C, E, L>
where
    A: SocialApi,
    C: ConversationRepository,
    E: EngagementRepository,
    L: ApiCallLog,
{
    api: A,
    client: Arc<RetryingClient<L>>,
    quota: Arc<QuotaMonitor>,
    tracker: ConversationTracker<C>,
    events: E,
    generator: GenerationChain,
    rules: Arc<dyn EngagementRules>,
    settings: OrchestratorSettings,
    running: AtomicBool,
    phase: watch::Sender<CyclePhase>,
}

impl<A, C, E, L> EngagementOrchestrator<A, C, E, L>
where
    A: SocialApi,
    C: ConversationRepository,
    E: EngagementRepository,
    L: ApiCallLog,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        api: A,
        client: Arc<RetryingClient<L>>,
        quota: Arc<QuotaMonitor>,
        tracker: ConversationTracker<C>,
        events: E,
        generator: GenerationChain,
        rules: Arc<dyn EngagementRules>,
        settings: OrchestratorSettings,
    ) -> Self {
        let (phase, _) = watch::channel(CyclePhase::Idle);
        Self {
            api,
            client,
            quota,
            tracker,
            events,
            generator,
            rules,
            settings,
            running: AtomicBool::new(false),
            phase,
        }
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    pub fn tracker(&self) -> &ConversationTracker<C> {
        &self.tracker
    }

    pub fn quota(&self) -> &QuotaMonitor {
        &self.quota
    }

    /// Watch the current cycle phase.
    pub fn subscribe_phase(&self) -> watch::Receiver<CyclePhase> {
        self.phase.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Run a single cycle.
    ///
    /// `shutdown` is checked between events, never inside one: a reply that
    /// has been posted is always recorded before the cycle stops.
    pub async fn run_cycle(&self, shutdown: &CancellationToken) -> Result<CycleReport, CycleError> {
        let Some(_guard) = RunGuard::acquire(&self.running) else {
            tracing::warn!("engagement cycle requested while another is running");
            return Err(CycleError::AlreadyRunning);
        };

        let span = tracing::info_span!("engagement_cycle", query = %self.settings.search_query);
        let result = self.cycle(shutdown).instrument(span).await;
        self.set_phase(CyclePhase::Idle);

        match &result {
            Ok(report) => tracing::info!(
                outcome = ?report.outcome,
                fetched = report.fetched,
                backlog = report.backlog,
                replied = report.replied,
                failed = report.failed,
                generation_failed = report.generation_failed,
                skipped_quota = report.skipped_quota,
                "engagement cycle finished"
            ),
            Err(e) => tracing::error!(error = %e, "engagement cycle aborted"),
        }
        result
    }

    async fn cycle(&self, shutdown: &CancellationToken) -> Result<CycleReport, CycleError> {
        self.set_phase(CyclePhase::QuotaCheck);
        match self.quota.admit() {
            Admission::Allowed => {}
            Admission::RateLimited { reset_at_ms } => {
                tracing::info!(reset_at_ms, "rate limited, skipping cycle");
                return Ok(CycleReport::skipped(CycleOutcome::SkippedRateLimited {
                    reset_at_ms,
                }));
            }
            Admission::Emergency { remaining } => {
                tracing::warn!(remaining, "quota in emergency mode, skipping cycle");
                return Ok(CycleReport::skipped(CycleOutcome::SkippedEmergency {
                    remaining,
                }));
            }
        }
        if !self.quota.consume(1) {
            tracing::info!("no token left for fetch, skipping cycle");
            return Ok(CycleReport::skipped(CycleOutcome::SkippedQuotaExhausted));
        }

        self.set_phase(CyclePhase::Fetching);
        let mut report = CycleReport::default();
        let fetched = match self.fetch().await {
            Ok(events) => events,
            Err(FetchError::Api(e)) if e.is_fatal() => return Err(CycleError::Fatal(e)),
            Err(FetchError::Api(e)) => {
                report.outcome = CycleOutcome::FetchFailed {
                    error: e.to_string(),
                };
                return Ok(report);
            }
            Err(FetchError::Repository(e)) => return Err(e.into()),
        };
        report.fetched = fetched.len();

        self.set_phase(CyclePhase::Filtering);
        let candidates = self.with_backlog(fetched, &mut report).await?;
        let mut eligible = Vec::new();
        for event in candidates {
            if self.tracker.is_processed(&event.external_id).await? {
                report.skipped_processed += 1;
                continue;
            }
            if !self.rules.is_reply_eligible(&event) {
                tracing::debug!(
                    event_id = %event.external_id,
                    kind = %event.kind,
                    "event not eligible for a reply"
                );
                report.skipped_ineligible += 1;
                continue;
            }
            eligible.push(event);
        }
        report.eligible = eligible.len();
        if eligible.len() > self.settings.max_replies_per_cycle {
            report.deferred = eligible.len() - self.settings.max_replies_per_cycle;
            eligible.truncate(self.settings.max_replies_per_cycle);
        }

        let total = eligible.len();
        for (idx, event) in eligible.into_iter().enumerate() {
            if shutdown.is_cancelled() {
                tracing::info!(remaining = total - idx, "shutdown requested, stopping cycle");
                report.interrupted = true;
                break;
            }
            self.set_phase(CyclePhase::Responding);

            if !self.quota.admit().is_allowed() {
                tracing::info!(
                    event_id = %event.external_id,
                    "quota gate closed mid-cycle, leaving remaining events"
                );
                report.skipped_quota += total - idx;
                break;
            }

            match self.respond(&event).await {
                Ok(Reply::Recorded) => report.replied += 1,
                Ok(Reply::Conflict) => {
                    report.replied += 1;
                    report.conflicts += 1;
                }
                Ok(Reply::GenerationFailed) => report.generation_failed += 1,
                Ok(Reply::NoToken) => {
                    report.skipped_quota += total - idx;
                    break;
                }
                Ok(Reply::PostFailed { rejection: None }) | Ok(Reply::RecordFailed) => {
                    report.failed += 1
                }
                Ok(Reply::PostFailed {
                    rejection: Some(error),
                }) => {
                    report.failed += 1;
                    let failures = self
                        .events
                        .record_failure(&event.external_id, &error)
                        .await?;
                    if failures >= self.settings.max_post_failures {
                        tracing::warn!(
                            event_id = %event.external_id,
                            failures,
                            error = %error,
                            "reply rejected too often, dropping event from backlog"
                        );
                        report.abandoned += 1;
                    }
                }
                Err(e) => return Err(CycleError::Fatal(e)),
            }
        }

        Ok(report)
    }

    async fn fetch(&self) -> Result<Vec<EngagementEvent>, FetchError> {
        let since_id = self
            .events
            .load_cursor(&self.settings.cursor_source)
            .await
            .map_err(FetchError::Repository)?;
        let query = EngagementQuery {
            query: self.settings.search_query.clone(),
            since_id,
        };
        let call = ApiCall::new(
            "search",
            COMPONENT,
            format!("q={} since={}", query.query, query.since_id.as_deref().unwrap_or("-")),
        );

        let page = match self.client.execute(&call, || self.api.search(&query)).await {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!(error = %e, "engagement fetch failed, cursor unchanged");
                return Err(FetchError::Api(e));
            }
        };

        let inserted = self
            .events
            .save_events(&page.events)
            .await
            .map_err(FetchError::Repository)?;
        if let Some(newest) = page.newest_id() {
            self.events
                .save_cursor(&self.settings.cursor_source, &newest)
                .await
                .map_err(FetchError::Repository)?;
        }
        tracing::debug!(
            fetched = page.events.len(),
            inserted,
            "engagement page stored"
        );
        Ok(page.events)
    }

    /// Merge the fresh page with eligible stored events that still lack a
    /// reply, oldest first.
    async fn with_backlog(
        &self,
        fetched: Vec<EngagementEvent>,
        report: &mut CycleReport,
    ) -> Result<Vec<EngagementEvent>, RepositoryError> {
        let now = DateTime::<Utc>::from_timestamp_millis(self.quota.clock().now_ms())
            .unwrap_or_else(Utc::now);
        let filter = BacklogFilter {
            since: now - self.settings.backlog_window,
            kinds: self.rules.reply_kinds().to_vec(),
            max_failures: self.settings.max_post_failures,
            limit: self.settings.backlog_limit,
        };
        let stored = self.events.unanswered(&filter).await?;

        let mut seen: HashSet<String> = HashSet::new();
        let mut candidates = Vec::with_capacity(fetched.len() + stored.len());
        for event in fetched {
            if seen.insert(event.external_id.clone()) {
                candidates.push(event);
            }
        }
        for event in stored {
            if self.rules.is_reply_eligible(&event) && seen.insert(event.external_id.clone()) {
                report.backlog += 1;
                candidates.push(event);
            }
        }

        candidates.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| compare_ids(&a.external_id, &b.external_id))
        });
        Ok(candidates)
    }

    /// Generate, post and record a reply to one event.
    ///
    /// Only fatal platform errors are returned as `Err`.
    async fn respond(&self, event: &EngagementEvent) -> Result<Reply, ApiError> {
        let memories = match self
            .tracker
            .recent_for_actor(&event.actor_id, self.settings.memory_limit)
            .await
        {
            Ok(memories) => memories,
            Err(e) => {
                tracing::warn!(
                    event_id = %event.external_id,
                    error = %e,
                    "could not load conversation memory, replying without it"
                );
                Vec::new()
            }
        };

        let context = GenerationContext {
            persona: self.settings.persona.clone(),
            event: event.clone(),
            memories,
        };
        let content = match self.generator.generate(&context).await {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(
                    event_id = %event.external_id,
                    error = %e,
                    "reply generation failed, skipping event"
                );
                return Ok(Reply::GenerationFailed);
            }
        };

        if !self.quota.consume(1) {
            tracing::info!(
                event_id = %event.external_id,
                "no token left for reply, leaving event for next cycle"
            );
            return Ok(Reply::NoToken);
        }

        let request = PostRequest::reply(content.text.clone(), event.external_id.clone());
        let call = ApiCall::new(
            "post",
            COMPONENT,
            format!("reply_to={}", event.external_id),
        );
        let posted = match self.client.execute(&call, || self.api.post(&request)).await {
            Ok(posted) => posted,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                tracing::warn!(
                    event_id = %event.external_id,
                    error = %e,
                    permanent = e.is_permanent(),
                    "reply post failed, event left unrecorded"
                );
                return Ok(Reply::PostFailed {
                    rejection: e.is_permanent().then(|| e.to_string()),
                });
            }
        };

        self.set_phase(CyclePhase::Recording);
        let record = ConversationRecord::pending(event).mark_answered(posted.id.clone(), content.text);
        match self.tracker.record_response(&record).await {
            Ok(()) => {
                tracing::info!(
                    event_id = %event.external_id,
                    reply_id = %posted.id,
                    provider = %content.provider_name,
                    "reply posted and recorded"
                );
                Ok(Reply::Recorded)
            }
            Err(RepositoryError::Conflict(_)) => {
                tracing::info!(
                    event_id = %event.external_id,
                    reply_id = %posted.id,
                    "event was already recorded"
                );
                Ok(Reply::Conflict)
            }
            Err(e) => {
                tracing::error!(
                    event_id = %event.external_id,
                    reply_id = %posted.id,
                    error = %e,
                    "reply posted but not recorded"
                );
                Ok(Reply::RecordFailed)
            }
        }
    }

    fn set_phase(&self, phase: CyclePhase) {
        self.phase.send_replace(phase);
    }
}

impl<A, C, E, L> CycleRunner for EngagementOrchestrator<A, C, E, L>
where
    A: SocialApi,
    C: ConversationRepository,
    E: EngagementRepository,
    L: ApiCallLog,
{
    async fn run_cycle(&self, shutdown: &CancellationToken) -> Result<CycleReport, CycleError> {
        EngagementOrchestrator::run_cycle(self, shutdown).await
    }
}

enum FetchError {
    Api(ApiError),
    Repository(RepositoryError),
}

enum Reply {
    Recorded,
    Conflict,
    GenerationFailed,
    NoToken,
    /// `rejection` is set when the platform refused this post for good.
    PostFailed { rejection: Option<String> },
    RecordFailed,
}
