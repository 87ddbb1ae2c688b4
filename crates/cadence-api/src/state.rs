//! Application state wiring all services together.
//!
//! The core orchestrator is generic over its collaborators; AppState pins it
//! to the SQLite stores, the HTTP social client and the OpenAI-compatible
//! generators.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use cadence_core::client::{RetryPolicy, RetryingClient};
use cadence_core::clock::SystemClock;
use cadence_core::generation::{BoxContentGenerator, GenerationChain};
use cadence_core::orchestrator::{EngagementOrchestrator, OrchestratorSettings};
use cadence_core::quota::QuotaMonitor;
use cadence_core::rules::DefaultEngagementRules;
use cadence_core::tracker::ConversationTracker;
use cadence_infra::config::{provider_api_key, social_token};
use cadence_infra::generation::{OpenAiCompatConfig, OpenAiCompatGenerator};
use cadence_infra::social::HttpSocialApi;
use cadence_infra::sqlite::api_call::SqliteApiCallLog;
use cadence_infra::sqlite::conversation::SqliteConversationRepository;
use cadence_infra::sqlite::engagement::SqliteEngagementRepository;
use cadence_infra::sqlite::pool::{DatabasePool, default_data_dir};
use cadence_types::config::CadenceConfig;

/// The orchestrator pinned to the concrete infra implementations.
pub type ConcreteOrchestrator = EngagementOrchestrator<
    HttpSocialApi,
    SqliteConversationRepository,
    SqliteEngagementRepository,
    SqliteApiCallLog,
>;

/// Shared application state.
pub struct AppState {
    pub config: CadenceConfig,
    pub data_dir: PathBuf,
    pub db_pool: DatabasePool,
    pub quota: Arc<QuotaMonitor>,
}

impl AppState {
    /// Open the database and create the process-wide quota monitor.
    pub async fn init(config: CadenceConfig) -> anyhow::Result<Self> {
        let data_dir = default_data_dir();
        tokio::fs::create_dir_all(&data_dir)
            .await
            .with_context(|| format!("failed to create data dir {}", data_dir.display()))?;

        let db_url = format!(
            "sqlite://{}?mode=rwc",
            data_dir.join("cadence.db").display()
        );
        let db_pool = DatabasePool::new(&db_url)
            .await
            .context("failed to open database")?;

        let quota = Arc::new(QuotaMonitor::new(
            config.quota.daily_quota,
            config.quota.emergency_threshold,
            Duration::from_secs(config.quota.default_rate_limit_cooldown_secs),
            Arc::new(SystemClock),
        ));

        Ok(Self {
            config,
            data_dir,
            db_pool,
            quota,
        })
    }

    pub fn conversations(&self) -> SqliteConversationRepository {
        SqliteConversationRepository::new(self.db_pool.clone())
    }

    pub fn engagement(&self) -> SqliteEngagementRepository {
        SqliteEngagementRepository::new(self.db_pool.clone())
    }

    pub fn api_calls(&self) -> SqliteApiCallLog {
        SqliteApiCallLog::new(self.db_pool.clone())
    }

    /// Build the generation chain from `generation.providers`, in order.
    ///
    /// Every provider's API key must be present in the environment.
    pub fn generation_chain(&self) -> anyhow::Result<GenerationChain> {
        let mut providers = Vec::with_capacity(self.config.generation.providers.len());
        for settings in &self.config.generation.providers {
            let api_key = provider_api_key(settings, |key| std::env::var(key).ok())?;
            let generator = OpenAiCompatGenerator::new(OpenAiCompatConfig {
                provider_name: settings.name.clone(),
                base_url: settings.base_url.clone(),
                api_key,
                model: settings.model.clone(),
                max_tokens: settings.max_tokens,
            })?;
            providers.push(BoxContentGenerator::new(generator));
        }
        Ok(GenerationChain::new(providers))
    }

    /// Wire the full orchestrator. Fails if any secret is missing.
    pub fn orchestrator(&self) -> anyhow::Result<ConcreteOrchestrator> {
        let token = social_token(|key| std::env::var(key).ok())?;
        let api = HttpSocialApi::new(
            self.config.social.base_url.clone(),
            token,
            Duration::from_secs(self.config.social.request_timeout_secs),
        )?;

        let client = Arc::new(RetryingClient::new(
            RetryPolicy::new(self.config.retry.max_retries, self.config.base_backoff()),
            Arc::clone(&self.quota),
            self.api_calls(),
        ));

        let settings =
            OrchestratorSettings::new(self.config.agent.persona.clone(), self.config.search_query())
                .with_max_replies(self.config.polling.max_replies_per_cycle)
                .with_max_post_failures(self.config.polling.max_post_failures);

        tracing::debug!(
            providers = ?self.config.generation.providers.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(),
            query = %settings.search_query,
            "orchestrator wired"
        );

        Ok(EngagementOrchestrator::new(
            api,
            client,
            Arc::clone(&self.quota),
            ConversationTracker::new(self.conversations()),
            self.engagement(),
            self.generation_chain()?,
            Arc::new(DefaultEngagementRules::new(self.config.agent.handle.clone())),
            settings,
        ))
    }
}
