//! Runtime configuration types for Cadence.
//!
//! `CadenceConfig` represents the top-level `cadence.toml`. Every numeric
//! setting has a default; identity settings are required. `validate()` is
//! called once at startup so a bad deployment fails before the first cycle.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level configuration for the orchestration core.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CadenceConfig {
    #[serde(default)]
    pub agent: AgentSettings,

    #[serde(default)]
    pub quota: QuotaSettings,

    #[serde(default)]
    pub retry: RetrySettings,

    #[serde(default)]
    pub polling: PollingSettings,

    #[serde(default)]
    pub social: SocialSettings,

    #[serde(default)]
    pub generation: GenerationSettings,
}

/// Who the agent is on the platform.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentSettings {
    /// Persona name handed to content generation.
    #[serde(default)]
    pub persona: String,
    /// The agent's own handle (without `@`); its own events are ignored.
    #[serde(default)]
    pub handle: String,
}

/// Daily call budget and emergency mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaSettings {
    /// Calls allowed per day (token bucket capacity).
    #[serde(default = "default_daily_quota")]
    pub daily_quota: u32,
    /// Emergency mode engages when remaining tokens drop below this.
    #[serde(default = "default_emergency_threshold")]
    pub emergency_threshold: u32,
    /// Cooldown applied when a 429 carries no reset time.
    #[serde(default = "default_rate_limit_cooldown_secs")]
    pub default_rate_limit_cooldown_secs: u64,
}

fn default_daily_quota() -> u32 {
    250
}

fn default_emergency_threshold() -> u32 {
    30
}

fn default_rate_limit_cooldown_secs() -> u64 {
    900
}

impl Default for QuotaSettings {
    fn default() -> Self {
        Self {
            daily_quota: default_daily_quota(),
            emergency_threshold: default_emergency_threshold(),
            default_rate_limit_cooldown_secs: default_rate_limit_cooldown_secs(),
        }
    }
}

/// Backoff for transient failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_backoff_ms() -> u64 {
    1000
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_backoff_ms: default_base_backoff_ms(),
        }
    }
}

/// Polling cycle schedule and search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingSettings {
    #[serde(default = "default_poll_interval_secs")]
    pub interval_secs: u64,
    /// Search expression; defaults to `@{agent.handle}`.
    #[serde(default)]
    pub search_query: Option<String>,
    /// Upper bound on replies attempted in one cycle.
    #[serde(default = "default_max_replies_per_cycle")]
    pub max_replies_per_cycle: usize,
    /// Rejected posts after which an event is dropped from the backlog.
    #[serde(default = "default_max_post_failures")]
    pub max_post_failures: u32,
}

fn default_poll_interval_secs() -> u64 {
    900
}

fn default_max_replies_per_cycle() -> usize {
    10
}

fn default_max_post_failures() -> u32 {
    3
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            interval_secs: default_poll_interval_secs(),
            search_query: None,
            max_replies_per_cycle: default_max_replies_per_cycle(),
            max_post_failures: default_max_post_failures(),
        }
    }
}

/// Social platform endpoint. The bearer token comes from the environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocialSettings {
    #[serde(default = "default_social_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_social_base_url() -> String {
    "https://api.x.com".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for SocialSettings {
    fn default() -> Self {
        Self {
            base_url: default_social_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Ordered content-generation providers (first is primary).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationSettings {
    #[serde(default)]
    pub providers: Vec<GenerationProviderSettings>,
}

/// One OpenAI-compatible chat completion endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationProviderSettings {
    pub name: String,
    pub base_url: String,
    pub model: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_max_tokens() -> u32 {
    280
}

impl CadenceConfig {
    /// Check every setting, returning the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agent.handle.trim().is_empty() {
            return Err(ConfigError::Missing("agent.handle".to_string()));
        }
        if self.agent.persona.trim().is_empty() {
            return Err(ConfigError::Missing("agent.persona".to_string()));
        }
        if self.quota.daily_quota == 0 {
            return Err(invalid("quota.daily_quota", "must be greater than zero"));
        }
        if self.quota.emergency_threshold >= self.quota.daily_quota {
            return Err(invalid(
                "quota.emergency_threshold",
                "must be lower than quota.daily_quota",
            ));
        }
        if self.quota.default_rate_limit_cooldown_secs == 0 {
            return Err(invalid(
                "quota.default_rate_limit_cooldown_secs",
                "must be greater than zero",
            ));
        }
        if self.retry.base_backoff_ms == 0 {
            return Err(invalid("retry.base_backoff_ms", "must be greater than zero"));
        }
        if self.polling.interval_secs == 0 {
            return Err(invalid("polling.interval_secs", "must be greater than zero"));
        }
        self.check_fetch_budget()?;
        if self.polling.max_replies_per_cycle == 0 {
            return Err(invalid(
                "polling.max_replies_per_cycle",
                "must be greater than zero",
            ));
        }
        if self.polling.max_post_failures == 0 {
            return Err(invalid("polling.max_post_failures", "must be greater than zero"));
        }
        if let Some(query) = &self.polling.search_query {
            if query.trim().is_empty() {
                return Err(invalid("polling.search_query", "must not be empty"));
            }
        }
        if self.social.base_url.trim().is_empty() {
            return Err(ConfigError::Missing("social.base_url".to_string()));
        }
        if self.generation.providers.is_empty() {
            return Err(ConfigError::Missing("generation.providers".to_string()));
        }
        for (i, provider) in self.generation.providers.iter().enumerate() {
            if provider.name.trim().is_empty() {
                return Err(invalid(&format!("generation.providers[{i}].name"), "must not be empty"));
            }
            if provider.api_key_env.trim().is_empty() {
                return Err(invalid(
                    &format!("generation.providers[{i}].api_key_env"),
                    "must not be empty",
                ));
            }
        }
        Ok(())
    }

    /// Polling cycles per day at the configured interval, rounded up.
    ///
    /// Every cycle spends one token on its fetch.
    pub fn fetches_per_day(&self) -> u64 {
        SECONDS_PER_DAY.div_ceil(self.polling.interval_secs.max(1))
    }

    /// Fetches may use at most half of the tokens above the emergency
    /// threshold; the rest is kept for replies.
    fn check_fetch_budget(&self) -> Result<(), ConfigError> {
        let usable = u64::from(self.quota.daily_quota - self.quota.emergency_threshold);
        let fetch_budget = usable / 2;
        let fetches = self.fetches_per_day();
        if fetch_budget == 0 {
            return Err(invalid(
                "quota.daily_quota",
                "leaves no tokens for polling above quota.emergency_threshold",
            ));
        }
        if fetches > fetch_budget {
            let min_interval = SECONDS_PER_DAY.div_ceil(fetch_budget);
            return Err(invalid(
                "polling.interval_secs",
                &format!(
                    "{fetches} polls per day exceed the fetch budget of {fetch_budget} tokens; \
                     use an interval of at least {min_interval}s"
                ),
            ));
        }
        Ok(())
    }

    /// The search expression used to fetch engagement events.
    pub fn search_query(&self) -> String {
        match &self.polling.search_query {
            Some(query) => query.clone(),
            None => format!("@{}", self.agent.handle.trim_start_matches('@')),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.polling.interval_secs)
    }

    pub fn base_backoff(&self) -> Duration {
        Duration::from_millis(self.retry.base_backoff_ms)
    }
}

const SECONDS_PER_DAY: u64 = 86_400;

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}
