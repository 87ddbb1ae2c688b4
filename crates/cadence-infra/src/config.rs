//! Configuration loader for Cadence.
//!
//! Reads `cadence.toml`, applies `CADENCE_*` environment overrides, then
//! validates. Unlike a best-effort loader, any problem is returned as a
//! [`ConfigError`] so the process refuses to start with a bad setup.
//! Secrets are read only from the environment.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use cadence_types::config::{CadenceConfig, GenerationProviderSettings};
use cadence_types::error::ConfigError;
use secrecy::SecretString;

use crate::sqlite::pool::default_data_dir;

/// Environment variable holding the platform bearer token.
pub const SOCIAL_TOKEN_ENV: &str = "CADENCE_SOCIAL_TOKEN";

/// Environment variable overriding the config file location.
pub const CONFIG_PATH_ENV: &str = "CADENCE_CONFIG";

/// `CADENCE_CONFIG`, else `{data_dir}/cadence.toml`.
pub fn default_config_path() -> PathBuf {
    match std::env::var_os(CONFIG_PATH_ENV) {
        Some(path) => PathBuf::from(path),
        None => default_data_dir().join("cadence.toml"),
    }
}

/// Load, override from the process environment, and validate.
pub async fn load_config(path: &Path) -> Result<CadenceConfig, ConfigError> {
    load_config_with(path, |key| std::env::var(key).ok()).await
}

/// [`load_config`] with an explicit environment lookup.
pub async fn load_config_with<F>(path: &Path, env: F) -> Result<CadenceConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match tokio::fs::read_to_string(path).await {
        Ok(content) => toml::from_str::<CadenceConfig>(&content)
            .map_err(|e| ConfigError::Parse(format!("{}: {e}", path.display())))?,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(
                path = %path.display(),
                "no config file found, using defaults and environment"
            );
            CadenceConfig::default()
        }
        Err(err) => return Err(ConfigError::Io(format!("{}: {err}", path.display()))),
    };

    apply_env_overrides(&mut config, &env)?;
    config.validate()?;
    Ok(config)
}

/// Overlay `CADENCE_*` variables onto a parsed config.
pub fn apply_env_overrides<F>(config: &mut CadenceConfig, env: &F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = env("CADENCE_AGENT_HANDLE") {
        config.agent.handle = v;
    }
    if let Some(v) = env("CADENCE_PERSONA") {
        config.agent.persona = v;
    }
    if let Some(v) = env("CADENCE_SEARCH_QUERY") {
        config.polling.search_query = Some(v);
    }
    if let Some(v) = env("CADENCE_SOCIAL_BASE_URL") {
        config.social.base_url = v;
    }
    override_number(env, "CADENCE_DAILY_QUOTA", &mut config.quota.daily_quota)?;
    override_number(
        env,
        "CADENCE_EMERGENCY_THRESHOLD",
        &mut config.quota.emergency_threshold,
    )?;
    override_number(
        env,
        "CADENCE_RATE_LIMIT_COOLDOWN_SECS",
        &mut config.quota.default_rate_limit_cooldown_secs,
    )?;
    override_number(env, "CADENCE_MAX_RETRIES", &mut config.retry.max_retries)?;
    override_number(env, "CADENCE_BASE_BACKOFF_MS", &mut config.retry.base_backoff_ms)?;
    override_number(env, "CADENCE_POLL_INTERVAL_SECS", &mut config.polling.interval_secs)?;
    override_number(
        env,
        "CADENCE_MAX_REPLIES_PER_CYCLE",
        &mut config.polling.max_replies_per_cycle,
    )?;
    override_number(
        env,
        "CADENCE_MAX_POST_FAILURES",
        &mut config.polling.max_post_failures,
    )?;
    Ok(())
}

fn override_number<F, T>(env: &F, key: &str, target: &mut T) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    if let Some(raw) = env(key) {
        *target = raw.trim().parse().map_err(|_| ConfigError::Invalid {
            field: key.to_string(),
            reason: format!("'{raw}' is not a valid number"),
        })?;
    }
    Ok(())
}

/// The platform bearer token from `CADENCE_SOCIAL_TOKEN`.
pub fn social_token<F>(env: F) -> Result<SecretString, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    required_secret(&env, SOCIAL_TOKEN_ENV)
}

/// The API key for a generation provider, from its `api_key_env` variable.
pub fn provider_api_key<F>(
    provider: &GenerationProviderSettings,
    env: F,
) -> Result<SecretString, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    required_secret(&env, &provider.api_key_env)
}

fn required_secret<F>(env: &F, key: &str) -> Result<SecretString, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match env(key) {
        Some(value) if !value.trim().is_empty() => Ok(SecretString::from(value)),
        _ => Err(ConfigError::Missing(key.to_string())),
    }
}
