//! `cadence config`: print the validated, effective configuration.
//!
//! Only environment variable names are shown for secrets.

use anyhow::Result;
use console::style;

use cadence_infra::config::SOCIAL_TOKEN_ENV;

use crate::state::AppState;

pub fn show_config(state: &AppState, json: bool) -> Result<()> {
    let config = &state.config;

    if json {
        println!("{}", serde_json::to_string_pretty(config)?);
        return Ok(());
    }

    let present = |key: &str| {
        if std::env::var(key).is_ok_and(|v| !v.trim().is_empty()) {
            format!("{}", style("✓ set").green())
        } else {
            format!("{}", style("✗ missing").red())
        }
    };

    println!();
    println!("  {} Configuration is valid", style("✓").green().bold());
    println!();
    println!("  {}", toml::to_string_pretty(config)?.trim_end().replace('\n', "\n  "));
    println!();
    println!("  {}", style("── Secrets ──").dim());
    println!("  {SOCIAL_TOKEN_ENV}: {}", present(SOCIAL_TOKEN_ENV));
    for provider in &config.generation.providers {
        println!(
            "  {} ({}): {}",
            provider.api_key_env,
            provider.name,
            present(&provider.api_key_env)
        );
    }
    println!();
    Ok(())
}
