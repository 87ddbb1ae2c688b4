//! `cadence status` and `cadence calls`.
//!
//! The token bucket lives in the running process, so daily usage is derived
//! from the persisted API-call log instead.

use anyhow::Result;
use chrono::{Duration, Utc};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use cadence_core::repository::{ApiCallLog, ConversationRepository};

use crate::state::AppState;

/// Display the quota and conversation dashboard.
pub async fn status(state: &AppState, json: bool) -> Result<()> {
    let quota = &state.config.quota;
    let calls_today = state
        .api_calls()
        .count_since(Utc::now() - Duration::hours(24))
        .await?;
    let remaining = (quota.daily_quota as i64 - calls_today).max(0);
    let emergency = remaining <= quota.emergency_threshold as i64;
    let processed = state.conversations().count_processed().await?;
    let stored_events = state.engagement().count().await?;

    if json {
        let status = serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "data_dir": state.data_dir.display().to_string(),
            "quota": {
                "daily_quota": quota.daily_quota,
                "calls_last_24h": calls_today,
                "estimated_remaining": remaining,
                "emergency_threshold": quota.emergency_threshold,
                "emergency": emergency,
            },
            "conversations_processed": processed,
            "events_stored": stored_events,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} Cadence v{}",
        style("⚡").bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!();

    println!("  {}", style("── Quota (last 24h) ──").dim());
    println!("  Daily quota:  {}", style(quota.daily_quota).bold());
    println!("  Calls made:   {calls_today}");
    let remaining_styled = if emergency {
        style(remaining).red()
    } else {
        style(remaining).green()
    };
    println!("  Remaining:    {remaining_styled}");
    if emergency {
        println!(
            "  {}",
            style(format!(
                "Emergency mode: at or below {} tokens",
                quota.emergency_threshold
            ))
            .yellow()
        );
    }
    println!();

    println!("  {}", style("── Engagement ──").dim());
    println!("  Replied:      {}", style(processed).bold());
    println!("  Events seen:  {stored_events}");
    println!();

    println!("  {}", style("── Storage ──").dim());
    println!("  Data dir:     {}", style(state.data_dir.display()).dim());
    println!();

    Ok(())
}

/// List the most recent outbound API calls, newest first.
pub async fn calls(state: &AppState, limit: i64, json: bool) -> Result<()> {
    let records = state.api_calls().recent(limit).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!();
        println!("  {}", style("No API calls recorded yet.").dim());
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("Time").fg(Color::White),
        Cell::new("Endpoint").fg(Color::White),
        Cell::new("Attempt").fg(Color::White),
        Cell::new("Result").fg(Color::White),
        Cell::new("Backoff").fg(Color::White),
        Cell::new("Request").fg(Color::White),
    ]);

    for record in &records {
        let result = if record.success {
            Cell::new("● ok").fg(Color::Green)
        } else {
            let label = match record.status_code {
                Some(code) => format!("✗ {code}"),
                None => "✗ error".to_string(),
            };
            Cell::new(label).fg(Color::Red)
        };

        table.add_row(vec![
            Cell::new(record.created_at.format("%m-%d %H:%M:%S")).fg(Color::DarkGrey),
            Cell::new(format!("{}/{}", record.component, record.endpoint)).fg(Color::Cyan),
            Cell::new(record.attempt),
            result,
            Cell::new(format!("{}ms", record.backoff_ms)).fg(Color::DarkGrey),
            Cell::new(&record.request_summary),
        ]);
    }

    println!("{table}");
    Ok(())
}
