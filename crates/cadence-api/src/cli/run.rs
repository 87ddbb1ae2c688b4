//! `cadence run` and `cadence cycle`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use console::style;
use tokio_util::sync::CancellationToken;

use cadence_core::orchestrator::{CycleOutcome, CycleReport, PollingScheduler};

use crate::state::AppState;

/// Poll on the configured interval until a shutdown signal arrives.
///
/// The in-flight cycle finishes its current event before the loop exits.
pub async fn run(state: &AppState, interval: Option<u64>, json: bool) -> Result<()> {
    let interval = match interval {
        Some(secs) => {
            // An override must still leave quota for replies.
            let mut config = state.config.clone();
            config.polling.interval_secs = secs;
            config.validate()?;
            Duration::from_secs(secs)
        }
        None => state.config.poll_interval(),
    };
    let orchestrator = Arc::new(state.orchestrator()?);

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            crate::shutdown_signal().await;
            tracing::info!("shutdown signal received");
            shutdown.cancel();
        }
    });

    if !json {
        println!(
            "  {} Polling for '{}' every {}s",
            style("⚡").bold(),
            style(&orchestrator.settings().search_query).cyan(),
            interval.as_secs()
        );
        println!("  {}", style("Press Ctrl+C to stop").dim());
    }

    let scheduler = PollingScheduler::new(orchestrator, interval);
    let summary = scheduler.run(&shutdown).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!();
        println!(
            "  Stopped after {} cycles, {} replies.",
            style(summary.cycles).bold(),
            style(summary.replied).green()
        );
    }
    Ok(())
}

/// Run one cycle now.
pub async fn cycle(state: &AppState, json: bool) -> Result<()> {
    let orchestrator = state.orchestrator()?;
    let report = orchestrator.run_cycle(&CancellationToken::new()).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn outcome_label(outcome: &CycleOutcome) -> String {
    match outcome {
        CycleOutcome::Completed => format!("{}", style("completed").green()),
        CycleOutcome::SkippedRateLimited { reset_at_ms } => {
            let reset = chrono::DateTime::from_timestamp_millis(*reset_at_ms)
                .map(|t| t.format("%H:%M:%S UTC").to_string())
                .unwrap_or_else(|| reset_at_ms.to_string());
            format!("{} (until {reset})", style("skipped: rate limited").yellow())
        }
        CycleOutcome::SkippedEmergency { remaining } => format!(
            "{} ({remaining} tokens left)",
            style("skipped: emergency quota").yellow()
        ),
        CycleOutcome::SkippedQuotaExhausted => {
            format!("{}", style("skipped: quota exhausted").yellow())
        }
        CycleOutcome::FetchFailed { error } => {
            format!("{} ({error})", style("fetch failed").red())
        }
    }
}

fn print_report(report: &CycleReport) {
    println!();
    println!("  Cycle {}", outcome_label(&report.outcome));
    println!();
    println!("  Fetched:            {}", report.fetched);
    println!("  From backlog:       {}", report.backlog);
    println!("  Replied:            {}", style(report.replied).green());
    println!("  Already processed:  {}", report.skipped_processed);
    println!("  Not eligible:       {}", report.skipped_ineligible);
    if report.deferred > 0 {
        println!("  Deferred (cap):     {}", report.deferred);
    }
    if report.skipped_quota > 0 {
        println!("  Left for quota:     {}", style(report.skipped_quota).yellow());
    }
    if report.generation_failed > 0 {
        println!("  Generation failed:  {}", style(report.generation_failed).red());
    }
    if report.failed > 0 {
        println!("  Post failed:        {}", style(report.failed).red());
    }
    if report.abandoned > 0 {
        println!("  Abandoned:          {}", style(report.abandoned).red());
    }
    if report.conflicts > 0 {
        println!("  Already recorded:   {}", report.conflicts);
    }
    if report.interrupted {
        println!("  {}", style("Interrupted by shutdown").dim());
    }
    println!();
}
