//! Background execution of a scrape run
//!
//! QUEUED → RUNNING → {SUCCEEDED | FAILED | CANCELLED}. The terminal status,
//! `finished_at` and message are always written, whatever the scrape did.

use anyhow::Context;
use cfe_common::config::YearMonth;
use cfe_common::events::ScrapeEvent;
use std::path::PathBuf;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::db;
use crate::models::{Run, RunStatus};
use crate::services::excel::write_english_workbook;
use crate::services::output_store::OutputStore;
use crate::services::persistence::{persist_outputs, PersistSummary};
use crate::services::scrape_job::{ScrapeJob, ScrapeOutcome};
use crate::AppState;

pub const COMPLETED_MESSAGE: &str = "Scrape completed.";
pub const CANCELLED_MESSAGE: &str = "Scrape cancelled.";

/// What the job body produced
enum JobResult {
    Completed(PersistSummary),
    Cancelled,
}

/// Spawn the background task for a freshly queued run
pub fn spawn_run(state: AppState, run: Run, cancel: CancellationToken) {
    let run_id = run.id;
    tokio::spawn(async move {
        tracing::info!(run_id = %run_id, "Background scrape task started");

        match execute_run(state, run, cancel).await {
            Ok(status) => {
                tracing::info!(run_id = %run_id, status = %status, "Background scrape task finished")
            }
            Err(e) => tracing::error!(run_id = %run_id, "Background scrape task failed: {:#}", e),
        }
    });
}

/// Drive a run from QUEUED to a terminal status.
///
/// Returns the terminal status written. An `Err` means the run row itself
/// could not be updated.
pub async fn execute_run(state: AppState, run: Run, cancel: CancellationToken) -> anyhow::Result<RunStatus> {
    let run_id = run.id;
    let result = drive(&state, &run, &cancel).await;
    state.cancellation_tokens.write().await.remove(&run_id);
    result
}

async fn drive(state: &AppState, run: &Run, cancel: &CancellationToken) -> anyhow::Result<RunStatus> {
    let run_id = run.id;

    if !db::runs::mark_running(&state.db, run_id).await? {
        tracing::info!(run_id = %run_id, "Run left the queue before starting, nothing to do");
        return Ok(RunStatus::Cancelled);
    }

    let output_dir = run
        .output_dir
        .as_deref()
        .map(PathBuf::from)
        .unwrap_or_else(|| state.config.output_dir.clone());

    state.event_bus.emit_lossy(ScrapeEvent::RunStarted {
        run_id,
        output_dir: output_dir.display().to_string(),
        timestamp: cfe_common::time::now(),
    });

    let started = Instant::now();
    let (status, message) = match scrape_and_persist(state, run, output_dir, cancel).await {
        Ok(JobResult::Completed(summary)) => {
            state.event_bus.emit_lossy(ScrapeEvent::RunSucceeded {
                run_id,
                records_inserted: summary.inserted_records,
                failures_inserted: summary.inserted_failures,
                duration_seconds: started.elapsed().as_secs(),
                timestamp: cfe_common::time::now(),
            });
            (RunStatus::Succeeded, COMPLETED_MESSAGE.to_string())
        }
        Ok(JobResult::Cancelled) => {
            state.event_bus.emit_lossy(ScrapeEvent::RunCancelled {
                run_id,
                timestamp: cfe_common::time::now(),
            });
            (RunStatus::Cancelled, CANCELLED_MESSAGE.to_string())
        }
        Err(e) => {
            let message = format!("{:#}", e);
            tracing::error!(run_id = %run_id, "Scrape run failed: {}", message);
            state.event_bus.emit_lossy(ScrapeEvent::RunFailed {
                run_id,
                error: message.clone(),
                timestamp: cfe_common::time::now(),
            });
            (RunStatus::Failed, message)
        }
    };

    db::runs::mark_finished(&state.db, run_id, status, Some(&message))
        .await
        .context("Failed to record run outcome")?;

    Ok(status)
}

async fn scrape_and_persist(
    state: &AppState,
    run: &Run,
    output_dir: PathBuf,
    cancel: &CancellationToken,
) -> anyhow::Result<JobResult> {
    let run_id = run.id;

    let store = OutputStore::open(&output_dir)
        .await
        .with_context(|| format!("Failed to prepare output directory {}", output_dir.display()))?;

    let portal = state
        .launcher
        .launch(run.headless)
        .await
        .context("Failed to start browser session")?;

    let periods = YearMonth::range_inclusive(state.config.period_start, state.config.period_end);
    let job = ScrapeJob::new(
        run_id,
        portal,
        store,
        state.translator.clone(),
        periods,
        cancel.clone(),
        state.event_bus.clone(),
    );

    let (outcome, store) = job.run().await;

    // Whatever was scraped before a cancellation is already on disk; mirror it too.
    let summary = persist_outputs(
        &state.db,
        &run_id.to_string(),
        &store.english_path(),
        &store.failures_path(),
    )
    .await
    .context("Failed to persist scrape outputs")?;

    let english_json = store.english_path();
    let xlsx = store.excel_path();
    tokio::task::spawn_blocking(move || write_english_workbook(&english_json, &xlsx))
        .await?
        .context("Failed to build Excel workbook")?;

    Ok(match outcome {
        ScrapeOutcome::Completed(_) => JobResult::Completed(summary),
        ScrapeOutcome::Cancelled(_) => JobResult::Cancelled,
    })
}

