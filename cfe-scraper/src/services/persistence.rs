//! Mirror the JSON outputs into SQLite

use serde::Serialize;
use sqlx::SqlitePool;
use std::path::Path;

use crate::db::{failures, tariffs};
use crate::models::{FailureRecord, TariffRecord};
use crate::services::output_store::load_array;

/// Rows written by one persistence pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PersistSummary {
    pub inserted_records: usize,
    pub inserted_failures: usize,
}

/// Insert English records (deduplicated by record id) and failures for a run.
///
/// Missing or invalid JSON files count as empty. The failure file is
/// cumulative, so every pass appends its full contents again.
pub async fn persist_outputs(
    pool: &SqlitePool,
    run_id: &str,
    english_json: &Path,
    failures_json: &Path,
) -> cfe_common::Result<PersistSummary> {
    let records: Vec<TariffRecord> = load_array(english_json).await;
    let failure_records: Vec<FailureRecord> = load_array(failures_json).await;

    let inserted_records = tariffs::insert_records(pool, run_id, &records).await?;
    let inserted_failures = failures::insert_failures(pool, run_id, &failure_records).await?;

    tracing::info!(
        run_id,
        inserted_records,
        inserted_failures,
        "Persisted scrape outputs"
    );

    Ok(PersistSummary {
        inserted_records,
        inserted_failures,
    })
}
