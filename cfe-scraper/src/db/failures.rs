//! Extraction failure rows

use cfe_common::Result;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::models::FailureRecord;
use crate::utils::retry_on_lock;

/// A row of `failures` as returned by `GET /failures`
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct StoredFailure {
    pub id: i64,
    pub run_id: Option<String>,
    pub timestamp: Option<String>,
    pub fare_type: Option<String>,
    pub region: Option<String>,
    pub municipality: Option<String>,
    pub division: Option<String>,
    pub year: Option<String>,
    pub month: Option<String>,
    pub error: Option<String>,
}

/// Append failure records for a run. Returns the number inserted.
pub async fn insert_failures(
    pool: &SqlitePool,
    run_id: &str,
    failures: &[FailureRecord],
) -> Result<usize> {
    if failures.is_empty() {
        return Ok(0);
    }

    let max_wait_ms = super::lock_wait_ms(pool).await?;

    retry_on_lock("insert_failures", max_wait_ms, || async move {
        let mut tx = pool.begin().await?;

        for failure in failures {
            sqlx::query(
                r#"
                INSERT INTO failures (
                    run_id, timestamp, fare_type, region, municipality, division, year, month, error
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(run_id)
            .bind(&failure.timestamp)
            .bind(&failure.fare_type)
            .bind(&failure.region)
            .bind(&failure.municipality)
            .bind(&failure.division)
            .bind(&failure.year)
            .bind(failure.month.to_string())
            .bind(&failure.error)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(failures.len())
    })
    .await
}

/// Newest failures first
pub async fn list_failures(pool: &SqlitePool, limit: i64) -> Result<Vec<StoredFailure>> {
    let rows = sqlx::query_as::<_, StoredFailure>(
        r#"
        SELECT id, run_id, timestamp, fare_type, region, municipality, division, year, month, error
        FROM failures
        ORDER BY id DESC
        LIMIT ?
        "#,
    )
    .bind(limit.max(0))
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Failure count per run, for status reporting
pub async fn count_for_run(pool: &SqlitePool, run_id: &str) -> Result<i64> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM failures WHERE run_id = ?")
        .bind(run_id)
        .fetch_one(pool)
        .await?;
    Ok(count)
}
