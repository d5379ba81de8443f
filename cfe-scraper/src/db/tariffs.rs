//! English tariff rows

use cfe_common::Result;
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::collections::HashSet;

use crate::models::TariffRecord;
use crate::utils::retry_on_lock;

/// Default and maximum page sizes for listings
pub const DEFAULT_LIMIT: i64 = 100;
pub const MAX_LIMIT: i64 = 10_000;

/// A row of `tariffs_en` as returned by `GET /records`
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct StoredTariff {
    pub record_id: Option<String>,
    pub run_id: Option<String>,
    pub region: Option<String>,
    pub municipality: Option<String>,
    pub division: Option<String>,
    pub year: Option<String>,
    pub month: Option<String>,
    pub month_name: Option<String>,
    pub extracted_at: Option<String>,
    pub fare: Option<String>,
    pub post: Option<String>,
    pub units: Option<String>,
    pub tariff_value: Option<String>,
}

/// Exact-match filters for `GET /records`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordFilter {
    pub limit: Option<i64>,
    pub region: Option<String>,
    pub municipality: Option<String>,
    pub division: Option<String>,
    pub fare: Option<String>,
}

/// Record ids already stored
pub async fn existing_record_ids(pool: &SqlitePool) -> Result<HashSet<String>> {
    let ids: Vec<String> =
        sqlx::query_scalar("SELECT record_id FROM tariffs_en WHERE record_id IS NOT NULL")
            .fetch_all(pool)
            .await?;
    Ok(ids.into_iter().collect())
}

/// Insert English records for a run, skipping empty and already-stored ids.
///
/// Runs in a single transaction. Returns the number of rows inserted.
/// `INSERT OR IGNORE` still guards ids stored between the lookup and the
/// transaction.
pub async fn insert_records(
    pool: &SqlitePool,
    run_id: &str,
    records: &[TariffRecord],
) -> Result<usize> {
    if records.is_empty() {
        return Ok(0);
    }

    let stored = existing_record_ids(pool).await?;
    let fresh: Vec<&TariffRecord> = records
        .iter()
        .filter(|r| !r.id.trim().is_empty() && !stored.contains(&r.id))
        .collect();
    if fresh.is_empty() {
        tracing::debug!(run_id, offered = records.len(), "All records already stored");
        return Ok(0);
    }

    let max_wait_ms = super::lock_wait_ms(pool).await?;
    let fresh = &fresh;

    retry_on_lock("insert_records", max_wait_ms, || async move {
        let mut tx = pool.begin().await?;
        let mut inserted = 0usize;

        for record in fresh {
            let result = sqlx::query(
                r#"
                INSERT OR IGNORE INTO tariffs_en (
                    record_id, run_id, region, municipality, division,
                    year, month, month_name, extracted_at, fare, post, units, tariff_value
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&record.id)
            .bind(run_id)
            .bind(&record.region)
            .bind(&record.municipality)
            .bind(&record.division)
            .bind(&record.year)
            .bind(record.month.to_string())
            .bind(&record.month_name)
            .bind(&record.extracted_at)
            .bind(&record.fare)
            .bind(&record.post)
            .bind(&record.units)
            .bind(&record.tariff_value)
            .execute(&mut *tx)
            .await?;

            inserted += result.rows_affected() as usize;
        }

        tx.commit().await?;
        Ok(inserted)
    })
    .await
}

/// Newest rows first, optionally filtered by exact field values
pub async fn list_records(pool: &SqlitePool, filter: &RecordFilter) -> Result<Vec<StoredTariff>> {
    let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT record_id, run_id, region, municipality, division, year, month, month_name, \
         extracted_at, fare, post, units, tariff_value FROM tariffs_en WHERE 1 = 1",
    );

    let filters = [
        ("region", &filter.region),
        ("municipality", &filter.municipality),
        ("division", &filter.division),
        ("fare", &filter.fare),
    ];
    for (column, value) in filters {
        if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
            query.push(format!(" AND {} = ", column));
            query.push_bind(value.to_string());
        }
    }

    query.push(" ORDER BY id DESC LIMIT ");
    query.push_bind(clamp_limit(filter.limit));

    let rows = query.build_query_as::<StoredTariff>().fetch_all(pool).await?;
    Ok(rows)
}

/// Clamp a requested page size into `0..=MAX_LIMIT`, defaulting to 100
pub fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(0, MAX_LIMIT)
}
