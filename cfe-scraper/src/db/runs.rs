//! Scrape run persistence

use cfe_common::time::parse_rfc3339;
use cfe_common::{Error, Result};
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::{Run, RunStatus};
use crate::utils::retry_on_lock;

/// Insert a new run row
pub async fn insert_run(pool: &SqlitePool, run: &Run) -> Result<()> {
    let id = run.id.to_string();
    let status = run.status.as_str();
    let created_at = run.created_at.to_rfc3339();
    let started_at = run.started_at.map(|t| t.to_rfc3339());
    let finished_at = run.finished_at.map(|t| t.to_rfc3339());
    let message = run.message.as_deref();
    let output_dir = run.output_dir.as_deref();
    let headless = run.headless;

    let max_wait_ms = super::lock_wait_ms(pool).await?;
    let (id, created_at, started_at, finished_at) = (&id, &created_at, &started_at, &finished_at);

    retry_on_lock("insert_run", max_wait_ms, || async move {
        sqlx::query(
            r#"
            INSERT INTO runs (id, status, started_at, finished_at, message, created_at, headless, output_dir)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(started_at)
        .bind(finished_at)
        .bind(message)
        .bind(created_at)
        .bind(headless)
        .bind(output_dir)
        .execute(pool)
        .await?;
        Ok(())
    })
    .await
}

/// Load a run by id
pub async fn load_run(pool: &SqlitePool, id: Uuid) -> Result<Option<Run>> {
    let row = sqlx::query(
        r#"
        SELECT id, status, started_at, finished_at, message, created_at, headless, output_dir
        FROM runs
        WHERE id = ?
        "#,
    )
    .bind(id.to_string())
    .fetch_optional(pool)
    .await?;

    row.map(|row| run_from_row(&row)).transpose()
}

/// Most recent runs first
pub async fn list_runs(pool: &SqlitePool, limit: i64) -> Result<Vec<Run>> {
    let rows = sqlx::query(
        r#"
        SELECT id, status, started_at, finished_at, message, created_at, headless, output_dir
        FROM runs
        ORDER BY created_at DESC
        LIMIT ?
        "#,
    )
    .bind(limit.max(0))
    .fetch_all(pool)
    .await?;

    rows.iter().map(run_from_row).collect()
}

/// True when any run is queued or running
pub async fn has_active_run(pool: &SqlitePool) -> Result<bool> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM runs WHERE status IN ('queued', 'running')")
            .fetch_one(pool)
            .await?;
    Ok(count > 0)
}

/// QUEUED → RUNNING. Returns false when the run was no longer queued.
pub async fn mark_running(pool: &SqlitePool, id: Uuid) -> Result<bool> {
    let id = id.to_string();
    let started_at = Utc::now().to_rfc3339();
    let max_wait_ms = super::lock_wait_ms(pool).await?;
    let (id, started_at) = (&id, &started_at);

    retry_on_lock("mark_running", max_wait_ms, || async move {
        let result = sqlx::query(
            "UPDATE runs SET status = 'running', started_at = ? WHERE id = ? AND status = 'queued'",
        )
        .bind(started_at)
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    })
    .await
}

/// QUEUED → CANCELLED. Returns false when the run had already left the
/// queue, in which case its job owns the outcome.
pub async fn cancel_queued(pool: &SqlitePool, id: Uuid, message: &str) -> Result<bool> {
    let id = id.to_string();
    let finished_at = Utc::now().to_rfc3339();
    let max_wait_ms = super::lock_wait_ms(pool).await?;
    let (id, finished_at) = (&id, &finished_at);

    retry_on_lock("cancel_queued", max_wait_ms, || async move {
        let result = sqlx::query(
            r#"
            UPDATE runs
            SET status = 'cancelled', finished_at = ?, message = ?
            WHERE id = ? AND status = 'queued'
            "#,
        )
        .bind(finished_at)
        .bind(message)
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    })
    .await
}

/// Move an active run into a terminal status.
///
/// Returns false when the run was already terminal, so a late writer can never
/// overwrite the first outcome.
pub async fn mark_finished(
    pool: &SqlitePool,
    id: Uuid,
    status: RunStatus,
    message: Option<&str>,
) -> Result<bool> {
    if !status.is_terminal() {
        return Err(Error::InvalidInput(format!(
            "{} is not a terminal run status",
            status
        )));
    }

    let id = id.to_string();
    let finished_at = Utc::now().to_rfc3339();
    let status = status.as_str();
    let max_wait_ms = super::lock_wait_ms(pool).await?;
    let (id, finished_at) = (&id, &finished_at);

    retry_on_lock("mark_finished", max_wait_ms, || async move {
        let result = sqlx::query(
            r#"
            UPDATE runs
            SET status = ?, finished_at = ?, message = ?
            WHERE id = ? AND status IN ('queued', 'running')
            "#,
        )
        .bind(status)
        .bind(finished_at)
        .bind(message)
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    })
    .await
}

/// Fail runs left active by a previous process (crash or restart)
pub async fn fail_orphaned_runs(pool: &SqlitePool) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE runs
        SET status = 'failed', finished_at = ?, message = 'Service restarted before the run finished.'
        WHERE status IN ('queued', 'running')
        "#,
    )
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

fn run_from_row(row: &SqliteRow) -> Result<Run> {
    let id: String = row.try_get("id")?;
    let id = Uuid::parse_str(&id)
        .map_err(|e| Error::Internal(format!("Invalid run id {:?}: {}", id, e)))?;

    let status: String = row.try_get("status")?;
    let status = status.parse::<RunStatus>()?;

    let created_at: String = row.try_get("created_at")?;
    let created_at = parse_rfc3339(&created_at)
        .ok_or_else(|| Error::Internal(format!("Invalid created_at: {}", created_at)))?;

    let started_at: Option<String> = row.try_get("started_at")?;
    let finished_at: Option<String> = row.try_get("finished_at")?;

    Ok(Run {
        id,
        status,
        started_at: started_at.as_deref().and_then(parse_rfc3339),
        finished_at: finished_at.as_deref().and_then(parse_rfc3339),
        message: row.try_get("message")?,
        created_at,
        headless: row.try_get("headless")?,
        output_dir: row.try_get("output_dir")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cfe_common::config::SqliteLocation;

    async fn pool() -> SqlitePool {
        cfe_common::db::init_database(&SqliteLocation::Memory)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_load() {
        let pool = pool().await;
        let run = Run::new(false, Some("/tmp/out".to_string()));
        insert_run(&pool, &run).await.unwrap();

        let loaded = load_run(&pool, run.id).await.unwrap().unwrap();
        assert_eq!(loaded.id, run.id);
        assert_eq!(loaded.status, RunStatus::Queued);
        assert!(!loaded.headless);
        assert_eq!(loaded.output_dir.as_deref(), Some("/tmp/out"));

        assert!(load_run(&pool, Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_lifecycle_updates() {
        let pool = pool().await;
        let run = Run::new(true, None);
        insert_run(&pool, &run).await.unwrap();
        assert!(has_active_run(&pool).await.unwrap());

        assert!(mark_running(&pool, run.id).await.unwrap());
        assert!(!mark_running(&pool, run.id).await.unwrap(), "only once");

        assert!(mark_finished(&pool, run.id, RunStatus::Succeeded, Some("Scrape completed."))
            .await
            .unwrap());
        assert!(!mark_finished(&pool, run.id, RunStatus::Failed, Some("late"))
            .await
            .unwrap());

        let loaded = load_run(&pool, run.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, RunStatus::Succeeded);
        assert_eq!(loaded.message.as_deref(), Some("Scrape completed."));
        assert!(loaded.started_at.is_some());
        assert!(loaded.finished_at.is_some());
        assert!(!has_active_run(&pool).await.unwrap());
    }

    #[tokio::test]
    async fn test_cancel_queued_run() {
        let pool = pool().await;
        let run = Run::new(true, None);
        insert_run(&pool, &run).await.unwrap();

        assert!(cancel_queued(&pool, run.id, "Cancelled by user.").await.unwrap());
        assert!(!mark_running(&pool, run.id).await.unwrap(), "cancelled runs never start");

        let loaded = load_run(&pool, run.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, RunStatus::Cancelled);
        assert_eq!(loaded.message.as_deref(), Some("Cancelled by user."));
        assert!(loaded.finished_at.is_some());
        assert!(!has_active_run(&pool).await.unwrap());
    }

    #[tokio::test]
    async fn test_cancel_queued_leaves_started_run_alone() {
        let pool = pool().await;
        let run = Run::new(true, None);
        insert_run(&pool, &run).await.unwrap();

        // The job claimed the run between the status read and the cancel
        assert!(mark_running(&pool, run.id).await.unwrap());
        assert!(!cancel_queued(&pool, run.id, "Cancelled by user.").await.unwrap());

        let loaded = load_run(&pool, run.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, RunStatus::Running);
        assert!(loaded.finished_at.is_none());
        assert!(has_active_run(&pool).await.unwrap());

        assert!(mark_finished(&pool, run.id, RunStatus::Cancelled, Some("Cancelled by user."))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_mark_finished_rejects_non_terminal() {
        let pool = pool().await;
        let result = mark_finished(&pool, Uuid::new_v4(), RunStatus::Running, None).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_orphaned_runs_are_failed() {
        let pool = pool().await;
        let queued = Run::new(true, None);
        let running = Run::new(true, None);
        insert_run(&pool, &queued).await.unwrap();
        insert_run(&pool, &running).await.unwrap();
        mark_running(&pool, running.id).await.unwrap();

        assert_eq!(fail_orphaned_runs(&pool).await.unwrap(), 2);
        assert!(!has_active_run(&pool).await.unwrap());
        assert_eq!(list_runs(&pool, 10).await.unwrap().len(), 2);
    }
}
