//! Database initialization tests
//!
//! Covers on-disk creation, idempotent schema setup and settings defaults.

use cfe_common::config::SqliteLocation;
use cfe_common::db::{create_schema, get_setting_i64, init_database};
use tempfile::TempDir;

async fn table_names(pool: &sqlx::SqlitePool) -> Vec<String> {
    sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
        .fetch_all(pool)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_creates_database_file_and_parent_dirs() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("nested").join("data").join("cfe.db");

    let pool = init_database(&SqliteLocation::File(db_path.clone()))
        .await
        .expect("database should initialize");

    assert!(db_path.exists(), "database file should be created");

    let tables = table_names(&pool).await;
    for expected in ["failures", "runs", "settings", "tariffs_en"] {
        assert!(tables.iter().any(|t| t == expected), "missing table {}", expected);
    }
}

#[tokio::test]
async fn test_schema_creation_is_idempotent() {
    let pool = init_database(&SqliteLocation::Memory).await.unwrap();

    create_schema(&pool).await.expect("second run should succeed");
    create_schema(&pool).await.expect("third run should succeed");

    let settings: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM settings")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(settings, 1, "default settings are inserted once");
}

#[tokio::test]
async fn test_reopening_existing_database_keeps_rows() {
    let temp_dir = TempDir::new().unwrap();
    let location = SqliteLocation::File(temp_dir.path().join("cfe.db"));

    {
        let pool = init_database(&location).await.unwrap();
        sqlx::query("INSERT INTO runs (id, status, created_at) VALUES ('r1', 'queued', '2025-01-01T00:00:00Z')")
            .execute(&pool)
            .await
            .unwrap();
        pool.close().await;
    }

    let pool = init_database(&location).await.unwrap();
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM runs")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_setting_lookup_defaults() {
    let pool = init_database(&SqliteLocation::Memory).await.unwrap();

    assert_eq!(get_setting_i64(&pool, "db_max_lock_wait_ms", 1).await.unwrap(), 5000);
    assert_eq!(get_setting_i64(&pool, "missing_key", 42).await.unwrap(), 42);

    sqlx::query("INSERT INTO settings (key, value) VALUES ('bad', 'not a number')")
        .execute(&pool)
        .await
        .unwrap();
    assert_eq!(get_setting_i64(&pool, "bad", 7).await.unwrap(), 7);
}

#[tokio::test]
async fn test_record_id_is_unique() {
    let pool = init_database(&SqliteLocation::Memory).await.unwrap();

    sqlx::query("INSERT INTO tariffs_en (record_id, run_id) VALUES ('a', 'r1')")
        .execute(&pool)
        .await
        .unwrap();
    let duplicate = sqlx::query("INSERT INTO tariffs_en (record_id, run_id) VALUES ('a', 'r2')")
        .execute(&pool)
        .await;
    assert!(duplicate.is_err(), "record_id must be unique");
}
