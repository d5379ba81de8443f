//! Database initialization
//!
//! Opens (creating when missing) the SQLite database named by `DB_URL` and
//! brings the schema up to date.

use crate::config::SqliteLocation;
use crate::db::schema;
use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::time::Duration;
use tracing::info;

/// Initialize database connection pool and create tables if needed
pub async fn init_database(location: &SqliteLocation) -> Result<SqlitePool> {
    let pool = match location {
        SqliteLocation::File(path) => {
            let newly_created = !path.exists();

            // Create parent directory if it doesn't exist
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }

            let options = SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .busy_timeout(Duration::from_millis(5000));

            let pool = SqlitePoolOptions::new()
                .max_connections(10)
                .connect_with(options)
                .await?;

            if newly_created {
                info!("Initialized new database: {}", path.display());
            } else {
                info!("Opened existing database: {}", path.display());
            }
            pool
        }
        SqliteLocation::Memory => {
            // Every in-memory connection is its own database, so pin one
            let pool = SqlitePoolOptions::new()
                .min_connections(1)
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(SqliteConnectOptions::new().in_memory(true))
                .await?;
            info!("Initialized in-memory database");
            pool
        }
    };

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create tables, indexes and default settings (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    for statement in [
        schema::CREATE_RUNS,
        schema::CREATE_TARIFFS_EN,
        schema::CREATE_FAILURES,
        schema::CREATE_SETTINGS,
    ] {
        sqlx::query(statement).execute(pool).await?;
    }

    for statement in schema::CREATE_INDEXES {
        sqlx::query(*statement).execute(pool).await?;
    }

    for (key, value) in schema::DEFAULT_SETTINGS {
        sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
            .bind(*key)
            .bind(*value)
            .execute(pool)
            .await?;
    }

    info!("Database tables initialized (runs, tariffs_en, failures, settings)");

    Ok(())
}

/// Read an integer setting, falling back to `default` when absent or malformed
pub async fn get_setting_i64(pool: &SqlitePool, key: &str, default: i64) -> Result<i64> {
    let value: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?;

    Ok(value.and_then(|v| v.trim().parse().ok()).unwrap_or(default))
}
