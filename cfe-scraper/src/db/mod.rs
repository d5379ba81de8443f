//! Database access for cfe-scraper
//!
//! Schema and pool setup live in `cfe_common::db`; this module holds the
//! queries the service runs against it.

pub mod failures;
pub mod runs;
pub mod tariffs;

use sqlx::SqlitePool;

/// Default lock wait when the setting is missing
pub const DEFAULT_LOCK_WAIT_MS: i64 = 5000;

/// Maximum time writes keep retrying on `database is locked`
pub async fn lock_wait_ms(pool: &SqlitePool) -> cfe_common::Result<u64> {
    let ms = cfe_common::db::get_setting_i64(pool, "db_max_lock_wait_ms", DEFAULT_LOCK_WAIT_MS).await?;
    Ok(ms.max(0) as u64)
}
