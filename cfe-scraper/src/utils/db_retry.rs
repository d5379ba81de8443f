//! Retry SQLite writes on lock contention
//!
//! The scrape job and the API handlers write to the same database file. A
//! write that hits `database is locked` is retried with doubling backoff
//! (10 ms up to 1 s) until `max_wait_ms` has passed.

use cfe_common::{Error, Result};
use std::future::Future;
use std::time::{Duration, Instant};

const FIRST_BACKOFF: Duration = Duration::from_millis(10);
const MAX_BACKOFF: Duration = Duration::from_secs(1);

/// Run `operation`, retrying only while it fails with a lock error
pub async fn retry_on_lock<F, Fut, T>(label: &str, max_wait_ms: u64, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let deadline = Instant::now() + Duration::from_millis(max_wait_ms);
    let mut backoff = FIRST_BACKOFF;
    let mut retries = 0u32;

    loop {
        let err = match operation().await {
            Ok(value) => {
                if retries > 0 {
                    tracing::debug!(label, retries, "Write went through after lock retries");
                }
                return Ok(value);
            }
            Err(err) if is_lock_error(&err) => err,
            Err(err) => return Err(err),
        };

        if Instant::now() >= deadline {
            tracing::error!(label, retries, max_wait_ms, "Gave up waiting for database lock: {}", err);
            return Err(Error::Internal(format!(
                "{}: database still locked after {} retries ({} ms)",
                label, retries, max_wait_ms
            )));
        }

        retries += 1;
        tracing::warn!(label, retries, backoff_ms = backoff.as_millis() as u64, "Database locked, backing off");
        tokio::time::sleep(backoff).await;
        backoff = (backoff * 2).min(MAX_BACKOFF);
    }
}

fn is_lock_error(err: &Error) -> bool {
    let Error::Database(db_err) = err else {
        return false;
    };
    let text = db_err.to_string();
    text.contains("database is locked") || text.contains("database table is locked")
}
