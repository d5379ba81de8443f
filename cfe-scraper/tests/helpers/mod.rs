//! Shared utilities for testing cfe-scraper

#![allow(dead_code)]

pub mod fake_portal;

pub use fake_portal::{FailingLauncher, FakeLauncher, FakeSite};

use cfe_common::config::{SqliteLocation, ServiceConfig, YearMonth};
use cfe_common::events::EventBus;
use cfe_scraper::models::RunStatus;
use cfe_scraper::portal::PortalLauncher;
use cfe_scraper::services::IdentityTranslator;
use cfe_scraper::AppState;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use uuid::Uuid;

/// In-memory database with the full schema
pub async fn memory_db() -> SqlitePool {
    cfe_common::db::init_database(&SqliteLocation::Memory)
        .await
        .expect("Should create in-memory database")
}

/// Config pointing at `dir`, scraping a single month
pub fn test_config(dir: &TempDir) -> ServiceConfig {
    let mut config = ServiceConfig::defaults_for(dir.path().to_path_buf());
    config.period_start = YearMonth { year: 2025, month: 1 };
    config.period_end = YearMonth { year: 2025, month: 1 };
    config.translate_enabled = false;
    config.spawn_chromedriver = false;
    config
}

/// App state over an in-memory database, with translation switched off
pub async fn test_state(dir: &TempDir, launcher: Arc<dyn PortalLauncher>) -> AppState {
    AppState::new(
        memory_db().await,
        EventBus::new(64),
        test_config(dir),
        launcher,
        Arc::new(IdentityTranslator),
    )
}

/// Poll until the run reaches a terminal status (5 s budget)
pub async fn wait_for_terminal(pool: &SqlitePool, run_id: Uuid) -> RunStatus {
    for _ in 0..250 {
        if let Some(run) = cfe_scraper::db::runs::load_run(pool, run_id).await.unwrap() {
            if run.status.is_terminal() {
                return run.status;
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("run {} did not finish in time", run_id);
}
