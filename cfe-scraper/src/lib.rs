//! cfe-scraper library interface
//!
//! Exposes the router, state and services for the binary and for integration
//! tests.

pub mod api;
pub mod db;
pub mod error;
pub mod logging;
pub mod models;
pub mod portal;
pub mod services;
pub mod utils;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use cfe_common::config::ServiceConfig;
use cfe_common::events::EventBus;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::portal::{PortalLauncher, PortalTimings, WebDriverLauncher};
use crate::services::translator::{GoogleTranslator, IdentityTranslator, TranslateError, Translator};

/// Event bus capacity
pub const EVENT_BUS_CAPACITY: usize = 256;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub event_bus: EventBus,
    pub config: Arc<ServiceConfig>,
    /// Opens browser sessions for runs
    pub launcher: Arc<dyn PortalLauncher>,
    pub translator: Arc<dyn Translator>,
    /// Cancellation tokens for runs that have not finished
    pub cancellation_tokens: Arc<RwLock<HashMap<Uuid, CancellationToken>>>,
    /// Held while checking for an active run and queueing a new one
    pub start_lock: Arc<Mutex<()>>,
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        event_bus: EventBus,
        config: ServiceConfig,
        launcher: Arc<dyn PortalLauncher>,
        translator: Arc<dyn Translator>,
    ) -> Self {
        Self {
            db,
            event_bus,
            config: Arc::new(config),
            launcher,
            translator,
            cancellation_tokens: Arc::new(RwLock::new(HashMap::new())),
            start_lock: Arc::new(Mutex::new(())),
            startup_time: Utc::now(),
        }
    }

    /// State wired to the real WebDriver launcher and the configured translator
    pub fn from_config(db: SqlitePool, event_bus: EventBus, config: ServiceConfig) -> Result<Self, TranslateError> {
        let launcher: Arc<dyn PortalLauncher> = Arc::new(WebDriverLauncher::new(
            config.webdriver_url.clone(),
            config.chromedriver_path.clone(),
            config.spawn_chromedriver,
            PortalTimings {
                element_timeout: std::time::Duration::from_secs(config.element_timeout_secs),
                settle_delay: std::time::Duration::from_millis(config.settle_delay_ms),
            },
        ));

        let translator: Arc<dyn Translator> = if config.translate_enabled {
            Arc::new(GoogleTranslator::new(
                config.translate_url.clone(),
                config.translate_target.clone(),
            )?)
        } else {
            Arc::new(IdentityTranslator)
        };

        Ok(Self::new(db, event_bus, config, launcher, translator))
    }

    /// Create and store the cancellation token for a new run
    pub async fn register_run(&self, run_id: Uuid) -> CancellationToken {
        let token = CancellationToken::new();
        self.cancellation_tokens
            .write()
            .await
            .insert(run_id, token.clone());
        token
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .merge(api::scrape_routes())
        .route("/scrape/events", get(api::scrape_event_stream))
        .merge(api::download_routes())
        .merge(api::record_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
