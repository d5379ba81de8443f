//! cfe-scraper - CFE industrial tariff scraping service
//!
//! Runs scrapes of the CFE industrial tariff portal on request, keeps the
//! results as Spanish/English JSON plus an Excel workbook, and mirrors English
//! rows and extraction failures into SQLite.

use anyhow::{Context, Result};
use cfe_common::config::{CliOverrides, ServiceConfig};
use cfe_common::events::EventBus;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use cfe_scraper::{build_router, logging, AppState, EVENT_BUS_CAPACITY};

/// Command-line arguments. Each flag overrides its environment variable.
#[derive(Debug, Parser)]
#[command(name = "cfe-scraper", version, about = "CFE industrial tariff scraping service")]
struct Args {
    /// Directory for JSON, Excel and the default database (env: OUTPUT_DIR)
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// SQLite connection string (env: DB_URL)
    #[arg(long)]
    db_url: Option<String>,

    /// Listen address (env: HOST)
    #[arg(long)]
    host: Option<String>,

    /// Listen port (env: PORT)
    #[arg(long)]
    port: Option<u16>,

    /// WebDriver server URL (env: WEBDRIVER_URL)
    #[arg(long)]
    webdriver_url: Option<String>,

    /// TOML configuration file
    #[arg(long, env = "CFE_SCRAPER_CONFIG")]
    config: Option<PathBuf>,
}

impl From<Args> for CliOverrides {
    fn from(args: Args) -> Self {
        Self {
            output_dir: args.output_dir,
            db_url: args.db_url,
            host: args.host,
            port: args.port,
            webdriver_url: args.webdriver_url,
            config_path: args.config,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let log_filter = logging::init();

    let cli: CliOverrides = Args::parse().into();
    let config = ServiceConfig::resolve(&cli).context("Invalid configuration")?;
    log_filter.apply_config_level(&config.log_level);

    info!(
        "Starting cfe-scraper v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    config
        .ensure_output_dir()
        .context("Failed to create output directory")?;
    info!("Output directory: {}", config.output_dir.display());

    let location = config.database_location()?;
    info!("Database: {}", config.db_url);
    let db = cfe_common::db::init_database(&location)
        .await
        .context("Failed to initialize database")?;

    let orphaned = cfe_scraper::db::runs::fail_orphaned_runs(&db).await?;
    if orphaned > 0 {
        info!(orphaned, "Marked runs interrupted by a previous shutdown as failed");
    }

    info!(
        webdriver_url = %config.webdriver_url,
        spawn_chromedriver = config.spawn_chromedriver,
        translate = config.translate_enabled,
        period_start = %config.period_start,
        period_end = %config.period_end,
        "Scrape settings"
    );

    let bind_address = config.bind_address();
    let state = AppState::from_config(db, EventBus::new(EVENT_BUS_CAPACITY), config)?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;
    info!("Listening on http://{}", bind_address);
    info!("Health check: http://{}/health", bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
