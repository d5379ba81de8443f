//! Table definitions
//!
//! All statements are idempotent (`IF NOT EXISTS`) and run on every startup.

/// Scrape runs and their lifecycle
pub const CREATE_RUNS: &str = r#"
    CREATE TABLE IF NOT EXISTS runs (
        id TEXT PRIMARY KEY,
        status TEXT NOT NULL DEFAULT 'queued',
        started_at TEXT,
        finished_at TEXT,
        message TEXT,
        created_at TEXT NOT NULL,
        headless INTEGER NOT NULL DEFAULT 1,
        output_dir TEXT
    )
"#;

/// English tariff rows, deduplicated by the scraper's record id
pub const CREATE_TARIFFS_EN: &str = r#"
    CREATE TABLE IF NOT EXISTS tariffs_en (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        record_id TEXT UNIQUE,
        run_id TEXT,
        region TEXT,
        municipality TEXT,
        division TEXT,
        year TEXT,
        month TEXT,
        month_name TEXT,
        extracted_at TEXT,
        fare TEXT,
        post TEXT,
        units TEXT,
        tariff_value TEXT
    )
"#;

/// Extraction failures copied from `failed_extractions.json`
pub const CREATE_FAILURES: &str = r#"
    CREATE TABLE IF NOT EXISTS failures (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        run_id TEXT,
        timestamp TEXT,
        fare_type TEXT,
        region TEXT,
        municipality TEXT,
        division TEXT,
        year TEXT,
        month TEXT,
        error TEXT
    )
"#;

/// Key/value service settings
pub const CREATE_SETTINGS: &str = r#"
    CREATE TABLE IF NOT EXISTS settings (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    )
"#;

pub const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_tariffs_en_record_id ON tariffs_en(record_id)",
    "CREATE INDEX IF NOT EXISTS idx_tariffs_en_run_id ON tariffs_en(run_id)",
    "CREATE INDEX IF NOT EXISTS idx_failures_run_id ON failures(run_id)",
    "CREATE INDEX IF NOT EXISTS idx_runs_status ON runs(status)",
];

/// Settings seeded when absent
pub const DEFAULT_SETTINGS: &[(&str, &str)] = &[("db_max_lock_wait_ms", "5000")];
