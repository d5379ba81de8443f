//! Configuration loading and output folder resolution
//!
//! Every setting resolves in the same priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing or malformed TOML file is never fatal: it logs a warning and the
//! remaining tiers still apply.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

/// Compiled default output directory
pub const DEFAULT_OUTPUT_DIR: &str = "/data/cfe_tariffs";
/// Database file name placed under the output directory by default
pub const DEFAULT_DB_FILE: &str = "cfe.db";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_WEBDRIVER_URL: &str = "http://127.0.0.1:9515";
pub const DEFAULT_CHROMEDRIVER_PATH: &str = "chromedriver";
pub const DEFAULT_TRANSLATE_URL: &str = "https://translate.googleapis.com/translate_a/single";
pub const DEFAULT_TRANSLATE_TARGET: &str = "en";
pub const DEFAULT_PERIOD_START: YearMonth = YearMonth { year: 2024, month: 9 };
pub const DEFAULT_PERIOD_END: YearMonth = YearMonth { year: 2025, month: 12 };
pub const DEFAULT_ELEMENT_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 2000;

/// Environment variable naming an explicit TOML config file
pub const CONFIG_PATH_ENV: &str = "CFE_SCRAPER_CONFIG";

/// A calendar month on the tariff portal (`YYYY-MM`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(Error::InvalidInput(format!("month out of range: {}", month)));
        }
        Ok(Self { year, month })
    }

    /// The following calendar month
    pub fn succ(self) -> Self {
        if self.month == 12 {
            Self { year: self.year + 1, month: 1 }
        } else {
            Self { year: self.year, month: self.month + 1 }
        }
    }

    /// Every month from `start` to `end`, both inclusive. Empty when `end < start`.
    pub fn range_inclusive(start: YearMonth, end: YearMonth) -> Vec<YearMonth> {
        let mut periods = Vec::new();
        let mut current = start;
        while current <= end {
            periods.push(current);
            current = current.succ();
        }
        periods
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (year, month) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| Error::Config(format!("expected YYYY-MM, got {:?}", s)))?;
        let year = year
            .parse::<i32>()
            .map_err(|e| Error::Config(format!("invalid year in {:?}: {}", s, e)))?;
        let month = month
            .parse::<u32>()
            .map_err(|e| Error::Config(format!("invalid month in {:?}: {}", s, e)))?;
        YearMonth::new(year, month).map_err(|e| Error::Config(e.to_string()))
    }
}

/// Where the SQLite database lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqliteLocation {
    File(PathBuf),
    Memory,
}

/// Parse a `DB_URL` value.
///
/// Accepts `sqlite:///abs/path`, `sqlite://rel/path`,
/// `sqlite:path` and `sqlite::memory:`.
pub fn parse_sqlite_url(url: &str) -> Result<SqliteLocation> {
    let url = url.trim();
    let rest = url
        .strip_prefix("sqlite:")
        .ok_or_else(|| Error::Config(format!("unsupported database URL (expected sqlite:): {}", url)))?;

    if rest == ":memory:" || rest == "//:memory:" {
        return Ok(SqliteLocation::Memory);
    }

    // `sqlite:///abs` → `/abs`; `sqlite://rel` → `rel`
    let path = rest.strip_prefix("//").unwrap_or(rest);
    // Drop query parameters such as `?mode=rwc`
    let path = path.split('?').next().unwrap_or(path);

    if path.is_empty() {
        return Err(Error::Config(format!("database URL has no path: {}", url)));
    }

    Ok(SqliteLocation::File(PathBuf::from(path)))
}

/// Default `DB_URL` for an output directory
pub fn default_db_url(output_dir: &Path) -> String {
    // Absolute paths yield `sqlite:///abs`, relative ones `sqlite://rel`
    format!("sqlite://{}", output_dir.join(DEFAULT_DB_FILE).display())
}

/// Command-line overrides (tier 1)
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub output_dir: Option<PathBuf>,
    pub db_url: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub webdriver_url: Option<String>,
    pub config_path: Option<PathBuf>,
}

/// Logging section of the TOML file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: Option<String>,
}

/// WebDriver section of the TOML file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebDriverToml {
    pub url: Option<String>,
    pub chromedriver_path: Option<String>,
    pub spawn_chromedriver: Option<bool>,
}

/// Translation section of the TOML file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranslateToml {
    pub enabled: Option<bool>,
    pub url: Option<String>,
    pub target: Option<String>,
}

/// Scrape window and timing section of the TOML file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScrapeToml {
    pub period_start: Option<String>,
    pub period_end: Option<String>,
    pub element_timeout_secs: Option<u64>,
    pub settle_delay_ms: Option<u64>,
}

/// TOML configuration file (tier 3)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    pub output_dir: Option<String>,
    pub db_url: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    #[serde(default)]
    pub webdriver: WebDriverToml,
    #[serde(default)]
    pub translate: TranslateToml,
    #[serde(default)]
    pub scrape: ScrapeToml,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Fully resolved service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub output_dir: PathBuf,
    pub db_url: String,
    pub host: String,
    pub port: u16,
    pub webdriver_url: String,
    pub chromedriver_path: String,
    pub spawn_chromedriver: bool,
    pub translate_enabled: bool,
    pub translate_url: String,
    pub translate_target: String,
    pub period_start: YearMonth,
    pub period_end: YearMonth,
    pub element_timeout_secs: u64,
    pub settle_delay_ms: u64,
    pub log_level: String,
}

impl ServiceConfig {
    /// Compiled defaults for a given output directory
    pub fn defaults_for(output_dir: PathBuf) -> Self {
        let db_url = default_db_url(&output_dir);
        Self {
            output_dir,
            db_url,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            webdriver_url: DEFAULT_WEBDRIVER_URL.to_string(),
            chromedriver_path: DEFAULT_CHROMEDRIVER_PATH.to_string(),
            spawn_chromedriver: true,
            translate_enabled: true,
            translate_url: DEFAULT_TRANSLATE_URL.to_string(),
            translate_target: DEFAULT_TRANSLATE_TARGET.to_string(),
            period_start: DEFAULT_PERIOD_START,
            period_end: DEFAULT_PERIOD_END,
            element_timeout_secs: DEFAULT_ELEMENT_TIMEOUT_SECS,
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            log_level: "info".to_string(),
        }
    }

    /// Resolve from the process environment and the discovered TOML file
    pub fn resolve(cli: &CliOverrides) -> Result<Self> {
        let explicit = cli
            .config_path
            .clone()
            .or_else(|| std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from));
        let toml_config = load_toml_config(explicit.as_deref());
        Self::resolve_with(cli, |name| std::env::var(name).ok(), &toml_config)
    }

    /// Resolve with an explicit environment lookup and TOML contents
    pub fn resolve_with<F>(cli: &CliOverrides, env: F, toml_config: &TomlConfig) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |name: &str| env(name).filter(|v| !v.trim().is_empty());

        let output_dir = cli
            .output_dir
            .clone()
            .or_else(|| lookup("OUTPUT_DIR").map(PathBuf::from))
            .or_else(|| toml_config.output_dir.as_ref().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));

        let mut config = Self::defaults_for(output_dir);

        if let Some(db_url) = cli
            .db_url
            .clone()
            .or_else(|| lookup("DB_URL"))
            .or_else(|| toml_config.db_url.clone())
        {
            config.db_url = db_url;
        }
        // Fail early on a URL the pool could never open
        parse_sqlite_url(&config.db_url)?;

        if let Some(host) = cli.host.clone().or_else(|| lookup("HOST")).or_else(|| toml_config.host.clone()) {
            config.host = host;
        }

        if let Some(port) = cli.port {
            config.port = port;
        } else if let Some(port) = lookup("PORT") {
            config.port = port
                .parse()
                .map_err(|e| Error::Config(format!("invalid PORT {:?}: {}", port, e)))?;
        } else if let Some(port) = toml_config.port {
            config.port = port;
        }

        if let Some(url) = cli
            .webdriver_url
            .clone()
            .or_else(|| lookup("WEBDRIVER_URL"))
            .or_else(|| toml_config.webdriver.url.clone())
        {
            config.webdriver_url = url;
        }
        if let Some(path) = lookup("CHROMEDRIVER_PATH").or_else(|| toml_config.webdriver.chromedriver_path.clone()) {
            config.chromedriver_path = path;
        }
        if let Some(spawn) = lookup("SPAWN_CHROMEDRIVER") {
            config.spawn_chromedriver = parse_flag("SPAWN_CHROMEDRIVER", &spawn)?;
        } else if let Some(spawn) = toml_config.webdriver.spawn_chromedriver {
            config.spawn_chromedriver = spawn;
        }

        if let Some(flag) = lookup("TRANSLATE") {
            config.translate_enabled = parse_flag("TRANSLATE", &flag)?;
        } else if let Some(enabled) = toml_config.translate.enabled {
            config.translate_enabled = enabled;
        }
        if let Some(url) = lookup("TRANSLATE_URL").or_else(|| toml_config.translate.url.clone()) {
            config.translate_url = url;
        }
        if let Some(target) = lookup("TRANSLATE_TARGET").or_else(|| toml_config.translate.target.clone()) {
            config.translate_target = target;
        }

        if let Some(start) = lookup("SCRAPE_PERIOD_START").or_else(|| toml_config.scrape.period_start.clone()) {
            config.period_start = start.parse()?;
        }
        if let Some(end) = lookup("SCRAPE_PERIOD_END").or_else(|| toml_config.scrape.period_end.clone()) {
            config.period_end = end.parse()?;
        }
        if config.period_end < config.period_start {
            return Err(Error::Config(format!(
                "scrape period end {} is before start {}",
                config.period_end, config.period_start
            )));
        }
        if let Some(secs) = toml_config.scrape.element_timeout_secs {
            config.element_timeout_secs = secs;
        }
        if let Some(ms) = toml_config.scrape.settle_delay_ms {
            config.settle_delay_ms = ms;
        }

        if let Some(level) = lookup("LOG_LEVEL").or_else(|| toml_config.logging.level.clone()) {
            config.log_level = level;
        }

        Ok(config)
    }

    /// Parsed database location
    pub fn database_location(&self) -> Result<SqliteLocation> {
        parse_sqlite_url(&self.db_url)
    }

    /// Create the output directory (and parents) if missing
    pub fn ensure_output_dir(&self) -> Result<()> {
        ensure_directory(&self.output_dir)
    }

    /// `host:port` for the listener
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Create a directory and its parents if missing
pub fn ensure_directory(path: &Path) -> Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
        debug!("Created directory: {}", path.display());
    }
    if !path.is_dir() {
        return Err(Error::Config(format!("not a directory: {}", path.display())));
    }
    Ok(())
}

fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Ok(true),
        "0" | "false" | "off" | "no" => Ok(false),
        other => Err(Error::Config(format!("invalid {} value: {:?}", name, other))),
    }
}

/// Candidate TOML locations, user config before system config
fn config_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(dir) = dirs::config_dir() {
        candidates.push(dir.join("cfe-scraper").join("config.toml"));
    }
    candidates.push(PathBuf::from("/etc/cfe-scraper/config.toml"));
    candidates
}

/// Load the TOML config file.
///
/// With an explicit path that file alone is consulted; otherwise the first
/// existing candidate wins. Any read or parse failure degrades to defaults.
pub fn load_toml_config(explicit: Option<&Path>) -> TomlConfig {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => config_file_candidates().into_iter().find(|p| p.exists()),
    };

    let Some(path) = path else {
        debug!("No TOML config file found, using environment and defaults");
        return TomlConfig::default();
    };

    match std::fs::read_to_string(&path) {
        Ok(content) => match toml::from_str::<TomlConfig>(&content) {
            Ok(config) => {
                debug!("Loaded TOML config: {}", path.display());
                config
            }
            Err(e) => {
                warn!("Failed to parse {}: {} (using defaults)", path.display(), e);
                TomlConfig::default()
            }
        },
        Err(e) => {
            warn!("Failed to read {}: {} (using defaults)", path.display(), e);
            TomlConfig::default()
        }
    }
}
