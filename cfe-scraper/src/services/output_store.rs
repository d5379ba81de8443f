//! JSON output tree under the output directory
//!
//! Consolidated arrays are rewritten in full after every append so that a run
//! interrupted at any point leaves valid JSON on disk. Write errors are logged
//! and never abort the scrape.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::models::{FailureRecord, TariffRecord};
use crate::utils::safe_filename;

pub const SPANISH_FILE: &str = "cfe_tariff_data_spanish.json";
pub const ENGLISH_FILE: &str = "cfe_tariff_data_english.json";
pub const FAILURES_FILE: &str = "failed_extractions.json";
pub const EXCEL_FILE: &str = "english_tariff_latest.xlsx";
pub const EXTRACTION_DIR: &str = "extraction";

/// Portal coordinates of one results table
#[derive(Debug, Clone, Copy)]
pub struct Location<'a> {
    pub fare: &'a str,
    pub region: &'a str,
    pub municipality: &'a str,
    pub division: &'a str,
    pub year: i32,
    pub month: u32,
}

impl Location<'_> {
    /// `extraction/<region>/<municipality>`
    fn directory(&self, root: &Path) -> PathBuf {
        root.join(EXTRACTION_DIR)
            .join(safe_filename(self.region))
            .join(safe_filename(self.municipality))
    }

    /// `<FARE>_<division>_<year>_<MM>`
    fn file_stem(&self) -> String {
        format!(
            "{}_{}_{}_{:02}",
            self.fare,
            safe_filename(self.division),
            self.year,
            self.month
        )
    }

    pub fn failure(&self, error: impl Into<String>) -> FailureRecord {
        FailureRecord {
            timestamp: cfe_common::time::local_timestamp(),
            fare_type: self.fare.to_string(),
            region: self.region.to_string(),
            municipality: self.municipality.to_string(),
            division: self.division.to_string(),
            year: self.year.to_string(),
            month: self.month,
            error: error.into(),
        }
    }
}

/// Consolidated Spanish/English/failure collections plus their files
pub struct OutputStore {
    root: PathBuf,
    spanish: Vec<TariffRecord>,
    english: Vec<TariffRecord>,
    failures: Vec<FailureRecord>,
}

impl OutputStore {
    /// Create the directory tree and load whatever a previous run left behind
    pub async fn open(root: impl Into<PathBuf>) -> std::io::Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(root.join(EXTRACTION_DIR)).await?;

        let spanish = load_array(&root.join(SPANISH_FILE)).await;
        let english = load_array(&root.join(ENGLISH_FILE)).await;
        let failures = load_array(&root.join(FAILURES_FILE)).await;

        info!(
            root = %root.display(),
            spanish = spanish.len(),
            english = english.len(),
            failures = failures.len(),
            "Output store opened"
        );

        Ok(Self {
            root,
            spanish,
            english,
            failures,
        })
    }

    pub fn english_path(&self) -> PathBuf {
        self.root.join(ENGLISH_FILE)
    }

    pub fn failures_path(&self) -> PathBuf {
        self.root.join(FAILURES_FILE)
    }

    pub fn excel_path(&self) -> PathBuf {
        self.root.join(EXCEL_FILE)
    }

    pub fn record_count(&self) -> usize {
        self.spanish.len()
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// Save one table's rows: per-division files first, then both consolidated files
    pub async fn append(
        &mut self,
        location: &Location<'_>,
        spanish: Vec<TariffRecord>,
        english: Vec<TariffRecord>,
    ) {
        if spanish.is_empty() {
            return;
        }

        let directory = location.directory(&self.root);
        let stem = location.file_stem();
        save_array(&spanish, &directory.join(format!("{}_spanish.json", stem))).await;
        save_array(&english, &directory.join(format!("{}_english.json", stem))).await;
        info!(
            fare = location.fare,
            region = location.region,
            municipality = location.municipality,
            division = location.division,
            "Individual files saved"
        );

        let added = spanish.len();
        self.spanish.extend(spanish);
        save_array(&self.spanish, &self.root.join(SPANISH_FILE)).await;

        self.english.extend(english);
        save_array(&self.english, &self.root.join(ENGLISH_FILE)).await;

        info!(added, total = self.spanish.len(), "Appended records");
    }

    /// Record a failure and rewrite the failure log
    pub async fn track_failure(&mut self, failure: FailureRecord) {
        error!(
            fare = %failure.fare_type,
            region = %failure.region,
            municipality = %failure.municipality,
            division = %failure.division,
            "Failure tracked: {}",
            failure.error
        );

        self.failures.push(failure);
        save_array(&self.failures, &self.root.join(FAILURES_FILE)).await;
    }
}

/// Load a JSON array; missing or unreadable files count as empty
pub async fn load_array<T: DeserializeOwned>(path: &Path) -> Vec<T> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            warn!(path = %path.display(), "Failed to read existing data: {}", e);
            return Vec::new();
        }
    };

    match serde_json::from_slice(&bytes) {
        Ok(items) => items,
        Err(e) => {
            warn!(path = %path.display(), "Ignoring unparseable data file: {}", e);
            Vec::new()
        }
    }
}

async fn save_array<T: Serialize>(items: &[T], path: &Path) {
    if let Err(e) = write_json(items, path).await {
        error!(path = %path.display(), "Error saving data: {:#}", e);
    }
}

async fn write_json<T: Serialize>(items: &[T], path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_vec_pretty(items)?;
    tokio::fs::write(path, json).await?;
    Ok(())
}
