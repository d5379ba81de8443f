//! Scrape, translation and export services

pub mod excel;
pub mod output_store;
pub mod persistence;
pub mod run_job;
pub mod scrape_job;
pub mod translator;

pub use excel::write_english_workbook;
pub use output_store::{Location, OutputStore};
pub use persistence::{persist_outputs, PersistSummary};
pub use run_job::{execute_run, spawn_run};
pub use scrape_job::{ScrapeJob, ScrapeOutcome, ScrapeStats};
pub use translator::{translate_record, GoogleTranslator, IdentityTranslator, TranslateError, Translator};
