//! Data models for cfe-scraper

pub mod failure;
pub mod lenient;
pub mod run;
pub mod tariff;

pub use failure::FailureRecord;
pub use run::{Run, RunStatus};
pub use tariff::{month_name, TariffRecord};
