//! # CFE Common Library
//!
//! Shared code for the CFE tariff scraper service:
//! - Configuration resolution (CLI → ENV → TOML → compiled default)
//! - Error types
//! - SQLite pool initialisation and schema
//! - Scrape event bus
//! - Timestamp helpers

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod time;

pub use error::{Error, Result};
