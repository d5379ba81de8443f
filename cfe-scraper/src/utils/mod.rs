//! Utility modules for cfe-scraper

pub mod db_retry;
pub mod filenames;

pub use db_retry::retry_on_lock;
pub use filenames::safe_filename;
