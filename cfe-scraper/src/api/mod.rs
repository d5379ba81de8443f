//! HTTP API handlers for cfe-scraper

pub mod downloads;
pub mod health;
pub mod records;
pub mod scrape;
pub mod sse;

pub use downloads::download_routes;
pub use health::health_routes;
pub use records::record_routes;
pub use scrape::scrape_routes;
pub use sse::scrape_event_stream;
