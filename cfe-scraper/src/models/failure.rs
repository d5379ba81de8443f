//! Extraction failure record

use serde::{Deserialize, Serialize};

use super::lenient::{month_number, string_or_number};

/// Placeholder for hierarchy levels below the point of failure
pub const NOT_APPLICABLE: &str = "N/A";

/// A portal location that could not be extracted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    /// Local time `YYYY-MM-DD HH:MM:SS`
    #[serde(default, deserialize_with = "string_or_number")]
    pub timestamp: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub fare_type: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub region: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub municipality: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub division: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub year: String,
    #[serde(default, deserialize_with = "month_number")]
    pub month: u32,
    #[serde(default, deserialize_with = "string_or_number")]
    pub error: String,
}
