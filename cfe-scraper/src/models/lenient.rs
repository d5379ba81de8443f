//! Tolerant field decoding for JSON files that outlive a single run
//!
//! Consolidated output files accumulate across runs and may have been written
//! by older builds, so numbers and strings are accepted interchangeably and
//! `null` decodes to the field's default.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Accept a string, number or null as a `String`
pub fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    })
}

/// Accept a number, numeric string or null as a month (`0` when unknown)
pub fn month_number<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_u64().map(|m| m as u32).unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    })
}
