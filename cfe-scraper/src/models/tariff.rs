//! Tariff row extracted from a portal results table

use serde::{Deserialize, Serialize};

use super::lenient::{month_number, string_or_number};

/// One row of a fare/period/division results table.
///
/// The same shape is written for the Spanish original and for the English
/// translation; only the free-text fields differ.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TariffRecord {
    /// `{region}_{municipality}_{division}_{year}_{month}_{row}` (Spanish names)
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: String,
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
    pub month_name: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub extracted_at: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub fare: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub post: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub units: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub tariff_value: String,
}

impl TariffRecord {
    /// Stable identifier for a table row
    pub fn make_id(
        region: &str,
        municipality: &str,
        division: &str,
        year: &str,
        month: u32,
        row: usize,
    ) -> String {
        format!("{}_{}_{}_{}_{}_{}", region, municipality, division, year, month, row)
    }

    /// Excel/sort column order
    pub const COLUMNS: [&'static str; 12] = [
        "id",
        "region",
        "municipality",
        "division",
        "year",
        "month",
        "month_name",
        "extracted_at",
        "fare",
        "post",
        "units",
        "tariff_value",
    ];
}

/// Spanish month name as shown on the portal; the number itself when out of range
pub fn month_name(month: u32) -> String {
    const NAMES: [&str; 12] = [
        "ENERO",
        "FEBRERO",
        "MARZO",
        "ABRIL",
        "MAYO",
        "JUNIO",
        "JULIO",
        "AGOSTO",
        "SEPTIEMBRE",
        "OCTUBRE",
        "NOVIEMBRE",
        "DICIEMBRE",
    ];

    match month {
        1..=12 => NAMES[(month - 1) as usize].to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_names() {
        assert_eq!(month_name(1), "ENERO");
        assert_eq!(month_name(9), "SEPTIEMBRE");
        assert_eq!(month_name(12), "DICIEMBRE");
        assert_eq!(month_name(13), "13");
        assert_eq!(month_name(0), "0");
    }

    #[test]
    fn test_make_id_uses_unpadded_month() {
        let id = TariffRecord::make_id("BAJA CALIFORNIA", "MEXICALI", "BAJA CALIFORNIA", "2024", 9, 3);
        assert_eq!(id, "BAJA CALIFORNIA_MEXICALI_BAJA CALIFORNIA_2024_9_3");
    }

    #[test]
    fn test_deserializes_legacy_shapes() {
        let json = r#"{
            "id": "A_B_C_2024_9_1",
            "region": "A",
            "year": 2024,
            "month": 9,
            "tariff_value": 123.45,
            "unexpected": true
        }"#;
        let record: TariffRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.year, "2024");
        assert_eq!(record.month, 9);
        assert_eq!(record.tariff_value, "123.45");
        assert_eq!(record.post, "");
    }
}
