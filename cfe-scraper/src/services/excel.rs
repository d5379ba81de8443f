//! Excel export of the consolidated English records

use anyhow::Context;
use rust_xlsxwriter::{Format, Workbook};
use std::path::Path;

use crate::models::TariffRecord;

const SHEET_NAME: &str = "Tariffs";

/// Build `xlsx_path` from the English JSON array at `english_json`.
///
/// A missing or unparseable JSON file yields a header-only workbook. Returns
/// the number of data rows written. Blocking; call through `spawn_blocking`
/// from async code.
pub fn write_english_workbook(english_json: &Path, xlsx_path: &Path) -> anyhow::Result<usize> {
    let mut records = read_records(english_json);
    sort_records(&mut records);

    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;

    for (col, name) in TariffRecord::COLUMNS.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *name, &header)?;
    }

    for (index, record) in records.iter().enumerate() {
        let row = index as u32 + 1;
        worksheet.write_string(row, 0, &record.id)?;
        worksheet.write_string(row, 1, &record.region)?;
        worksheet.write_string(row, 2, &record.municipality)?;
        worksheet.write_string(row, 3, &record.division)?;
        worksheet.write_string(row, 4, &record.year)?;
        worksheet.write_number(row, 5, record.month as f64)?;
        worksheet.write_string(row, 6, &record.month_name)?;
        worksheet.write_string(row, 7, &record.extracted_at)?;
        worksheet.write_string(row, 8, &record.fare)?;
        worksheet.write_string(row, 9, &record.post)?;
        worksheet.write_string(row, 10, &record.units)?;
        worksheet.write_string(row, 11, &record.tariff_value)?;
    }

    if let Some(parent) = xlsx_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    workbook
        .save(xlsx_path)
        .with_context(|| format!("Failed to write {}", xlsx_path.display()))?;

    tracing::info!(rows = records.len(), path = %xlsx_path.display(), "Excel workbook written");
    Ok(records.len())
}

fn read_records(path: &Path) -> Vec<TariffRecord> {
    let Ok(bytes) = std::fs::read(path) else {
        return Vec::new();
    };
    match serde_json::from_slice(&bytes) {
        Ok(records) => records,
        Err(e) => {
            tracing::warn!(path = %path.display(), "English JSON unreadable, exporting empty workbook: {}", e);
            Vec::new()
        }
    }
}

/// Stable sort by year, month, region, municipality, division, fare
pub fn sort_records(records: &mut [TariffRecord]) {
    records.sort_by(|a, b| {
        (&a.year, a.month, &a.region, &a.municipality, &a.division, &a.fare).cmp(&(
            &b.year,
            b.month,
            &b.region,
            &b.municipality,
            &b.division,
            &b.fare,
        ))
    });
}
