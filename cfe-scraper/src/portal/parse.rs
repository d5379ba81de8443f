//! Pure HTML extraction from portal page sources

use scraper::{ElementRef, Html, Selector};

/// A selectable dropdown entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropdownOption {
    pub value: String,
    pub text: String,
}

/// The three cells kept from a results-table row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TariffCells {
    /// 1-based position among the rows following the header row
    pub row: usize,
    pub post: String,
    pub units: String,
    /// Value text with thousands separators removed
    pub tariff_value: String,
}

/// Real options of the dropdown `dropdown_id`.
///
/// Placeholders are skipped: empty values, the `"0"` value, empty labels and
/// labels containing `Seleccione` or `Select`. An option without a `value`
/// attribute takes its label as value, the way browsers report it.
pub fn dropdown_options(html: &str, dropdown_id: &str) -> Vec<DropdownOption> {
    let Ok(selector) = Selector::parse(&format!("select[id=\"{}\"] option", dropdown_id)) else {
        return Vec::new();
    };

    let document = Html::parse_document(html);

    document
        .select(&selector)
        .filter_map(|option| {
            let text = element_text(&option);
            let value = option
                .value()
                .attr("value")
                .map(|v| v.trim().to_string())
                .unwrap_or_else(|| text.clone());

            let placeholder = value.is_empty()
                || value == "0"
                || text.is_empty()
                || text.contains("Seleccione")
                || text.contains("Select");

            (!placeholder).then_some(DropdownOption { value, text })
        })
        .collect()
}

/// Rows of the first `table.table-bordered`.
///
/// `None` when the page has no such table. The first row is the header and is
/// skipped; rows with fewer than three `td` cells (section headings) are
/// dropped but still count toward row numbering.
pub fn tariff_rows(html: &str) -> Option<Vec<TariffCells>> {
    let table_selector = Selector::parse("table.table-bordered").ok()?;
    let row_selector = Selector::parse("tr").ok()?;
    let cell_selector = Selector::parse("td").ok()?;

    let document = Html::parse_document(html);
    let table = document.select(&table_selector).next()?;

    let rows = table
        .select(&row_selector)
        .enumerate()
        .skip(1)
        .filter_map(|(row, tr)| {
            let cells: Vec<ElementRef> = tr.select(&cell_selector).collect();
            let [.., post, units, value] = cells.as_slice() else {
                return None;
            };

            Some(TariffCells {
                row,
                post: element_text(post),
                units: element_text(units),
                tariff_value: element_text(value).replace(',', ""),
            })
        })
        .collect();

    Some(rows)
}

/// Text content with runs of whitespace collapsed to one space
fn element_text(element: &ElementRef) -> String {
    let text: String = element.text().collect();
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
