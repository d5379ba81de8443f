//! Walk the portal: fare → period → region → municipality → division
//!
//! Every division that yields a results table is saved immediately through
//! the [`OutputStore`]. Faults below the period level are recorded as failure
//! records and the walk moves on; period-level faults are only logged.

use cfe_common::config::YearMonth;
use cfe_common::events::{EventBus, ScrapeEvent};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::models::failure::NOT_APPLICABLE;
use crate::models::{month_name, TariffRecord};
use crate::portal::{dropdown, dropdown_options, tariff_rows, DropdownOption, Fare, TariffPortal};
use crate::services::output_store::{Location, OutputStore};
use crate::services::translator::{translate_record, Translator};

/// Whether the walk should keep going
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    /// The level was walked; the caller reselects its own dropdown
    Continue,
    /// Abandoned before any postback below it, so no reselect is needed
    Skipped,
    Cancelled,
}

/// Counters reported when a walk ends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScrapeStats {
    pub records_added: usize,
    pub failures_added: usize,
    pub records_total: usize,
    pub failures_total: usize,
}

/// How a walk ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrapeOutcome {
    Completed(ScrapeStats),
    Cancelled(ScrapeStats),
}

/// One pass over every fare and period
pub struct ScrapeJob {
    run_id: Uuid,
    portal: Box<dyn TariffPortal>,
    store: OutputStore,
    translator: Arc<dyn Translator>,
    periods: Vec<YearMonth>,
    cancel: CancellationToken,
    event_bus: EventBus,
    initial_records: usize,
    initial_failures: usize,
}

impl ScrapeJob {
    pub fn new(
        run_id: Uuid,
        portal: Box<dyn TariffPortal>,
        store: OutputStore,
        translator: Arc<dyn Translator>,
        periods: Vec<YearMonth>,
        cancel: CancellationToken,
        event_bus: EventBus,
    ) -> Self {
        let initial_records = store.record_count();
        let initial_failures = store.failure_count();
        Self {
            run_id,
            portal,
            store,
            translator,
            periods,
            cancel,
            event_bus,
            initial_records,
            initial_failures,
        }
    }

    /// Walk everything, then close the browser session whatever happened
    pub async fn run(mut self) -> (ScrapeOutcome, OutputStore) {
        let flow = self.walk().await;

        if let Err(e) = self.portal.close().await {
            warn!(run_id = %self.run_id, "Failed to close browser session: {:#}", e);
        }

        let stats = self.stats();
        info!(
            run_id = %self.run_id,
            records_total = stats.records_total,
            failures_total = stats.failures_total,
            "Scraping finished"
        );

        let outcome = match flow {
            Flow::Continue | Flow::Skipped => ScrapeOutcome::Completed(stats),
            Flow::Cancelled => ScrapeOutcome::Cancelled(stats),
        };
        (outcome, self.store)
    }

    fn stats(&self) -> ScrapeStats {
        let records_total = self.store.record_count();
        let failures_total = self.store.failure_count();
        ScrapeStats {
            records_added: records_total.saturating_sub(self.initial_records),
            failures_added: failures_total.saturating_sub(self.initial_failures),
            records_total,
            failures_total,
        }
    }

    async fn walk(&mut self) -> Flow {
        let periods = self.periods.clone();

        for fare in Fare::ALL {
            info!(run_id = %self.run_id, fare = fare.code(), "Processing fare type");

            for &period in &periods {
                if self.cancel.is_cancelled() {
                    return Flow::Cancelled;
                }

                info!(fare = fare.code(), %period, "Processing period");
                match self.scrape_period(fare, period).await {
                    Ok(Flow::Continue | Flow::Skipped) => {}
                    Ok(Flow::Cancelled) => return Flow::Cancelled,
                    Err(e) => {
                        error!(fare = fare.code(), %period, "Error processing period: {:#}", e);
                    }
                }
            }
        }

        Flow::Continue
    }

    async fn scrape_period(&mut self, fare: Fare, period: YearMonth) -> anyhow::Result<Flow> {
        self.portal.open(&fare.url()).await?;

        if !self.portal.select(dropdown::YEAR, &period.year.to_string()).await? {
            warn!(fare = fare.code(), %period, "Year not available, skipping period");
            return Ok(Flow::Skipped);
        }
        if !self.portal.select(dropdown::MONTH, &period.month.to_string()).await? {
            warn!(fare = fare.code(), %period, "Month not available, skipping period");
            return Ok(Flow::Skipped);
        }

        let regions = self.options(dropdown::REGION).await?;
        info!(fare = fare.code(), count = regions.len(), "Found regions");

        for region in &regions {
            self.emit_progress(fare, period, Some(&region.text));

            let at = Location {
                fare: fare.code(),
                region: &region.text,
                municipality: NOT_APPLICABLE,
                division: NOT_APPLICABLE,
                year: period.year,
                month: period.month,
            };

            match self.scrape_region(&at, region).await {
                Ok(Flow::Continue | Flow::Skipped) => {}
                Ok(Flow::Cancelled) => return Ok(Flow::Cancelled),
                Err(e) => self.store.track_failure(at.failure(format!("{:#}", e))).await,
            }
        }

        Ok(Flow::Continue)
    }

    async fn scrape_region(&mut self, at: &Location<'_>, region: &DropdownOption) -> anyhow::Result<Flow> {
        info!(fare = at.fare, region = %region.text, "Processing region");

        if !self.portal.select(dropdown::REGION, &region.value).await? {
            self.store.track_failure(at.failure("Failed to select region")).await;
            return Ok(Flow::Skipped);
        }

        let municipalities = self.options(dropdown::MUNICIPALITY).await?;

        for municipality in &municipalities {
            let at = Location {
                municipality: &municipality.text,
                ..*at
            };

            match self.scrape_municipality(&at, municipality).await {
                Ok(Flow::Continue) => {
                    self.portal.select(dropdown::REGION, &region.value).await?;
                }
                Ok(Flow::Skipped) => {}
                Ok(Flow::Cancelled) => return Ok(Flow::Cancelled),
                Err(e) => self.store.track_failure(at.failure(format!("{:#}", e))).await,
            }
        }

        Ok(Flow::Continue)
    }

    async fn scrape_municipality(
        &mut self,
        at: &Location<'_>,
        municipality: &DropdownOption,
    ) -> anyhow::Result<Flow> {
        info!(fare = at.fare, municipality = %municipality.text, "Processing municipality");

        if !self.portal.select(dropdown::MUNICIPALITY, &municipality.value).await? {
            self.store.track_failure(at.failure("Failed to select municipality")).await;
            return Ok(Flow::Skipped);
        }

        let divisions = self.options(dropdown::DIVISION).await?;
        if divisions.is_empty() {
            self.store.track_failure(at.failure("No divisions available")).await;
            return Ok(Flow::Skipped);
        }

        for division in &divisions {
            if self.cancel.is_cancelled() {
                return Ok(Flow::Cancelled);
            }

            let at = Location {
                division: &division.text,
                ..*at
            };

            match self.scrape_division(&at, division).await {
                Ok(Flow::Continue) => {
                    self.portal
                        .select(dropdown::MUNICIPALITY, &municipality.value)
                        .await?;
                }
                Ok(_) => {}
                Err(e) => {
                    error!(division = %division.text, "Error processing division: {:#}", e);
                    self.store.track_failure(at.failure(format!("{:#}", e))).await;
                }
            }
        }

        Ok(Flow::Continue)
    }

    async fn scrape_division(&mut self, at: &Location<'_>, division: &DropdownOption) -> anyhow::Result<Flow> {
        info!(fare = at.fare, division = %division.text, "Processing division");

        if !self.portal.select(dropdown::DIVISION, &division.value).await? {
            self.store.track_failure(at.failure("Failed to select division")).await;
            return Ok(Flow::Skipped);
        }

        let html = self.portal.page_source().await?;
        let spanish = build_records(at, &html);

        if spanish.is_empty() {
            warn!(
                fare = at.fare,
                region = at.region,
                municipality = at.municipality,
                division = at.division,
                "No data found"
            );
            self.store.track_failure(at.failure("No table data extracted")).await;
            return Ok(Flow::Continue);
        }

        let mut english = Vec::with_capacity(spanish.len());
        for record in &spanish {
            english.push(translate_record(self.translator.as_ref(), record).await);
        }

        self.store.append(at, spanish, english).await;
        Ok(Flow::Continue)
    }

    async fn options(&mut self, dropdown_id: &str) -> anyhow::Result<Vec<DropdownOption>> {
        let html = self.portal.page_source().await?;
        Ok(dropdown_options(&html, dropdown_id))
    }

    fn emit_progress(&self, fare: Fare, period: YearMonth, region: Option<&str>) {
        self.event_bus.emit_lossy(ScrapeEvent::RunProgress {
            run_id: self.run_id,
            fare: fare.code().to_string(),
            period: period.to_string(),
            region: region.map(str::to_string),
            records_total: self.store.record_count(),
            failures_total: self.store.failure_count(),
            timestamp: cfe_common::time::now(),
        });
    }
}

/// Spanish records for the results table on `html`
fn build_records(at: &Location<'_>, html: &str) -> Vec<TariffRecord> {
    let Some(rows) = tariff_rows(html) else {
        return Vec::new();
    };

    let year = at.year.to_string();
    let extracted_at = cfe_common::time::local_timestamp();

    rows.into_iter()
        .map(|cells| {
            debug!(
                row = cells.row,
                fare = at.fare,
                post = %cells.post,
                units = %cells.units,
                value = %cells.tariff_value,
                "Extracted row"
            );
            TariffRecord {
                id: TariffRecord::make_id(at.region, at.municipality, at.division, &year, at.month, cells.row),
                region: at.region.to_string(),
                municipality: at.municipality.to_string(),
                division: at.division.to_string(),
                year: year.clone(),
                month: at.month,
                month_name: month_name(at.month),
                extracted_at: extracted_at.clone(),
                fare: at.fare.to_string(),
                post: cells.post,
                units: cells.units,
                tariff_value: cells.tariff_value,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_records() {
        let html = r#"<table class="table-bordered">
            <tr><th>h</th></tr>
            <tr><td>Fijo</td><td>$/mes</td><td>1,500.00</td></tr>
        </table>"#;
        let at = Location {
            fare: "DIT",
            region: "SONORA",
            municipality: "HERMOSILLO",
            division: "NOROESTE",
            year: 2025,
            month: 3,
        };

        let records = build_records(&at, html);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "SONORA_HERMOSILLO_NOROESTE_2025_3_1");
        assert_eq!(records[0].month_name, "MARZO");
        assert_eq!(records[0].tariff_value, "1500.00");
        assert_eq!(records[0].fare, "DIT");

        assert!(build_records(&at, "<p>no table</p>").is_empty());
    }
}
