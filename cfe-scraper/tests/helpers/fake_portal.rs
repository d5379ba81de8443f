//! In-memory stand-in for the CFE tariff portal
//!
//! Renders the same dropdown ids and results table the live site does, and
//! follows the same cascade: picking a region repopulates municipalities,
//! picking a municipality repopulates divisions.

use async_trait::async_trait;
use cfe_scraper::portal::{dropdown, PortalLauncher, TariffPortal};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct FakeDivision {
    pub value: String,
    pub text: String,
    /// `(post, units, value)` rows; `None` renders no table at all
    pub rows: Option<Vec<(String, String, String)>>,
}

#[derive(Debug, Clone)]
pub struct FakeMunicipality {
    pub value: String,
    pub text: String,
    pub divisions: Vec<FakeDivision>,
}

#[derive(Debug, Clone)]
pub struct FakeRegion {
    pub value: String,
    pub text: String,
    pub municipalities: Vec<FakeMunicipality>,
}

#[derive(Debug, Clone)]
pub struct FakeSite {
    pub years: Vec<String>,
    pub regions: Vec<FakeRegion>,
    /// `(dropdown id, value)` pairs whose selection reports "not selected"
    pub rejected: Vec<(String, String)>,
    /// `(dropdown id, value)` pairs whose selection errors, like a dead session
    pub failing: Vec<(String, String)>,
}

impl FakeSite {
    /// Two regions:
    /// - BAJA CALIFORNIA / MEXICALI with one division carrying a two-row table
    ///   and one division with no table
    /// - SONORA / HERMOSILLO with no divisions at all
    pub fn standard() -> Self {
        let rows = vec![
            ("Fijo".to_string(), "$/mes".to_string(), "1,234.56".to_string()),
            ("Energía".to_string(), "$/kWh".to_string(), "1.0817".to_string()),
        ];

        Self {
            years: vec!["2024".to_string(), "2025".to_string()],
            regions: vec![
                FakeRegion {
                    value: "2".to_string(),
                    text: "BAJA CALIFORNIA".to_string(),
                    municipalities: vec![FakeMunicipality {
                        value: "20".to_string(),
                        text: "MEXICALI".to_string(),
                        divisions: vec![
                            FakeDivision {
                                value: "200".to_string(),
                                text: "BAJA CALIFORNIA".to_string(),
                                rows: Some(rows),
                            },
                            FakeDivision {
                                value: "201".to_string(),
                                text: "NOROESTE".to_string(),
                                rows: None,
                            },
                        ],
                    }],
                },
                FakeRegion {
                    value: "26".to_string(),
                    text: "SONORA".to_string(),
                    municipalities: vec![FakeMunicipality {
                        value: "260".to_string(),
                        text: "HERMOSILLO".to_string(),
                        divisions: Vec::new(),
                    }],
                },
            ],
            rejected: Vec::new(),
            failing: Vec::new(),
        }
    }

    /// Selecting `value` in `dropdown_id` returns `Ok(false)`
    pub fn reject(mut self, dropdown_id: &str, value: &str) -> Self {
        self.rejected.push((dropdown_id.to_string(), value.to_string()));
        self
    }

    /// Selecting `value` in `dropdown_id` returns an error
    pub fn fail(mut self, dropdown_id: &str, value: &str) -> Self {
        self.failing.push((dropdown_id.to_string(), value.to_string()));
        self
    }
}

/// Counters shared between a launcher and the portals it opens
#[derive(Debug, Default)]
pub struct PortalStats {
    pub launched: AtomicUsize,
    pub closed: AtomicUsize,
    pub tables_served: AtomicUsize,
    pub opened_urls: Mutex<Vec<String>>,
    /// Every `select` call in order, as `(dropdown id, value)`
    pub selections: Mutex<Vec<(String, String)>>,
}

impl PortalStats {
    pub fn launched(&self) -> usize {
        self.launched.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn opened_urls(&self) -> Vec<String> {
        self.opened_urls.lock().unwrap().clone()
    }

    /// How many times `value` was picked in `dropdown_id`
    pub fn selection_count(&self, dropdown_id: &str, value: &str) -> usize {
        self.selections
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, v)| id == dropdown_id && v == value)
            .count()
    }
}

#[derive(Debug, Default)]
struct Selection {
    year: Option<String>,
    month: Option<String>,
    region: Option<usize>,
    municipality: Option<usize>,
    division: Option<usize>,
}

pub struct FakePortal {
    site: Arc<FakeSite>,
    stats: Arc<PortalStats>,
    selection: Selection,
    /// Cancelled once this many tables have been served
    cancel_after_tables: Option<(usize, CancellationToken)>,
}

impl FakePortal {
    fn region(&self) -> Option<&FakeRegion> {
        self.selection.region.map(|i| &self.site.regions[i])
    }

    fn municipality(&self) -> Option<&FakeMunicipality> {
        let region = self.region()?;
        self.selection.municipality.map(|i| &region.municipalities[i])
    }

    fn division(&self) -> Option<&FakeDivision> {
        let municipality = self.municipality()?;
        self.selection.division.map(|i| &municipality.divisions[i])
    }

    fn render(&self) -> String {
        let mut html = String::from("<html><body>");

        let years: Vec<(String, String)> =
            self.site.years.iter().map(|y| (y.clone(), y.clone())).collect();
        html.push_str(&render_select(dropdown::YEAR, &years, "Seleccione año"));

        let months: Vec<(String, String)> = (1..=12).map(|m| (m.to_string(), format!("Mes {}", m))).collect();
        html.push_str(&render_select(dropdown::MONTH, &months, "Seleccione mes"));

        if self.selection.year.is_some() && self.selection.month.is_some() {
            let regions: Vec<(String, String)> = self
                .site
                .regions
                .iter()
                .map(|r| (r.value.clone(), r.text.clone()))
                .collect();
            html.push_str(&render_select(dropdown::REGION, &regions, "Seleccione estado"));
        }

        if let Some(region) = self.region() {
            let municipalities: Vec<(String, String)> = region
                .municipalities
                .iter()
                .map(|m| (m.value.clone(), m.text.clone()))
                .collect();
            html.push_str(&render_select(dropdown::MUNICIPALITY, &municipalities, "Seleccione municipio"));
        }

        if let Some(municipality) = self.municipality() {
            let divisions: Vec<(String, String)> = municipality
                .divisions
                .iter()
                .map(|d| (d.value.clone(), d.text.clone()))
                .collect();
            html.push_str(&render_select(dropdown::DIVISION, &divisions, "Seleccione división"));
        }

        if let Some(rows) = self.division().and_then(|d| d.rows.as_ref()) {
            html.push_str(r#"<table class="table table-bordered">"#);
            html.push_str("<tr><th>Tarifa</th><th>Cargo</th><th>Unidades</th><th>Valor</th></tr>");
            for (post, units, value) in rows {
                html.push_str(&format!(
                    "<tr><td>{}</td><td>{}</td><td><font>{}</font></td></tr>",
                    post, units, value
                ));
            }
            html.push_str("</table>");
        }

        html.push_str("</body></html>");
        html
    }
}

fn render_select(id: &str, options: &[(String, String)], placeholder: &str) -> String {
    let mut html = format!(r#"<select id="{}"><option value="0">{}</option>"#, id, placeholder);
    for (value, text) in options {
        html.push_str(&format!(r#"<option value="{}">{}</option>"#, value, text));
    }
    html.push_str("</select>");
    html
}

#[async_trait]
impl TariffPortal for FakePortal {
    async fn open(&mut self, url: &str) -> anyhow::Result<()> {
        self.stats.opened_urls.lock().unwrap().push(url.to_string());
        self.selection = Selection::default();
        Ok(())
    }

    async fn select(&mut self, dropdown_id: &str, value: &str) -> anyhow::Result<bool> {
        self.stats
            .selections
            .lock()
            .unwrap()
            .push((dropdown_id.to_string(), value.to_string()));

        let targets = |pairs: &[(String, String)]| {
            pairs.iter().any(|(id, v)| id == dropdown_id && v == value)
        };
        if targets(&self.site.failing) {
            anyhow::bail!("injected failure selecting {} in {}", value, dropdown_id);
        }
        if targets(&self.site.rejected) {
            return Ok(false);
        }

        let selected = match dropdown_id {
            id if id == dropdown::YEAR => {
                let found = self.site.years.iter().any(|y| y == value);
                if found {
                    self.selection.year = Some(value.to_string());
                }
                found
            }
            id if id == dropdown::MONTH => {
                let found = (1..=12).any(|m: u32| m.to_string() == value);
                if found {
                    self.selection.month = Some(value.to_string());
                }
                found
            }
            id if id == dropdown::REGION => {
                if self.selection.month.is_none() {
                    return Ok(false);
                }
                match self.site.regions.iter().position(|r| r.value == value) {
                    Some(index) => {
                        self.selection.region = Some(index);
                        self.selection.municipality = None;
                        self.selection.division = None;
                        true
                    }
                    None => false,
                }
            }
            id if id == dropdown::MUNICIPALITY => {
                let position = self
                    .region()
                    .and_then(|r| r.municipalities.iter().position(|m| m.value == value));
                match position {
                    Some(index) => {
                        self.selection.municipality = Some(index);
                        self.selection.division = None;
                        true
                    }
                    None => false,
                }
            }
            id if id == dropdown::DIVISION => {
                let position = self
                    .municipality()
                    .and_then(|m| m.divisions.iter().position(|d| d.value == value));
                match position {
                    Some(index) => {
                        self.selection.division = Some(index);
                        true
                    }
                    None => false,
                }
            }
            _ => false,
        };

        Ok(selected)
    }

    async fn page_source(&mut self) -> anyhow::Result<String> {
        if self.division().and_then(|d| d.rows.as_ref()).is_some() {
            let served = self.stats.tables_served.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some((limit, token)) = &self.cancel_after_tables {
                if served >= *limit {
                    token.cancel();
                }
            }
        }
        Ok(self.render())
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        self.stats.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Launches [`FakePortal`]s over a shared site
#[derive(Clone)]
pub struct FakeLauncher {
    pub site: Arc<FakeSite>,
    pub stats: Arc<PortalStats>,
    pub cancel_after_tables: Option<(usize, CancellationToken)>,
}

impl FakeLauncher {
    pub fn new(site: FakeSite) -> Self {
        Self {
            site: Arc::new(site),
            stats: Arc::new(PortalStats::default()),
            cancel_after_tables: None,
        }
    }

    pub fn portal(&self) -> FakePortal {
        FakePortal {
            site: self.site.clone(),
            stats: self.stats.clone(),
            selection: Selection::default(),
            cancel_after_tables: self.cancel_after_tables.clone(),
        }
    }
}

#[async_trait]
impl PortalLauncher for FakeLauncher {
    async fn launch(&self, _headless: bool) -> anyhow::Result<Box<dyn TariffPortal>> {
        self.stats.launched.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(self.portal()))
    }
}

/// A launcher whose browser never starts
pub struct FailingLauncher;

#[async_trait]
impl PortalLauncher for FailingLauncher {
    async fn launch(&self, _headless: bool) -> anyhow::Result<Box<dyn TariffPortal>> {
        Err(anyhow::anyhow!("connection refused (os error 111)"))
    }
}
