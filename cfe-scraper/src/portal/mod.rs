//! CFE industrial tariff portal
//!
//! The portal is an ASP.NET WebForms site: every dropdown selection posts the
//! page back and repopulates the dependent dropdowns. Driving it therefore
//! needs a real browser, reached through a WebDriver server.
//!
//! The browser only navigates and selects. Everything read from the page goes
//! through [`parse`] on the page source, so extraction is testable offline.

pub mod parse;
pub mod webdriver;

use async_trait::async_trait;
use std::time::Duration;

pub use parse::{dropdown_options, tariff_rows, DropdownOption, TariffCells};
pub use webdriver::{WebDriverLauncher, WebDriverPortal};

const BASE_URL: &str = "https://app.cfe.mx/Aplicaciones/CCFE/Tarifas/TarifasCREIndustria/Tarifas";

/// Dropdown element ids on every fare page
pub mod dropdown {
    pub const YEAR: &str = "ContentPlaceHolder1_Fecha_ddAnio";
    pub const MONTH: &str = "ContentPlaceHolder1_MesVerano3_ddMesConsulta";
    pub const REGION: &str = "ContentPlaceHolder1_EdoMpoDiv_ddEstado";
    pub const MUNICIPALITY: &str = "ContentPlaceHolder1_EdoMpoDiv_ddMunicipio";
    pub const DIVISION: &str = "ContentPlaceHolder1_EdoMpoDiv_ddDivision";
}

/// Industrial fare categories published by CFE
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fare {
    /// Gran Demanda en Media Tensión Ordinaria
    Gdmto,
    /// Gran Demanda en Media Tensión Horaria
    Gdmth,
    /// Demanda Industrial en Subtransmisión
    Dist,
    /// Demanda Industrial en Transmisión
    Dit,
}

impl Fare {
    /// Scrape order
    pub const ALL: [Fare; 4] = [Fare::Gdmto, Fare::Gdmth, Fare::Dist, Fare::Dit];

    pub fn code(&self) -> &'static str {
        match self {
            Fare::Gdmto => "GDMTO",
            Fare::Gdmth => "GDMTH",
            Fare::Dist => "DIST",
            Fare::Dit => "DIT",
        }
    }

    fn page(&self) -> &'static str {
        match self {
            Fare::Gdmto => "GranDemandaMTO.aspx",
            Fare::Gdmth => "GranDemandaMTH.aspx",
            Fare::Dist => "DemandaIndustrialSub.aspx",
            Fare::Dit => "DemandaIndustrialTran.aspx",
        }
    }

    /// Absolute page URL
    pub fn url(&self) -> String {
        format!("{}/{}", BASE_URL, self.page())
    }
}

/// Browser timing knobs
#[derive(Debug, Clone, Copy)]
pub struct PortalTimings {
    /// How long to wait for an element or for `document.readyState`
    pub element_timeout: Duration,
    /// Pause after each navigation or postback before polling readiness
    pub settle_delay: Duration,
}

impl Default for PortalTimings {
    fn default() -> Self {
        Self {
            element_timeout: Duration::from_secs(15),
            settle_delay: Duration::from_millis(2000),
        }
    }
}

/// A live browser session on the portal
#[async_trait]
pub trait TariffPortal: Send {
    /// Navigate to a fare page and wait for it to settle
    async fn open(&mut self, url: &str) -> anyhow::Result<()>;

    /// Select `value` in the dropdown `dropdown_id` and wait for the postback.
    ///
    /// `Ok(false)` when the dropdown never appeared or has no such option.
    async fn select(&mut self, dropdown_id: &str, value: &str) -> anyhow::Result<bool>;

    /// Current page HTML
    async fn page_source(&mut self) -> anyhow::Result<String>;

    /// End the session; safe to call more than once
    async fn close(&mut self) -> anyhow::Result<()>;
}

/// Opens portal sessions for scrape runs
#[async_trait]
pub trait PortalLauncher: Send + Sync {
    async fn launch(&self, headless: bool) -> anyhow::Result<Box<dyn TariffPortal>>;
}
