//! Chrome over WebDriver (fantoccini)

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use fantoccini::error::CmdError;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::{json, Map, Value};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use super::{PortalLauncher, PortalTimings, TariffPortal};

/// Pause after `document.readyState` reports complete
const POST_READY_DELAY: Duration = Duration::from_secs(1);

/// How long a freshly spawned chromedriver gets to start answering
const CHROMEDRIVER_STARTUP: Duration = Duration::from_secs(10);

/// Launches Chrome sessions through a WebDriver server
#[derive(Debug, Clone)]
pub struct WebDriverLauncher {
    pub webdriver_url: String,
    pub chromedriver_path: String,
    /// Start `chromedriver` for each run instead of using an external server
    pub spawn_chromedriver: bool,
    pub timings: PortalTimings,
}

impl WebDriverLauncher {
    pub fn new(
        webdriver_url: impl Into<String>,
        chromedriver_path: impl Into<String>,
        spawn_chromedriver: bool,
        timings: PortalTimings,
    ) -> Self {
        Self {
            webdriver_url: webdriver_url.into(),
            chromedriver_path: chromedriver_path.into(),
            spawn_chromedriver,
            timings,
        }
    }
}

#[async_trait]
impl PortalLauncher for WebDriverLauncher {
    async fn launch(&self, headless: bool) -> anyhow::Result<Box<dyn TariffPortal>> {
        let driver = if self.spawn_chromedriver {
            Some(ChromeDriverProcess::spawn(&self.chromedriver_path, &self.webdriver_url).await?)
        } else {
            None
        };

        let mut builder = ClientBuilder::native();
        builder.capabilities(chrome_capabilities(headless));

        let client = builder
            .connect(&self.webdriver_url)
            .await
            .with_context(|| format!("Failed to open a WebDriver session at {}", self.webdriver_url))?;

        info!(headless, webdriver_url = %self.webdriver_url, "Browser session started");

        Ok(Box::new(WebDriverPortal {
            client: Some(client),
            driver,
            timings: self.timings,
        }))
    }
}

fn chrome_capabilities(headless: bool) -> Map<String, Value> {
    let mut args = vec![
        "--no-sandbox",
        "--disable-dev-shm-usage",
        "--disable-gpu",
        "--window-size=1920,1080",
    ];
    if headless {
        args.insert(0, "--headless");
    }

    let mut caps = Map::new();
    caps.insert("browserName".to_string(), json!("chrome"));
    caps.insert("goog:chromeOptions".to_string(), json!({ "args": args }));
    caps
}

/// A Chrome session on the tariff portal
pub struct WebDriverPortal {
    client: Option<Client>,
    driver: Option<ChromeDriverProcess>,
    timings: PortalTimings,
}

impl WebDriverPortal {
    fn client(&self) -> anyhow::Result<&Client> {
        self.client
            .as_ref()
            .ok_or_else(|| anyhow!("Browser session already closed"))
    }

    /// Settle delay, then `document.readyState == "complete"`, then a short pause
    async fn wait_for_page(&self) -> anyhow::Result<()> {
        tokio::time::sleep(self.timings.settle_delay).await;

        let client = self.client()?;
        let deadline = Instant::now() + self.timings.element_timeout;
        loop {
            let state = client
                .execute("return document.readyState", Vec::new())
                .await?;
            if state.as_str() == Some("complete") {
                break;
            }
            if Instant::now() >= deadline {
                warn!("Timed out waiting for page load, continuing");
                break;
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }

        tokio::time::sleep(POST_READY_DELAY).await;
        Ok(())
    }
}

#[async_trait]
impl TariffPortal for WebDriverPortal {
    async fn open(&mut self, url: &str) -> anyhow::Result<()> {
        debug!(url, "Navigating");
        self.client()?
            .goto(url)
            .await
            .with_context(|| format!("Failed to open {}", url))?;
        self.wait_for_page().await
    }

    async fn select(&mut self, dropdown_id: &str, value: &str) -> anyhow::Result<bool> {
        let client = self.client()?;

        let element = match client
            .wait()
            .at_most(self.timings.element_timeout)
            .for_element(Locator::Id(dropdown_id))
            .await
        {
            Ok(element) => element,
            Err(e) if is_missing(&e) => {
                warn!(dropdown_id, "Dropdown did not appear");
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        };

        match element.select_by_value(value).await {
            Ok(()) => {}
            Err(e) if is_missing(&e) => {
                warn!(dropdown_id, value, "Option not found");
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        }

        self.wait_for_page().await?;
        Ok(true)
    }

    async fn page_source(&mut self) -> anyhow::Result<String> {
        Ok(self.client()?.source().await?)
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        let closed = match self.client.take() {
            Some(client) => client.close().await.map_err(anyhow::Error::from),
            None => Ok(()),
        };

        if let Some(mut driver) = self.driver.take() {
            driver.stop().await;
        }

        if closed.is_ok() {
            info!("Browser session closed");
        }
        closed
    }
}

/// Element or option absent: a wait that ran out, or a W3C `no such element`
fn is_missing(err: &CmdError) -> bool {
    matches!(err, CmdError::WaitTimeout) || err.is_no_such_element()
}

/// A `chromedriver` child process bound to the WebDriver URL's port
#[derive(Debug)]
pub struct ChromeDriverProcess {
    child: Child,
}

impl ChromeDriverProcess {
    /// Spawn `chromedriver --port=<port>` and wait until it answers `/status`
    pub async fn spawn(path: &str, webdriver_url: &str) -> anyhow::Result<Self> {
        let port = webdriver_port(webdriver_url)?;

        let child = Command::new(path)
            .arg(format!("--port={}", port))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to start {}", path))?;

        let mut process = Self { child };
        info!(path, port, "chromedriver started");

        if let Err(e) = wait_until_ready(webdriver_url).await {
            process.stop().await;
            return Err(e);
        }

        Ok(process)
    }

    pub async fn stop(&mut self) {
        match self.child.kill().await {
            Ok(()) => debug!("chromedriver stopped"),
            Err(e) => warn!("Failed to stop chromedriver: {}", e),
        }
    }
}

/// Port of a WebDriver URL, falling back to the scheme default
pub fn webdriver_port(webdriver_url: &str) -> anyhow::Result<u16> {
    let url = reqwest::Url::parse(webdriver_url)
        .with_context(|| format!("Invalid WebDriver URL: {}", webdriver_url))?;
    url.port_or_known_default()
        .ok_or_else(|| anyhow!("WebDriver URL has no port: {}", webdriver_url))
}

async fn wait_until_ready(webdriver_url: &str) -> anyhow::Result<()> {
    let status_url = format!("{}/status", webdriver_url.trim_end_matches('/'));
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .build()?;

    let deadline = Instant::now() + CHROMEDRIVER_STARTUP;
    loop {
        if let Ok(response) = http.get(&status_url).send().await {
            if response.status().is_success() {
                return Ok(());
            }
        }
        if Instant::now() >= deadline {
            return Err(anyhow!("chromedriver did not become ready at {}", webdriver_url));
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
}
