//! WebDriver-driven fetch of the ranking page.
//!
//! The page only renders its product list after client-side navigation and
//! lazy loading, so a plain HTTP GET is not enough. [`BrowserFetcher`] opens
//! a Chrome session through a running WebDriver server (chromedriver), clicks
//! through to the ranking tab, scrolls a few times and hands back the
//! rendered markup.
//!
//! ## Failure handling
//!
//! - A wait that runs out produces `timeout_screenshot.png` and logs the page
//!   source at debug level.
//! - Any other failure produces `error_screenshot.png`.
//! - The session is closed on every path, after the capture.

use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use fantoccini::elements::Element;
use fantoccini::error::{CmdError, NewSessionError};
use fantoccini::wd::Capabilities;
use fantoccini::{Client, ClientBuilder, Locator};
use rand::Rng;
use serde_json::json;
use thiserror::Error;
use tokio::time::{Instant, sleep};
use tracing::{debug, error, info, warn};

use crate::config::BrowserSettings;
use crate::traits::PageSource;

pub const ENTRY_URL: &str = "https://www.oliveyoung.co.kr/store/main/main.do";

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/118.0.0.0 Safari/537.36";

const HIDE_WEBDRIVER_SCRIPT: &str =
    "Object.defineProperty(navigator, 'webdriver', {get: () => undefined})";

const CLICKABLE_POLL: Duration = Duration::from_millis(250);

/// Why the ranking page could not be rendered
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("timed out waiting for {waiting_for}")]
    Timeout { waiting_for: String },
    #[error("could not start browser session: {0}")]
    Session(#[from] NewSessionError),
    #[error("browser command failed: {0}")]
    Command(#[from] CmdError),
}

impl FetchError {
    fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Everything the fetcher needs to reach and render the ranking list
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub webdriver_url: String,
    pub entry_url: String,
    /// Visible text (or part of it) of the link leading to the ranking page
    pub nav_link_text: String,
    /// Selector that must be present once the ranking page has rendered
    pub list_selector: String,
    pub wait_timeout: Duration,
    pub scroll_cycles: u32,
    pub scroll_step_px: u32,
    pub scroll_pause: RangeInclusive<Duration>,
    pub window_size: (u32, u32),
    pub user_agent: String,
    pub headless: bool,
    /// Directory receiving diagnostic screenshots
    pub diagnostics_dir: PathBuf,
}

impl FetchConfig {
    pub fn from_settings(settings: &BrowserSettings) -> Self {
        Self {
            webdriver_url: settings.webdriver_url.clone(),
            headless: settings.headless,
            ..Self::default()
        }
    }

    /// WebDriver capabilities for a Chrome session that hides the usual
    /// automation markers.
    pub fn capabilities(&self) -> Capabilities {
        let (width, height) = self.window_size;
        let mut args = vec![
            "--no-sandbox".to_string(),
            "--disable-dev-shm-usage".to_string(),
            "--disable-gpu".to_string(),
            format!("--window-size={width},{height}"),
            "--disable-blink-features=AutomationControlled".to_string(),
            format!("user-agent={}", self.user_agent),
        ];
        if self.headless {
            args.push("--headless=new".to_string());
        }

        let mut caps = Capabilities::new();
        caps.insert("browserName".to_string(), json!("chrome"));
        caps.insert(
            "goog:chromeOptions".to_string(),
            json!({
                "args": args,
                "excludeSwitches": ["enable-automation"],
                "useAutomationExtension": false,
            }),
        );
        caps
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".to_string(),
            entry_url: ENTRY_URL.to_string(),
            nav_link_text: "랭킹".to_string(),
            list_selector: "ul.cate_prd_list".to_string(),
            wait_timeout: Duration::from_secs(20),
            scroll_cycles: 3,
            scroll_step_px: 500,
            scroll_pause: Duration::from_millis(500)..=Duration::from_millis(1500),
            window_size: (1920, 1080),
            user_agent: USER_AGENT.to_string(),
            headless: false,
            diagnostics_dir: PathBuf::from("."),
        }
    }
}

/// An open WebDriver session. Must be finished with [`BrowserSession::close`].
struct BrowserSession {
    client: Client,
}

impl BrowserSession {
    async fn open(config: &FetchConfig) -> Result<Self, FetchError> {
        let client = ClientBuilder::native()
            .capabilities(config.capabilities())
            .connect(&config.webdriver_url)
            .await?;
        let session = Self { client };

        // A session that cannot hide `navigator.webdriver` is still usable.
        if let Err(e) = session.client.execute(HIDE_WEBDRIVER_SCRIPT, vec![]).await {
            warn!("Could not hide navigator.webdriver: {}", e);
        }

        Ok(session)
    }

    /// Save a screenshot of the current page; failures are only logged.
    async fn capture_diagnostic(&self, path: &Path, dump_source: bool) {
        match self.client.screenshot().await {
            Ok(png) => match tokio::fs::write(path, png).await {
                Ok(()) => info!("Screenshot saved to {}", path.display()),
                Err(e) => warn!("Could not write screenshot {}: {}", path.display(), e),
            },
            Err(e) => warn!("Could not take screenshot: {}", e),
        }

        if dump_source {
            match self.client.source().await {
                Ok(source) => debug!(page_source = %source, "Page source at timeout"),
                Err(e) => warn!("Could not read page source: {}", e),
            }
        }
    }

    async fn close(self) {
        match self.client.close().await {
            Ok(()) => debug!("Browser session closed"),
            Err(e) => warn!("Failed to close browser session cleanly: {}", e),
        }
    }
}

/// Fetches the ranking page through a real browser
pub struct BrowserFetcher {
    config: FetchConfig,
}

impl BrowserFetcher {
    pub fn new(config: FetchConfig) -> Self {
        Self { config }
    }

    async fn render_ranking_page(&self, client: &Client) -> Result<String, FetchError> {
        info!("Visiting main page: {}", self.config.entry_url);
        client.goto(&self.config.entry_url).await?;

        info!("Finding and clicking the '{}' link", self.config.nav_link_text);
        let link_xpath = partial_link_text_xpath(&self.config.nav_link_text);
        let link = wait_until_clickable(
            client,
            &link_xpath,
            self.config.wait_timeout,
            &format!("link containing '{}'", self.config.nav_link_text),
        )
        .await?;
        link.click().await?;

        info!("Waiting for ranking page to load");
        client
            .wait()
            .at_most(self.config.wait_timeout)
            .for_element(Locator::Css(&self.config.list_selector))
            .await
            .map_err(|e| wait_error(e, &self.config.list_selector))?;

        let scroll = format!("window.scrollBy(0, {})", self.config.scroll_step_px);
        for _ in 0..self.config.scroll_cycles {
            client.execute(&scroll, vec![]).await?;
            sleep(random_pause(&self.config.scroll_pause)).await;
        }

        Ok(client.source().await?)
    }
}

#[async_trait]
impl PageSource for BrowserFetcher {
    async fn fetch_page(&self) -> Result<String, FetchError> {
        let session = BrowserSession::open(&self.config).await.inspect_err(|e| {
            error!("Could not start browser session: {}", e);
        })?;

        let result = self.render_ranking_page(&session.client).await;

        if let Err(e) = &result {
            let (file_name, dump_source) = if e.is_timeout() {
                warn!("Timeout waiting for page or element to load: {}", e);
                ("timeout_screenshot.png", true)
            } else {
                error!("An error occurred while fetching the page: {}", e);
                ("error_screenshot.png", false)
            };
            session
                .capture_diagnostic(&self.config.diagnostics_dir.join(file_name), dump_source)
                .await;
        }

        session.close().await;
        result
    }
}

/// Wait until an element matching `xpath` is present, displayed and enabled.
async fn wait_until_clickable(
    client: &Client,
    xpath: &str,
    timeout: Duration,
    what: &str,
) -> Result<Element, FetchError> {
    let deadline = Instant::now() + timeout;
    let element = client
        .wait()
        .at_most(timeout)
        .for_element(Locator::XPath(xpath))
        .await
        .map_err(|e| wait_error(e, what))?;

    loop {
        if element.is_displayed().await? && element.is_enabled().await? {
            return Ok(element);
        }
        if Instant::now() >= deadline {
            return Err(FetchError::Timeout {
                waiting_for: format!("{what} to become clickable"),
            });
        }
        sleep(CLICKABLE_POLL).await;
    }
}

fn wait_error(err: CmdError, what: &str) -> FetchError {
    match err {
        CmdError::WaitTimeout => FetchError::Timeout {
            waiting_for: what.to_string(),
        },
        other => FetchError::Command(other),
    }
}

fn random_pause(range: &RangeInclusive<Duration>) -> Duration {
    let (min, max) = (range.start().as_millis(), range.end().as_millis());
    if min >= max {
        return *range.start();
    }
    let millis = rand::thread_rng().gen_range(min..=max);
    Duration::from_millis(u64::try_from(millis).unwrap_or(u64::MAX))
}

/// XPath matching anchors whose visible text contains `text`.
pub fn partial_link_text_xpath(text: &str) -> String {
    format!("//a[contains(normalize-space(.), {})]", xpath_literal(text))
}

/// Quote `text` as an XPath 1.0 string literal. XPath has no escape syntax,
/// so text holding both quote kinds is split with `concat()`.
fn xpath_literal(text: &str) -> String {
    if !text.contains('"') {
        format!("\"{text}\"")
    } else if !text.contains('\'') {
        format!("'{text}'")
    } else {
        let parts: Vec<String> = text.split('"').map(|part| format!("\"{part}\"")).collect();
        format!("concat({})", parts.join(", '\"', "))
    }
}
