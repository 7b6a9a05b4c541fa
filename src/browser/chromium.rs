//! Chromiumoxide-backed implementation of the browser capabilities.
//!
//! Manages one headless Chromium instance per process. The browser is lazily
//! launched on first page request and every account borrows fresh pages from
//! it, so concurrent operations never share a page.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::ScreenshotParams;
use futures_util::StreamExt;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::browser::{BrowserSession, Locator, PageDriver, WaitState};
use crate::error::{Error, Result};

/// Default viewport, matching a common desktop session.
pub const DEFAULT_VIEWPORT_WIDTH: u32 = 1920;
pub const DEFAULT_VIEWPORT_HEIGHT: u32 = 1080;

/// User agent presented to the origin. A plain desktop Chrome string; the
/// automation flag is stripped separately via launch args.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

const SELECTOR_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Browser launch configuration.
#[derive(Debug, Clone)]
pub struct ChromiumOptions {
    pub headless: bool,
    /// Path to a Chrome/Chromium executable (None for auto-detection).
    pub chrome_path: Option<String>,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub request_timeout: Duration,
}

impl Default for ChromiumOptions {
    fn default() -> Self {
        Self {
            headless: true,
            chrome_path: None,
            viewport_width: DEFAULT_VIEWPORT_WIDTH,
            viewport_height: DEFAULT_VIEWPORT_HEIGHT,
            request_timeout: Duration::from_secs(60),
        }
    }
}

/// Lazily-launched shared browser handing out isolated pages.
pub struct ChromiumSession {
    options: ChromiumOptions,
    browser: Arc<Mutex<Option<Browser>>>,
}

impl ChromiumSession {
    #[must_use]
    pub fn new(options: ChromiumOptions) -> Self {
        Self {
            options,
            browser: Arc::new(Mutex::new(None)),
        }
    }

    async fn ensure_browser(&self) -> Result<()> {
        let mut guard = self.browser.lock().await;
        if guard.is_some() {
            return Ok(());
        }

        info!("Launching headless browser");

        let mut builder = BrowserConfig::builder()
            .window_size(self.options.viewport_width, self.options.viewport_height)
            .request_timeout(self.options.request_timeout)
            .no_sandbox()
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-background-networking")
            .arg("--disable-extensions")
            .arg("--disable-sync")
            .arg("--mute-audio")
            .arg("--hide-scrollbars")
            .arg("--lang=en-US,en")
            .arg(format!("--user-agent={USER_AGENT}"));

        if self.options.headless {
            builder = builder.arg("--headless=new");
        } else {
            builder = builder.with_head();
        }
        if let Some(ref chrome_path) = self.options.chrome_path {
            builder = builder.chrome_executable(chrome_path);
        }

        let browser_config = builder
            .build()
            .map_err(|e| Error::Driver(format!("failed to build browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| Error::Driver(format!("failed to launch browser: {e}")))?;

        // Drive the CDP event stream for the lifetime of the browser.
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("browser handler error: {e}");
                }
            }
        });

        *guard = Some(browser);
        info!("Headless browser ready");
        Ok(())
    }
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn new_page(&self) -> Result<Box<dyn PageDriver>> {
        self.ensure_browser().await?;
        let guard = self.browser.lock().await;
        let browser = guard
            .as_ref()
            .ok_or_else(|| Error::Driver("browser not initialized".to_string()))?;
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| Error::Driver(format!("failed to open page: {e}")))?;
        Ok(Box::new(ChromiumPage { page }))
    }

    async fn shutdown(&self) {
        let mut guard = self.browser.lock().await;
        if let Some(mut browser) = guard.take() {
            if let Err(e) = browser.close().await {
                error!("failed to close browser: {e}");
            } else {
                info!("Browser shutdown complete");
            }
        }
    }
}

struct ChromiumPage {
    page: chromiumoxide::Page,
}

fn drv(e: impl std::fmt::Display) -> Error {
    Error::Driver(e.to_string())
}

/// JS visibility probe for [`WaitState::Visible`]. CDP has no first-class
/// visibility wait, so this mirrors what DOM-testing libraries check.
const VISIBLE_CHECK: &str = r"(sel) => {
    const el = document.querySelector(sel);
    return !!el && !!(el.offsetWidth || el.offsetHeight || el.getClientRects().length);
}";

const CLEAR_INPUT: &str = r"(sel) => {
    const el = document.querySelector(sel);
    if (el) { el.value = ''; }
}";

#[async_trait]
impl PageDriver for ChromiumPage {
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<()> {
        let nav = async {
            self.page.goto(url).await.map_err(drv)?;
            self.page.wait_for_navigation().await.map_err(drv)?;
            Ok(())
        };
        match tokio::time::timeout(timeout, nav).await {
            Ok(result) => result.map_err(|e: Error| Error::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => Err(Error::Navigation {
                url: url.to_string(),
                reason: format!("timed out after {timeout:?}"),
            }),
        }
    }

    async fn wait_for_selector(
        &self,
        locator: &Locator,
        timeout: Duration,
        state: WaitState,
    ) -> Result<bool> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let found = match state {
                WaitState::Attached => self.page.find_element(&locator.css).await.is_ok(),
                WaitState::Visible => self
                    .evaluate(VISIBLE_CHECK, serde_json::Value::String(locator.css.clone()))
                    .await
                    .ok()
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false),
            };
            if found {
                return Ok(true);
            }
            if tokio::time::Instant::now() + SELECTOR_POLL_INTERVAL > deadline {
                return Ok(false);
            }
            tokio::time::sleep(SELECTOR_POLL_INTERVAL).await;
        }
    }

    async fn query_count(&self, locator: &Locator) -> Result<usize> {
        // chromiumoxide reports "no node" as an error; treat it as zero.
        match self.page.find_elements(&locator.css).await {
            Ok(elements) => Ok(elements.len()),
            Err(_) => Ok(0),
        }
    }

    async fn evaluate(&self, script: &str, arg: serde_json::Value) -> Result<serde_json::Value> {
        // `script` is an arrow function; apply it to the serialized argument.
        let expression = format!("({script})({arg})");
        let evaluation = self.page.evaluate(expression).await.map_err(drv)?;
        evaluation
            .into_value::<serde_json::Value>()
            .map_err(|e| Error::Driver(format!("evaluate result not JSON: {e}")))
    }

    async fn fill(&self, locator: &Locator, text: &str) -> Result<()> {
        self.evaluate(CLEAR_INPUT, serde_json::Value::String(locator.css.clone()))
            .await?;
        let element = self.page.find_element(&locator.css).await.map_err(drv)?;
        element.click().await.map_err(drv)?;
        element.type_str(text).await.map_err(drv)?;
        Ok(())
    }

    async fn type_char(&self, locator: &Locator, ch: char) -> Result<()> {
        let element = self.page.find_element(&locator.css).await.map_err(drv)?;
        element.type_str(ch.to_string()).await.map_err(drv)?;
        Ok(())
    }

    async fn click(&self, locator: &Locator) -> Result<()> {
        let element = self.page.find_element(&locator.css).await.map_err(drv)?;
        element.click().await.map_err(drv)?;
        Ok(())
    }

    async fn screenshot(&self, path: &Path) -> Result<()> {
        let params = ScreenshotParams::builder().full_page(true).build();
        let png = self.page.screenshot(params).await.map_err(drv)?;
        tokio::fs::write(path, &png)
            .await
            .map_err(|e| Error::Driver(format!("failed to write screenshot: {e}")))?;
        Ok(())
    }

    async fn current_url(&self) -> String {
        self.page
            .url()
            .await
            .ok()
            .flatten()
            .unwrap_or_default()
    }

    async fn content(&self) -> Result<String> {
        self.page.content().await.map_err(drv)
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.page.close().await.map_err(drv)
    }
}
