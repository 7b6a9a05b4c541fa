//! Capability seams for the headless browser.
//!
//! The pipeline never talks to a browser implementation directly; everything
//! goes through [`PageDriver`] (one page) and [`BrowserSession`] (a page
//! factory). Tests substitute scripted in-memory drivers, production uses the
//! chromiumoxide-backed implementation in [`chromium`].

pub mod chromium;
pub mod selector;

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

pub use selector::SelectorResolver;

/// A typed DOM locator candidate. Candidates are data, not control flow: new
/// site-markup variants are supported by appending to a chain, never by
/// touching the resolution logic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    pub css: String,
}

impl Locator {
    #[must_use]
    pub fn css(css: impl Into<String>) -> Self {
        Self { css: css.into() }
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.css)
    }
}

/// What "found" means when waiting for a selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitState {
    /// Present in the DOM.
    Attached,
    /// Present and rendered.
    Visible,
}

/// One borrowed browser page.
///
/// Every method is a suspension point. A page must be released with
/// [`PageDriver::close`] on every exit path, success or failure.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate and wait for the DOM to be ready, up to `timeout`.
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<()>;

    /// Wait up to `timeout` for `locator` to reach `state`. `Ok(false)` means
    /// the wait elapsed without a match; errors are reserved for driver
    /// failures.
    async fn wait_for_selector(
        &self,
        locator: &Locator,
        timeout: Duration,
        state: WaitState,
    ) -> Result<bool>;

    /// Number of elements currently matching `locator`.
    async fn query_count(&self, locator: &Locator) -> Result<usize>;

    /// Evaluate a JS function body against the page. `arg` is passed as the
    /// function's single argument; the completion value is returned as JSON.
    async fn evaluate(&self, script: &str, arg: serde_json::Value) -> Result<serde_json::Value>;

    /// Replace the value of the input matching `locator`.
    async fn fill(&self, locator: &Locator, text: &str) -> Result<()>;

    /// Type a single character into the input matching `locator`.
    async fn type_char(&self, locator: &Locator, ch: char) -> Result<()>;

    async fn click(&self, locator: &Locator) -> Result<()>;

    async fn screenshot(&self, path: &Path) -> Result<()>;

    async fn current_url(&self) -> String;

    /// Full page HTML.
    async fn content(&self) -> Result<String>;

    async fn close(self: Box<Self>) -> Result<()>;
}

/// Page factory. Each bounded-parallel operation borrows its own exclusive
/// page; pages are never shared across concurrent operations.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn new_page(&self) -> Result<Box<dyn PageDriver>>;

    /// Release the underlying browser. Idempotent.
    async fn shutdown(&self);
}
