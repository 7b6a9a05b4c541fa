//! Discourse adapter.
//!
//! Selector chains are data: when a Discourse version moves its markup, a new
//! candidate is appended here and no control flow changes.

mod detail;
mod humanize;
mod list;
mod login;

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use tracing::debug;

use crate::browser::{Locator, PageDriver, SelectorResolver};
use crate::error::Result;
use crate::model::{Topic, TopicContent};
use crate::retry::DiagnosticSink;
use crate::site::{ForumSite, ListKind};

pub use humanize::Humanizer;

/// Render settle time after a navigation, before the DOM is inspected.
const RENDER_DELAY: Duration = Duration::from_secs(2);

/// Timeout for the per-indicator waits in the authentication probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

fn chain(selectors: &[&str]) -> Vec<Locator> {
    selectors.iter().map(|s| Locator::css(*s)).collect()
}

/// Sign-in affordances across Discourse versions/themes.
static SIGN_IN_BUTTONS: Lazy<Vec<Locator>> = Lazy::new(|| {
    chain(&[
        "button.login-button",
        ".login-button",
        "header .auth-buttons .btn-primary",
        "button[class*='login']",
    ])
});

static USERNAME_INPUTS: Lazy<Vec<Locator>> = Lazy::new(|| {
    chain(&[
        "#login-account-name",
        "input[name='login']",
        "input[autocomplete='username']",
        "input.username",
    ])
});

static PASSWORD_INPUTS: Lazy<Vec<Locator>> = Lazy::new(|| {
    chain(&[
        "#login-account-password",
        "input[name='password']",
        "input[type='password']",
        "input.password",
    ])
});

static SUBMIT_BUTTONS: Lazy<Vec<Locator>> = Lazy::new(|| {
    chain(&[
        "#login-button",
        ".login-modal button.btn-primary",
        ".d-modal__footer .btn-primary",
        "button[type='submit']",
    ])
});

/// Markers that only render for an authenticated user.
static AUTH_INDICATORS: Lazy<Vec<Locator>> = Lazy::new(|| {
    chain(&[
        ".current-user",
        ".header-dropdown-toggle.current-user",
        "#current-user",
        ".user-menu",
    ])
});

/// Anti-bot interstitial markers (Cloudflare-style managed challenges).
static CHALLENGE_MARKERS: Lazy<Vec<Locator>> = Lazy::new(|| {
    chain(&[
        "#challenge-running",
        "#challenge-stage",
        "#cf-challenge-running",
        ".cf-browser-verification",
    ])
});

/// Text fallbacks for challenge pages that render no stable ids.
const CHALLENGE_TEXT_MARKERS: &[&str] = &[
    "Checking your browser",
    "Verifying you are human",
    "Just a moment",
];

/// Conventional login paths tried when no sign-in affordance is found.
const LOGIN_PATHS: &[&str] = &["/login", "/signin", "/session/new", "/auth/login"];

const NOT_FOUND_MARKERS: &[&str] = &["Page Not Found", "page-not-found", "Oops! That page"];

static LOGIN_BUTTON_PROBE: Lazy<Locator> = Lazy::new(|| Locator::css("button.login-button, .login-button"));

static TOPIC_ROWS: Lazy<Locator> = Lazy::new(|| Locator::css(".topic-list-item, [data-topic-id]"));

/// Scroll-to-load behavior for list pages.
#[derive(Debug, Clone)]
pub struct ScrollOptions {
    pub enabled: bool,
    pub times: u32,
    pub interval: Duration,
}

impl Default for ScrollOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            times: 3,
            interval: Duration::from_millis(1500),
        }
    }
}

/// One account's view of one Discourse forum.
pub struct DiscourseSite {
    base_url: String,
    username: String,
    password: String,
    resolver: SelectorResolver,
    humanizer: Humanizer,
    page_timeout: Duration,
    challenge_timeout: Duration,
    scroll: ScrollOptions,
    detail_max_retries: u32,
    screenshot_dir: Option<PathBuf>,
}

impl DiscourseSite {
    #[must_use]
    pub fn new(
        base_url: &str,
        username: &str,
        password: &str,
        humanizer: Humanizer,
        page_timeout: Duration,
        challenge_timeout: Duration,
        scroll: ScrollOptions,
        detail_max_retries: u32,
        screenshot_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            username: username.to_string(),
            password: password.to_string(),
            resolver: SelectorResolver::default(),
            humanizer,
            page_timeout,
            challenge_timeout,
            scroll,
            detail_max_retries,
            screenshot_dir,
        }
    }

    /// Best-effort debug screenshot, named after the failure point.
    async fn snap(&self, page: &dyn PageDriver, label: &str) {
        let Some(ref dir) = self.screenshot_dir else {
            return;
        };
        let path = dir.join(format!("discourse_{}_{label}.png", self.username));
        if let Err(e) = page.screenshot(&path).await {
            debug!(label, "screenshot failed: {e}");
        } else {
            debug!(path = %path.display(), "screenshot saved");
        }
    }
}

#[async_trait]
impl ForumSite for DiscourseSite {
    fn site_name(&self) -> &str {
        "discourse"
    }

    fn username(&self) -> &str {
        &self.username
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn is_logged_in(&self, page: &dyn PageDriver) -> Result<bool> {
        login::probe_logged_in(self, page).await
    }

    async fn login(&self, page: &dyn PageDriver) -> Result<()> {
        login::run_login(self, page).await
    }

    async fn fetch_list(
        &self,
        page: &dyn PageDriver,
        kind: &ListKind,
        limit: usize,
    ) -> Result<Vec<Topic>> {
        list::fetch_list(self, page, kind, limit).await
    }

    async fn fetch_detail(&self, page: &dyn PageDriver, link: &str) -> Result<TopicContent> {
        detail::fetch_detail(self, page, link).await
    }
}

/// Screenshot-producing diagnostic sink bound to one page, used by the
/// retry policy wrapping login and harvest.
pub struct PageScreenshots<'a> {
    site: &'a DiscourseSite,
    page: &'a dyn PageDriver,
}

impl<'a> PageScreenshots<'a> {
    #[must_use]
    pub fn new(site: &'a DiscourseSite, page: &'a dyn PageDriver) -> Self {
        Self { site, page }
    }
}

#[async_trait]
impl DiagnosticSink for PageScreenshots<'_> {
    async fn capture(&self, label: &str) {
        self.site.snap(self.page, label).await;
    }
}
