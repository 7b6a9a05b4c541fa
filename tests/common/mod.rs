//! Shared scripted fakes for integration tests: an in-memory page driver,
//! a session handing out pages over the same scripted forum, and a counting
//! completion client.
#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use discourse_digest::browser::{BrowserSession, Locator, PageDriver, WaitState};
use discourse_digest::error::{Error, Result};

/// Scripted forum state shared by every page of a [`MockSession`].
#[derive(Default)]
pub struct MockForum {
    /// Rows returned by the list-extraction script, keyed by URL substring
    /// (e.g. "/latest" or "/top").
    pub list_rows: Mutex<HashMap<String, serde_json::Value>>,
    /// First-post HTML keyed by topic link.
    pub details: Mutex<HashMap<String, String>>,
    /// CSS selectors that currently exist on any page.
    pub selectors_present: Mutex<Vec<String>>,
    /// Authentication state; flips to true when the login submit is clicked.
    pub logged_in: AtomicBool,
    /// Recorded `fill`/`type_char` targets and accumulated values.
    pub fills: Mutex<Vec<(String, String)>>,
    /// Recorded clicked selectors.
    pub clicks: Mutex<Vec<String>>,
    /// Recorded navigations.
    pub navigations: Mutex<Vec<String>>,
}

const AUTH_INDICATOR_MARKERS: &[&str] = &[".current-user", "#current-user", ".user-menu"];

impl MockForum {
    pub fn logged_in_forum() -> Arc<Self> {
        let forum = Arc::new(Self::default());
        forum.logged_in.store(true, Ordering::SeqCst);
        forum
    }

    pub fn set_list(&self, url_fragment: &str, rows: serde_json::Value) {
        self.list_rows
            .lock()
            .unwrap()
            .insert(url_fragment.to_string(), rows);
    }

    pub fn set_detail(&self, link: &str, html: &str) {
        self.details
            .lock()
            .unwrap()
            .insert(link.to_string(), html.to_string());
    }

    pub fn add_selector(&self, css: &str) {
        self.selectors_present.lock().unwrap().push(css.to_string());
    }

    fn is_auth_indicator(css: &str) -> bool {
        AUTH_INDICATOR_MARKERS.iter().any(|m| css.contains(m))
    }
}

pub struct MockPage {
    forum: Arc<MockForum>,
    url: Mutex<String>,
}

#[async_trait]
impl PageDriver for MockPage {
    async fn navigate(&self, url: &str, _timeout: Duration) -> Result<()> {
        *self.url.lock().unwrap() = url.to_string();
        self.forum.navigations.lock().unwrap().push(url.to_string());
        Ok(())
    }

    async fn wait_for_selector(
        &self,
        locator: &Locator,
        _timeout: Duration,
        _state: WaitState,
    ) -> Result<bool> {
        if MockForum::is_auth_indicator(&locator.css) {
            return Ok(self.forum.logged_in.load(Ordering::SeqCst));
        }
        Ok(self
            .forum
            .selectors_present
            .lock()
            .unwrap()
            .iter()
            .any(|s| s == &locator.css))
    }

    async fn query_count(&self, locator: &Locator) -> Result<usize> {
        if locator.css.contains(".login-button") {
            // The login button renders only for unauthenticated visitors.
            return Ok(usize::from(!self.forum.logged_in.load(Ordering::SeqCst)));
        }
        if MockForum::is_auth_indicator(&locator.css) {
            return Ok(usize::from(self.forum.logged_in.load(Ordering::SeqCst)));
        }
        Ok(usize::from(
            self.forum
                .selectors_present
                .lock()
                .unwrap()
                .iter()
                .any(|s| s == &locator.css),
        ))
    }

    async fn evaluate(&self, script: &str, _arg: serde_json::Value) -> Result<serde_json::Value> {
        let url = self.url.lock().unwrap().clone();

        if script.contains("scrollTo") {
            return Ok(serde_json::Value::Null);
        }
        if script.contains(".topic-list-item") {
            let rows = self.forum.list_rows.lock().unwrap();
            for (fragment, value) in rows.iter() {
                if url.contains(fragment) {
                    return Ok(value.clone());
                }
            }
            return Ok(serde_json::json!([]));
        }
        if script.contains(".cooked") {
            let details = self.forum.details.lock().unwrap();
            for (link, html) in details.iter() {
                if url.contains(link) {
                    return Ok(serde_json::Value::String(html.clone()));
                }
            }
            return Ok(serde_json::Value::String(String::new()));
        }
        Ok(serde_json::Value::Null)
    }

    async fn fill(&self, locator: &Locator, text: &str) -> Result<()> {
        self.forum
            .fills
            .lock()
            .unwrap()
            .push((locator.css.clone(), text.to_string()));
        Ok(())
    }

    async fn type_char(&self, locator: &Locator, ch: char) -> Result<()> {
        let mut fills = self.forum.fills.lock().unwrap();
        match fills.last_mut() {
            Some((css, value)) if css == &locator.css => value.push(ch),
            _ => fills.push((locator.css.clone(), ch.to_string())),
        }
        Ok(())
    }

    async fn click(&self, locator: &Locator) -> Result<()> {
        self.forum.clicks.lock().unwrap().push(locator.css.clone());
        if locator.css.contains("#login-button") {
            self.forum.logged_in.store(true, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn screenshot(&self, _path: &Path) -> Result<()> {
        Ok(())
    }

    async fn current_url(&self) -> String {
        self.url.lock().unwrap().clone()
    }

    async fn content(&self) -> Result<String> {
        if self.forum.logged_in.load(Ordering::SeqCst) {
            Ok("<html><div class=\"current-user\"></div></html>".to_string())
        } else {
            Ok("<html><button class=\"login-button\">Log In</button></html>".to_string())
        }
    }

    async fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

/// Session whose pages all observe the same scripted forum.
pub struct MockSession {
    pub forum: Arc<MockForum>,
}

#[async_trait]
impl BrowserSession for MockSession {
    async fn new_page(&self) -> Result<Box<dyn PageDriver>> {
        Ok(Box::new(MockPage {
            forum: Arc::clone(&self.forum),
            url: Mutex::new(String::new()),
        }))
    }

    async fn shutdown(&self) {}
}

/// Completion client that counts calls and replays a fixed script.
pub struct ScriptedCompletion {
    pub calls: AtomicUsize,
    pub response: Mutex<Option<String>>,
}

impl ScriptedCompletion {
    pub fn always_failing() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            response: Mutex::new(None),
        }
    }

    pub fn with_response(response: &str) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            response: Mutex::new(Some(response.to_string())),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl discourse_digest::ai::CompletionClient for ScriptedCompletion {
    async fn complete(
        &self,
        _system_prompt: &str,
        _user_prompt: &str,
        _temperature: f32,
        _max_tokens: u32,
    ) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.response
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| Error::AiUnavailable("scripted failure".to_string()))
    }
}
