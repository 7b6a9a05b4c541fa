//! Human-likeness shims for page interactions.
//!
//! Purely cosmetic: randomized pauses before actions and per-character typing
//! for credential fields. Never correctness-affecting and fully toggleable;
//! a disabled humanizer degrades every call to the plain driver operation.

use std::time::Duration;

use rand::Rng;

use crate::browser::{Locator, PageDriver};
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct Humanizer {
    enabled: bool,
    action_delay_ms: (u64, u64),
    char_jitter_ms: (u64, u64),
}

impl Humanizer {
    #[must_use]
    pub fn new(action_delay_ms: (u64, u64), char_jitter_ms: (u64, u64)) -> Self {
        Self {
            enabled: true,
            action_delay_ms,
            char_jitter_ms,
        }
    }

    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            action_delay_ms: (0, 0),
            char_jitter_ms: (0, 0),
        }
    }

    /// Random pre-action pause within the configured range.
    pub async fn pause(&self) {
        if let Some(delay) = self.sample(self.action_delay_ms) {
            tokio::time::sleep(delay).await;
        }
    }

    pub async fn click(&self, page: &dyn PageDriver, locator: &Locator) -> Result<()> {
        self.pause().await;
        page.click(locator).await
    }

    pub async fn fill(&self, page: &dyn PageDriver, locator: &Locator, text: &str) -> Result<()> {
        self.pause().await;
        page.fill(locator, text).await
    }

    /// Fill a credential field character-by-character with per-character
    /// jitter. Falls back to a plain fill when disabled.
    pub async fn type_credential(
        &self,
        page: &dyn PageDriver,
        locator: &Locator,
        text: &str,
    ) -> Result<()> {
        if !self.enabled {
            return page.fill(locator, text).await;
        }
        self.pause().await;
        for ch in text.chars() {
            page.type_char(locator, ch).await?;
            if let Some(jitter) = self.sample(self.char_jitter_ms) {
                tokio::time::sleep(jitter).await;
            }
        }
        Ok(())
    }

    fn sample(&self, (min, max): (u64, u64)) -> Option<Duration> {
        if !self.enabled || max == 0 {
            return None;
        }
        // ThreadRng is not Send; sample before any await point.
        let ms = rand::thread_rng().gen_range(min..=max);
        (ms > 0).then(|| Duration::from_millis(ms))
    }
}
