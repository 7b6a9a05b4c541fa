//! Failure taxonomy for the acquisition pipeline.
//!
//! Failures local to one topic (detail fetch, AI call) never abort the batch;
//! failures local to one account never abort other accounts. Only a failed
//! login or an exhausted top-level retry surfaces as an account-level failure.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// No locator candidate matched. Recoverable when a fallback path exists,
    /// fatal when the target is a credential field or submit control.
    #[error("no selector matched for {target} ({tried} candidates tried)")]
    SelectorExhausted { target: String, tried: usize },

    /// The anti-bot interstitial did not clear in time. Soft: callers log and
    /// continue, letting the verification step decide.
    #[error("anti-bot challenge still present after {0:?}")]
    ChallengeTimeout(Duration),

    #[error("login failed: {0}")]
    LoginFailed(String),

    /// Detail extraction produced no text after all retries. Tolerated as an
    /// empty result by the caller.
    #[error("extraction empty after {attempts} attempts for {link}")]
    ExtractionEmpty { link: String, attempts: u32 },

    #[error("AI completion unavailable: {0}")]
    AiUnavailable(String),

    #[error("unparseable AI response: {0}")]
    AiParse(String),

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("browser driver error: {0}")]
    Driver(String),

    #[error("cache I/O: {0}")]
    CacheIo(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether the error is worth feeding back into a retry policy, as
    /// opposed to failing fast.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Navigation { .. } | Self::Driver(_) | Self::ExtractionEmpty { .. }
        )
    }
}
