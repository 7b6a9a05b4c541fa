//! Ordered-candidate selector resolution.
//!
//! Discourse themes move their markup around between versions; every DOM
//! interaction therefore goes through an ordered chain of locator candidates.
//! The first candidate that appears within its per-candidate timeout wins.
//! Individual misses are expected and never surface as errors; only an
//! exhausted chain does.

use std::time::Duration;

use tracing::{debug, trace};

use crate::browser::{Locator, PageDriver, WaitState};
use crate::error::{Error, Result};

/// Default per-candidate wait. Deliberately much shorter than the page
/// timeout so a long chain still resolves quickly.
pub const DEFAULT_CANDIDATE_TIMEOUT: Duration = Duration::from_secs(5);

pub struct SelectorResolver {
    candidate_timeout: Duration,
}

impl Default for SelectorResolver {
    fn default() -> Self {
        Self {
            candidate_timeout: DEFAULT_CANDIDATE_TIMEOUT,
        }
    }
}

impl SelectorResolver {
    #[must_use]
    pub fn new(candidate_timeout: Duration) -> Self {
        Self { candidate_timeout }
    }

    /// Try each candidate in order and return the first that reaches `state`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SelectorExhausted`] when no candidate matched.
    pub async fn resolve(
        &self,
        page: &dyn PageDriver,
        target: &str,
        candidates: &[Locator],
        state: WaitState,
    ) -> Result<Locator> {
        for candidate in candidates {
            match page
                .wait_for_selector(candidate, self.candidate_timeout, state)
                .await
            {
                Ok(true) => {
                    debug!(target = %target, selector = %candidate, "selector resolved");
                    return Ok(candidate.clone());
                }
                Ok(false) => {
                    trace!(target = %target, selector = %candidate, "selector miss");
                }
                Err(e) => {
                    // A driver hiccup on one candidate must not kill the chain.
                    trace!(target = %target, selector = %candidate, error = %e, "selector wait error");
                }
            }
        }
        Err(Error::SelectorExhausted {
            target: target.to_string(),
            tried: candidates.len(),
        })
    }
}
