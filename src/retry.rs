//! Exponential-backoff retry used by every network-touching operation.

use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

/// Receives a diagnostic artifact after each failed attempt. In production
/// this is a page screenshot; tests substitute a recorder.
#[async_trait]
pub trait DiagnosticSink: Send + Sync {
    async fn capture(&self, label: &str);
}

/// Sink that drops diagnostics.
pub struct NoDiagnostics;

#[async_trait]
impl DiagnosticSink for NoDiagnostics {
    async fn capture(&self, _label: &str) {}
}

/// Run `op` up to `max_attempts` times with exponential backoff between
/// attempts (2^attempt seconds, attempt 0-indexed: 1s, 2s, 4s, ...).
///
/// A diagnostic is captured after every failed attempt. The last error is
/// returned once attempts are exhausted.
///
/// # Errors
///
/// Returns the final attempt's error when all attempts fail.
pub async fn retry_with_backoff<T, E, F, Fut>(
    max_attempts: u32,
    diagnostics: &dyn DiagnosticSink,
    op_name: &str,
    mut op: F,
) -> Result<T, E>
where
    E: std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    debug_assert!(max_attempts > 0);
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                warn!(
                    op = op_name,
                    attempt = attempt + 1,
                    max_attempts,
                    "operation failed: {e}"
                );
                diagnostics
                    .capture(&format!("{op_name}_attempt{}", attempt + 1))
                    .await;
                if attempt + 1 >= max_attempts {
                    return Err(e);
                }
                tokio::time::sleep(backoff_delay(attempt)).await;
                attempt += 1;
            }
        }
    }
}

fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(2_u64.saturating_pow(attempt))
}
