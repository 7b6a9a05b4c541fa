//! Bounded-concurrency batch execution with per-item failure isolation.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::warn;

/// Run one async operation per item under a concurrency cap.
///
/// A fixed courtesy delay runs after each permit is acquired and before the
/// operation starts, keeping request bursts gentle on the origin. One item's
/// failure never aborts its siblings: failed items are logged and excluded
/// from the result, which preserves input order for the successes.
pub async fn run_bounded<T, R, F, Fut>(
    items: Vec<T>,
    concurrency: usize,
    courtesy_delay: Duration,
    label: &str,
    op: F,
) -> Vec<R>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<R>> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let op = Arc::new(op);

    let handles: Vec<_> = items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            let semaphore = Arc::clone(&semaphore);
            let op = Arc::clone(&op);
            let label = label.to_string();
            tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("semaphore closed unexpectedly");
                if !courtesy_delay.is_zero() {
                    tokio::time::sleep(courtesy_delay).await;
                }
                match op(item).await {
                    Ok(value) => Some(value),
                    Err(e) => {
                        warn!(batch = %label, index, "batch item failed: {e:#}");
                        None
                    }
                }
            })
        })
        .collect();

    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        match handle.await {
            Ok(Some(value)) => results.push(value),
            Ok(None) => {}
            Err(e) => warn!(batch = %label, "batch task panicked: {e}"),
        }
    }
    results
}
