//! Retry-policy timing and invocation-count properties.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use discourse_digest::retry::{retry_with_backoff, DiagnosticSink, NoDiagnostics};

struct RecordingSink {
    labels: Mutex<Vec<String>>,
}

#[async_trait]
impl DiagnosticSink for RecordingSink {
    async fn capture(&self, label: &str) {
        self.labels.lock().unwrap().push(label.to_string());
    }
}

/// Fails `failures` times, then succeeds.
fn flaky_op(
    failures: usize,
) -> (
    Arc<AtomicUsize>,
    impl FnMut() -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<u32, String>> + Send>>,
) {
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_op = Arc::clone(&calls);
    let op = move || {
        let calls = Arc::clone(&calls_op);
        Box::pin(async move {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < failures {
                Err(format!("attempt {n} failed"))
            } else {
                Ok(42_u32)
            }
        }) as std::pin::Pin<Box<dyn std::future::Future<Output = Result<u32, String>> + Send>>
    };
    (calls, op)
}

#[tokio::test(start_paused = true)]
async fn test_succeeds_after_k_failures_with_k_plus_one_invocations() {
    let (calls, op) = flaky_op(2);
    let start = tokio::time::Instant::now();

    let result = retry_with_backoff(5, &NoDiagnostics, "flaky", op).await;

    assert_eq!(result, Ok(42));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    // Backoff sequence 1s + 2s between the three attempts.
    assert_eq!(start.elapsed().as_secs(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_exhaustion_returns_last_error() {
    let (calls, op) = flaky_op(10);
    let start = tokio::time::Instant::now();

    let result = retry_with_backoff(3, &NoDiagnostics, "always-failing", op).await;

    assert_eq!(result, Err("attempt 2 failed".to_string()));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    // Only the delays between attempts are paid: 1s + 2s.
    assert_eq!(start.elapsed().as_secs(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_first_try_success_takes_no_delay() {
    let (calls, op) = flaky_op(0);
    let start = tokio::time::Instant::now();

    let result = retry_with_backoff(3, &NoDiagnostics, "healthy", op).await;

    assert_eq!(result, Ok(42));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(start.elapsed().as_secs(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_diagnostic_captured_per_failed_attempt() {
    let sink = RecordingSink {
        labels: Mutex::new(Vec::new()),
    };
    let (_, op) = flaky_op(2);

    let result = retry_with_backoff(5, &sink, "login", op).await;
    assert_eq!(result, Ok(42));

    let labels = sink.labels.lock().unwrap();
    assert_eq!(*labels, vec!["login_attempt1", "login_attempt2"]);
}
