//! Retry and per-host spacing for outbound requests.
//!
//! Transient failures (timeouts, connection errors, 429 and 5xx responses)
//! are retried a bounded number of times with a fixed delay. Everything
//! else propagates on the first attempt.

use std::future::Future;
use std::time::Duration;

use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};

use crate::error::ScraperError;

/// Returns `true` if `err` represents a transient condition that should be
/// retried after a backoff delay.
///
/// Retriable errors:
/// - [`ScraperError::Timeout`] and [`ScraperError::Network`]
/// - [`ScraperError::HttpStatus`] with 429 or any 5xx status
///
/// Everything else, including 404 and decode failures, would return the same
/// result on a second try.
pub(crate) fn is_retriable(err: &ScraperError) -> bool {
    match err {
        ScraperError::Timeout { .. } | ScraperError::Network { .. } => true,
        ScraperError::HttpStatus { status, .. } => *status == 429 || (500..600).contains(status),
        _ => false,
    }
}

/// Executes `operation`, retrying transient errors after a fixed `backoff`.
///
/// With `max_retries = 2` the operation is attempted at most 3 times. The
/// last error is returned once retries are exhausted; non-retriable errors
/// are returned immediately without sleeping.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff: Duration,
    mut operation: F,
) -> Result<T, ScraperError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ScraperError>>,
{
    let mut attempt = 0u32;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retriable(&err) || attempt >= max_retries {
                    return Err(err);
                }
                tracing::warn!(
                    attempt,
                    max_retries,
                    delay_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "transient fetch error, retrying after backoff"
                );
            }
        }

        tokio::time::sleep(backoff).await;
        attempt += 1;
    }
}

/// Enforces a minimum spacing between two requests to the same host.
///
/// Hosts are tracked independently, so a slow origin never delays requests
/// to an unrelated one. A zero spacing disables throttling.
pub struct HostThrottle {
    limiter: Option<DefaultKeyedRateLimiter<String>>,
}

impl HostThrottle {
    #[must_use]
    pub fn new(spacing: Duration) -> Self {
        Self {
            limiter: Quota::with_period(spacing).map(RateLimiter::keyed),
        }
    }

    /// Waits until `host` may receive another request.
    pub async fn wait(&self, host: &str) {
        if let Some(limiter) = &self.limiter {
            limiter.until_key_ready(&host.to_ascii_lowercase()).await;
        }
    }
}

impl std::fmt::Debug for HostThrottle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostThrottle")
            .field("enabled", &self.limiter.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Instant;

    fn server_error(status: u16) -> ScraperError {
        ScraperError::HttpStatus {
            status,
            url: "https://acme.example/logo.png".to_owned(),
        }
    }

    #[test]
    fn classifies_transient_statuses() {
        assert!(is_retriable(&server_error(429)));
        assert!(is_retriable(&server_error(503)));
        assert!(!is_retriable(&server_error(404)));
        assert!(!is_retriable(&server_error(403)));
        assert!(is_retriable(&ScraperError::Timeout {
            url: "https://acme.example".to_owned()
        }));
        assert!(!is_retriable(&ScraperError::Decode {
            url: "https://acme.example/logo.png".to_owned(),
            reason: "truncated".to_owned(),
        }));
    }

    #[tokio::test]
    async fn succeeds_immediately_on_first_try() {
        let call_count = Arc::new(AtomicU32::new(0));
        let cc = Arc::clone(&call_count);
        let result = retry_with_backoff(3, Duration::ZERO, || {
            let cc = Arc::clone(&cc);
            async move {
                cc.fetch_add(1, Ordering::SeqCst);
                Ok::<u32, ScraperError>(42)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_server_errors_then_succeeds() {
        let call_count = Arc::new(AtomicU32::new(0));
        let cc = Arc::clone(&call_count);
        let result = retry_with_backoff(2, Duration::ZERO, || {
            let cc = Arc::clone(&cc);
            async move {
                let n = cc.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(server_error(502))
                } else {
                    Ok::<u32, ScraperError>(7)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(call_count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn propagates_last_error_after_exhausting_retries() {
        let call_count = Arc::new(AtomicU32::new(0));
        let cc = Arc::clone(&call_count);
        let result = retry_with_backoff(2, Duration::ZERO, || {
            let cc = Arc::clone(&cc);
            async move {
                cc.fetch_add(1, Ordering::SeqCst);
                Err::<u32, ScraperError>(server_error(429))
            }
        })
        .await;
        assert_eq!(call_count.load(Ordering::SeqCst), 3);
        assert!(matches!(
            result,
            Err(ScraperError::HttpStatus { status: 429, .. })
        ));
    }

    #[tokio::test]
    async fn does_not_retry_not_found() {
        let call_count = Arc::new(AtomicU32::new(0));
        let cc = Arc::clone(&call_count);
        let result = retry_with_backoff(3, Duration::ZERO, || {
            let cc = Arc::clone(&cc);
            async move {
                cc.fetch_add(1, Ordering::SeqCst);
                Err::<u32, ScraperError>(server_error(404))
            }
        })
        .await;
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
        assert!(matches!(
            result,
            Err(ScraperError::HttpStatus { status: 404, .. })
        ));
    }

    #[tokio::test]
    async fn throttle_spaces_requests_to_the_same_host() {
        let throttle = HostThrottle::new(Duration::from_millis(120));
        let started = Instant::now();
        throttle.wait("acme.example").await;
        throttle.wait("ACME.example").await;
        assert!(started.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn throttle_does_not_couple_unrelated_hosts() {
        let throttle = HostThrottle::new(Duration::from_secs(5));
        let started = Instant::now();
        throttle.wait("acme.example").await;
        throttle.wait("other.example").await;
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn zero_spacing_disables_throttle() {
        let throttle = HostThrottle::new(Duration::ZERO);
        let started = Instant::now();
        for _ in 0..5 {
            throttle.wait("acme.example").await;
        }
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
