//! Adaptive exponential backoff for transient upstream failures.
//!
//! [`Backoff::execute`] runs an operation, classifies its failures, and
//! retries the transient ones (rate limiting, server-side errors) with
//! exponential backoff plus jitter. Authentication and other client-side
//! failures are never retried. Rate-limit responses additionally grow a
//! persistent adaptive base delay shared by every call on the same
//! executor, so sibling submissions in the same run start out more
//! conservatively once the upstream has pushed back.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{Result, UploadError};

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the initial try (default: 5).
    pub max_retries: u32,
    /// Initial adaptive base delay (default: 1 second).
    pub base_delay: Duration,
    /// Cap on any single computed delay (default: 30 seconds).
    pub max_delay: Duration,
    /// Shorter cap used for server-side (5xx) failures (default: 5 seconds).
    pub server_error_cap: Duration,
    /// Upper bound of the random jitter added to every delay (default: 1 second).
    pub jitter: Duration,
    /// Growth factor applied to the adaptive base on each rate-limit response
    /// (default: 1.5).
    pub adaptive_growth: f64,
    /// Cap on the adaptive base delay (default: 10 seconds).
    pub adaptive_cap: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            server_error_cap: Duration::from_secs(5),
            jitter: Duration::from_secs(1),
            adaptive_growth: 1.5,
            adaptive_cap: Duration::from_secs(10),
        }
    }
}

/// Determines whether an [`UploadError`] should be retried.
pub fn is_retryable(err: &UploadError) -> bool {
    match err {
        UploadError::RateLimited { .. } | UploadError::Server { .. } => true,
        UploadError::Http(e) => e.is_timeout() || e.is_connect(),
        UploadError::Auth(_)
        | UploadError::Translation(_)
        | UploadError::Request { .. }
        | UploadError::InvalidResponse(_)
        | UploadError::Json(_)
        | UploadError::BatchFailed { .. } => false,
    }
}

/// Calculate the delay for retry `attempt` (0-indexed): exponential growth
/// from `base`, capped at `cap`, plus random jitter of `0..=jitter`.
pub fn compute_delay(base: Duration, attempt: u32, cap: Duration, jitter: Duration) -> Duration {
    let exp = 2u64.saturating_pow(attempt);
    let raw_ms = (base.as_millis() as u64).saturating_mul(exp);
    let capped_ms = raw_ms.min(cap.as_millis() as u64);

    // Jitter seeded from the clock's sub-second nanos, as elsewhere in the
    // workspace: good enough to de-synchronize retry storms.
    let jitter_max_ms = jitter.as_millis() as u64;
    let jitter_ms = if jitter_max_ms > 0 {
        let seed = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .subsec_nanos() as u64;
        seed % (jitter_max_ms + 1)
    } else {
        0
    };

    Duration::from_millis(capped_ms.saturating_add(jitter_ms).min(cap.as_millis() as u64))
}

/// Executor that retries transient failures with adaptive exponential backoff.
pub struct Backoff {
    config: RetryConfig,
    /// Current adaptive base delay in milliseconds. Grown on rate limiting,
    /// never shrunk within a run.
    adaptive_base_ms: AtomicU64,
}

impl Backoff {
    /// Create an executor with the given configuration.
    pub fn new(config: RetryConfig) -> Self {
        let base_ms = config.base_delay.as_millis() as u64;
        Self {
            config,
            adaptive_base_ms: AtomicU64::new(base_ms),
        }
    }

    /// The current adaptive base delay.
    pub fn adaptive_base(&self) -> Duration {
        Duration::from_millis(self.adaptive_base_ms.load(Ordering::SeqCst))
    }

    /// Reset the adaptive base delay to the configured initial value.
    pub fn reset(&self) {
        self.adaptive_base_ms
            .store(self.config.base_delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Grow the adaptive base by the growth factor, up to the cap.
    fn grow_adaptive_base(&self) -> Duration {
        let cap_ms = self.config.adaptive_cap.as_millis() as u64;
        let mut current = self.adaptive_base_ms.load(Ordering::SeqCst);
        loop {
            let grown = ((current as f64 * self.config.adaptive_growth).ceil() as u64).min(cap_ms);
            match self.adaptive_base_ms.compare_exchange(
                current,
                grown,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return Duration::from_millis(grown),
                Err(actual) => current = actual,
            }
        }
    }

    /// Run `op`, retrying transient failures.
    ///
    /// Returns the first success, the first non-retryable error, or the
    /// last error once `max_retries` retries are spent.
    pub async fn execute<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut last_err = None;

        for attempt in 0..=self.config.max_retries {
            match op().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(attempt, "operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) => {
                    if !is_retryable(&err) || attempt == self.config.max_retries {
                        return Err(err);
                    }

                    let delay = match &err {
                        UploadError::RateLimited { retry_after_ms } => {
                            let base = self.grow_adaptive_base();
                            let computed =
                                compute_delay(base, attempt, self.config.max_delay, self.config.jitter);
                            // Server-suggested wait is a floor, not a ceiling.
                            let suggested =
                                Duration::from_millis(retry_after_ms.unwrap_or_default());
                            computed.max(suggested)
                        }
                        UploadError::Server { .. } => compute_delay(
                            self.adaptive_base(),
                            attempt,
                            self.config.server_error_cap,
                            self.config.jitter,
                        ),
                        _ => compute_delay(
                            self.adaptive_base(),
                            attempt,
                            self.config.max_delay,
                            self.config.jitter,
                        ),
                    };

                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying after transient error"
                    );

                    tokio::time::sleep(delay).await;
                    last_err = Some(err);
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| UploadError::InvalidResponse("retry loop exhausted".into())))
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicU32;

    fn fast_config() -> RetryConfig {
        RetryConfig {
            max_retries: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
            server_error_cap: Duration::from_millis(5),
            jitter: Duration::ZERO,
            adaptive_growth: 1.5,
            adaptive_cap: Duration::from_millis(8),
        }
    }

    fn counting_op(
        calls: Arc<AtomicU32>,
        fail_first: u32,
        err: impl Fn() -> UploadError + Clone + Send + 'static,
    ) -> impl Fn() -> futures::future::BoxFuture<'static, Result<&'static str>> {
        move || {
            let calls = calls.clone();
            let err = err.clone();
            Box::pin(async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < fail_first {
                    Err(err())
                } else {
                    Ok("uploaded")
                }
            })
        }
    }

    #[test]
    fn default_config() {
        let cfg = RetryConfig::default();
        assert_eq!(cfg.max_retries, 5);
        assert_eq!(cfg.base_delay, Duration::from_secs(1));
        assert_eq!(cfg.max_delay, Duration::from_secs(30));
        assert!((cfg.adaptive_growth - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn classification() {
        assert!(is_retryable(&UploadError::RateLimited {
            retry_after_ms: Some(100)
        }));
        assert!(is_retryable(&UploadError::Server {
            status: 503,
            message: "unavailable".into()
        }));
        assert!(!is_retryable(&UploadError::Auth(
            crate::error::AuthError::fatal("no")
        )));
        assert!(!is_retryable(&UploadError::Translation("boom".into())));
        assert!(!is_retryable(&UploadError::Request {
            status: 400,
            message: "bad".into()
        }));
    }

    #[test]
    fn compute_delay_is_exponential_and_capped() {
        let base = Duration::from_millis(100);
        let cap = Duration::from_secs(60);
        assert_eq!(compute_delay(base, 0, cap, Duration::ZERO).as_millis(), 100);
        assert_eq!(compute_delay(base, 1, cap, Duration::ZERO).as_millis(), 200);
        assert_eq!(compute_delay(base, 2, cap, Duration::ZERO).as_millis(), 400);

        let capped = compute_delay(Duration::from_secs(1), 9, Duration::from_secs(5), Duration::ZERO);
        assert_eq!(capped.as_secs(), 5);
    }

    #[test]
    fn jitter_is_bounded() {
        let base = Duration::from_millis(100);
        for _ in 0..20 {
            let d = compute_delay(base, 0, Duration::from_secs(30), Duration::from_millis(50));
            assert!(d.as_millis() >= 100);
            assert!(d.as_millis() <= 150);
        }
    }

    #[tokio::test]
    async fn success_on_first_try() {
        let calls = Arc::new(AtomicU32::new(0));
        let backoff = Backoff::new(fast_config());
        let out = backoff
            .execute(counting_op(calls.clone(), 0, || UploadError::Server {
                status: 500,
                message: String::new(),
            }))
            .await
            .unwrap();
        assert_eq!(out, "uploaded");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn transient_server_failures_are_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let backoff = Backoff::new(fast_config());
        let out = backoff
            .execute(counting_op(calls.clone(), 2, || UploadError::Server {
                status: 502,
                message: "bad gateway".into(),
            }))
            .await
            .unwrap();
        assert_eq!(out, "uploaded");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_rate_limit_exhausts_exactly_max_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let backoff = Backoff::new(fast_config());
        let err = backoff
            .execute(counting_op(calls.clone(), u32::MAX, || {
                UploadError::RateLimited {
                    retry_after_ms: Some(1),
                }
            }))
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::RateLimited { .. }));
        // Initial attempt plus max_retries retries.
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn server_suggested_wait_is_a_floor_on_the_computed_delay() {
        let mut config = fast_config();
        config.max_retries = 1;
        let backoff = Backoff::new(config);

        let calls = Arc::new(AtomicU32::new(0));
        let start = tokio::time::Instant::now();
        let err = backoff
            .execute(counting_op(calls.clone(), u32::MAX, || {
                UploadError::RateLimited {
                    retry_after_ms: Some(60_000),
                }
            }))
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::RateLimited { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // The exponential delay caps at 10ms here; the sleep before the
        // retry must still honor the server's 60-second hint.
        assert!(start.elapsed() >= Duration::from_millis(60_000));
    }

    #[tokio::test]
    async fn auth_failures_are_never_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let backoff = Backoff::new(fast_config());
        let err = backoff
            .execute(counting_op(calls.clone(), u32::MAX, || {
                UploadError::Auth(crate::error::AuthError::fatal("expired"))
            }))
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::Auth(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn client_request_failures_are_never_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let backoff = Backoff::new(fast_config());
        let err = backoff
            .execute(counting_op(calls.clone(), u32::MAX, || UploadError::Request {
                status: 422,
                message: "unprocessable".into(),
            }))
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::Request { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rate_limiting_grows_the_adaptive_base_up_to_the_cap() {
        let backoff = Backoff::new(fast_config());
        assert_eq!(backoff.adaptive_base(), Duration::from_millis(1));

        let calls = Arc::new(AtomicU32::new(0));
        let _ = backoff
            .execute(counting_op(calls, u32::MAX, || UploadError::RateLimited {
                retry_after_ms: None,
            }))
            .await;

        // Grown once per rate-limited retry, never past the cap.
        let grown = backoff.adaptive_base();
        assert!(grown > Duration::from_millis(1));
        assert!(grown <= Duration::from_millis(8));

        backoff.reset();
        assert_eq!(backoff.adaptive_base(), Duration::from_millis(1));
    }
}
