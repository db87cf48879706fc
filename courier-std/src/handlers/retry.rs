//! Retry decorator for handlers.

use courier_core::{CourierError, Handler, Request};
use std::{fmt, sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;

type Classifier = Arc<dyn Fn(&CourierError) -> bool + Send + Sync>;

/// When and how often [`Retry`] re-invokes a handler.
///
/// Configuration, validation, resolution and cancellation errors are never
/// retried, whatever the classifier says.
#[derive(Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Duration,
    is_transient: Classifier,
}

impl RetryPolicy {
    /// Allow up to `max_attempts` invocations in total.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Delay before the first retry; doubled for every further retry.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Only retry errors accepted by `classifier`.
    pub fn retry_if<F>(mut self, classifier: F) -> Self
    where
        F: Fn(&CourierError) -> bool + Send + Sync + 'static,
    {
        self.is_transient = Arc::new(classifier);
        self
    }

    /// The maximum number of invocations.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns `true` if `err` is worth another attempt.
    pub fn is_transient(&self, err: &CourierError) -> bool {
        !err.is_permanent() && (self.is_transient)(err)
    }

    /// The delay before attempt `attempt + 1`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.backoff.saturating_mul(factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(100),
            is_transient: Arc::new(|_| true),
        }
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}

/// A handler that re-invokes its inner handler on transient failures.
///
/// Retrying happens around the handler rather than in the pipeline, so
/// behaviors still observe exactly one call.
///
/// # Example
///
/// ```rust,ignore
/// let handler = Retry::new(FetchQuoteHandler::new(client))
///     .with_policy(RetryPolicy::new(5).with_backoff(Duration::from_millis(50)));
/// builder.register_handler_instance::<FetchQuote, _>(handler)?;
/// ```
#[derive(Debug, Clone)]
pub struct Retry<H> {
    inner: H,
    policy: RetryPolicy,
}

impl<H> Retry<H> {
    /// Wrap `inner` with the default policy.
    pub fn new(inner: H) -> Self {
        Self {
            inner,
            policy: RetryPolicy::default(),
        }
    }

    /// Replace the policy.
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The wrapped handler.
    pub fn inner(&self) -> &H {
        &self.inner
    }
}

impl<R, H> Handler<R> for Retry<H>
where
    R: Request,
    H: Handler<R>,
{
    async fn handle(&self, request: &R, cancel: &CancellationToken) -> Result<R::Response, CourierError> {
        let mut attempt = 1;
        loop {
            let err = match self.inner.handle(request, cancel).await {
                Ok(response) => return Ok(response),
                Err(err) => err,
            };
            if attempt >= self.policy.max_attempts || !self.policy.is_transient(&err) {
                return Err(err);
            }

            let delay = self.policy.delay_after(attempt);
            tracing::warn!(
                request = %std::any::type_name::<R>(),
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "handler failed; retrying"
            );
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(CourierError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::{ValidationError, ValidationFailure};
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Fetch;

    impl Request for Fetch {
        type Response = &'static str;
    }

    struct Flaky {
        calls: AtomicU32,
        failures: u32,
    }

    impl Flaky {
        fn new(failures: u32) -> Self {
            Self {
                calls: AtomicU32::new(0),
                failures,
            }
        }
    }

    impl Handler<Fetch> for Flaky {
        async fn handle(&self, _request: &Fetch, _cancel: &CancellationToken) -> Result<&'static str, CourierError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures {
                Err(CourierError::msg("connection reset"))
            } else {
                Ok("ok")
            }
        }
    }

    struct Invalid {
        calls: AtomicU32,
    }

    impl Handler<Fetch> for Invalid {
        async fn handle(&self, _request: &Fetch, _cancel: &CancellationToken) -> Result<&'static str, CourierError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(ValidationError::new(vec![ValidationFailure::new("id", "unknown")]).into())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_are_retried() {
        let retry = Retry::new(Flaky::new(2));
        let cancel = CancellationToken::new();

        let response = retry.handle(&Fetch, &cancel).await.unwrap();
        assert_eq!(response, "ok");
        assert_eq!(retry.inner().calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempts_are_bounded() {
        let retry = Retry::new(Flaky::new(10)).with_policy(RetryPolicy::new(2));
        let cancel = CancellationToken::new();

        let err = retry.handle(&Fetch, &cancel).await.unwrap_err();
        assert_eq!(err.to_string(), "connection reset");
        assert_eq!(retry.inner().calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_permanent_errors_are_not_retried() {
        let retry = Retry::new(Invalid {
            calls: AtomicU32::new(0),
        });
        let cancel = CancellationToken::new();

        let err = retry.handle(&Fetch, &cancel).await.unwrap_err();
        assert!(err.validation().is_some());
        assert_eq!(retry.inner().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancellation_stops_backoff() {
        let retry = Retry::new(Flaky::new(10)).with_policy(RetryPolicy::new(5).with_backoff(Duration::from_secs(3600)));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = retry.handle(&Fetch, &cancel).await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(retry.inner().calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::new(4).with_backoff(Duration::from_millis(10));
        assert_eq!(policy.delay_after(1), Duration::from_millis(10));
        assert_eq!(policy.delay_after(2), Duration::from_millis(20));
        assert_eq!(policy.delay_after(3), Duration::from_millis(40));
    }
}
