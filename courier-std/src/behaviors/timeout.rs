//! Timeout behavior for time-limited dispatch.

use courier_core::{Behavior, CourierError, Next, Payload, RequestContext};
use std::time::Duration;
use tokio::time::timeout;

/// A behavior that gives the rest of the pipeline a fixed time budget.
///
/// When the budget runs out the inner future is dropped, which unwinds
/// the handler and releases any resource scope it held, and the call fails
/// with [`CourierError::Timeout`].
#[derive(Debug, Clone, Copy)]
pub struct TimeoutBehavior {
    duration: Duration,
}

impl TimeoutBehavior {
    /// Create a new timeout behavior.
    pub const fn new(duration: Duration) -> Self {
        Self { duration }
    }

    /// Create a timeout behavior with a budget in seconds.
    pub const fn secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }

    /// Create a timeout behavior with a budget in milliseconds.
    pub const fn millis(millis: u64) -> Self {
        Self::new(Duration::from_millis(millis))
    }

    /// The time budget.
    pub fn duration(&self) -> Duration {
        self.duration
    }
}

impl Behavior for TimeoutBehavior {
    async fn handle(&self, cx: &RequestContext<'_>, next: Next<'_>) -> Result<Payload, CourierError> {
        match timeout(self.duration, next.run()).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    request = %cx.request_name(),
                    timeout_ms = self.duration.as_millis() as u64,
                    "request timed out"
                );
                Err(CourierError::Timeout(self.duration))
            }
        }
    }
}
