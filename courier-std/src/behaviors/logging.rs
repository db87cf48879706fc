//! Logging behaviors - observability for dispatch.

use courier_core::{
    Behavior, CourierError, Next, Payload, PayloadStream, RequestContext, StreamBehavior,
    StreamNext,
};
use futures::StreamExt;
use std::time::Instant;
use tracing::Instrument;

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

/// A behavior that records the start, outcome and duration of every call.
///
/// Each call runs inside an `info` span carrying the pipeline name and the
/// request type. Errors are recorded and returned unchanged.
///
/// # Example
///
/// ```rust,ignore
/// // Create a logging behavior with default settings
/// let logging = LoggingBehavior::new();
///
/// // Or with a custom name
/// let logging = LoggingBehavior::named("commands");
///
/// builder.register_behavior_instance(logging);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct LoggingBehavior {
    name: &'static str,
}

impl LoggingBehavior {
    /// Create a new `LoggingBehavior` with a default name.
    pub const fn new() -> Self {
        Self { name: "dispatch" }
    }

    /// Create a new `LoggingBehavior` with a custom name.
    ///
    /// The name is attached to the span to identify the pipeline.
    pub const fn named(name: &'static str) -> Self {
        Self { name }
    }

    /// The pipeline name.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl Default for LoggingBehavior {
    fn default() -> Self {
        Self::new()
    }
}

impl Behavior for LoggingBehavior {
    async fn handle(&self, cx: &RequestContext<'_>, next: Next<'_>) -> Result<Payload, CourierError> {
        let span = tracing::info_span!(
            "dispatch",
            pipeline = %self.name,
            request = %cx.request_name(),
        );

        async move {
            let started = Instant::now();
            tracing::info!(response = %cx.response_name(), "handling request");

            let result = next.run().await;
            let elapsed_ms = elapsed_ms(started);
            match &result {
                Ok(_) => tracing::info!(elapsed_ms, "request handled"),
                Err(err) if err.is_cancelled() => {
                    tracing::info!(elapsed_ms, "request cancelled")
                }
                Err(err) => tracing::error!(elapsed_ms, error = %err, "request failed"),
            }
            result
        }
        .instrument(span)
        .await
    }
}

/// The stream counterpart of [`LoggingBehavior`].
///
/// Records when consumption starts, every failed item, and a completion
/// event with the item count once the inner sequence is exhausted.
#[derive(Debug, Clone, Copy)]
pub struct StreamLoggingBehavior {
    name: &'static str,
}

impl StreamLoggingBehavior {
    /// Create a new `StreamLoggingBehavior` with a default name.
    pub const fn new() -> Self {
        Self {
            name: "dispatch_stream",
        }
    }

    /// Create a new `StreamLoggingBehavior` with a custom name.
    pub const fn named(name: &'static str) -> Self {
        Self { name }
    }
}

impl Default for StreamLoggingBehavior {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamBehavior for StreamLoggingBehavior {
    fn handle<'a>(&'a self, cx: &'a RequestContext<'a>, next: StreamNext<'a>) -> PayloadStream<'a> {
        let name = self.name;
        let request = cx.request_name();

        async_stream::stream! {
            let started = Instant::now();
            tracing::info!(pipeline = %name, request = %request, "stream started");

            let mut items = next.run();
            let mut produced = 0usize;
            while let Some(item) = items.next().await {
                match &item {
                    Ok(_) => produced += 1,
                    Err(err) => tracing::error!(
                        pipeline = %name,
                        request = %request,
                        items = produced,
                        elapsed_ms = elapsed_ms(started),
                        error = %err,
                        "stream item failed"
                    ),
                }
                yield item;
            }

            tracing::info!(
                pipeline = %name,
                request = %request,
                items = produced,
                elapsed_ms = elapsed_ms(started),
                "stream completed"
            );
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::{CancellationToken, DynBehavior, Request, StreamRequest};
    use futures::FutureExt;

    struct Ping;

    impl Request for Ping {
        type Response = &'static str;
    }

    impl StreamRequest for Ping {
        type Item = u32;
    }

    #[tokio::test]
    async fn test_logging_behavior_passes_response_through() {
        let behavior = LoggingBehavior::named("test");
        let cancel = CancellationToken::new();
        let cx = RequestContext::new(&Ping, &cancel);
        let next = Next::new(|| async { Ok(Box::new("pong") as Payload) }.boxed());

        let payload = behavior.handle_dyn(&cx, next).await.unwrap();
        assert_eq!(*payload.downcast::<&str>().unwrap(), "pong");
    }

    #[tokio::test]
    async fn test_logging_behavior_reraises_errors() {
        let behavior = LoggingBehavior::new();
        let cancel = CancellationToken::new();
        let cx = RequestContext::new(&Ping, &cancel);
        let next = Next::new(|| async { Err(CourierError::msg("boom")) }.boxed());

        let err = behavior.handle_dyn(&cx, next).await.unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }

    #[tokio::test]
    async fn test_stream_logging_keeps_every_item() {
        let behavior = StreamLoggingBehavior::new();
        let cancel = CancellationToken::new();
        let cx = RequestContext::for_stream(&Ping, &cancel);
        let next = StreamNext::new(|| {
            futures::stream::iter([
                Ok(Box::new(1u32) as Payload),
                Err(CourierError::msg("bad item")),
                Ok(Box::new(3u32) as Payload),
            ])
            .boxed()
        });

        let items: Vec<_> = behavior.handle(&cx, next).collect().await;
        assert_eq!(items.len(), 3);
        assert!(items[1].is_err());
    }
}
