//! Tower integration.
//!
//! - [`Dispatcher`] is a `tower::Service` for every request type, so tower
//!   middleware can sit in front of dispatch.
//! - [`ServiceHandler`] turns a `tower::Service` into a [`Handler`], so an
//!   existing client stack can terminate a pipeline.
//!
//! # Example
//!
//! ```rust,ignore
//! use tower::ServiceExt;
//!
//! let user = dispatcher.clone().oneshot(GetUser { id: 7 }).await?;
//!
//! let handler = ServiceHandler::new(tower::service_fn(|req: FetchQuote| async move {
//!     quotes_client.fetch(&req.symbol).await
//! }));
//! builder.register_handler_instance::<FetchQuote, _>(handler)?;
//! ```

use crate::Dispatcher;
use courier_core::{BoxError, CourierError, Handler, Request};
use futures::{FutureExt, future::BoxFuture};
use std::task::{Context, Poll};
use tokio_util::sync::CancellationToken;
use ::tower::{Service, ServiceExt};

// ============================================================================
// Dispatcher -> Service
// ============================================================================

impl<R: Request> Service<R> for Dispatcher {
    type Response = R::Response;
    type Error = CourierError;
    type Future = BoxFuture<'static, Result<R::Response, CourierError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: R) -> Self::Future {
        let dispatcher = self.clone();
        async move { dispatcher.dispatch(request).await }.boxed()
    }
}

// ============================================================================
// Service -> Handler
// ============================================================================

/// A handler backed by a `tower::Service`.
///
/// Each call clones the service and drives it with `oneshot`, so readiness
/// is respected. Service errors become [`CourierError::Handler`]; the
/// cancellation signal races the call.
#[derive(Debug, Clone)]
pub struct ServiceHandler<S> {
    service: S,
}

impl<S> ServiceHandler<S> {
    /// Wrap `service`.
    pub fn new(service: S) -> Self {
        Self { service }
    }

    /// The wrapped service.
    pub fn inner(&self) -> &S {
        &self.service
    }
}

impl<R, S> Handler<R> for ServiceHandler<S>
where
    R: Request + Clone,
    S: Service<R, Response = R::Response> + Clone + Send + Sync + 'static,
    S::Error: Into<BoxError>,
    S::Future: Send,
{
    async fn handle(&self, request: &R, cancel: &CancellationToken) -> Result<R::Response, CourierError> {
        let call = self.service.clone().oneshot(request.clone());
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(CourierError::Cancelled),
            response = call => response.map_err(|err| CourierError::Handler(err.into())),
        }
    }
}
