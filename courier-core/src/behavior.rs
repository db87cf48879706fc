//! # Behaviors
//!
//! A behavior is a pipeline stage that wraps the handler call. It may
//! inspect the request, short-circuit, transform the response, or simply
//! observe the call.
//!
//! # Open vs Closed
//!
//! - [`Behavior`] is *open*: it runs for every request type and therefore
//!   works on the type-erased [`RequestContext`] and [`Payload`].
//! - [`RequestBehavior`] is *closed*: it is written for one request type and
//!   sees the request and response with their concrete types.
//!
//! Both receive the rest of the pipeline as a single-use continuation. A
//! behavior that never runs it short-circuits the call; running it twice is
//! impossible because [`Next::run`] consumes it.

use crate::{
    context::{Payload, RequestContext},
    error::{ConfigError, CourierError},
    request::Request,
};
use futures::future::BoxFuture;
use std::{future::Future, marker::PhantomData, pin::Pin};
use tokio_util::sync::CancellationToken;

/// The remainder of a pipeline, as seen by an open behavior.
pub struct Next<'a> {
    call: Box<dyn FnOnce() -> BoxFuture<'a, Result<Payload, CourierError>> + Send + 'a>,
}

impl<'a> Next<'a> {
    /// Wrap a continuation.
    pub fn new<F>(call: F) -> Self
    where
        F: FnOnce() -> BoxFuture<'a, Result<Payload, CourierError>> + Send + 'a,
    {
        Self { call: Box::new(call) }
    }

    /// Run the remainder of the pipeline.
    pub fn run(self) -> BoxFuture<'a, Result<Payload, CourierError>> {
        (self.call)()
    }
}

impl std::fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Next")
    }
}

/// A pipeline stage applied to every request type.
///
/// # Static vs Dynamic Dispatch
///
/// This trait uses native `async fn` for zero-cost static dispatch.
/// Pipelines store behaviors as [`DynBehavior`] trait objects.
///
/// # Example
///
/// ```rust,ignore
/// struct Audit;
///
/// impl Behavior for Audit {
///     async fn handle(&self, cx: &RequestContext<'_>, next: Next<'_>) -> Result<Payload, CourierError> {
///         println!("-> {}", cx.request_name());
///         next.run().await
///     }
/// }
/// ```
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not a courier `Behavior`",
    label = "missing `Behavior` implementation",
    note = "Open behaviors must implement `handle(&self, cx, next)`."
)]
pub trait Behavior: Send + Sync + 'static {
    /// Handle the call, usually by running `next` exactly once.
    fn handle(
        &self,
        cx: &RequestContext<'_>,
        next: Next<'_>,
    ) -> impl Future<Output = Result<Payload, CourierError>> + Send;
}

/// Dynamic object-safe version of [`Behavior`].
pub trait DynBehavior: Send + Sync + 'static {
    /// Handle the call (dynamic dispatch version).
    fn handle_dyn<'a>(
        &'a self,
        cx: &'a RequestContext<'a>,
        next: Next<'a>,
    ) -> Pin<Box<dyn Future<Output = Result<Payload, CourierError>> + Send + 'a>>;
}

impl<T: Behavior> DynBehavior for T {
    fn handle_dyn<'a>(
        &'a self,
        cx: &'a RequestContext<'a>,
        next: Next<'a>,
    ) -> Pin<Box<dyn Future<Output = Result<Payload, CourierError>> + Send + 'a>> {
        Box::pin(self.handle(cx, next))
    }
}

/// The remainder of a pipeline, as seen by a closed behavior.
pub struct TypedNext<'a, R> {
    next: Next<'a>,
    _request: PhantomData<fn(&R)>,
}

impl<'a, R: Request> TypedNext<'a, R> {
    /// View an erased continuation through the request's response type.
    pub fn new(next: Next<'a>) -> Self {
        Self {
            next,
            _request: PhantomData,
        }
    }

    /// Run the remainder of the pipeline.
    pub async fn run(self) -> Result<R::Response, CourierError> {
        let payload = self.next.run().await?;
        downcast_response::<R>(payload)
    }
}

/// Recover a typed response from a pipeline payload.
///
/// Fails with [`ConfigError::ResponseTypeMismatch`] if a behavior replaced
/// the response with a value of another type.
pub fn downcast_response<R: Request>(payload: Payload) -> Result<R::Response, CourierError> {
    payload
        .downcast::<R::Response>()
        .map(|response| *response)
        .map_err(|_| {
            ConfigError::ResponseTypeMismatch {
                request: std::any::type_name::<R>(),
                expected: std::any::type_name::<R::Response>(),
            }
            .into()
        })
}

/// A pipeline stage written for one request type.
///
/// Runs at its registration position, and only for `R`.
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not a courier `RequestBehavior` for `{R}`",
    label = "missing `RequestBehavior<{R}>` implementation",
    note = "Closed behaviors must implement `handle(&self, request, next, cancel)` for `{R}`."
)]
pub trait RequestBehavior<R: Request>: Send + Sync + 'static {
    /// Handle the call, usually by running `next` exactly once.
    fn handle(
        &self,
        request: &R,
        next: TypedNext<'_, R>,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<R::Response, CourierError>> + Send;
}

/// Adapts a [`RequestBehavior`] into an open [`Behavior`].
///
/// Requests of any other type pass straight through.
pub struct ClosedBehavior<R, B> {
    inner: B,
    _request: PhantomData<fn(&R)>,
}

impl<R, B> ClosedBehavior<R, B> {
    /// Wrap a closed behavior.
    pub fn new(inner: B) -> Self {
        Self {
            inner,
            _request: PhantomData,
        }
    }

    /// The wrapped behavior.
    pub fn inner(&self) -> &B {
        &self.inner
    }
}

impl<R, B> Behavior for ClosedBehavior<R, B>
where
    R: Request,
    B: RequestBehavior<R>,
{
    async fn handle(&self, cx: &RequestContext<'_>, next: Next<'_>) -> Result<Payload, CourierError> {
        let Some(request) = cx.downcast_ref::<R>() else {
            return next.run().await;
        };
        let response = self
            .inner
            .handle(request, TypedNext::new(next), cx.cancellation())
            .await?;
        Ok(Box::new(response))
    }
}
