//! # Handlers
//!
//! The terminal endpoint of a dispatch pipeline: the single owner of the
//! business logic for one request type.
//!
//! # Usage Patterns
//!
//! 1. **Single response**: `impl Handler<GetUser> for GetUserHandler`
//! 2. **Streaming**: `impl StreamHandler<ListUsers> for ListUsersHandler`
//!
//! Handlers receive the cancellation signal of the call and are expected to
//! honor it promptly, typically by racing long waits against
//! [`CancellationToken::cancelled`].

use crate::{
    error::CourierError,
    request::{Request, StreamRequest},
};
use futures::stream::BoxStream;
use std::{future::Future, pin::Pin};
use tokio_util::sync::CancellationToken;

/// Business logic answering one request type with one response.
///
/// # Static vs Dynamic Dispatch
///
/// This trait uses native `async fn` for zero-cost static dispatch.
/// The dispatcher stores handlers as [`DynHandler`] trait objects.
#[diagnostic::on_unimplemented(
    message = "`{Self}` cannot handle requests of type `{R}`",
    label = "missing `Handler<{R}>` implementation",
    note = "Handlers must implement `handle` for the request type `{R}`."
)]
pub trait Handler<R: Request>: Send + Sync + 'static {
    /// Produce the response for `request`.
    fn handle(
        &self,
        request: &R,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<R::Response, CourierError>> + Send;
}

/// Dynamic object-safe version of [`Handler`].
pub trait DynHandler<R: Request>: Send + Sync + 'static {
    /// Produce the response for `request` (dynamic dispatch version).
    fn handle_dyn<'a>(
        &'a self,
        request: &'a R,
        cancel: &'a CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Result<R::Response, CourierError>> + Send + 'a>>;
}

// Blanket implementation: Any type implementing Handler implements DynHandler automatically.
impl<R: Request, T: Handler<R>> DynHandler<R> for T {
    fn handle_dyn<'a>(
        &'a self,
        request: &'a R,
        cancel: &'a CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Result<R::Response, CourierError>> + Send + 'a>> {
        Box::pin(self.handle(request, cancel))
    }
}

/// Business logic answering one request type with a lazy sequence of items.
///
/// The returned stream may borrow the request; the dispatcher keeps the
/// request alive for as long as the caller consumes the stream.
#[diagnostic::on_unimplemented(
    message = "`{Self}` cannot stream responses for `{R}`",
    label = "missing `StreamHandler<{R}>` implementation",
    note = "Stream handlers must implement `handle` for the request type `{R}`."
)]
pub trait StreamHandler<R: StreamRequest>: Send + Sync + 'static {
    /// Start producing items for `request`.
    fn handle<'a>(
        &'a self,
        request: &'a R,
        cancel: &'a CancellationToken,
    ) -> BoxStream<'a, Result<R::Item, CourierError>>;
}
