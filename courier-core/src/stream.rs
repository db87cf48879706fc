//! Stream behaviors.
//!
//! Stream behaviors wrap the whole lazy sequence produced by a
//! [`StreamHandler`](crate::StreamHandler). They may filter, transform or
//! buffer items, or replace the sequence outright, but they never see a
//! single item in isolation from the sequence.

use crate::{
    context::{Payload, RequestContext},
    error::{ConfigError, CourierError},
    request::StreamRequest,
};
use futures::{StreamExt, stream::BoxStream};
use std::marker::PhantomData;
use tokio_util::sync::CancellationToken;

/// A type-erased sequence of stream items.
pub type PayloadStream<'a> = BoxStream<'a, Result<Payload, CourierError>>;

/// The remainder of a stream pipeline.
pub struct StreamNext<'a> {
    call: Box<dyn FnOnce() -> PayloadStream<'a> + Send + 'a>,
}

impl<'a> StreamNext<'a> {
    /// Wrap a continuation.
    pub fn new<F>(call: F) -> Self
    where
        F: FnOnce() -> PayloadStream<'a> + Send + 'a,
    {
        Self { call: Box::new(call) }
    }

    /// Start the inner sequence.
    pub fn run(self) -> PayloadStream<'a> {
        (self.call)()
    }
}

impl std::fmt::Debug for StreamNext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StreamNext")
    }
}

/// A stream pipeline stage applied to every stream request type.
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not a courier `StreamBehavior`",
    label = "missing `StreamBehavior` implementation",
    note = "Stream behaviors must implement `handle(&self, cx, next)` returning a stream."
)]
pub trait StreamBehavior: Send + Sync + 'static {
    /// Produce the sequence, usually by adapting `next.run()`.
    fn handle<'a>(&'a self, cx: &'a RequestContext<'a>, next: StreamNext<'a>) -> PayloadStream<'a>;
}

/// The remainder of a stream pipeline, as seen by a closed stream behavior.
pub struct TypedStreamNext<'a, R> {
    next: StreamNext<'a>,
    _request: PhantomData<fn(&R)>,
}

impl<'a, R: StreamRequest> TypedStreamNext<'a, R> {
    /// View an erased continuation through the request's item type.
    pub fn new(next: StreamNext<'a>) -> Self {
        Self {
            next,
            _request: PhantomData,
        }
    }

    /// Start the inner sequence.
    pub fn run(self) -> BoxStream<'a, Result<R::Item, CourierError>> {
        self.next
            .run()
            .map(|item| item.and_then(downcast_item::<R>))
            .boxed()
    }
}

/// Recover a typed stream item from a pipeline payload.
pub fn downcast_item<R: StreamRequest>(payload: Payload) -> Result<R::Item, CourierError> {
    payload.downcast::<R::Item>().map(|item| *item).map_err(|_| {
        ConfigError::ResponseTypeMismatch {
            request: std::any::type_name::<R>(),
            expected: std::any::type_name::<R::Item>(),
        }
        .into()
    })
}

/// A stream pipeline stage written for one stream request type.
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not a courier `RequestStreamBehavior` for `{R}`",
    label = "missing `RequestStreamBehavior<{R}>` implementation",
    note = "Closed stream behaviors must implement `handle(&self, request, next, cancel)` for `{R}`."
)]
pub trait RequestStreamBehavior<R: StreamRequest>: Send + Sync + 'static {
    /// Produce the sequence, usually by adapting `next.run()`.
    fn handle<'a>(
        &'a self,
        request: &'a R,
        next: TypedStreamNext<'a, R>,
        cancel: &'a CancellationToken,
    ) -> BoxStream<'a, Result<R::Item, CourierError>>;
}

/// Adapts a [`RequestStreamBehavior`] into an open [`StreamBehavior`].
pub struct ClosedStreamBehavior<R, B> {
    inner: B,
    _request: PhantomData<fn(&R)>,
}

impl<R, B> ClosedStreamBehavior<R, B> {
    /// Wrap a closed stream behavior.
    pub fn new(inner: B) -> Self {
        Self {
            inner,
            _request: PhantomData,
        }
    }
}

impl<R, B> StreamBehavior for ClosedStreamBehavior<R, B>
where
    R: StreamRequest,
    B: RequestStreamBehavior<R>,
{
    fn handle<'a>(&'a self, cx: &'a RequestContext<'a>, next: StreamNext<'a>) -> PayloadStream<'a> {
        let Some(request) = cx.downcast_ref::<R>() else {
            return next.run();
        };
        self.inner
            .handle(request, TypedStreamNext::new(next), cx.cancellation())
            .map(|item| item.map(|item| Box::new(item) as Payload))
            .boxed()
    }
}
