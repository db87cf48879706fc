//! Pipeline composition.
//!
//! A pipeline is a handler wrapped by behaviors. Behaviors are stored in
//! the order the registry hands them out, last registered first, so the
//! outermost behavior of a call is the one registered last:
//!
//! ```text
//! registered:  [b_1, b_2, b_3]
//! stored:      [b_3, b_2, b_1]
//! call:        b_3 -> b_2 -> b_1 -> handler
//! ```
//!
//! Composition folds from the handler outward; each behavior receives the
//! rest of the chain as its single-use continuation.

use courier_core::{
    CourierError, DynBehavior, DynHandler, Next, Payload, PayloadStream, Request, RequestContext,
    StreamBehavior, StreamHandler, StreamNext, StreamRequest, downcast_item, downcast_response,
};
use futures::{FutureExt, StreamExt, stream::BoxStream};
use std::{fmt, sync::Arc};
use tokio_util::sync::CancellationToken;

// ============================================================================
// Single response
// ============================================================================

pub(crate) struct Pipeline<R: Request> {
    handler: Arc<dyn DynHandler<R>>,
    behaviors: Vec<Arc<dyn DynBehavior>>,
}

impl<R: Request> Pipeline<R> {
    /// `behaviors` must be outermost first.
    pub(crate) fn new(handler: Arc<dyn DynHandler<R>>, behaviors: Vec<Arc<dyn DynBehavior>>) -> Self {
        Self { handler, behaviors }
    }

    pub(crate) async fn execute(&self, request: &R, cancel: &CancellationToken) -> Result<R::Response, CourierError> {
        if self.behaviors.is_empty() {
            return self.handler.handle_dyn(request, cancel).await;
        }

        let cx = RequestContext::new(request, cancel);
        let cx = &cx;
        let handler = &self.handler;
        let mut next = Next::new(move || {
            async move {
                let response = handler.handle_dyn(request, cancel).await?;
                Ok(Box::new(response) as Payload)
            }
            .boxed()
        });
        for behavior in self.behaviors.iter().rev() {
            let inner = next;
            next = Next::new(move || behavior.handle_dyn(cx, inner));
        }

        downcast_response::<R>(next.run().await?)
    }
}

impl<R: Request> fmt::Debug for Pipeline<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("request", &std::any::type_name::<R>())
            .field("behaviors", &self.behaviors.len())
            .finish()
    }
}

// ============================================================================
// Streams
// ============================================================================

pub(crate) struct StreamPipeline<R: StreamRequest> {
    handler: Arc<dyn StreamHandler<R>>,
    behaviors: Vec<Arc<dyn StreamBehavior>>,
}

impl<R: StreamRequest> StreamPipeline<R> {
    /// `behaviors` must be outermost first.
    pub(crate) fn new(handler: Arc<dyn StreamHandler<R>>, behaviors: Vec<Arc<dyn StreamBehavior>>) -> Self {
        Self { handler, behaviors }
    }

    /// Open the item sequence. Nothing runs until the stream is polled.
    pub(crate) fn open<'a>(
        &'a self,
        cx: &'a RequestContext<'a>,
        request: &'a R,
        cancel: &'a CancellationToken,
    ) -> BoxStream<'a, Result<R::Item, CourierError>> {
        if self.behaviors.is_empty() {
            return self.handler.handle(request, cancel);
        }

        let handler = &self.handler;
        let mut next = StreamNext::new(move || -> PayloadStream<'a> {
            handler
                .handle(request, cancel)
                .map(|item| item.map(|item| Box::new(item) as Payload))
                .boxed()
        });
        for behavior in self.behaviors.iter().rev() {
            let inner = next;
            next = StreamNext::new(move || behavior.handle(cx, inner));
        }

        next.run()
            .map(|item| item.and_then(downcast_item::<R>))
            .boxed()
    }
}

impl<R: StreamRequest> fmt::Debug for StreamPipeline<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamPipeline")
            .field("request", &std::any::type_name::<R>())
            .field("behaviors", &self.behaviors.len())
            .finish()
    }
}
