//! Stream dispatch.
//!
//! The lazy counterpart of [`Dispatcher::dispatch`]: the returned stream
//! does nothing until first polled. Handler lookup, lifetime resolution and
//! every error (including "no handler") surface as stream items.
//!
//! A scope opened for a scope-scoped stream handler lives inside the
//! stream and is released once, when the stream finishes or is dropped.

use crate::{
    dispatcher::{Dispatcher, not_found},
    lifetime::{LifetimeResolver, Resolution},
    pipeline::StreamPipeline,
    registry::{BehaviorBinding, BindingRegistry, StreamBinding, StreamHandlerSlot},
};
use courier_core::{Container, CourierError, RequestContext, StreamBehavior, StreamRequest};
use futures::{StreamExt, stream::BoxStream};
use std::{
    any::{Any, TypeId},
    fmt,
    sync::Arc,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

pub(crate) struct StreamWrapper<R: StreamRequest> {
    binding: Arc<StreamBinding>,
    behaviors: Vec<BehaviorBinding<dyn StreamBehavior>>,
    resolver: LifetimeResolver<StreamPipeline<R>>,
}

impl<R: StreamRequest> StreamWrapper<R> {
    /// Matches the `wrap` slot of a [`StreamBinding`].
    pub(crate) fn create(binding: &Arc<StreamBinding>, registry: &BindingRegistry) -> Arc<dyn Any + Send + Sync> {
        let behaviors = registry.stream_behaviors_for(TypeId::of::<R>());
        debug!(
            request = binding.request,
            handler = binding.handler,
            lifetime = ?binding.lifetime,
            behaviors = behaviors.len(),
            "stream wrapper created"
        );
        Arc::new(Self {
            binding: Arc::clone(binding),
            behaviors,
            resolver: LifetimeResolver::new(binding.lifetime),
        })
    }

    fn build(&self, container: &dyn Container) -> Result<StreamPipeline<R>, CourierError> {
        let handler = container.resolve::<StreamHandlerSlot<R>>()?;
        let behaviors = self
            .behaviors
            .iter()
            .map(|behavior| {
                behavior.resolve(container).inspect_err(|err| {
                    trace!(behavior = behavior.name(), error = %err, "behavior not resolved");
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(StreamPipeline::new(Arc::clone(&handler.0), behaviors))
    }

    fn resolve(&self, container: &dyn Container) -> Result<Resolution<StreamPipeline<R>>, CourierError> {
        self.resolver.resolve(container, |c| self.build(c))
    }
}

impl<R: StreamRequest> fmt::Debug for StreamWrapper<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamWrapper")
            .field("binding", &self.binding)
            .field("behaviors", &self.behaviors)
            .field("lifetime", &self.resolver.lifetime())
            .finish()
    }
}

enum Pulled<T> {
    Item(T),
    Exhausted,
    Cancelled,
}

impl Dispatcher {
    /// Open a lazy stream of items for `request`.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let mut prices = dispatcher.dispatch_stream(WatchPrices { symbol: "ACME".into() });
    /// while let Some(price) = prices.next().await {
    ///     println!("{}", price?);
    /// }
    /// ```
    pub fn dispatch_stream<R: StreamRequest>(&self, request: R) -> BoxStream<'static, Result<R::Item, CourierError>> {
        self.dispatch_stream_with(request, CancellationToken::new())
    }

    /// Open a lazy stream of items for `request`, stopped by `cancel`.
    ///
    /// Cancelling ends the stream with a single [`CourierError::Cancelled`]
    /// item. The stream also ends after the first error item.
    pub fn dispatch_stream_with<R: StreamRequest>(
        &self,
        request: R,
        cancel: CancellationToken,
    ) -> BoxStream<'static, Result<R::Item, CourierError>> {
        let dispatcher = self.clone();
        async_stream::stream! {
            if cancel.is_cancelled() {
                yield Err(CourierError::Cancelled);
                return;
            }
            let resolved = dispatcher
                .stream_wrapper::<R>()
                .and_then(|wrapper| wrapper.resolve(&*dispatcher.container));
            let resolution = match resolved {
                Ok(resolution) => resolution,
                Err(err) => {
                    yield Err(err);
                    return;
                }
            };

            let cx = RequestContext::for_stream(&request, &cancel);
            let mut items = resolution.pipeline.open(&cx, &request, &cancel);
            loop {
                let pulled = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Pulled::Cancelled,
                    item = items.next() => match item {
                        Some(item) if !cancel.is_cancelled() => Pulled::Item(item),
                        Some(_) => Pulled::Cancelled,
                        None => Pulled::Exhausted,
                    },
                };
                match pulled {
                    Pulled::Item(item) => {
                        let failed = item.is_err();
                        yield item;
                        if failed {
                            break;
                        }
                    }
                    Pulled::Exhausted => break,
                    Pulled::Cancelled => {
                        yield Err(CourierError::Cancelled);
                        break;
                    }
                }
            }
        }
        .boxed()
    }

    fn stream_wrapper<R: StreamRequest>(&self) -> Result<Arc<StreamWrapper<R>>, CourierError> {
        let name = std::any::type_name::<R>();
        let request = TypeId::of::<R>();
        let registry = &self.shared.registry;
        let wrapper = self.shared.streams.get_or_try_insert(request, || {
            let binding = registry
                .stream_handler(request)
                .ok_or_else(|| not_found(name, "StreamHandler"))?;
            Ok::<_, CourierError>((binding.wrap)(binding, registry))
        })?;
        wrapper
            .downcast::<StreamWrapper<R>>()
            .map_err(|_| not_found(name, "StreamHandler").into())
    }
}
