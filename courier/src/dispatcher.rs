//! Single-response dispatch.
//!
//! The [`Dispatcher`] routes a request by its runtime type to a per-type
//! wrapper built on first use. The wrapper owns the lifetime decision for
//! its handler and composes the pipeline for each call.
//!
//! ```text
//! dispatch(request)
//!   -> resolution cache (TypeId -> wrapper)
//!   -> wrapper.execute(request, container)
//!        -> lifetime resolver (reuse / build / build in scope)
//!        -> pipeline (b_n -> ... -> b_1 -> handler)
//! ```

use crate::{
    cache::ResolutionCache,
    lifetime::LifetimeResolver,
    pipeline::Pipeline,
    registry::{BehaviorBinding, BindingRegistry, HandlerSlot, SingleBinding},
};
use courier_core::{
    AnyRequest, ConfigError, Container, CourierError, DynBehavior, Payload, Request, StreamRequest,
};
use futures::{FutureExt, future::BoxFuture};
use std::{
    any::{Any, TypeId},
    convert::Infallible,
    fmt,
    sync::Arc,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

// ============================================================================
// Per-type wrapper
// ============================================================================

/// The object-safe face of a [`RequestWrapper`], stored in the resolution
/// cache and reachable from a runtime `TypeId`.
pub(crate) trait ErasedWrapper: Send + Sync + 'static {
    fn request_name(&self) -> &'static str;

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;

    fn execute_erased<'a>(
        &'a self,
        request: &'a (dyn Any + Send + Sync),
        container: &'a dyn Container,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<Payload, CourierError>>;
}

/// Everything needed to run requests of type `R`.
pub(crate) struct RequestWrapper<R: Request> {
    binding: Arc<SingleBinding>,
    behaviors: Vec<BehaviorBinding<dyn DynBehavior>>,
    resolver: LifetimeResolver<Pipeline<R>>,
}

impl<R: Request> RequestWrapper<R> {
    /// Matches the `wrap` slot of a [`SingleBinding`].
    pub(crate) fn create(binding: &Arc<SingleBinding>, registry: &BindingRegistry) -> Arc<dyn ErasedWrapper> {
        let behaviors = registry.behaviors_for(TypeId::of::<R>());
        debug!(
            request = binding.request,
            handler = binding.handler,
            lifetime = ?binding.lifetime,
            behaviors = behaviors.len(),
            "request wrapper created"
        );
        Arc::new(Self {
            binding: Arc::clone(binding),
            behaviors,
            resolver: LifetimeResolver::new(binding.lifetime),
        })
    }

    fn build(&self, container: &dyn Container) -> Result<Pipeline<R>, CourierError> {
        let handler = container.resolve::<HandlerSlot<R>>()?;
        let behaviors = self
            .behaviors
            .iter()
            .map(|behavior| {
                behavior.resolve(container).inspect_err(|err| {
                    trace!(behavior = behavior.name(), error = %err, "behavior not resolved");
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Pipeline::new(Arc::clone(&handler.0), behaviors))
    }

    pub(crate) async fn execute(
        &self,
        request: &R,
        container: &dyn Container,
        cancel: &CancellationToken,
    ) -> Result<R::Response, CourierError> {
        // Dropping the resolution releases any scope opened for this call.
        let resolution = self.resolver.resolve(container, |c| self.build(c))?;
        if cancel.is_cancelled() {
            return Err(CourierError::Cancelled);
        }
        resolution.pipeline.execute(request, cancel).await
    }
}

impl<R: Request> ErasedWrapper for RequestWrapper<R> {
    fn request_name(&self) -> &'static str {
        self.binding.request
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }

    fn execute_erased<'a>(
        &'a self,
        request: &'a (dyn Any + Send + Sync),
        container: &'a dyn Container,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<Payload, CourierError>> {
        async move {
            let Some(request) = request.downcast_ref::<R>() else {
                return Err(not_found(self.request_name(), "Handler").into());
            };
            let response = self.execute(request, container, cancel).await?;
            Ok(Box::new(response) as Payload)
        }
        .boxed()
    }
}

impl<R: Request> fmt::Debug for RequestWrapper<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestWrapper")
            .field("binding", &self.binding)
            .field("behaviors", &self.behaviors)
            .field("resolver", &self.resolver)
            .finish()
    }
}

pub(crate) fn not_found(request: &'static str, contract: &str) -> ConfigError {
    ConfigError::HandlerNotFound {
        request,
        contract: format!("{contract}<{request}>").into(),
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

pub(crate) struct Shared {
    pub(crate) registry: BindingRegistry,
    pub(crate) requests: ResolutionCache<dyn ErasedWrapper>,
    pub(crate) streams: ResolutionCache<dyn Any + Send + Sync>,
}

/// The runtime entry point: sends requests to their handlers.
///
/// Cheap to clone. Clones share bindings and resolution caches; each clone
/// may be bound to a different container (see [`Dispatcher::in_scope`]).
///
/// # Example
///
/// ```rust,ignore
/// let dispatcher = DispatcherBuilder::new()
///     .use_logging()
///     .register_handler_instance::<GetUser, _>(GetUserHandler::new(db))?
///     .build()?;
///
/// let user = dispatcher.dispatch(GetUser { id: 7 }).await?;
/// ```
#[derive(Clone)]
pub struct Dispatcher {
    pub(crate) shared: Arc<Shared>,
    pub(crate) container: Arc<dyn Container>,
}

impl Dispatcher {
    pub(crate) fn new(registry: BindingRegistry, container: Arc<dyn Container>) -> Self {
        Self {
            shared: Arc::new(Shared {
                registry,
                requests: ResolutionCache::new(),
                streams: ResolutionCache::new(),
            }),
            container,
        }
    }

    /// Dispatch `request` to its handler.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::HandlerNotFound`] if no handler is bound for `R`
    /// - [`CourierError::Validation`] if a validator rejects the request
    /// - whatever the handler or a behavior returns
    pub async fn dispatch<R: Request>(&self, request: R) -> Result<R::Response, CourierError> {
        self.dispatch_with(request, &CancellationToken::new()).await
    }

    /// Dispatch `request` with a caller-owned cancellation signal.
    pub async fn dispatch_with<R: Request>(
        &self,
        request: R,
        cancel: &CancellationToken,
    ) -> Result<R::Response, CourierError> {
        if cancel.is_cancelled() {
            return Err(CourierError::Cancelled);
        }
        let wrapper = self.request_wrapper::<R>()?;
        wrapper.execute(&request, &*self.container, cancel).await
    }

    /// Dispatch a request whose concrete type is only known at run time.
    ///
    /// The response comes back erased; downcast it to the request's
    /// response type.
    ///
    /// ```rust,ignore
    /// let requests: Vec<Box<dyn AnyRequest>> = vec![Box::new(Ping), Box::new(GetUser { id: 7 })];
    /// for request in requests {
    ///     let payload = dispatcher.dispatch_any(request).await?;
    /// }
    /// ```
    pub async fn dispatch_any(&self, request: Box<dyn AnyRequest>) -> Result<Payload, CourierError> {
        self.dispatch_any_with(request, &CancellationToken::new()).await
    }

    /// [`dispatch_any`](Self::dispatch_any) with a caller-owned cancellation signal.
    pub async fn dispatch_any_with(
        &self,
        request: Box<dyn AnyRequest>,
        cancel: &CancellationToken,
    ) -> Result<Payload, CourierError> {
        if cancel.is_cancelled() {
            return Err(CourierError::Cancelled);
        }
        let name = request.request_name();
        let any = request.as_any();
        let wrapper = self.erased_wrapper(any.type_id(), || name)?;
        wrapper.execute_erased(any, &*self.container, cancel).await
    }

    /// A dispatcher bound to a fresh resource scope.
    ///
    /// Scope-scoped handlers dispatched through it share that scope; it is
    /// released when the last clone of the returned dispatcher is dropped.
    pub fn in_scope(&self) -> Result<Self, CourierError> {
        let scope = self.container.create_scope()?;
        debug!(scope = %scope.id(), "dispatcher bound to scope");
        Ok(Self {
            shared: Arc::clone(&self.shared),
            container: Arc::from(scope),
        })
    }

    /// A dispatcher sharing these bindings but resolving from `container`.
    pub fn with_container(&self, container: Arc<dyn Container>) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            container,
        }
    }

    /// The container handlers and behaviors are resolved from.
    pub fn container(&self) -> &Arc<dyn Container> {
        &self.container
    }

    /// Returns `true` if a handler is bound for `R`.
    pub fn has_handler<R: Request>(&self) -> bool {
        self.shared.registry.handler(TypeId::of::<R>()).is_some()
    }

    /// Returns `true` if a stream handler is bound for `R`.
    pub fn has_stream_handler<R: StreamRequest>(&self) -> bool {
        self.shared.registry.stream_handler(TypeId::of::<R>()).is_some()
    }

    /// Build the wrapper of every bound request type ahead of the first
    /// dispatch, returning how many wrappers exist afterward.
    ///
    /// Construction only; no handler or behavior is resolved or invoked.
    pub fn warm_up(&self) -> usize {
        let registry = &self.shared.registry;
        for (request, binding) in registry.handlers() {
            let _ = self
                .shared
                .requests
                .get_or_try_insert(request, || Ok::<_, Infallible>((binding.wrap)(binding, registry)));
        }
        for (request, binding) in registry.stream_handlers() {
            let _ = self
                .shared
                .streams
                .get_or_try_insert(request, || Ok::<_, Infallible>((binding.wrap)(binding, registry)));
        }
        self.shared.requests.len() + self.shared.streams.len()
    }

    fn request_wrapper<R: Request>(&self) -> Result<Arc<RequestWrapper<R>>, CourierError> {
        let name = std::any::type_name::<R>();
        self.erased_wrapper(TypeId::of::<R>(), || name)?
            .into_any()
            .downcast::<RequestWrapper<R>>()
            .map_err(|_| not_found(name, "Handler").into())
    }

    fn erased_wrapper(
        &self,
        request: TypeId,
        name: impl FnOnce() -> &'static str,
    ) -> Result<Arc<dyn ErasedWrapper>, CourierError> {
        let registry = &self.shared.registry;
        self.shared.requests.get_or_try_insert(request, || {
            let binding = registry
                .handler(request)
                .ok_or_else(|| not_found(name(), "Handler"))?;
            Ok((binding.wrap)(binding, registry))
        })
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.shared.registry)
            .field("requests", &self.shared.requests)
            .field("streams", &self.shared.streams)
            .field("container", &self.container)
            .finish()
    }
}
