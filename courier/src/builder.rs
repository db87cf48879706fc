//! Dispatcher construction.
//!
//! Every binding is declared here, at startup. Registration order of
//! behaviors is significant: the behavior registered last runs outermost.
//!
//! # Example
//!
//! ```rust,ignore
//! let dispatcher = DispatcherBuilder::new()
//!     .use_logging()
//!     .configure_caching(Arc::new(MemoryCache::new()))
//!     .use_caching()
//!     .register_validator::<CreateUser, _>(EmailValidator)?
//!     .register_handler::<CreateUser, _, _>(Lifetime::ScopeScoped, |c| {
//!         Ok(CreateUserHandler::new(c.resolve::<UnitOfWork>()?))
//!     })?
//!     .configure_services(|services| {
//!         services.add_scoped_factory(|c| Ok(UnitOfWork::begin(c.resolve::<Pool>()?)));
//!     })
//!     .build()?;
//! ```

use crate::{
    dispatcher::{Dispatcher, RequestWrapper},
    registry::{BehaviorBinding, BehaviorFactory, BindingRegistry, HandlerBinding, HandlerSlot, StreamHandlerSlot},
    stream::StreamWrapper,
};
use courier_core::{
    Behavior, CacheProvider, ClosedBehavior, ClosedStreamBehavior, ConfigError, Container,
    DynBehavior, DynCacheProvider, Handler, Lifetime, Request, RequestBehavior,
    RequestStreamBehavior, ResolveError, StreamBehavior, StreamHandler, StreamRequest, Validator,
};
use courier_std::{
    behaviors::{CachingBehavior, CachingOptions, ValidationBehavior, ValidatorTable},
    container::ServiceCollection,
};
use std::{any::TypeId, fmt, sync::Arc};
use tracing::debug;

/// Builder for a [`Dispatcher`].
///
/// Fallible registrations return the builder inside a `Result` so that
/// configuration mistakes surface at startup:
///
/// - a second handler for a request type ([`ConfigError::DuplicateHandler`])
/// - the same validator twice for a request type ([`ConfigError::DuplicateValidator`])
/// - caching without a provider ([`ConfigError::MissingCacheProvider`], from [`build`](Self::build))
#[derive(Default)]
pub struct DispatcherBuilder {
    services: ServiceCollection,
    registry: BindingRegistry,
    validators: Option<ValidatorTable>,
    cache: Option<(Arc<dyn DynCacheProvider>, CachingOptions)>,
    caching_used: bool,
}

impl DispatcherBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Handlers
    // ========================================================================

    /// Bind `R` to handlers produced by `factory`.
    ///
    /// `lifetime` decides how often `factory` runs: once per root container
    /// ([`Lifetime::Reusable`]), on every dispatch ([`Lifetime::CallScoped`]),
    /// or once per resource scope ([`Lifetime::ScopeScoped`]).
    pub fn register_handler<R, H, F>(mut self, lifetime: Lifetime, factory: F) -> Result<Self, ConfigError>
    where
        R: Request,
        H: Handler<R>,
        F: Fn(&dyn Container) -> Result<H, ResolveError> + Send + Sync + 'static,
    {
        self.registry.insert_handler(
            TypeId::of::<R>(),
            HandlerBinding {
                request: std::any::type_name::<R>(),
                handler: std::any::type_name::<H>(),
                lifetime,
                wrap: RequestWrapper::<R>::create,
            },
        )?;
        self.services
            .add_factory(lifetime.into(), move |c: &dyn Container| {
                factory(c).map(|handler| HandlerSlot::<R>(Arc::new(handler)))
            });
        Ok(self)
    }

    /// Bind `R` to a single shared handler instance.
    pub fn register_handler_instance<R, H>(mut self, handler: H) -> Result<Self, ConfigError>
    where
        R: Request,
        H: Handler<R>,
    {
        self.registry.insert_handler(
            TypeId::of::<R>(),
            HandlerBinding {
                request: std::any::type_name::<R>(),
                handler: std::any::type_name::<H>(),
                lifetime: Lifetime::Reusable,
                wrap: RequestWrapper::<R>::create,
            },
        )?;
        self.services.add_singleton(HandlerSlot::<R>(Arc::new(handler)));
        Ok(self)
    }

    /// Bind the stream request `R` to handlers produced by `factory`.
    pub fn register_stream_handler<R, H, F>(mut self, lifetime: Lifetime, factory: F) -> Result<Self, ConfigError>
    where
        R: StreamRequest,
        H: StreamHandler<R>,
        F: Fn(&dyn Container) -> Result<H, ResolveError> + Send + Sync + 'static,
    {
        self.registry.insert_stream_handler(
            TypeId::of::<R>(),
            HandlerBinding {
                request: std::any::type_name::<R>(),
                handler: std::any::type_name::<H>(),
                lifetime,
                wrap: StreamWrapper::<R>::create,
            },
        )?;
        self.services
            .add_factory(lifetime.into(), move |c: &dyn Container| {
                factory(c).map(|handler| StreamHandlerSlot::<R>(Arc::new(handler)))
            });
        Ok(self)
    }

    /// Bind the stream request `R` to a single shared handler instance.
    pub fn register_stream_handler_instance<R, H>(mut self, handler: H) -> Result<Self, ConfigError>
    where
        R: StreamRequest,
        H: StreamHandler<R>,
    {
        self.registry.insert_stream_handler(
            TypeId::of::<R>(),
            HandlerBinding {
                request: std::any::type_name::<R>(),
                handler: std::any::type_name::<H>(),
                lifetime: Lifetime::Reusable,
                wrap: StreamWrapper::<R>::create,
            },
        )?;
        self.services.add_singleton(StreamHandlerSlot::<R>(Arc::new(handler)));
        Ok(self)
    }

    // ========================================================================
    // Behaviors
    // ========================================================================

    /// Add an open behavior, produced by `factory` whenever a pipeline is
    /// composed.
    pub fn register_behavior<B, F>(mut self, factory: F) -> Self
    where
        B: Behavior,
        F: Fn(&dyn Container) -> Result<B, ResolveError> + Send + Sync + 'static,
    {
        let factory: BehaviorFactory<dyn DynBehavior> = Arc::new(move |c: &dyn Container| {
            factory(c).map(|behavior| Arc::new(behavior) as Arc<dyn DynBehavior>)
        });
        self.registry
            .push_behavior(BehaviorBinding::open(std::any::type_name::<B>(), factory));
        self
    }

    /// Add an open behavior shared by every pipeline.
    pub fn register_behavior_instance<B: Behavior>(mut self, behavior: B) -> Self {
        let behavior: Arc<dyn DynBehavior> = Arc::new(behavior);
        self.registry.push_behavior(BehaviorBinding::open(
            std::any::type_name::<B>(),
            Arc::new(move |_: &dyn Container| Ok(Arc::clone(&behavior))),
        ));
        self
    }

    /// Add a behavior that only wraps requests of type `R`.
    pub fn register_request_behavior<R, B, F>(mut self, factory: F) -> Self
    where
        R: Request,
        B: RequestBehavior<R>,
        F: Fn(&dyn Container) -> Result<B, ResolveError> + Send + Sync + 'static,
    {
        let factory: BehaviorFactory<dyn DynBehavior> = Arc::new(move |c: &dyn Container| {
            factory(c).map(|behavior| Arc::new(ClosedBehavior::<R, B>::new(behavior)) as Arc<dyn DynBehavior>)
        });
        self.registry
            .push_behavior(BehaviorBinding::closed::<R>(std::any::type_name::<B>(), factory));
        self
    }

    /// Add a shared behavior instance that only wraps requests of type `R`.
    pub fn register_request_behavior_instance<R, B>(mut self, behavior: B) -> Self
    where
        R: Request,
        B: RequestBehavior<R>,
    {
        let behavior: Arc<dyn DynBehavior> = Arc::new(ClosedBehavior::<R, B>::new(behavior));
        self.registry.push_behavior(BehaviorBinding::closed::<R>(
            std::any::type_name::<B>(),
            Arc::new(move |_: &dyn Container| Ok(Arc::clone(&behavior))),
        ));
        self
    }

    /// Add an open stream behavior, produced by `factory`.
    pub fn register_stream_behavior<B, F>(mut self, factory: F) -> Self
    where
        B: StreamBehavior,
        F: Fn(&dyn Container) -> Result<B, ResolveError> + Send + Sync + 'static,
    {
        let factory: BehaviorFactory<dyn StreamBehavior> = Arc::new(move |c: &dyn Container| {
            factory(c).map(|behavior| Arc::new(behavior) as Arc<dyn StreamBehavior>)
        });
        self.registry
            .push_stream_behavior(BehaviorBinding::open(std::any::type_name::<B>(), factory));
        self
    }

    /// Add an open stream behavior shared by every stream pipeline.
    pub fn register_stream_behavior_instance<B: StreamBehavior>(mut self, behavior: B) -> Self {
        let behavior: Arc<dyn StreamBehavior> = Arc::new(behavior);
        self.registry.push_stream_behavior(BehaviorBinding::open(
            std::any::type_name::<B>(),
            Arc::new(move |_: &dyn Container| Ok(Arc::clone(&behavior))),
        ));
        self
    }

    /// Add a stream behavior that only wraps stream requests of type `R`.
    pub fn register_request_stream_behavior<R, B, F>(mut self, factory: F) -> Self
    where
        R: StreamRequest,
        B: RequestStreamBehavior<R>,
        F: Fn(&dyn Container) -> Result<B, ResolveError> + Send + Sync + 'static,
    {
        let factory: BehaviorFactory<dyn StreamBehavior> = Arc::new(move |c: &dyn Container| {
            factory(c)
                .map(|behavior| Arc::new(ClosedStreamBehavior::<R, B>::new(behavior)) as Arc<dyn StreamBehavior>)
        });
        self.registry
            .push_stream_behavior(BehaviorBinding::closed::<R>(std::any::type_name::<B>(), factory));
        self
    }

    /// Add a shared stream behavior instance that only wraps `R`.
    pub fn register_request_stream_behavior_instance<R, B>(mut self, behavior: B) -> Self
    where
        R: StreamRequest,
        B: RequestStreamBehavior<R>,
    {
        let behavior: Arc<dyn StreamBehavior> = Arc::new(ClosedStreamBehavior::<R, B>::new(behavior));
        self.registry.push_stream_behavior(BehaviorBinding::closed::<R>(
            std::any::type_name::<B>(),
            Arc::new(move |_: &dyn Container| Ok(Arc::clone(&behavior))),
        ));
        self
    }

    // ========================================================================
    // Validation
    // ========================================================================

    /// Add a validator for `R`.
    ///
    /// The first validator registered, for any request type, inserts the
    /// validation behavior at this point of the behavior order. Later
    /// validators join the same behavior.
    pub fn register_validator<R, V>(mut self, validator: V) -> Result<Self, ConfigError>
    where
        R: Request,
        V: Validator<R>,
    {
        if self.validators.is_none() {
            self.registry.push_behavior(BehaviorBinding::open(
                std::any::type_name::<ValidationBehavior>(),
                Arc::new(|c: &dyn Container| {
                    c.resolve::<ValidationBehavior>()
                        .map(|behavior| behavior as Arc<dyn DynBehavior>)
                }),
            ));
        }
        self.validators
            .get_or_insert_with(ValidatorTable::new)
            .add::<R, V>(validator)?;
        Ok(self)
    }

    // ========================================================================
    // Caching
    // ========================================================================

    /// Supply the cache backend used by [`use_caching`](Self::use_caching).
    pub fn configure_caching<P: CacheProvider>(self, provider: Arc<P>) -> Self {
        self.configure_caching_with(provider, CachingOptions::default())
    }

    /// Supply the cache backend together with caching options.
    pub fn configure_caching_with<P: CacheProvider>(mut self, provider: Arc<P>, options: CachingOptions) -> Self {
        let provider: Arc<dyn DynCacheProvider> = provider;
        self.cache = Some((provider, options));
        self
    }

    /// Insert the caching behavior at this point of the behavior order.
    ///
    /// Calling it again has no effect. [`build`](Self::build) fails unless
    /// a provider was configured.
    pub fn use_caching(mut self) -> Self {
        if self.caching_used {
            return self;
        }
        self.caching_used = true;
        self.registry.push_behavior(BehaviorBinding::open(
            std::any::type_name::<CachingBehavior>(),
            Arc::new(|c: &dyn Container| {
                c.resolve::<CachingBehavior>()
                    .map(|behavior| behavior as Arc<dyn DynBehavior>)
            }),
        ));
        self
    }

    // ========================================================================
    // Services
    // ========================================================================

    /// The service collection handler and behavior factories resolve from.
    pub fn services(&mut self) -> &mut ServiceCollection {
        &mut self.services
    }

    /// Register application services in place.
    pub fn configure_services(mut self, configure: impl FnOnce(&mut ServiceCollection)) -> Self {
        configure(&mut self.services);
        self
    }

    /// Finish configuration.
    ///
    /// # Errors
    ///
    /// [`ConfigError::MissingCacheProvider`] if [`use_caching`](Self::use_caching)
    /// was called without a provider.
    pub fn build(self) -> Result<Dispatcher, ConfigError> {
        let Self {
            mut services,
            registry,
            validators,
            cache,
            caching_used,
        } = self;

        if caching_used {
            let (provider, options) = cache.ok_or(ConfigError::MissingCacheProvider)?;
            services.add_singleton(CachingBehavior::with_options(provider, options));
        }
        if let Some(table) = validators {
            services.add_singleton(ValidationBehavior::new(Arc::new(table)));
        }

        debug!(
            handlers = registry.handlers().count(),
            stream_handlers = registry.stream_handlers().count(),
            behaviors = registry.behavior_count(),
            stream_behaviors = registry.stream_behavior_count(),
            services = services.len(),
            "dispatcher built"
        );
        Ok(Dispatcher::new(registry, Arc::new(services.build())))
    }
}

impl fmt::Debug for DispatcherBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatcherBuilder")
            .field("registry", &self.registry)
            .field("services", &self.services.len())
            .field("validators", &self.validators)
            .field("caching", &self.caching_used)
            .finish_non_exhaustive()
    }
}
