//! Service registrations.

use super::provider::ServiceProvider;
use courier_core::{AnyArc, Container, Lifetime, ResolveError, ServiceKey};
use std::{any::TypeId, collections::HashMap, fmt, sync::Arc};

/// How long a resolved service instance lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceLifetime {
    /// One instance per root container, created on first resolve.
    Singleton,
    /// One instance per scope; root containers refuse to resolve it.
    Scoped,
    /// A new instance on every resolve.
    Transient,
}

impl ServiceLifetime {
    /// Returns `true` if resolved instances are cached.
    #[inline]
    pub fn is_cached(&self) -> bool {
        matches!(self, ServiceLifetime::Singleton | ServiceLifetime::Scoped)
    }
}

/// Handler lifetimes map onto service lifetimes one to one.
impl From<Lifetime> for ServiceLifetime {
    fn from(lifetime: Lifetime) -> Self {
        match lifetime {
            Lifetime::Reusable => ServiceLifetime::Singleton,
            Lifetime::CallScoped => ServiceLifetime::Transient,
            Lifetime::ScopeScoped => ServiceLifetime::Scoped,
        }
    }
}

impl fmt::Display for ServiceLifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceLifetime::Singleton => write!(f, "Singleton"),
            ServiceLifetime::Scoped => write!(f, "Scoped"),
            ServiceLifetime::Transient => write!(f, "Transient"),
        }
    }
}

/// A type-erased service factory.
///
/// The container passed in is the one the service is being resolved from,
/// except for singletons, which always receive the root.
pub type ServiceFactory = Arc<dyn Fn(&dyn Container) -> Result<AnyArc, ResolveError> + Send + Sync>;

#[derive(Clone)]
pub(crate) enum Source {
    Instance(AnyArc),
    Factory(ServiceFactory),
}

#[derive(Clone)]
pub(crate) struct Registration {
    pub(crate) key: ServiceKey,
    pub(crate) lifetime: ServiceLifetime,
    pub(crate) source: Source,
}

impl Registration {
    pub(crate) fn create(&self, container: &dyn Container) -> Result<AnyArc, ResolveError> {
        match &self.source {
            Source::Instance(instance) => Ok(instance.clone()),
            Source::Factory(factory) => factory(container),
        }
    }
}

/// Builder for a [`ServiceProvider`].
///
/// Registering the same service type twice replaces the earlier
/// registration.
///
/// # Example
///
/// ```rust,ignore
/// let mut services = ServiceCollection::new();
/// services
///     .add_singleton(Config::from_env())
///     .add_scoped_factory(|c| Ok(UnitOfWork::begin(c.resolve::<Pool>()?)));
/// let provider = services.build();
/// ```
#[derive(Default, Clone)]
pub struct ServiceCollection {
    registrations: HashMap<TypeId, Registration>,
}

impl ServiceCollection {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an existing instance as a singleton.
    pub fn add_singleton<T: Send + Sync + 'static>(&mut self, instance: T) -> &mut Self {
        self.add_shared(Arc::new(instance))
    }

    /// Register an already shared instance as a singleton.
    pub fn add_shared<T: Send + Sync + 'static>(&mut self, instance: Arc<T>) -> &mut Self {
        self.insert(Registration {
            key: ServiceKey::of::<T>(),
            lifetime: ServiceLifetime::Singleton,
            source: Source::Instance(instance),
        })
    }

    /// Register a singleton created lazily on first resolve.
    pub fn add_singleton_factory<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&dyn Container) -> Result<T, ResolveError> + Send + Sync + 'static,
    {
        self.add_factory(ServiceLifetime::Singleton, factory)
    }

    /// Register a service created once per scope.
    pub fn add_scoped_factory<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&dyn Container) -> Result<T, ResolveError> + Send + Sync + 'static,
    {
        self.add_factory(ServiceLifetime::Scoped, factory)
    }

    /// Register a service created on every resolve.
    pub fn add_transient_factory<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&dyn Container) -> Result<T, ResolveError> + Send + Sync + 'static,
    {
        self.add_factory(ServiceLifetime::Transient, factory)
    }

    /// Register a typed factory with an explicit lifetime.
    pub fn add_factory<T, F>(&mut self, lifetime: ServiceLifetime, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&dyn Container) -> Result<T, ResolveError> + Send + Sync + 'static,
    {
        let erased: ServiceFactory = Arc::new(move |container: &dyn Container| {
            factory(container).map(|service| Arc::new(service) as AnyArc)
        });
        self.add(ServiceKey::of::<T>(), lifetime, erased)
    }

    /// Register an erased factory under `key`.
    ///
    /// The factory must produce an instance whose concrete type matches the
    /// key, otherwise typed resolution fails with
    /// [`ResolveError::TypeMismatch`].
    pub fn add(&mut self, key: ServiceKey, lifetime: ServiceLifetime, factory: ServiceFactory) -> &mut Self {
        self.insert(Registration {
            key,
            lifetime,
            source: Source::Factory(factory),
        })
    }

    /// Returns `true` if `T` is registered.
    pub fn contains<T: ?Sized + 'static>(&self) -> bool {
        self.registrations.contains_key(&TypeId::of::<T>())
    }

    /// The lifetime `T` is registered with.
    pub fn lifetime_of<T: ?Sized + 'static>(&self) -> Option<ServiceLifetime> {
        self.registrations
            .get(&TypeId::of::<T>())
            .map(|registration| registration.lifetime)
    }

    /// The number of registered services.
    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Freeze the registrations into a root container.
    pub fn build(self) -> ServiceProvider {
        ServiceProvider::new(self.registrations)
    }

    fn insert(&mut self, registration: Registration) -> &mut Self {
        self.registrations
            .insert(registration.key.type_id(), registration);
        self
    }
}

impl fmt::Debug for ServiceCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(
                self.registrations
                    .values()
                    .map(|registration| (registration.key, registration.lifetime)),
            )
            .finish()
    }
}
