//! Root container and resource scopes.

use super::collection::{Registration, ServiceLifetime};
use courier_core::{AnyArc, Container, ContainerId, ResolveError, ServiceKey};
use dashmap::DashMap;
use std::{
    any::TypeId,
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex, PoisonError},
};

struct ProviderInner {
    id: ContainerId,
    registrations: HashMap<TypeId, Registration>,
    singletons: DashMap<TypeId, AnyArc>,
}

/// The root container.
///
/// Cheap to clone; clones share singletons. Scoped services can only be
/// resolved from a [`ServiceScope`].
#[derive(Clone)]
pub struct ServiceProvider {
    inner: Arc<ProviderInner>,
}

impl ServiceProvider {
    pub(crate) fn new(registrations: HashMap<TypeId, Registration>) -> Self {
        Self {
            inner: Arc::new(ProviderInner {
                id: ContainerId::next(),
                registrations,
                singletons: DashMap::new(),
            }),
        }
    }

    /// Open a typed scope.
    pub fn scope(&self) -> ServiceScope {
        ServiceScope::new(self.clone())
    }

    /// Returns `true` if `key` is registered.
    pub fn contains(&self, key: &ServiceKey) -> bool {
        self.inner.registrations.contains_key(&key.type_id())
    }

    fn registration(&self, key: &ServiceKey) -> Result<&Registration, ResolveError> {
        self.inner
            .registrations
            .get(&key.type_id())
            .ok_or(ResolveError::NotRegistered { service: key.name() })
    }

    fn singleton(&self, registration: &Registration) -> Result<AnyArc, ResolveError> {
        let type_id = registration.key.type_id();
        if let Some(existing) = self.inner.singletons.get(&type_id) {
            return Ok(existing.value().clone());
        }
        // Created outside the map lock; a racing resolve keeps the first instance.
        let created = registration.create(self)?;
        Ok(self
            .inner
            .singletons
            .entry(type_id)
            .or_insert(created)
            .value()
            .clone())
    }
}

impl Container for ServiceProvider {
    fn id(&self) -> ContainerId {
        self.inner.id
    }

    fn root_id(&self) -> ContainerId {
        self.inner.id
    }

    fn resolve_any(&self, key: &ServiceKey) -> Result<AnyArc, ResolveError> {
        let registration = self.registration(key)?;
        match registration.lifetime {
            ServiceLifetime::Singleton => self.singleton(registration),
            ServiceLifetime::Scoped => Err(ResolveError::ScopeRequired { service: key.name() }),
            ServiceLifetime::Transient => registration.create(self),
        }
    }

    fn create_scope(&self) -> Result<Box<dyn Container>, ResolveError> {
        Ok(Box::new(self.scope()))
    }
}

impl fmt::Debug for ServiceProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceProvider")
            .field("id", &self.inner.id)
            .field("services", &self.inner.registrations.len())
            .field("singletons", &self.inner.singletons.len())
            .finish()
    }
}

/// A resource scope: scoped services live exactly as long as the scope.
///
/// Dropping the scope releases every scoped instance it created.
pub struct ServiceScope {
    id: ContainerId,
    root: ServiceProvider,
    scoped: Mutex<HashMap<TypeId, AnyArc>>,
}

impl ServiceScope {
    fn new(root: ServiceProvider) -> Self {
        let id = ContainerId::next();
        tracing::debug!(scope = %id, root = %root.id(), "service scope opened");
        Self {
            id,
            root,
            scoped: Mutex::new(HashMap::new()),
        }
    }

    /// The root container this scope belongs to.
    pub fn root(&self) -> &ServiceProvider {
        &self.root
    }

    fn scoped(&self, registration: &Registration) -> Result<AnyArc, ResolveError> {
        let type_id = registration.key.type_id();
        if let Some(existing) = self.instances().get(&type_id) {
            return Ok(existing.clone());
        }
        // Factories may resolve other scoped services, so the lock is not held.
        let created = registration.create(self)?;
        Ok(self.instances().entry(type_id).or_insert(created).clone())
    }

    fn instances(&self) -> std::sync::MutexGuard<'_, HashMap<TypeId, AnyArc>> {
        self.scoped.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Container for ServiceScope {
    fn id(&self) -> ContainerId {
        self.id
    }

    fn root_id(&self) -> ContainerId {
        self.root.id()
    }

    fn resolve_any(&self, key: &ServiceKey) -> Result<AnyArc, ResolveError> {
        let registration = self.root.registration(key)?;
        match registration.lifetime {
            ServiceLifetime::Singleton => self.root.singleton(registration),
            ServiceLifetime::Scoped => self.scoped(registration),
            ServiceLifetime::Transient => registration.create(self),
        }
    }

    fn create_scope(&self) -> Result<Box<dyn Container>, ResolveError> {
        Ok(Box::new(self.root.scope()))
    }
}

impl Drop for ServiceScope {
    fn drop(&mut self) {
        let instances = self.scoped.get_mut().unwrap_or_else(PoisonError::into_inner);
        tracing::debug!(scope = %self.id, instances = instances.len(), "service scope released");
        instances.clear();
    }
}

impl fmt::Debug for ServiceScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceScope")
            .field("id", &self.id)
            .field("root", &self.root.id())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::ServiceCollection;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Config(&'static str);

    #[derive(Debug)]
    struct UnitOfWork {
        released: Arc<AtomicUsize>,
    }

    impl Drop for UnitOfWork {
        fn drop(&mut self) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn provider(created: Arc<AtomicUsize>, released: Arc<AtomicUsize>) -> ServiceProvider {
        let mut services = ServiceCollection::new();
        services
            .add_singleton(Config("prod"))
            .add_scoped_factory(move |_| {
                created.fetch_add(1, Ordering::SeqCst);
                Ok(UnitOfWork {
                    released: released.clone(),
                })
            })
            .add_transient_factory(|c| Ok(c.resolve::<Config>()?.0.len()));
        services.build()
    }

    #[test]
    fn test_root_refuses_scoped_services() {
        let root = provider(Arc::default(), Arc::default());
        let root: &dyn Container = &root;

        assert!(root.resolve::<Config>().is_ok());
        let err = root.resolve::<UnitOfWork>().unwrap_err();
        assert!(err.is_scope_required());
        assert!(matches!(
            root.resolve::<String>(),
            Err(ResolveError::NotRegistered { .. })
        ));
    }

    #[test]
    fn test_scope_caches_and_releases_scoped_instances() {
        let created = Arc::new(AtomicUsize::new(0));
        let released = Arc::new(AtomicUsize::new(0));
        let root = provider(created.clone(), released.clone());

        {
            let scope = root.create_scope().unwrap();
            let a = scope.resolve::<UnitOfWork>().unwrap();
            let b = scope.resolve::<UnitOfWork>().unwrap();
            assert!(Arc::ptr_eq(&a, &b));
            assert_eq!(scope.root_id(), root.id());
            assert!(scope.is_scope());
        }

        assert_eq!(created.load(Ordering::SeqCst), 1);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_singletons_are_shared_across_scopes() {
        let root = provider(Arc::default(), Arc::default());
        let first = root.create_scope().unwrap().resolve::<Config>().unwrap();
        let second = root.create_scope().unwrap().resolve::<Config>().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_transients_are_fresh() {
        let root = provider(Arc::default(), Arc::default());
        let root: &dyn Container = &root;
        let a = root.resolve::<usize>().unwrap();
        let b = root.resolve::<usize>().unwrap();
        assert_eq!(*a, 4);
        assert!(!Arc::ptr_eq(&a, &b));
    }
}
