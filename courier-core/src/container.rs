//! # Container boundary
//!
//! The dispatcher needs exactly three things from a service container:
//! resolve a service, create a nested scope, and know which root a scope
//! belongs to. [`Container`] is that boundary; `courier-std` ships the
//! default implementation.
//!
//! Scopes are released by dropping the `Box<dyn Container>` returned from
//! [`Container::create_scope`].

use crate::error::ResolveError;
use std::{
    any::{Any, TypeId},
    fmt,
    hash::{Hash, Hasher},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

/// A shared, type-erased service instance.
pub type AnyArc = Arc<dyn Any + Send + Sync>;

/// How long a resolved handler may be reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Lifetime {
    /// Resolved once per root container and reused by every call.
    Reusable,
    /// Resolved fresh for every call.
    #[default]
    CallScoped,
    /// Resolved from a resource scope that lives exactly as long as the call.
    ScopeScoped,
}

/// Identifies a registered service.
#[derive(Clone, Copy)]
pub struct ServiceKey {
    type_id: TypeId,
    name: &'static str,
}

impl ServiceKey {
    /// The key of service type `T`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// The service's type id.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// The service's type name.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for ServiceKey {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ServiceKey {}

impl Hash for ServiceKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServiceKey({})", self.name)
    }
}

/// Process-unique identity of a container or scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContainerId(u64);

static NEXT_CONTAINER_ID: AtomicU64 = AtomicU64::new(1);

impl ContainerId {
    /// Allocate a fresh id.
    pub fn next() -> Self {
        Self(NEXT_CONTAINER_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw id.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A service container as seen by the dispatcher.
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not a courier `Container`",
    label = "missing `Container` implementation",
    note = "Containers must implement `resolve_any` and `create_scope`."
)]
pub trait Container: Send + Sync {
    /// This container's identity.
    fn id(&self) -> ContainerId;

    /// The identity of the root this container belongs to.
    ///
    /// A root container returns its own id.
    fn root_id(&self) -> ContainerId;

    /// Returns `true` for scopes, `false` for root containers.
    fn is_scope(&self) -> bool {
        self.id() != self.root_id()
    }

    /// Resolve a service instance.
    ///
    /// Root containers must fail with [`ResolveError::ScopeRequired`] for
    /// scope-bound services.
    fn resolve_any(&self, key: &ServiceKey) -> Result<AnyArc, ResolveError>;

    /// Open a nested resource scope, released when the box is dropped.
    fn create_scope(&self) -> Result<Box<dyn Container>, ResolveError>;
}

impl dyn Container + '_ {
    /// Resolve a service and downcast it to `T`.
    pub fn resolve<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, ResolveError> {
        let key = ServiceKey::of::<T>();
        self.resolve_any(&key)?
            .downcast::<T>()
            .map_err(|_| ResolveError::TypeMismatch { service: key.name() })
    }
}

impl fmt::Debug for dyn Container + '_ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("id", &self.id())
            .field("root", &self.root_id())
            .finish()
    }
}
