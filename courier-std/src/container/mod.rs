//! # Service container
//!
//! The default [`Container`](courier_core::Container) implementation:
//!
//! - [`ServiceCollection`] - registrations, built once at startup
//! - [`ServiceProvider`] - the root container; owns singletons
//! - [`ServiceScope`] - a resource scope; owns scoped instances and
//!   releases them when dropped
//!
//! | Lifetime | Root | Scope |
//! |---|---|---|
//! | Singleton | created once, shared | delegated to the root |
//! | Scoped | `ResolveError::ScopeRequired` | created once per scope |
//! | Transient | created per resolve | created per resolve |

mod collection;
mod provider;

pub use collection::{ServiceCollection, ServiceFactory, ServiceLifetime};
pub use provider::{ServiceProvider, ServiceScope};
