//! # courier - In-Process Request Dispatch
//!
//! `courier` sends a request value to the single handler bound to its type,
//! through an ordered pipeline of behaviors.
//!
//! ```text
//! caller -> dispatch(request)
//!        -> b_n -> ... -> b_1 -> handler
//!        <- response (or error, unchanged by the pipeline)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use courier::prelude::*;
//!
//! struct GetGreeting { name: String }
//!
//! impl Request for GetGreeting {
//!     type Response = String;
//! }
//!
//! struct GreetingHandler;
//!
//! impl Handler<GetGreeting> for GreetingHandler {
//!     async fn handle(&self, req: &GetGreeting, _cancel: &CancellationToken) -> Result<String, CourierError> {
//!         Ok(format!("Hello, {}!", req.name))
//!     }
//! }
//!
//! let dispatcher = DispatcherBuilder::new()
//!     .use_logging()
//!     .register_handler_instance::<GetGreeting, _>(GreetingHandler)?
//!     .build()?;
//!
//! let greeting = dispatcher.dispatch(GetGreeting { name: "Ada".into() }).await?;
//! ```
//!
//! ## Lifetimes
//!
//! | [`Lifetime`] | Handler and behaviors resolved |
//! |---|---|
//! | `Reusable` | once per root container, then reused; per call inside a scope |
//! | `CallScoped` | on every dispatch |
//! | `ScopeScoped` | on every dispatch, inside a resource scope released when the call ends |
//!
//! ## Streams
//!
//! [`Dispatcher::dispatch_stream`] is lazy: nothing is resolved, and no
//! error surfaces, until the returned stream is first polled.

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

mod builder;
mod cache;
mod dispatcher;
mod lifetime;
mod pipeline;
mod presets;
mod registry;
mod stream;

#[cfg(feature = "tower")]
mod tower;

pub use builder::DispatcherBuilder;
pub use dispatcher::Dispatcher;

#[cfg(feature = "tower")]
pub use crate::tower::ServiceHandler;

pub use courier_core::{
    AnyRequest, Behavior, BoxError, CachePolicy, CacheProvider, CacheValue, CancellationToken,
    ClosedBehavior, ClosedStreamBehavior, ConfigError, Container, ContainerId, CourierError,
    DynBehavior, DynCacheProvider, DynHandler, DynValidator, ErasedCachePolicy, Handler, Lifetime,
    Next, Payload, PayloadStream, Request, RequestBehavior, RequestContext, RequestStreamBehavior,
    ResolveError, ServiceKey, StreamBehavior, StreamHandler, StreamNext, StreamRequest, TypedNext,
    TypedStreamNext, ValidationError, ValidationFailure, Validator, downcast_item,
    downcast_response,
};

/// Standard behaviors.
pub mod behaviors {
    pub use courier_std::behaviors::{
        CachingBehavior, CachingOptions, LoggingBehavior, StreamLoggingBehavior, TimeoutBehavior,
        ValidationBehavior, ValidatorTable,
    };
}

/// Cache providers.
pub mod cache_providers {
    pub use courier_std::cache::MemoryCache;
}

/// The default service container.
pub mod container {
    pub use courier_std::container::{
        ServiceCollection, ServiceFactory, ServiceLifetime, ServiceProvider, ServiceScope,
    };
}

/// Handler decorators.
pub mod handlers {
    pub use courier_std::handlers::{Retry, RetryPolicy};
}

/// Testing utilities.
pub mod testing {
    pub use courier_std::testing::{
        CacheUnavailable, CallCounter, FailingCacheProvider, RecordingBehavior, RecordingLog,
    };
}

/// Prelude module - common imports for courier.
///
/// # Usage
///
/// ```rust,ignore
/// use courier::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        Behavior, CachePolicy, CancellationToken, ConfigError, Container, CourierError, Dispatcher,
        DispatcherBuilder, Handler, Lifetime, Next, Payload, Request, RequestBehavior,
        RequestContext, StreamHandler, StreamRequest, TypedNext, ValidationFailure, Validator,
    };
}

#[cfg(feature = "macros")]
pub use courier_macros::{Request, StreamRequest};
