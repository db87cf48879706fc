//! Request traits.
//!
//! A request is an immutable value whose runtime type selects exactly one
//! handler. Its associated `Response` (or `Item`, for streams) fixes what the
//! caller gets back.

use crate::cache::CachePolicy;
use std::any::Any;

/// A value that is routed to exactly one [`Handler`](crate::Handler).
///
/// # Example
///
/// ```rust,ignore
/// struct GetUser { id: u64 }
///
/// impl Request for GetUser {
///     type Response = User;
/// }
/// ```
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not a courier `Request`",
    label = "missing `Request` implementation",
    note = "Requests must declare their `Response` type and be `Send + Sync + 'static`."
)]
pub trait Request: Send + Sync + 'static {
    /// The value produced by the request's handler.
    type Response: Send + 'static;

    /// Declares this request cacheable.
    ///
    /// The caching behavior only engages when this returns `Some`; otherwise
    /// it is a pure pass-through.
    fn cache_policy(&self) -> Option<CachePolicy<Self::Response>> {
        None
    }
}

/// A value that is routed to exactly one [`StreamHandler`](crate::StreamHandler)
/// and answered with a lazy sequence of items.
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not a courier `StreamRequest`",
    label = "missing `StreamRequest` implementation",
    note = "Stream requests must declare their `Item` type and be `Send + Sync + 'static`."
)]
pub trait StreamRequest: Send + Sync + 'static {
    /// The type of each produced item.
    type Item: Send + 'static;
}

/// Object-safe view of any [`Request`], used for runtime-typed dispatch.
pub trait AnyRequest: Send + Sync + 'static {
    /// The request as `Any`, for downcasting to its concrete type.
    fn as_any(&self) -> &(dyn Any + Send + Sync);

    /// The concrete request type name.
    fn request_name(&self) -> &'static str;
}

impl<R: Request> AnyRequest for R {
    fn as_any(&self) -> &(dyn Any + Send + Sync) {
        self
    }

    fn request_name(&self) -> &'static str {
        std::any::type_name::<R>()
    }
}
