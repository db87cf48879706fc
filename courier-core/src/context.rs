//! # Request Context
//!
//! The type-erased view of an in-flight request that open behaviors receive.
//!
//! Open behaviors apply to every request type, so they cannot name the
//! request or response type. Instead they get a [`RequestContext`] (type
//! identity, downcasting, cache policy, cancellation) and exchange responses
//! as a [`Payload`].

use crate::{
    cache::ErasedCachePolicy,
    request::{Request, StreamRequest},
};
use std::any::{Any, TypeId};
use tokio_util::sync::CancellationToken;

/// A type-erased response (or stream item) flowing through a pipeline.
pub type Payload = Box<dyn Any + Send>;

/// The view of a request shared by every behavior of one call.
///
/// All behaviors of a call observe the same request instance.
pub struct RequestContext<'a> {
    request: &'a (dyn Any + Send + Sync),
    type_id: TypeId,
    request_name: &'static str,
    response_name: &'static str,
    cache_policy: fn(&(dyn Any + Send + Sync)) -> Option<ErasedCachePolicy>,
    cancel: &'a CancellationToken,
}

impl<'a> RequestContext<'a> {
    /// Build the context for a single-response request.
    pub fn new<R: Request>(request: &'a R, cancel: &'a CancellationToken) -> Self {
        Self {
            request,
            type_id: TypeId::of::<R>(),
            request_name: std::any::type_name::<R>(),
            response_name: std::any::type_name::<R::Response>(),
            cache_policy: cache_policy_of::<R>,
            cancel,
        }
    }

    /// Build the context for a stream request.
    pub fn for_stream<R: StreamRequest>(request: &'a R, cancel: &'a CancellationToken) -> Self {
        Self {
            request,
            type_id: TypeId::of::<R>(),
            request_name: std::any::type_name::<R>(),
            response_name: std::any::type_name::<R::Item>(),
            cache_policy: no_cache_policy,
            cancel,
        }
    }

    /// The request's runtime type.
    pub fn request_type(&self) -> TypeId {
        self.type_id
    }

    /// The request's type name.
    pub fn request_name(&self) -> &'static str {
        self.request_name
    }

    /// The response (or item) type name.
    pub fn response_name(&self) -> &'static str {
        self.response_name
    }

    /// Returns `true` if the request is an `R`.
    pub fn is<R: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<R>()
    }

    /// Borrow the request as its concrete type.
    pub fn downcast_ref<R: 'static>(&self) -> Option<&'a R> {
        self.request.downcast_ref::<R>()
    }

    /// The request itself, type-erased.
    pub fn request(&self) -> &'a (dyn Any + Send + Sync) {
        self.request
    }

    /// The request's cache policy, computed on demand.
    ///
    /// Requests that never declared one pay nothing for it.
    pub fn cache_policy(&self) -> Option<ErasedCachePolicy> {
        (self.cache_policy)(self.request)
    }

    /// The cancellation signal for this call.
    pub fn cancellation(&self) -> &'a CancellationToken {
        self.cancel
    }

    /// Shorthand for `self.cancellation().is_cancelled()`.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl std::fmt::Debug for RequestContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("request", &self.request_name)
            .field("response", &self.response_name)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

fn cache_policy_of<R: Request>(request: &(dyn Any + Send + Sync)) -> Option<ErasedCachePolicy> {
    request
        .downcast_ref::<R>()
        .and_then(|request| request.cache_policy())
        .map(|policy| policy.erase())
}

fn no_cache_policy(_: &(dyn Any + Send + Sync)) -> Option<ErasedCachePolicy> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CachePolicy;

    struct Lookup {
        id: u32,
    }

    impl Request for Lookup {
        type Response = String;

        fn cache_policy(&self) -> Option<CachePolicy<String>> {
            Some(CachePolicy::new(format!("lookup:{}", self.id)))
        }
    }

    struct Plain;

    impl Request for Plain {
        type Response = ();
    }

    #[test]
    fn test_context_exposes_request_identity() {
        let cancel = CancellationToken::new();
        let request = Lookup { id: 7 };
        let cx = RequestContext::new(&request, &cancel);

        assert!(cx.is::<Lookup>());
        assert!(!cx.is::<Plain>());
        assert_eq!(cx.downcast_ref::<Lookup>().map(|r| r.id), Some(7));
        assert!(cx.request_name().ends_with("Lookup"));
        assert_eq!(cx.response_name(), std::any::type_name::<String>());
    }

    #[test]
    fn test_cache_policy_is_computed_from_typed_request() {
        let cancel = CancellationToken::new();
        let cacheable = Lookup { id: 3 };
        let plain = Plain;

        let policy = RequestContext::new(&cacheable, &cancel).cache_policy();
        assert_eq!(policy.as_ref().map(|p| p.key()), Some("lookup:3"));
        assert!(RequestContext::new(&plain, &cancel).cache_policy().is_none());
    }
}
