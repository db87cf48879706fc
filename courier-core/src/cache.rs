//! Cache policy and cache provider contracts.
//!
//! The caching behavior is type-erased: it sees a [`Payload`] rather than a
//! concrete response. [`CachePolicy`] captures the monomorphized conversion
//! functions while the request is still strongly typed, so the behavior can
//! store and restore responses without any runtime type synthesis.

use crate::{context::Payload, error::BoxError};
use std::{any::Any, future::Future, marker::PhantomData, pin::Pin, sync::Arc, time::Duration};

/// A value stored by a cache provider.
pub type CacheValue = Arc<dyn Any + Send + Sync>;

/// Declares how a response may be cached.
///
/// Returned from [`Request::cache_policy`](crate::Request::cache_policy).
pub struct CachePolicy<T> {
    key: String,
    ttl: Option<Duration>,
    codec: CacheCodec,
    _response: PhantomData<fn() -> T>,
}

impl<T> CachePolicy<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Cache the response under `key` with the provider's default TTL.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ttl: None,
            codec: CacheCodec {
                encode: encode::<T>,
                decode: decode::<T>,
            },
            _response: PhantomData,
        }
    }
}

impl<T> CachePolicy<T> {
    /// Override the time-to-live for this entry.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// The cache key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The declared TTL, if any.
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Drop the response type, keeping the conversion functions.
    pub fn erase(self) -> ErasedCachePolicy {
        ErasedCachePolicy {
            key: self.key,
            ttl: self.ttl,
            codec: self.codec,
        }
    }
}

#[derive(Clone, Copy)]
struct CacheCodec {
    encode: fn(&Payload) -> Option<CacheValue>,
    decode: fn(&CacheValue) -> Option<Payload>,
}

fn encode<T: Clone + Send + Sync + 'static>(payload: &Payload) -> Option<CacheValue> {
    payload
        .downcast_ref::<T>()
        .map(|value| Arc::new(value.clone()) as CacheValue)
}

fn decode<T: Clone + Send + Sync + 'static>(value: &CacheValue) -> Option<Payload> {
    value
        .downcast_ref::<T>()
        .map(|value| Box::new(value.clone()) as Payload)
}

/// A [`CachePolicy`] with its response type erased.
pub struct ErasedCachePolicy {
    key: String,
    ttl: Option<Duration>,
    codec: CacheCodec,
}

impl ErasedCachePolicy {
    /// The cache key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The declared TTL, if any.
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Convert a pipeline payload into a storable value.
    ///
    /// Returns `None` if the payload is not the declared response type.
    pub fn encode(&self, payload: &Payload) -> Option<CacheValue> {
        (self.codec.encode)(payload)
    }

    /// Restore a payload from a stored value.
    ///
    /// Returns `None` if the stored value has another type; callers treat
    /// that as a miss.
    pub fn decode(&self, value: &CacheValue) -> Option<Payload> {
        (self.codec.decode)(value)
    }
}

impl std::fmt::Debug for ErasedCachePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErasedCachePolicy")
            .field("key", &self.key)
            .field("ttl", &self.ttl)
            .finish()
    }
}

/// A pluggable TTL key-value store used by the caching behavior.
///
/// No transactional guarantees are required. Errors are treated exactly like
/// misses by the caching behavior.
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not a courier `CacheProvider`",
    label = "missing `CacheProvider` implementation",
    note = "Cache providers must implement `try_get` and `set`."
)]
pub trait CacheProvider: Send + Sync + 'static {
    /// Look up a value.
    fn try_get(&self, key: &str) -> impl Future<Output = Result<Option<CacheValue>, BoxError>> + Send;

    /// Store a value that expires after `ttl`.
    fn set(
        &self,
        key: &str,
        value: CacheValue,
        ttl: Duration,
    ) -> impl Future<Output = Result<(), BoxError>> + Send;
}

/// Dynamic object-safe version of [`CacheProvider`].
pub trait DynCacheProvider: Send + Sync + 'static {
    /// Look up a value (dynamic dispatch version).
    fn try_get_dyn<'a>(
        &'a self,
        key: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<CacheValue>, BoxError>> + Send + 'a>>;

    /// Store a value (dynamic dispatch version).
    fn set_dyn<'a>(
        &'a self,
        key: &'a str,
        value: CacheValue,
        ttl: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<(), BoxError>> + Send + 'a>>;
}

impl<T: CacheProvider> DynCacheProvider for T {
    fn try_get_dyn<'a>(
        &'a self,
        key: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<CacheValue>, BoxError>> + Send + 'a>> {
        Box::pin(self.try_get(key))
    }

    fn set_dyn<'a>(
        &'a self,
        key: &'a str,
        value: CacheValue,
        ttl: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<(), BoxError>> + Send + 'a>> {
        Box::pin(self.set(key, value, ttl))
    }
}
