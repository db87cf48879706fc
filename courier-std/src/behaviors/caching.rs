//! Response caching.

use courier_core::{Behavior, CourierError, DynCacheProvider, Next, Payload, RequestContext};
use std::{sync::Arc, time::Duration};

/// Settings for [`CachingBehavior`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachingOptions {
    /// TTL used when a request's cache policy declares none.
    pub default_ttl: Duration,
    /// Prepended to every key, e.g. to share one provider between services.
    pub key_prefix: Option<String>,
}

impl CachingOptions {
    /// The default TTL: five minutes.
    pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

    /// Create options with the default TTL and no key prefix.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the default TTL.
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Set the key prefix.
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }
}

impl Default for CachingOptions {
    fn default() -> Self {
        Self {
            default_ttl: Self::DEFAULT_TTL,
            key_prefix: None,
        }
    }
}

/// Serves cacheable requests from a [`CacheProvider`](courier_core::CacheProvider).
///
/// Requests without a cache policy pass straight through. For cacheable
/// requests a hit returns the stored response without running the rest of
/// the pipeline; a miss runs it and stores the result. Provider errors are
/// logged and treated as misses.
pub struct CachingBehavior {
    provider: Arc<dyn DynCacheProvider>,
    options: CachingOptions,
}

impl CachingBehavior {
    /// Create a caching behavior with default options.
    pub fn new(provider: Arc<dyn DynCacheProvider>) -> Self {
        Self::with_options(provider, CachingOptions::default())
    }

    /// Create a caching behavior with explicit options.
    pub fn with_options(provider: Arc<dyn DynCacheProvider>, options: CachingOptions) -> Self {
        Self { provider, options }
    }

    /// The active options.
    pub fn options(&self) -> &CachingOptions {
        &self.options
    }

    fn key_for(&self, key: &str) -> String {
        match &self.options.key_prefix {
            Some(prefix) => format!("{prefix}{key}"),
            None => key.to_owned(),
        }
    }
}

impl Behavior for CachingBehavior {
    async fn handle(&self, cx: &RequestContext<'_>, next: Next<'_>) -> Result<Payload, CourierError> {
        let Some(policy) = cx.cache_policy() else {
            return next.run().await;
        };
        let key = self.key_for(policy.key());

        match self.provider.try_get_dyn(&key).await {
            Ok(Some(value)) => match policy.decode(&value) {
                Some(payload) => {
                    tracing::debug!(request = %cx.request_name(), %key, "cache hit");
                    return Ok(payload);
                }
                None => tracing::warn!(
                    request = %cx.request_name(),
                    %key,
                    "cached value has an unexpected type; treating as miss"
                ),
            },
            Ok(None) => tracing::debug!(request = %cx.request_name(), %key, "cache miss"),
            Err(err) => tracing::warn!(
                request = %cx.request_name(),
                %key,
                error = %err,
                "cache lookup failed; treating as miss"
            ),
        }

        let payload = next.run().await?;

        if let Some(value) = policy.encode(&payload) {
            let ttl = policy.ttl().unwrap_or(self.options.default_ttl);
            if let Err(err) = self.provider.set_dyn(&key, value, ttl).await {
                tracing::warn!(
                    request = %cx.request_name(),
                    %key,
                    error = %err,
                    "cache store failed"
                );
            }
        }
        Ok(payload)
    }
}

impl std::fmt::Debug for CachingBehavior {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachingBehavior")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
