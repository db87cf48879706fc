//! Testing utilities for courier.
//!
//! This module provides utilities to make testing pipelines, handlers and
//! cache integrations easier.
//!
//! # Features
//!
//! - [`RecordingLog`]: A shared, ordered log of pipeline events
//! - [`RecordingBehavior`]: A behavior that writes its name to a log
//! - [`CallCounter`]: A shared invocation counter for handlers
//! - [`FailingCacheProvider`]: A cache provider whose every operation fails

use courier_core::{
    Behavior, BoxError, CacheProvider, CacheValue, CourierError, Next, Payload, PayloadStream,
    RequestContext, StreamBehavior, StreamNext,
};
use std::{
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

// ============================================================================
// Recording Log
// ============================================================================

/// An ordered log shared between test fixtures.
///
/// Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct RecordingLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl RecordingLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry.
    pub fn push(&self, entry: impl Into<String>) {
        self.lock().push(entry.into());
    }

    /// Get a copy of every entry, in order.
    pub fn entries(&self) -> Vec<String> {
        self.lock().clone()
    }

    /// Get the number of entries.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Clear all entries.
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ============================================================================
// Recording Behavior
// ============================================================================

/// A behavior that records its name and then runs the rest of the pipeline.
///
/// Useful for verifying pipeline order.
///
/// # Example
///
/// ```rust,ignore
/// let log = RecordingLog::new();
/// builder
///     .register_behavior_instance(RecordingBehavior::new("A", log.clone()))
///     .register_behavior_instance(RecordingBehavior::new("B", log.clone()));
///
/// dispatcher.dispatch(Ping).await?;
/// assert_eq!(log.entries(), ["B", "A"]);
/// ```
#[derive(Debug, Clone)]
pub struct RecordingBehavior {
    name: &'static str,
    log: RecordingLog,
}

impl RecordingBehavior {
    /// Create a recording behavior writing to `log`.
    pub fn new(name: &'static str, log: RecordingLog) -> Self {
        Self { name, log }
    }

    /// The name written to the log.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl Behavior for RecordingBehavior {
    async fn handle(&self, _cx: &RequestContext<'_>, next: Next<'_>) -> Result<Payload, CourierError> {
        self.log.push(self.name);
        next.run().await
    }
}

impl StreamBehavior for RecordingBehavior {
    fn handle<'a>(&'a self, _cx: &'a RequestContext<'a>, next: StreamNext<'a>) -> PayloadStream<'a> {
        self.log.push(self.name);
        next.run()
    }
}

// ============================================================================
// Call Counter
// ============================================================================

/// A shared invocation counter.
///
/// # Example
///
/// ```rust,ignore
/// let counter = CallCounter::new();
/// let handler = GetQuoteHandler { calls: counter.clone() };
///
/// // Dispatch twice...
///
/// assert_eq!(counter.count(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct CallCounter {
    count: Arc<AtomicUsize>,
}

impl CallCounter {
    /// Create a new counter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one call, returning the number of calls before it.
    pub fn increment(&self) -> usize {
        self.count.fetch_add(1, Ordering::SeqCst)
    }

    /// Get the current count.
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// Reset the counter.
    pub fn reset(&self) {
        self.count.store(0, Ordering::SeqCst);
    }
}

// ============================================================================
// Failing Cache Provider
// ============================================================================

/// The error reported by [`FailingCacheProvider`].
#[derive(Debug, thiserror::Error)]
#[error("cache provider unavailable")]
pub struct CacheUnavailable;

/// A cache provider that fails every lookup and store.
///
/// Counts attempts so tests can check that the provider was consulted.
#[derive(Debug, Clone, Default)]
pub struct FailingCacheProvider {
    attempts: CallCounter,
}

impl FailingCacheProvider {
    /// Create a new failing provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of lookups and stores attempted.
    pub fn attempts(&self) -> usize {
        self.attempts.count()
    }
}

impl CacheProvider for FailingCacheProvider {
    async fn try_get(&self, _key: &str) -> Result<Option<CacheValue>, BoxError> {
        self.attempts.increment();
        Err(Box::new(CacheUnavailable))
    }

    async fn set(&self, _key: &str, _value: CacheValue, _ttl: Duration) -> Result<(), BoxError> {
        self.attempts.increment();
        Err(Box::new(CacheUnavailable))
    }
}
