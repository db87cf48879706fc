use courier::{
    BoxError, CacheProvider, CacheValue, ConfigError, DispatcherBuilder,
    behaviors::CachingOptions,
    cache_providers::MemoryCache,
    testing::FailingCacheProvider,
};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

mod common;
use common::{GetQuote, Greet, GreetHandler, QuoteHandler};

/// A provider that never expires anything.
#[derive(Default)]
struct MapCache {
    entries: Mutex<HashMap<String, CacheValue>>,
}

impl CacheProvider for MapCache {
    async fn try_get(&self, key: &str) -> Result<Option<CacheValue>, BoxError> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: CacheValue, _ttl: Duration) -> Result<(), BoxError> {
        self.entries.lock().unwrap().insert(key.to_owned(), value);
        Ok(())
    }
}

#[tokio::test]
async fn test_cached_response_is_reused() {
    let quotes = QuoteHandler::default();
    let calls = quotes.calls.clone();
    let dispatcher = DispatcherBuilder::new()
        .configure_caching(Arc::new(MemoryCache::new()))
        .use_caching()
        .register_handler_instance::<GetQuote, _>(quotes)
        .unwrap()
        .build()
        .unwrap();

    let first = dispatcher.dispatch(GetQuote { symbol: "ACME" }).await.unwrap();
    let second = dispatcher.dispatch(GetQuote { symbol: "ACME" }).await.unwrap();

    assert_eq!(first, 100);
    assert_eq!(second, 100);
    assert_eq!(calls.count(), 1);
}

#[tokio::test]
async fn test_distinct_keys_are_cached_separately() {
    let quotes = QuoteHandler::default();
    let calls = quotes.calls.clone();
    let dispatcher = DispatcherBuilder::new()
        .configure_caching(Arc::new(MemoryCache::new()))
        .use_caching()
        .register_handler_instance::<GetQuote, _>(quotes)
        .unwrap()
        .build()
        .unwrap();

    assert_eq!(dispatcher.dispatch(GetQuote { symbol: "ACME" }).await.unwrap(), 100);
    assert_eq!(dispatcher.dispatch(GetQuote { symbol: "INIT" }).await.unwrap(), 101);
    assert_eq!(dispatcher.dispatch(GetQuote { symbol: "ACME" }).await.unwrap(), 100);
    assert_eq!(calls.count(), 2);
}

#[tokio::test]
async fn test_providers_are_interchangeable() {
    async fn handler_calls(provider: DispatcherBuilder) -> usize {
        let quotes = QuoteHandler::default();
        let calls = quotes.calls.clone();
        let dispatcher = provider
            .use_caching()
            .register_handler_instance::<GetQuote, _>(quotes)
            .unwrap()
            .build()
            .unwrap();
        for symbol in ["ACME", "ACME", "INIT", "ACME"] {
            dispatcher.dispatch(GetQuote { symbol }).await.unwrap();
        }
        calls.count()
    }

    let memory = handler_calls(DispatcherBuilder::new().configure_caching(Arc::new(MemoryCache::new()))).await;
    let map = handler_calls(DispatcherBuilder::new().configure_caching(Arc::new(MapCache::default()))).await;

    assert_eq!(memory, 2);
    assert_eq!(memory, map);
}

#[tokio::test]
async fn test_provider_failure_is_a_miss() {
    let provider = Arc::new(FailingCacheProvider::new());
    let quotes = QuoteHandler::default();
    let calls = quotes.calls.clone();
    let dispatcher = DispatcherBuilder::new()
        .configure_caching(provider.clone())
        .use_caching()
        .register_handler_instance::<GetQuote, _>(quotes)
        .unwrap()
        .build()
        .unwrap();

    assert_eq!(dispatcher.dispatch(GetQuote { symbol: "ACME" }).await.unwrap(), 100);
    assert_eq!(dispatcher.dispatch(GetQuote { symbol: "ACME" }).await.unwrap(), 101);

    assert_eq!(calls.count(), 2);
    // one lookup and one store per dispatch
    assert_eq!(provider.attempts(), 4);
}

#[tokio::test]
async fn test_key_prefix_is_applied() {
    let cache = Arc::new(MemoryCache::new());
    let dispatcher = DispatcherBuilder::new()
        .configure_caching_with(cache.clone(), CachingOptions::new().with_key_prefix("svc:"))
        .use_caching()
        .register_handler_instance::<GetQuote, _>(QuoteHandler::default())
        .unwrap()
        .build()
        .unwrap();

    dispatcher.dispatch(GetQuote { symbol: "ACME" }).await.unwrap();

    assert!(cache.contains_key("svc:quote:ACME"));
    assert!(!cache.contains_key("quote:ACME"));
}

#[tokio::test]
async fn test_requests_without_policy_are_not_cached() {
    let cache = Arc::new(MemoryCache::new());
    let dispatcher = DispatcherBuilder::new()
        .configure_caching(cache.clone())
        .use_caching()
        .register_handler_instance::<Greet, _>(GreetHandler)
        .unwrap()
        .build()
        .unwrap();

    assert_eq!(dispatcher.dispatch(Greet("hi")).await.unwrap(), "hi");
    assert!(cache.is_empty());
}

#[test]
fn test_caching_without_provider_fails_to_build() {
    let err = DispatcherBuilder::new().use_caching().build().unwrap_err();
    assert_eq!(err, ConfigError::MissingCacheProvider);
}
