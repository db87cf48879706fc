//! Resolution cache.
//!
//! One entry per request type, holding the wrapper built on the first
//! dispatch of that type. Only successful constructions are stored; a
//! failed lookup is recomputed on the next dispatch.

use dashmap::DashMap;
use std::{any::TypeId, fmt, sync::Arc};

pub(crate) struct ResolutionCache<W: ?Sized> {
    entries: DashMap<TypeId, Arc<W>>,
}

impl<W: ?Sized> ResolutionCache<W> {
    pub(crate) fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub(crate) fn get(&self, key: TypeId) -> Option<Arc<W>> {
        self.entries.get(&key).map(|entry| Arc::clone(entry.value()))
    }

    /// Return the cached wrapper for `key`, constructing it if missing.
    ///
    /// Construction runs outside the map lock. When two callers race, both
    /// may construct, but only the first stored wrapper is ever returned.
    pub(crate) fn get_or_try_insert<E>(
        &self,
        key: TypeId,
        create: impl FnOnce() -> Result<Arc<W>, E>,
    ) -> Result<Arc<W>, E> {
        if let Some(hit) = self.get(key) {
            return Ok(hit);
        }
        let created = create()?;
        Ok(Arc::clone(self.entries.entry(key).or_insert(created).value()))
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

impl<W: ?Sized> Default for ResolutionCache<W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: ?Sized> fmt::Debug for ResolutionCache<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolutionCache")
            .field("entries", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Ping;
    struct Pong;

    #[test]
    fn test_construction_happens_once() {
        let cache: ResolutionCache<str> = ResolutionCache::new();
        let built = AtomicUsize::new(0);
        let build = || {
            built.fetch_add(1, Ordering::SeqCst);
            Ok::<_, ()>(Arc::from("wrapper"))
        };

        let first = cache.get_or_try_insert(TypeId::of::<Ping>(), build).unwrap();
        let second = cache.get_or_try_insert(TypeId::of::<Ping>(), build).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(built.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_failures_are_not_cached() {
        let cache: ResolutionCache<str> = ResolutionCache::new();

        let err = cache.get_or_try_insert(TypeId::of::<Pong>(), || Err("missing"));
        assert_eq!(err.unwrap_err(), "missing");
        assert!(cache.get(TypeId::of::<Pong>()).is_none());

        let ok = cache.get_or_try_insert(TypeId::of::<Pong>(), || Ok::<_, &str>(Arc::from("late")));
        assert_eq!(&*ok.unwrap(), "late");
    }
}
