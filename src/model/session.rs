//! Memoized, single-flight initialization of inference handles.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use once_cell::sync::OnceCell;

use crate::error::Result;

type Slot<T> = Arc<OnceCell<Arc<T>>>;

/// Maps a model key to its initialized handle.
///
/// Concurrent requests for the same key share one initialization: the first
/// caller runs `init` while the others block on the same slot and then
/// receive the same handle. A failed initialization drops the key's slot so
/// the next request retries and no empty entries accumulate.
pub struct SessionCache<T> {
    slots: Mutex<HashMap<String, Slot<T>>>,
}

impl<T> SessionCache<T> {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Return the handle for `key`, running `init` if none exists yet.
    ///
    /// # Errors
    ///
    /// Propagates the error of `init`; nothing is cached in that case.
    pub fn get_or_try_init<F>(&self, key: &str, init: F) -> Result<Arc<T>>
    where
        F: FnOnce() -> Result<T>,
    {
        // The map lock only covers slot lookup; initialization runs on the
        // per-key slot so other keys are not blocked.
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(slots.entry(key.to_string()).or_default())
        };

        let handle = slot
            .get_or_try_init(|| {
                tracing::debug!(key, "initializing session");
                init().map(Arc::new)
            })
            .map(Arc::clone);

        if handle.is_err() {
            self.discard_empty(key, &slot);
        }

        handle
    }

    /// Remove `slot` from the map if it is still the entry for `key` and
    /// holds no handle.
    fn discard_empty(&self, key: &str, slot: &Slot<T>) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let stale = slots
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, slot) && current.get().is_none());
        if stale {
            slots.remove(key);
        }
    }

    /// The handle for `key` if it has been initialized.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Arc<T>> {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.get(key).and_then(|slot| slot.get().cloned())
    }

    /// Number of initialized handles.
    #[must_use]
    pub fn len(&self) -> usize {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.values().filter(|slot| slot.get().is_some()).count()
    }

    /// Whether no handle has been initialized.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for SessionCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    use super::*;
    use crate::error::Error;

    #[test]
    fn test_caches_after_first_init() {
        let cache = SessionCache::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = cache
                .get_or_try_init("vangogh", || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(42)
                })
                .unwrap();
            assert_eq!(*value, 42);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_concurrent_requests_collapse() {
        let cache = SessionCache::new();
        let calls = AtomicUsize::new(0);
        let barrier = Barrier::new(8);

        let handles: Vec<Arc<String>> = thread::scope(|s| {
            let workers: Vec<_> = (0..8)
                .map(|_| {
                    s.spawn(|| {
                        barrier.wait();
                        cache
                            .get_or_try_init("picasso", || {
                                calls.fetch_add(1, Ordering::SeqCst);
                                thread::sleep(Duration::from_millis(50));
                                Ok("session".to_string())
                            })
                            .unwrap()
                    })
                })
                .collect();
            workers.into_iter().map(|w| w.join().unwrap()).collect()
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(handles.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[test]
    fn test_failed_init_is_retried() {
        let cache: SessionCache<u32> = SessionCache::new();

        let err = cache
            .get_or_try_init("cyberpunk", || {
                Err(Error::InvalidParameter {
                    name: "model".to_string(),
                    reason: "broken".to_string(),
                })
            })
            .unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { .. }));
        assert!(cache.get("cyberpunk").is_none());
        assert!(cache.is_empty());

        let value = cache.get_or_try_init("cyberpunk", || Ok(7)).unwrap();
        assert_eq!(*value, 7);
    }

    #[test]
    fn test_failed_init_leaves_no_slot() {
        let cache: SessionCache<u32> = SessionCache::new();
        cache.get_or_try_init("ok", || Ok(1)).unwrap();

        for key in ["missing-a", "missing-b", "missing-a"] {
            let result = cache.get_or_try_init(key, || {
                Err(Error::ModelNotFound {
                    name: key.to_string(),
                    path: key.into(),
                })
            });
            assert!(result.is_err());
        }

        let slots = cache.slots.lock().unwrap();
        assert_eq!(slots.len(), 1);
        assert!(slots.contains_key("ok"));
    }

    #[test]
    fn test_keys_are_independent() {
        let cache = SessionCache::new();
        let a = cache.get_or_try_init("a", || Ok(1)).unwrap();
        let b = cache.get_or_try_init("b", || Ok(2)).unwrap();

        assert_eq!((*a, *b), (1, 2));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a").as_deref(), Some(&1));
    }
}
