//! # Reference Caches
//!
//! Read-through caches in front of the reference-entity repositories. Every
//! report row needs a field worker, an indicator and a date row; caching them
//! removes three lookups (and possibly three inserts) per row under bursty
//! ingestion.
//!
//! ## Miss Path
//!
//! ```text
//! fetch(entity)
//!     │
//!     ├── hit  ──> cached entity
//!     │
//!     └── miss ──> repository.find(entity)
//!                      ├── Some(found) ──> cache + return
//!                      └── None ──> repository.save(entity) ──> cache + return
//! ```
//!
//! The cache lock is never held across repository calls. Two callers missing
//! on the same key both resolve; the last one to store wins.

use std::fmt;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::NaiveDate;
use lru::LruCache;
use tracing::debug;

use crate::types::{Anm, Dates, Indicator};
use crate::Result;

/// Entities that can be cached by a natural key.
pub trait Cacheable: Clone + Send + 'static {
    type Key: Hash + Eq + Clone + fmt::Debug + Send;

    fn cache_key(&self) -> Self::Key;
}

impl Cacheable for Anm {
    type Key = String;

    fn cache_key(&self) -> String {
        self.anm_identifier.clone()
    }
}

impl Cacheable for Indicator {
    type Key = String;

    fn cache_key(&self) -> String {
        self.indicator.clone()
    }
}

impl Cacheable for Dates {
    type Key = NaiveDate;

    fn cache_key(&self) -> NaiveDate {
        self.date
    }
}

/// Backing store for a reference entity, looked up by the entity's natural
/// key.
pub trait CacheableRepository<T>: Send + Sync {
    /// Returns the persisted entity with the same natural key, if any.
    fn find(&self, entity: &T) -> Result<Option<T>>;

    /// Persists the entity if no entity with its natural key exists and
    /// returns the persisted entity.
    fn save(&self, entity: &T) -> Result<T>;

    fn find_all(&self) -> Result<Vec<T>>;
}

struct EntityCache<T: Cacheable> {
    entries: Mutex<LruCache<T::Key, T>>,
}

impl<T: Cacheable> EntityCache<T> {
    fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    // A panic while holding the lock cannot leave a half-written entry.
    fn lock(&self) -> MutexGuard<'_, LruCache<T::Key, T>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn get(&self, key: &T::Key) -> Option<T> {
        self.lock().get(key).cloned()
    }

    fn put(&self, key: T::Key, entity: T) {
        self.lock().put(key, entity);
    }

    fn remove(&self, key: &T::Key) {
        self.lock().pop(key);
    }

    fn contains(&self, key: &T::Key) -> bool {
        self.lock().contains(key)
    }

    fn len(&self) -> usize {
        self.lock().len()
    }
}

/// Cache for entities that never change once created (field workers,
/// indicators). Entries are only dropped by [`clear`](Self::clear) or by
/// capacity eviction.
pub struct ReadOnlyCachingRepository<T: Cacheable> {
    repository: Arc<dyn CacheableRepository<T>>,
    cache: EntityCache<T>,
}

impl<T: Cacheable> ReadOnlyCachingRepository<T> {
    pub fn new(repository: Arc<dyn CacheableRepository<T>>, capacity: NonZeroUsize) -> Self {
        Self {
            repository,
            cache: EntityCache::new(capacity),
        }
    }

    /// Returns the cached entity for `entity`'s key, resolving (and creating
    /// if needed) through the repository on a miss.
    pub fn fetch(&self, entity: &T) -> Result<T> {
        let key = entity.cache_key();
        if let Some(cached) = self.cache.get(&key) {
            return Ok(cached);
        }

        debug!(key = ?key, "reference cache miss");
        let resolved = match self.repository.find(entity)? {
            Some(found) => found,
            None => self.repository.save(entity)?,
        };

        self.cache.put(key, resolved.clone());
        Ok(resolved)
    }

    /// Evicts the entry for `entity`'s key. No-op if absent.
    pub fn clear(&self, entity: &T) {
        self.cache.remove(&entity.cache_key());
    }

    /// Reads every entity from the repository and warms the cache with them.
    pub fn fetch_all(&self) -> Result<Vec<T>> {
        let all = self.repository.find_all()?;
        for entity in &all {
            self.cache.put(entity.cache_key(), entity.clone());
        }
        Ok(all)
    }

    pub fn is_cached(&self, entity: &T) -> bool {
        self.cache.contains(&entity.cache_key())
    }

    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }
}

/// Cache for entities that may be written through the cache (dates). Same
/// fetch/clear contract as [`ReadOnlyCachingRepository`].
pub struct CachingRepository<T: Cacheable> {
    inner: ReadOnlyCachingRepository<T>,
}

impl<T: Cacheable> CachingRepository<T> {
    pub fn new(repository: Arc<dyn CacheableRepository<T>>, capacity: NonZeroUsize) -> Self {
        Self {
            inner: ReadOnlyCachingRepository::new(repository, capacity),
        }
    }

    pub fn fetch(&self, entity: &T) -> Result<T> {
        self.inner.fetch(entity)
    }

    pub fn clear(&self, entity: &T) {
        self.inner.clear(entity)
    }

    /// Writes the entity through the repository and refreshes its cache entry.
    pub fn save(&self, entity: &T) -> Result<T> {
        let saved = self.inner.repository.save(entity)?;
        self.inner.cache.put(saved.cache_key(), saved.clone());
        Ok(saved)
    }

    pub fn is_cached(&self, entity: &T) -> bool {
        self.inner.is_cached(entity)
    }
}
