// src/cache/mod.rs
//! Bounded response cache for LLM answers.

use std::num::NonZeroUsize;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use lru::LruCache;
use sha2::{Digest, Sha256};

/// Content-derived cache key. Every field is length-prefixed before hashing,
/// so no two different field tuples share a digest input.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn derive(provider: &str, model: &str, kind: &str, keyword: &str, context: &str) -> Self {
        let mut hasher = Sha256::new();
        for field in [provider, model, kind, keyword, context] {
            hasher.update((field.len() as u64).to_le_bytes());
            hasher.update(field.as_bytes());
        }
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

struct CachedValue {
    value: String,
    stored_at: Instant,
}

pub struct ResponseCache {
    // None when caching is disabled
    entries: Option<Mutex<LruCache<CacheKey, CachedValue>>>,
    ttl: Option<Duration>,
}

impl ResponseCache {
    /// `capacity == 0` disables caching; a zero `ttl` means entries never expire.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: NonZeroUsize::new(capacity).map(|cap| Mutex::new(LruCache::new(cap))),
            ttl: (!ttl.is_zero()).then_some(ttl),
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<String> {
        let mut cache = self.entries.as_ref()?.lock().unwrap_or_else(PoisonError::into_inner);
        let expired = match cache.get(key) {
            None => return None,
            Some(entry) => self.ttl.is_some_and(|ttl| entry.stored_at.elapsed() > ttl),
        };
        if expired {
            tracing::debug!("Cache entry {} expired", key.as_str());
            cache.pop(key);
            return None;
        }
        cache.get(key).map(|entry| entry.value.clone())
    }

    pub fn insert(&self, key: CacheKey, value: String) {
        if let Some(entries) = &self.entries {
            let mut cache = entries.lock().unwrap_or_else(PoisonError::into_inner);
            cache.put(key, CachedValue { value, stored_at: Instant::now() });
        }
    }

    pub fn len(&self) -> usize {
        self.entries
            .as_ref()
            .map_or(0, |entries| entries.lock().unwrap_or_else(PoisonError::into_inner).len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Some(entries) = &self.entries {
            entries.lock().unwrap_or_else(PoisonError::into_inner).clear();
        }
    }
}
