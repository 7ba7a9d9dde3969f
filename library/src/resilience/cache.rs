use lru::LruCache;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::trace;

struct CacheEntry<F, V> {
    fingerprint: F,
    value: V,
    inserted_at: Instant,
}

/// Bounded LRU cache whose entries expire after a fixed time-to-live
///
/// Every entry remembers a fingerprint of the inputs it was computed from. A lookup only hits if
/// the entry is younger than the TTL and the fingerprint matches, otherwise the entry is evicted.
pub struct ExpiringCache<F, V> {
    ttl: Duration,
    entries: Mutex<LruCache<String, CacheEntry<F, V>>>,
}

impl<F, V> ExpiringCache<F, V>
where
    F: PartialEq,
    V: Clone,
{
    /// Creates a cache holding at most `capacity` entries
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(LruCache::new(capacity.max(1))),
        }
    }

    /// Returns the cached value if it is fresh and was computed from the same inputs
    pub async fn get(&self, key: &str, fingerprint: &F) -> Option<V> {
        let key = key.to_owned();
        let mut entries = self.entries.lock().await;

        let lookup = entries.get(&key).map(|entry| {
            if entry.inserted_at.elapsed() >= self.ttl {
                trace!(%key, "Cache entry expired");
                None
            } else if entry.fingerprint != *fingerprint {
                trace!(%key, "Cache entry has been computed from different inputs");
                None
            } else {
                Some(entry.value.clone())
            }
        });

        match lookup {
            Some(Some(value)) => Some(value),
            Some(None) => {
                entries.pop(&key);
                None
            }
            None => None,
        }
    }

    /// Stores a value, replacing any previous entry for the key
    pub async fn insert(&self, key: String, fingerprint: F, value: V) {
        self.entries.lock().await.put(
            key,
            CacheEntry {
                fingerprint,
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Number of stored entries, including expired ones not yet evicted
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Whether the cache holds no entries
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}
