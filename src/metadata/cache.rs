use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use lru::LruCache;

use crate::config::CacheConfig;
use crate::metadata::types::CompanyMetadata;

struct Entry {
    stored_at: Instant,
    value: CompanyMetadata,
}

/// Bounded time-to-live cache of pipeline results, keyed by bare domain.
pub struct MetadataCache {
    ttl: Duration,
    entries: Mutex<LruCache<String, Entry>>,
}

impl MetadataCache {
    pub fn new(capacity: NonZeroUsize, ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// `None` when caching is switched off
    pub fn from_config(config: &CacheConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        let capacity = NonZeroUsize::new(config.capacity)?;
        Some(Self::new(capacity, Duration::from_secs(config.ttl_secs)))
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<String, Entry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, key: &str) -> Option<CompanyMetadata> {
        let mut entries = self.lock();
        let expired = match entries.get(key) {
            Some(entry) if entry.stored_at.elapsed() < self.ttl => {
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(key);
        }
        None
    }

    pub fn insert(&self, key: &str, value: CompanyMetadata) {
        self.lock().put(
            key.to_string(),
            Entry {
                stored_at: Instant::now(),
                value,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(title: &str) -> CompanyMetadata {
        CompanyMetadata {
            title: title.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_hit_and_miss() {
        let cache = MetadataCache::new(NonZeroUsize::new(4).unwrap(), Duration::from_secs(60));
        assert_eq!(cache.get("a.com"), None);

        cache.insert("a.com", meta("A"));
        assert_eq!(cache.get("a.com"), Some(meta("A")));
        assert_eq!(cache.get("b.com"), None);
    }

    #[test]
    fn test_expired_entries_are_dropped() {
        let cache = MetadataCache::new(NonZeroUsize::new(4).unwrap(), Duration::ZERO);
        cache.insert("a.com", meta("A"));
        assert_eq!(cache.get("a.com"), None);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_capacity_evicts_least_recent() {
        let cache = MetadataCache::new(NonZeroUsize::new(2).unwrap(), Duration::from_secs(60));
        cache.insert("a.com", meta("A"));
        cache.insert("b.com", meta("B"));
        // touch a.com so b.com is the eviction candidate
        assert!(cache.get("a.com").is_some());
        cache.insert("c.com", meta("C"));

        assert_eq!(cache.len(), 2);
        assert!(cache.get("a.com").is_some());
        assert!(cache.get("b.com").is_none());
        assert!(cache.get("c.com").is_some());
    }

    #[test]
    fn test_disabled_by_config() {
        let config = CacheConfig {
            enabled: false,
            ..Default::default()
        };
        assert!(MetadataCache::from_config(&config).is_none());
        assert!(MetadataCache::from_config(&CacheConfig::default()).is_some());
    }
}
