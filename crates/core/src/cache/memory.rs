//! In-process cache backend.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

use super::{is_expired, CacheError, CacheKey, ResultCache};

struct Entry {
    payload: String,
    created_at: DateTime<Utc>,
}

/// Mutex-guarded map shared by all workers of a process.
pub struct MemoryCache {
    ttl: Duration,
    entries: Mutex<HashMap<CacheKey, Entry>>,
}

impl MemoryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn set_at(
        &self,
        key: &CacheKey,
        payload: &str,
        created_at: DateTime<Utc>,
    ) -> Result<(), CacheError> {
        let mut entries = self.entries.lock().map_err(|_| CacheError::Poisoned)?;
        let ttl = self.ttl;
        entries.retain(|_, entry| !is_expired(entry.created_at, ttl, created_at));
        entries.insert(
            key.clone(),
            Entry {
                payload: payload.to_string(),
                created_at,
            },
        );
        Ok(())
    }
}

impl ResultCache for MemoryCache {
    fn get(&self, key: &CacheKey) -> Result<Option<String>, CacheError> {
        let entries = self.entries.lock().map_err(|_| CacheError::Poisoned)?;
        let now = Utc::now();
        Ok(entries
            .get(key)
            .filter(|entry| !is_expired(entry.created_at, self.ttl, now))
            .map(|entry| entry.payload.clone()))
    }

    fn set(&self, key: &CacheKey, payload: &str) -> Result<(), CacheError> {
        self.set_at(key, payload, Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn key(day: u32) -> CacheKey {
        CacheKey::new(
            "95673444",
            NaiveDate::from_ymd_opt(2026, 1, day).unwrap(),
            NaiveDate::from_ymd_opt(2026, 1, day + 2).unwrap(),
            1,
        )
    }

    #[test]
    fn test_round_trip_before_expiry() {
        let cache = MemoryCache::new(Duration::hours(3));
        let payload = r#"{"everywhereDestination":{"results":[]}}"#;
        cache.set(&key(9), payload).unwrap();
        assert_eq!(cache.get(&key(9)).unwrap().as_deref(), Some(payload));
    }

    #[test]
    fn test_miss_after_expiry() {
        let cache = MemoryCache::new(Duration::hours(3));
        cache
            .set_at(&key(9), "old", Utc::now() - Duration::hours(4))
            .unwrap();
        assert!(cache.get(&key(9)).unwrap().is_none());
    }

    #[test]
    fn test_distinct_party_size_is_distinct_key() {
        let cache = MemoryCache::new(Duration::hours(3));
        cache.set(&key(9), "one").unwrap();
        let mut two = key(9);
        two.adults = 2;
        assert!(cache.get(&two).unwrap().is_none());
    }

    #[test]
    fn test_overwrite_replaces_payload() {
        let cache = MemoryCache::new(Duration::hours(3));
        cache.set(&key(9), "first").unwrap();
        cache.set(&key(9), "second").unwrap();
        assert_eq!(cache.get(&key(9)).unwrap().as_deref(), Some("second"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_write_purges_expired_entries() {
        let cache = MemoryCache::new(Duration::hours(3));
        cache
            .set_at(&key(9), "stale", Utc::now() - Duration::hours(5))
            .unwrap();
        cache
            .set_at(&key(10), "stale", Utc::now() - Duration::hours(4))
            .unwrap();
        assert_eq!(cache.len(), 2);

        cache.set(&key(16), "fresh").unwrap();
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&key(16)).unwrap().is_some());
    }
}
