//! Short-lived cache for phase-1 ("everywhere") responses.
//!
//! Entries are keyed by origin, trip dates and party size. A read past the
//! TTL is a miss; writes purge every expired entry.

mod memory;
mod sqlite;

pub use memory::MemoryCache;
pub use sqlite::SqliteCache;

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use thiserror::Error;

use crate::config::{CacheBackend, CacheConfig};

/// Errors for cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Cache lock poisoned")]
    Poisoned,
}

/// Identity of a phase-1 query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub origin: String,
    pub departure: NaiveDate,
    pub return_date: NaiveDate,
    pub adults: u32,
}

impl CacheKey {
    pub fn new(origin: &str, departure: NaiveDate, return_date: NaiveDate, adults: u32) -> Self {
        Self {
            origin: origin.to_string(),
            departure,
            return_date,
            adults,
        }
    }

    /// Flat string form used as the storage key.
    pub fn as_storage_key(&self) -> String {
        format!(
            "{}|{}|{}|{}",
            self.origin, self.departure, self.return_date, self.adults
        )
    }
}

/// Storage for raw phase-1 payloads.
pub trait ResultCache: Send + Sync {
    /// Fresh payload for `key`, or `None` on a miss or expired entry.
    fn get(&self, key: &CacheKey) -> Result<Option<String>, CacheError>;

    /// Store (or replace) the payload for `key` and purge expired entries.
    fn set(&self, key: &CacheKey, payload: &str) -> Result<(), CacheError>;
}

/// Whether an entry created at `created_at` is stale at `now`.
pub(crate) fn is_expired(created_at: DateTime<Utc>, ttl: Duration, now: DateTime<Utc>) -> bool {
    now - created_at > ttl
}

/// Build the configured cache backend.
pub fn create_cache(config: &CacheConfig) -> Result<Arc<dyn ResultCache>, CacheError> {
    let ttl = Duration::seconds(config.ttl_secs as i64);
    Ok(match config.backend {
        CacheBackend::Memory => Arc::new(MemoryCache::new(ttl)),
        CacheBackend::Sqlite => Arc::new(SqliteCache::new(&config.path, ttl)?),
    })
}
