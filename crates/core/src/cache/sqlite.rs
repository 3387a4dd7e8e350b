//! SQLite-backed cache, shared across processes that point at the same file.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{is_expired, CacheError, CacheKey, ResultCache};

/// SQLite-backed result cache.
pub struct SqliteCache {
    conn: Mutex<Connection>,
    ttl: Duration,
}

impl SqliteCache {
    /// Open (or create) the cache database at `path`.
    pub fn new(path: &Path, ttl: Duration) -> Result<Self, CacheError> {
        let conn = Connection::open(path).map_err(|e| CacheError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            ttl,
        })
    }

    /// Create an in-memory SQLite cache (useful for testing).
    pub fn in_memory(ttl: Duration) -> Result<Self, CacheError> {
        let conn =
            Connection::open_in_memory().map_err(|e| CacheError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            ttl,
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), CacheError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS search_cache (
                key TEXT PRIMARY KEY,
                data TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_search_cache_created ON search_cache(created_at);
            "#,
        )
        .map_err(|e| CacheError::Database(e.to_string()))?;

        Ok(())
    }

    /// Number of stored rows, expired ones included.
    pub fn len(&self) -> Result<u64, CacheError> {
        let conn = self.conn.lock().map_err(|_| CacheError::Poisoned)?;
        conn.query_row("SELECT COUNT(*) FROM search_cache", [], |row| {
            row.get::<_, i64>(0)
        })
        .map(|n| n as u64)
        .map_err(|e| CacheError::Database(e.to_string()))
    }

    fn set_at(
        &self,
        key: &CacheKey,
        payload: &str,
        created_at: DateTime<Utc>,
    ) -> Result<(), CacheError> {
        let conn = self.conn.lock().map_err(|_| CacheError::Poisoned)?;

        conn.execute(
            "INSERT OR REPLACE INTO search_cache (key, data, created_at) VALUES (?, ?, ?)",
            params![key.as_storage_key(), payload, format_timestamp(created_at)],
        )
        .map_err(|e| CacheError::Database(e.to_string()))?;

        let cutoff = format_timestamp(created_at - self.ttl);
        conn.execute(
            "DELETE FROM search_cache WHERE created_at < ?",
            params![cutoff],
        )
        .map_err(|e| CacheError::Database(e.to_string()))?;

        Ok(())
    }
}

impl ResultCache for SqliteCache {
    fn get(&self, key: &CacheKey) -> Result<Option<String>, CacheError> {
        let conn = self.conn.lock().map_err(|_| CacheError::Poisoned)?;

        let row: Option<(String, String)> = conn
            .query_row(
                "SELECT data, created_at FROM search_cache WHERE key = ?",
                params![key.as_storage_key()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(|e| CacheError::Database(e.to_string()))?;

        let Some((data, created_at)) = row else {
            return Ok(None);
        };

        // Unparseable timestamps count as stale.
        let fresh = DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| !is_expired(dt.with_timezone(&Utc), self.ttl, Utc::now()))
            .unwrap_or(false);

        Ok(fresh.then_some(data))
    }

    fn set(&self, key: &CacheKey, payload: &str) -> Result<(), CacheError> {
        self.set_at(key, payload, Utc::now())
    }
}

/// Fixed-width UTC timestamps so string comparison orders them correctly.
fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}
