//! SQLite implementation of the EntryStore trait

use crate::cache::{CacheEntry, CacheError, EntryStore};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// SQLite-backed implementation of EntryStore
pub struct SqliteEntryStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteEntryStore {
    /// Create a new SQLite entry store
    ///
    /// If the database doesn't exist, it will be created with the required schema.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, CacheError> {
        let conn = Connection::open(db_path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Initialize the database schema
    fn init_schema(&self) -> Result<(), CacheError> {
        let conn = self.conn.lock().unwrap();

        // Cache entries table: one row per (named cache, URL)
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS cache_entries (
                cache_name TEXT NOT NULL,
                url TEXT NOT NULL,
                sha256 TEXT NOT NULL,
                size INTEGER NOT NULL,
                mime TEXT NOT NULL,
                revision TEXT,
                stored_at TEXT NOT NULL,
                last_used_at TEXT NOT NULL,
                PRIMARY KEY (cache_name, url)
            )
            "#,
            [],
        )?;

        // Index for age-ordered eviction queries
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_cache_entries_age ON cache_entries(cache_name, stored_at)",
            [],
        )?;

        // Index for blob reference checks
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_cache_entries_sha ON cache_entries(sha256)",
            [],
        )?;

        info!("Cache entry database schema initialized");
        Ok(())
    }

    /// Parse an RFC 3339 timestamp stored in the database
    fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, CacheError> {
        DateTime::parse_from_rfc3339(raw)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| CacheError::Database(format!("Invalid timestamp '{}': {}", raw, e)))
    }
}

/// Raw row as read from SQLite, timestamps still as text
struct RawEntry {
    cache_name: String,
    url: String,
    sha256: String,
    size: i64,
    mime: String,
    revision: Option<String>,
    stored_at: String,
    last_used_at: String,
}

impl RawEntry {
    fn into_entry(self) -> Result<CacheEntry, CacheError> {
        Ok(CacheEntry {
            cache_name: self.cache_name,
            url: self.url,
            sha256: self.sha256,
            size: self.size as u64,
            mime: self.mime,
            revision: self.revision,
            stored_at: SqliteEntryStore::parse_timestamp(&self.stored_at)?,
            last_used_at: SqliteEntryStore::parse_timestamp(&self.last_used_at)?,
        })
    }
}

#[async_trait::async_trait]
impl EntryStore for SqliteEntryStore {
    async fn lookup(&self, cache_name: &str, url: &str) -> Result<Option<CacheEntry>, CacheError> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(
            r#"
            SELECT cache_name, url, sha256, size, mime, revision, stored_at, last_used_at
            FROM cache_entries
            WHERE cache_name = ?1 AND url = ?2
            "#,
        )?;

        let mut rows = stmt.query_map(params![cache_name, url], |row| {
            Ok(RawEntry {
                cache_name: row.get(0)?,
                url: row.get(1)?,
                sha256: row.get(2)?,
                size: row.get(3)?,
                mime: row.get(4)?,
                revision: row.get(5)?,
                stored_at: row.get(6)?,
                last_used_at: row.get(7)?,
            })
        })?;

        match rows.next() {
            Some(Ok(raw)) => Ok(Some(raw.into_entry()?)),
            Some(Err(e)) => Err(CacheError::Database(e.to_string())),
            None => Ok(None),
        }
    }

    async fn upsert(&self, entry: CacheEntry) -> Result<(), CacheError> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            r#"
            INSERT OR REPLACE INTO cache_entries
                (cache_name, url, sha256, size, mime, revision, stored_at, last_used_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                entry.cache_name,
                entry.url,
                entry.sha256,
                entry.size as i64,
                entry.mime,
                entry.revision,
                entry.stored_at.to_rfc3339(),
                entry.last_used_at.to_rfc3339(),
            ],
        )?;

        debug!(
            "Stored cache entry: cache={}, url={}, sha256={}",
            entry.cache_name,
            entry.url,
            &entry.sha256[..16.min(entry.sha256.len())]
        );
        Ok(())
    }

    async fn touch(
        &self,
        cache_name: &str,
        url: &str,
        when: DateTime<Utc>,
    ) -> Result<(), CacheError> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "UPDATE cache_entries SET last_used_at = ?3 WHERE cache_name = ?1 AND url = ?2",
            params![cache_name, url, when.to_rfc3339()],
        )?;

        Ok(())
    }

    async fn count(&self, cache_name: &str) -> Result<u64, CacheError> {
        let conn = self.conn.lock().unwrap();

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM cache_entries WHERE cache_name = ?1",
            params![cache_name],
            |row| row.get(0),
        )?;

        Ok(count as u64)
    }

    async fn purge_stored_before(
        &self,
        cache_name: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<String>, CacheError> {
        let conn = self.conn.lock().unwrap();
        let cutoff = cutoff.to_rfc3339();

        let mut stmt = conn.prepare(
            "SELECT sha256 FROM cache_entries WHERE cache_name = ?1 AND stored_at <= ?2",
        )?;
        let hashes: Vec<String> = stmt
            .query_map(params![cache_name, cutoff], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        if !hashes.is_empty() {
            conn.execute(
                "DELETE FROM cache_entries WHERE cache_name = ?1 AND stored_at <= ?2",
                params![cache_name, cutoff],
            )?;
            debug!(
                "Purged {} expired entries from cache '{}'",
                hashes.len(),
                cache_name
            );
        }

        Ok(hashes)
    }

    async fn trim_oldest(&self, cache_name: &str, max: u64) -> Result<Vec<String>, CacheError> {
        let conn = self.conn.lock().unwrap();

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM cache_entries WHERE cache_name = ?1",
            params![cache_name],
            |row| row.get(0),
        )?;

        let excess = count - max as i64;
        if excess <= 0 {
            return Ok(Vec::new());
        }

        // Oldest first by storage time
        let mut stmt = conn.prepare(
            r#"
            SELECT url, sha256 FROM cache_entries
            WHERE cache_name = ?1
            ORDER BY stored_at ASC
            LIMIT ?2
            "#,
        )?;
        let victims: Vec<(String, String)> = stmt
            .query_map(params![cache_name, excess], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut hashes = Vec::with_capacity(victims.len());
        for (url, sha256) in victims {
            conn.execute(
                "DELETE FROM cache_entries WHERE cache_name = ?1 AND url = ?2",
                params![cache_name, url],
            )?;
            hashes.push(sha256);
        }

        debug!(
            "Trimmed {} entries from cache '{}' (max {})",
            hashes.len(),
            cache_name,
            max
        );
        Ok(hashes)
    }

    async fn hash_in_use(&self, sha256: &str) -> Result<bool, CacheError> {
        let conn = self.conn.lock().unwrap();

        let in_use: i64 = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM cache_entries WHERE sha256 = ?1)",
            params![sha256],
            |row| row.get(0),
        )?;

        Ok(in_use != 0)
    }
}
