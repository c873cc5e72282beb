//! Entry count and age limits for a named cache
//!
//! The policy runs lazily, after each store into the cache it is attached
//! to. It never runs on the read path, so an expired entry can still answer
//! a request until the next store triggers a maintenance pass.

use crate::cache::{BlobStore, CacheError, EntryStore};
use chrono::{DateTime, Duration, Utc};
use tracing::debug;

/// Maximum entry count and age for one named cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpirationPolicy {
    max_entries: u64,
    max_age: Duration,
}

impl ExpirationPolicy {
    pub fn new(max_entries: u64, max_age_seconds: i64) -> Self {
        Self {
            max_entries,
            max_age: Duration::seconds(max_age_seconds),
        }
    }

    pub fn max_entries(&self) -> u64 {
        self.max_entries
    }

    pub fn max_age_seconds(&self) -> i64 {
        self.max_age.num_seconds()
    }

    /// Run one maintenance pass over a named cache
    ///
    /// Order is age first, then count: entries stored `max_age` or longer
    /// before `now` are purged, and if more than `max_entries` remain the
    /// oldest by storage time are trimmed. Blobs are removed only once no
    /// entry in any cache references them.
    pub async fn enforce(
        &self,
        entries: &dyn EntryStore,
        blobs: &dyn BlobStore,
        cache_name: &str,
        now: DateTime<Utc>,
    ) -> Result<(), CacheError> {
        let cutoff = now - self.max_age;

        let mut dropped = entries.purge_stored_before(cache_name, cutoff).await?;
        dropped.extend(entries.trim_oldest(cache_name, self.max_entries).await?);

        if dropped.is_empty() {
            return Ok(());
        }

        let evicted = dropped.len();
        for sha256 in dropped {
            if !entries.hash_in_use(&sha256).await? {
                blobs.remove(&sha256).await?;
            }
        }

        debug!("Evicted {} entries from cache '{}'", evicted, cache_name);
        Ok(())
    }
}
