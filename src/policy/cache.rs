//! Time-bounded read cache in front of a policy repository

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};

use super::{PolicyKey, PolicyLookupError, PolicyRecord, PolicyRepository};

/// Default cap on cached principals
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

struct CacheEntry {
    record: PolicyRecord,
    cached_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.cached_at.elapsed() >= ttl
    }
}

/// Caches found records for at most `ttl`
///
/// Not-found and error results always go to the backing store, so a newly
/// registered client is visible on its next request. A revoked grant stays
/// visible for at most `ttl`.
pub struct CachedPolicyRepository {
    inner: Arc<dyn PolicyRepository>,
    entries: DashMap<PolicyKey, CacheEntry>,
    ttl: Duration,
    max_entries: usize,
}

impl CachedPolicyRepository {
    pub fn new(inner: Arc<dyn PolicyRepository>, ttl: Duration) -> Self {
        Self {
            inner,
            entries: DashMap::new(),
            ttl,
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn invalidate(&self, key: &PolicyKey) {
        self.entries.remove(key);
    }

    /// Drop expired entries
    pub fn purge_expired(&self) {
        let ttl = self.ttl;
        self.entries.retain(|_, entry| !entry.is_expired(ttl));
    }

    fn cached(&self, key: &PolicyKey) -> Option<PolicyRecord> {
        let entry = self.entries.get(key)?;
        if entry.is_expired(self.ttl) {
            drop(entry);
            self.entries.remove(key);
            return None;
        }
        Some(entry.record.clone())
    }

    fn store(&self, key: &PolicyKey, record: &PolicyRecord) {
        if self.entries.len() >= self.max_entries {
            self.purge_expired();
            if self.entries.len() >= self.max_entries {
                debug!(max_entries = self.max_entries, "Policy cache full, not caching");
                return;
            }
        }
        self.entries.insert(
            key.clone(),
            CacheEntry {
                record: record.clone(),
                cached_at: Instant::now(),
            },
        );
    }
}

#[async_trait]
impl PolicyRepository for CachedPolicyRepository {
    async fn granted_scopes(&self, key: &PolicyKey) -> Result<PolicyRecord, PolicyLookupError> {
        if let Some(record) = self.cached(key) {
            trace!(key = %key, "Policy cache hit");
            return Ok(record);
        }

        let record = self.inner.granted_scopes(key).await?;
        self.store(key, &record);
        Ok(record)
    }
}
