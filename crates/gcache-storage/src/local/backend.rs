//! Bounded, TTL-indexed, process-local cache backend.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use gcache_core::{LocalTier, Result};
use parking_lot::RwLock;

use super::ttl_index::TtlIndex;

/// Construction-time configuration for [`LocalMemoryBackend`].
#[derive(Debug, Clone)]
pub struct LocalTierConfig {
    /// Maximum number of entries (0 = unlimited).
    pub max_capacity: usize,
    /// Longest TTL the index needs to accommodate; sizes the time wheel.
    pub max_ttl: Duration,
}

impl Default for LocalTierConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
            max_ttl: Duration::from_secs(86_400),
        }
    }
}

impl LocalTierConfig {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            max_capacity: capacity,
            ..Default::default()
        }
    }

    pub fn unlimited() -> Self {
        Self {
            max_capacity: 0,
            ..Default::default()
        }
    }
}

struct Stored {
    bytes: Vec<u8>,
    stored_at: Instant,
    ttl: Duration,
}

impl Stored {
    fn is_expired(&self) -> bool {
        self.stored_at.elapsed() >= self.ttl
    }
}

/// `DashMap` + time-wheel backed implementation of [`LocalTier`].
///
/// Cloning produces a new handle onto the same underlying store.
#[derive(Clone)]
pub struct LocalMemoryBackend {
    data: Arc<DashMap<String, Stored>>,
    ttl_index: Arc<RwLock<TtlIndex>>,
    config: LocalTierConfig,
}

impl LocalMemoryBackend {
    pub fn new(config: LocalTierConfig) -> Self {
        let ttl_index = TtlIndex::new(Duration::from_secs(1), config.max_ttl);
        Self {
            data: Arc::new(DashMap::with_capacity(config.max_capacity.min(10_000))),
            ttl_index: Arc::new(RwLock::new(ttl_index)),
            config,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(LocalTierConfig::default())
    }

    fn maybe_evict(&self) {
        if self.config.max_capacity == 0 || self.data.len() < self.config.max_capacity {
            return;
        }

        let overflow = self.data.len().saturating_sub(self.config.max_capacity - 1);
        let keys_to_remove: Vec<String> = self
            .data
            .iter()
            .take(overflow)
            .map(|entry| entry.key().clone())
            .collect();

        for key in keys_to_remove {
            self.data.remove(&key);
            self.ttl_index.write().remove(&key);
        }
    }

    fn remove_entry(&self, key: &str) {
        self.data.remove(key);
        self.ttl_index.write().remove(key);
    }

    /// Advances the TTL wheel and reaps anything that fell out of it.
    /// Called lazily from `get`; a deployment may also run it from a
    /// periodic background task.
    pub fn reap_expired(&self) -> usize {
        let expired = self.ttl_index.write().tick();
        let mut count = 0;
        for key in expired {
            if let Some(entry) = self.data.get(&key) {
                if entry.is_expired() {
                    drop(entry);
                    self.data.remove(&key);
                    count += 1;
                }
            }
        }
        count
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[async_trait]
impl LocalTier for LocalMemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.reap_expired();
        match self.data.get(key) {
            Some(entry) if entry.is_expired() => {
                drop(entry);
                self.remove_entry(key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.bytes.clone())),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        self.maybe_evict();

        self.ttl_index.write().schedule(key.to_string(), ttl);
        self.data.insert(
            key.to_string(),
            Stored {
                bytes: value,
                stored_at: Instant::now(),
                ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.remove_entry(key);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.data.clear();
        *self.ttl_index.write() = TtlIndex::new(Duration::from_secs(1), self.config.max_ttl);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn basic_get_set() {
        let backend = LocalMemoryBackend::with_defaults();
        backend
            .set("key1", b"value1".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();

        let result = backend.get("key1").await.unwrap();
        assert_eq!(result, Some(b"value1".to_vec()));
    }

    #[tokio::test]
    async fn delete_removes_entry() {
        let backend = LocalMemoryBackend::with_defaults();
        backend
            .set("key1", b"value1".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();
        backend.delete("key1").await.unwrap();
        assert_eq!(backend.get("key1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn get_nonexistent_is_none() {
        let backend = LocalMemoryBackend::with_defaults();
        assert_eq!(backend.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn clear_empties_the_store() {
        let backend = LocalMemoryBackend::with_defaults();
        backend
            .set("key1", b"v".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();
        backend
            .set("key2", b"v".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(backend.len(), 2);

        backend.clear().await.unwrap();
        assert_eq!(backend.len(), 0);
    }

    #[tokio::test]
    async fn expired_entry_reads_as_miss() {
        let backend = LocalMemoryBackend::with_defaults();
        backend
            .set("key1", b"value1".to_vec(), Duration::from_millis(1))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(backend.get("key1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn capacity_eviction_bounds_size() {
        let config = LocalTierConfig {
            max_capacity: 2,
            ..Default::default()
        };
        let backend = LocalMemoryBackend::new(config);

        for key in ["key1", "key2", "key3"] {
            backend
                .set(key, b"v".to_vec(), Duration::from_secs(60))
                .await
                .unwrap();
        }

        assert!(backend.len() <= 2);
    }
}
