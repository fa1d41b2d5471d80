//! Tier boundaries the cache chain and controller are generic over.
//!
//! `gcache-storage` provides the concrete implementations (an in-process
//! bounded map for [`LocalTier`], a pooled Redis client for [`SharedTier`]);
//! `gcache`'s chain and controller only depend on these traits, keeping
//! storage and orchestration in separate crates.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::key::CacheKey;

/// The bounded, TTL-indexed, process-local tier. Oblivious to watermarks
/// and to invalidation: its only staleness bound is its own TTL and
/// capacity eviction.
#[async_trait]
pub trait LocalTier: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;
    async fn clear(&self) -> Result<()>;
}

/// Outcome of a shared-tier read once the watermark check has been
/// applied. `StaleMiss` is distinct from `Miss` only in that a stale read
/// must never repopulate the local tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SharedGetOutcome {
    Hit(Vec<u8>),
    Miss,
    StaleMiss,
}

/// The shared network tier. Every method here is fail-open at the
/// implementation level: transport, protocol, and serialization failures
/// are caught, logged, counted, and converted into `Ok(SharedGetOutcome::Miss)`
/// (reads) or `Ok(())` (writes) by the implementation. `Err` is reserved
/// for the handful of surfaced construction-time errors.
///
/// Methods take the structured [`CacheKey`] rather than a pre-rendered
/// string so an implementation can label its own `size_histogram` and
/// `serialization_timer` metric observations by `use_case`/`key_type`
/// without the caller having to thread that context through separately.
#[async_trait]
pub trait SharedTier: Send + Sync {
    /// When `track_for_invalidation` is true, the implementation batches
    /// the envelope and watermark fetch into one round-trip and folds the
    /// staleness comparison into the returned outcome.
    async fn get(&self, key: &CacheKey, track_for_invalidation: bool) -> Result<SharedGetOutcome>;

    async fn set(
        &self,
        key: &CacheKey,
        value: Vec<u8>,
        ttl: Duration,
        track_for_invalidation: bool,
    ) -> Result<()>;

    async fn delete(&self, key: &CacheKey) -> Result<()>;

    /// Writes `now_ms() + buffer_ms` to the watermark for `(key_type, id)`
    /// with a TTL that must exceed the longest configured envelope TTL in
    /// use.
    async fn write_watermark(&self, key_type: &str, id: &str, buffer_ms: i64) -> Result<()>;

    async fn flushall(&self) -> Result<()>;
}
