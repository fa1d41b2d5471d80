//! Shared-tier value wrapper carrying a watermark-comparable timestamp.

use serde::{Deserialize, Serialize};

/// Opaque value bytes plus the millisecond timestamp the value was
/// written at, compared against a key's watermark on every read.
///
/// Local-tier entries are bare values governed by TTL eviction alone and
/// have no envelope; this type is shared-tier only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Envelope {
    pub bytes: Vec<u8>,
    pub created_at_ms: i64,
}

impl Envelope {
    pub fn new(bytes: Vec<u8>, created_at_ms: i64) -> Self {
        Self {
            bytes,
            created_at_ms,
        }
    }

    /// `true` when this envelope's `created_at_ms` is at or before the given
    /// watermark, i.e. the envelope must be treated as a stale-miss rather
    /// than a hit. Equality counts as stale: a watermark carries a forward
    /// buffer precisely so that writes completing at or before it are
    /// still caught by the invalidation (see `CacheKey::write_watermark`'s
    /// `buffer_ms`).
    pub fn is_stale_under(&self, watermark_ms: i64) -> bool {
        self.created_at_ms <= watermark_ms
    }
}
