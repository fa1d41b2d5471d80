//! Connection and behavior configuration for the Redis-backed shared tier.

use std::time::Duration;

/// Longest envelope TTL this process-level constant assumes is in use.
/// Watermarks are written with a TTL that must exceed every envelope TTL
/// a deployment configures; raise this if a deployment uses longer TTLs.
pub const DEFAULT_WATERMARK_TTL: Duration = Duration::from_secs(4 * 60 * 60);

/// Payload size above which (de)serialization is moved off the hot path
/// via `tokio::task::spawn_blocking`.
pub const DEFAULT_LARGE_PAYLOAD_THRESHOLD: usize = 50 * 1024;

#[derive(Debug, Clone)]
pub struct RedisTierConfig {
    /// Redis connection URL, e.g. `redis://127.0.0.1:6379`.
    pub url: String,
    pub pool_size: u32,
    pub connection_timeout: Duration,
    /// Optional key prefix applied to every stored key (envelope and
    /// watermark alike).
    pub key_prefix: Option<String>,
    /// Prefix used inside the canonical URN form itself (the `<prefix>`
    /// slot of `urn:<prefix>:<key_type>:<id>?...#...`).
    pub urn_prefix: String,
    pub watermark_ttl: Duration,
    pub large_payload_threshold: usize,
}

impl Default for RedisTierConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            pool_size: 10,
            connection_timeout: Duration::from_secs(1),
            key_prefix: Some("gcache".to_string()),
            urn_prefix: "urn".to_string(),
            watermark_ttl: DEFAULT_WATERMARK_TTL,
            large_payload_threshold: DEFAULT_LARGE_PAYLOAD_THRESHOLD,
        }
    }
}

impl RedisTierConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn pool_size(mut self, size: u32) -> Self {
        self.pool_size = size;
        self
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    pub fn watermark_ttl(mut self, ttl: Duration) -> Self {
        self.watermark_ttl = ttl;
        self
    }
}
