//! The Redis-backed shared network tier.

mod backend;
mod config;

pub use backend::RedisSharedTier;
pub use config::{RedisTierConfig, DEFAULT_LARGE_PAYLOAD_THRESHOLD, DEFAULT_WATERMARK_TTL};
