//! gcache-storage: concrete tier implementations.
//!
//! `local` provides the bounded, TTL-indexed process-local tier; `shared`
//! provides the `bb8`-pooled Redis shared tier with watermark-aware reads
//! folded in. Both implement the tier traits from `gcache-core` so the
//! cache chain and controller in `gcache` are generic over them.

#[cfg(feature = "local")]
pub mod local;

#[cfg(feature = "shared")]
pub mod shared;

#[cfg(feature = "local")]
pub use local::{LocalMemoryBackend, LocalTierConfig};

#[cfg(feature = "shared")]
pub use shared::{RedisSharedTier, RedisTierConfig};
