//! gcache-core: key/config model, error taxonomy, and the pluggable
//! traits shared across the gcache workspace.
//!
//! This crate has no knowledge of any concrete tier implementation. It
//! defines the vocabulary (`CacheKey`, `KeyDescriptor`, `KeyConfig`,
//! `Envelope`, `CacheMetrics`, `Serializer`, `LocalTier`/`SharedTier`) that
//! `gcache-storage` and `gcache` build on.

mod backend;
mod config;
mod envelope;
mod error;
mod key;
mod metrics;
mod ramp;
mod serializer;

pub use backend::{LocalTier, SharedGetOutcome, SharedTier};
pub use config::{ConfigOracle, KeyConfig, KeyConfigBuilder, LayerConfig, NoopConfigOracle};
pub use envelope::Envelope;
pub use error::{CacheError, DisabledReason, ErrorStage, Result};
pub use key::{CacheKey, KeyDescriptor, Layer, RESERVED_USE_CASE};
pub use metrics::{CacheMetrics, NoopMetrics, SerializeDirection};
pub use ramp::participates as ramp_participates;
pub use serializer::Serializer;

#[cfg(feature = "json")]
pub use serializer::JsonSerializer;

#[cfg(feature = "msgpack")]
pub use serializer::MsgPackSerializer;

#[cfg(feature = "bincode")]
pub use serializer::BincodeSerializer;

#[cfg(feature = "metrics")]
pub use metrics::MetricsCrateAdapter;

pub mod prelude {
    pub use crate::{
        CacheError, CacheKey, CacheMetrics, ConfigOracle, DisabledReason, Envelope, ErrorStage,
        KeyConfig, KeyDescriptor, Layer, LocalTier, NoopConfigOracle, NoopMetrics, Result,
        SharedGetOutcome, SharedTier,
    };
}
