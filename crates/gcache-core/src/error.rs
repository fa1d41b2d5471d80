//! Error types for cache operations.

use thiserror::Error;

/// Which stage of a shared-tier round-trip an `error_counter` or
/// `disabled_counter` observation refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorStage {
    SharedGet,
    SharedSet,
    Watermark,
    Serialize,
    Deserialize,
}

impl ErrorStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorStage::SharedGet => "shared_get",
            ErrorStage::SharedSet => "shared_set",
            ErrorStage::Watermark => "watermark",
            ErrorStage::Serialize => "ser",
            ErrorStage::Deserialize => "de",
        }
    }
}

/// Why a call bypassed the cache entirely (`disabled_counter{reason}`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisabledReason {
    NotEnabled,
    RampedOff,
    NoConfig,
    KeyError,
    ExplicitlyDisabled,
}

impl DisabledReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisabledReason::NotEnabled => "not_enabled",
            DisabledReason::RampedOff => "ramped_off",
            DisabledReason::NoConfig => "no_config",
            DisabledReason::KeyError => "key_error",
            DisabledReason::ExplicitlyDisabled => "explicitly_disabled",
        }
    }
}

/// Main error type for all cache operations.
///
/// Per the propagation policy (spec §7), only the last four variants are
/// ever surfaced to a caller. Everything else is caught by the controller,
/// recorded against a metric, and treated as a bypass or fail-open miss.
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    /// Argument binding or an adapter closure failed while building a key.
    #[error("key build failed: {0}")]
    KeyBuild(String),

    /// The config oracle returned nothing and the descriptor has no default.
    #[error("no config available for this key")]
    ConfigAbsent,

    /// Shared-tier transport (connection, timeout, protocol) failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// Serializer or deserializer failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A sync cached function was invoked transitively on a bridge worker
    /// that is already running one. Sync cached functions must not nest;
    /// the remediation is to make the inner call async.
    #[error("reentrant sync cached call detected on bridge worker")]
    ReentrantSyncCall,

    /// A second facade was constructed while the first is still live.
    #[error("a gcache facade is already constructed for this process")]
    SingletonViolation,

    /// Both a fixed shared-tier connection config and a client factory were
    /// supplied; exactly one is allowed.
    #[error("both a fixed shared-tier config and a client factory were supplied")]
    ConflictingRedisConfig,

    /// A descriptor registered the reserved `watermark` use_case.
    #[error("use_case \"watermark\" is reserved")]
    ReservedUseCase,
}

/// Result type alias for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;
