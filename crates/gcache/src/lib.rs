//! gcache: read-through, multi-tier function-result cache with
//! watermark-based invalidation.
//!
//! A call is registered once against a [`gcache_core::KeyDescriptor`] and a
//! fallback; afterward, [`GCache::register`] (async call sites) or
//! [`GCache::register_sync`] (plain-thread call sites, routed through the
//! [`bridge`]) consult LOCAL then REMOTE before ever running the fallback.
//! Caching only actually happens inside an [`enable`](GCache::enable)
//! scope. Outside of one, every call is a bypass straight to the
//! fallback, counted as `disabled{not_enabled}`.

mod bridge;
mod chain;
mod controller;
pub mod scope;
mod singleton;

use std::future::Future;
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};

pub use gcache_core::*;

#[cfg(feature = "local")]
pub use gcache_storage::{LocalMemoryBackend, LocalTierConfig};
#[cfg(feature = "shared")]
pub use gcache_storage::{RedisSharedTier, RedisTierConfig};

pub use bridge::BridgeConfig;
pub use controller::GCacheConfig;

use bridge::Bridge;
use controller::Controller;
use singleton::SingletonGuard;

/// The constructed facade. One process may hold at most one at a time;
/// constructing a second while the first is live fails with
/// [`CacheError::SingletonViolation`].
pub struct GCache<L, S, M, Ser, O> {
    controller: Arc<Controller<L, S, M, Ser, O>>,
    bridge: Arc<Bridge>,
    _singleton: SingletonGuard,
}

impl<L, S, M, Ser, O> GCache<L, S, M, Ser, O>
where
    L: LocalTier + 'static,
    S: SharedTier + 'static,
    M: CacheMetrics + 'static,
    Ser: Serializer + 'static,
    O: ConfigOracle + 'static,
{
    pub fn builder(local: Arc<L>, shared: Arc<S>) -> GCacheBuilder<L, S, M, Ser, O> {
        GCacheBuilder::new(local, shared)
    }

    /// Binds `descriptor` to this facade for async call sites.
    pub fn register<Args>(&self, descriptor: KeyDescriptor<Args>) -> Cached<L, S, M, Ser, O, Args> {
        Cached {
            controller: Arc::clone(&self.controller),
            descriptor,
        }
    }

    /// Binds `descriptor` to this facade for plain-thread call sites. Calls
    /// run on the sync-to-async bridge's worker pool.
    pub fn register_sync<Args>(
        &self,
        descriptor: KeyDescriptor<Args>,
    ) -> CachedSync<L, S, M, Ser, O, Args> {
        CachedSync {
            controller: Arc::clone(&self.controller),
            bridge: Arc::clone(&self.bridge),
            descriptor: Arc::new(descriptor),
        }
    }

    /// Runs `fut` with the enable-scope set to `active` for its duration:
    /// `enable(true, ...)` opens an enabling scope, `enable(false, ...)`
    /// opens a disabling scope that bypasses the cache even inside an
    /// outer enabling scope. Nested `enable` scopes (and the ones
    /// `register_sync` re-installs on a bridge worker) restore the outer
    /// value on exit.
    pub async fn enable<F: Future>(&self, active: bool, fut: F) -> F::Output {
        scope::with_scope(active, fut).await
    }

    /// Async entry point for advancing the watermark of `(key_type, id)`.
    pub async fn ainvalidate(&self, key_type: &str, id: &str, buffer_ms: i64) -> Result<()> {
        self.controller.invalidate(key_type, id, buffer_ms).await
    }

    /// Sync entry point for [`Self::ainvalidate`], routed through the bridge.
    pub fn invalidate(&self, key_type: &str, id: &str, buffer_ms: i64) -> Result<()> {
        let controller = Arc::clone(&self.controller);
        let key_type = key_type.to_string();
        let id = id.to_string();
        self.bridge.submit_sync(scope::state(), move || async move {
            controller.invalidate(&key_type, &id, buffer_ms).await
        })
    }

    /// Async entry point for removing one key from both tiers.
    pub async fn aremove(&self, key: &CacheKey) -> Result<()> {
        self.controller.remove(key).await
    }

    /// Sync entry point for [`Self::aremove`], routed through the bridge.
    pub fn remove(&self, key: &CacheKey) -> Result<()> {
        let controller = Arc::clone(&self.controller);
        let key = key.clone();
        self.bridge
            .submit_sync(scope::state(), move || async move { controller.remove(&key).await })
    }

    /// Async entry point for clearing both tiers entirely.
    pub async fn aflushall(&self) -> Result<()> {
        self.controller.flushall().await
    }

    /// Sync entry point for [`Self::aflushall`], routed through the bridge.
    pub fn flushall(&self) -> Result<()> {
        let controller = Arc::clone(&self.controller);
        self.bridge
            .submit_sync(scope::state(), move || async move { controller.flushall().await })
    }
}

/// A call registered for an async call site.
pub struct Cached<L, S, M, Ser, O, Args> {
    controller: Arc<Controller<L, S, M, Ser, O>>,
    descriptor: KeyDescriptor<Args>,
}

impl<L, S, M, Ser, O, Args> Cached<L, S, M, Ser, O, Args>
where
    L: LocalTier,
    S: SharedTier,
    M: CacheMetrics,
    Ser: Serializer + 'static,
    O: ConfigOracle,
{
    pub async fn call<T, F, Fut>(&self, args: &Args, fallback: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.controller
            .get_or_compute(&self.descriptor, args, fallback)
            .await
    }
}

/// A call registered for a plain-thread call site. Dispatches through the
/// sync-to-async bridge, carrying the calling thread's enable-scope across.
pub struct CachedSync<L, S, M, Ser, O, Args> {
    controller: Arc<Controller<L, S, M, Ser, O>>,
    bridge: Arc<Bridge>,
    descriptor: Arc<KeyDescriptor<Args>>,
}

impl<L, S, M, Ser, O, Args> CachedSync<L, S, M, Ser, O, Args>
where
    L: LocalTier + 'static,
    S: SharedTier + 'static,
    M: CacheMetrics + 'static,
    Ser: Serializer + 'static,
    O: ConfigOracle + 'static,
    Args: Send + 'static,
{
    pub fn call<T, F, Fut>(&self, args: Args, fallback: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce(&Args) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + 'static,
    {
        let controller = Arc::clone(&self.controller);
        let descriptor = self.descriptor.clone();
        let scope_state = scope::state();
        self.bridge.submit_sync(scope_state, move || async move {
            let args = args;
            controller
                .get_or_compute(&descriptor, &args, || fallback(&args))
                .await
        })
    }
}

/// Assembles a [`GCache`]. `local` and `shared` are supplied up front
/// since they have no sensible process-wide default; `metrics`,
/// `serializer`, and `oracle` fall back to their `Default` impl
/// (`NoopMetrics`, `JsonSerializer`, `NoopConfigOracle` being the usual
/// choices) when not set explicitly.
pub struct GCacheBuilder<L, S, M, Ser, O> {
    local: Arc<L>,
    shared: Arc<S>,
    metrics: Option<Arc<M>>,
    serializer: Option<Arc<Ser>>,
    oracle: Option<Arc<O>>,
    config: GCacheConfig,
    bridge_config: BridgeConfig,
}

impl<L, S, M, Ser, O> GCacheBuilder<L, S, M, Ser, O> {
    pub fn new(local: Arc<L>, shared: Arc<S>) -> Self {
        Self {
            local,
            shared,
            metrics: None,
            serializer: None,
            oracle: None,
            config: GCacheConfig::default(),
            bridge_config: BridgeConfig::default(),
        }
    }

    pub fn metrics(mut self, metrics: Arc<M>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn serializer(mut self, serializer: Arc<Ser>) -> Self {
        self.serializer = Some(serializer);
        self
    }

    pub fn oracle(mut self, oracle: Arc<O>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    pub fn urn_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.urn_prefix = prefix.into();
        self
    }

    pub fn large_payload_threshold(mut self, bytes: usize) -> Self {
        self.config.large_payload_threshold = bytes;
        self
    }

    pub fn bridge_pool_size(mut self, size: usize) -> Self {
        self.bridge_config.pool_size = size;
        self
    }
}

impl<L, S, M, Ser, O> GCacheBuilder<L, S, M, Ser, O>
where
    L: LocalTier + 'static,
    S: SharedTier + 'static,
    M: CacheMetrics + Default + 'static,
    Ser: Serializer + Default + 'static,
    O: ConfigOracle + Default + 'static,
{
    /// Finalizes the facade. Fails with [`CacheError::SingletonViolation`]
    /// if another facade is already live in this process.
    pub fn build(self) -> Result<GCache<L, S, M, Ser, O>> {
        let singleton = SingletonGuard::acquire()?;
        let metrics = self.metrics.unwrap_or_default_arc();
        let serializer = self.serializer.unwrap_or_default_arc();
        let oracle = self.oracle.unwrap_or_default_arc();
        let controller = Controller::new(
            self.local,
            self.shared,
            metrics,
            serializer,
            oracle,
            self.config,
        );
        Ok(GCache {
            controller: Arc::new(controller),
            bridge: Arc::new(Bridge::new(self.bridge_config)),
            _singleton: singleton,
        })
    }
}

trait OptionArcExt<T> {
    fn unwrap_or_default_arc(self) -> Arc<T>;
}

impl<T: Default> OptionArcExt<T> for Option<Arc<T>> {
    fn unwrap_or_default_arc(self) -> Arc<T> {
        self.unwrap_or_else(|| Arc::new(T::default()))
    }
}

/// Builds the Redis-backed shared tier from exactly one source: a
/// [`RedisTierConfig`] to connect fresh, or a tier a caller already built
/// (e.g. sharing a connection pool with other subsystems). Supplying both
/// is [`CacheError::ConflictingRedisConfig`].
#[cfg(feature = "shared")]
pub async fn connect_shared_tier(
    config: Option<RedisTierConfig>,
    prebuilt: Option<Arc<RedisSharedTier>>,
) -> Result<Arc<RedisSharedTier>> {
    match (config, prebuilt) {
        (Some(_), Some(_)) => Err(CacheError::ConflictingRedisConfig),
        (Some(config), None) => Ok(Arc::new(RedisSharedTier::new(config).await?)),
        (None, Some(tier)) => Ok(tier),
        (None, None) => Ok(Arc::new(RedisSharedTier::new(RedisTierConfig::default()).await?)),
    }
}

pub mod prelude {
    pub use crate::{
        scope, BridgeConfig, CacheError, CacheKey, CacheMetrics, Cached, CachedSync, ConfigOracle,
        DisabledReason, Envelope, ErrorStage, GCache, GCacheBuilder, GCacheConfig, KeyConfig,
        KeyDescriptor, Layer, LocalTier, NoopConfigOracle, NoopMetrics, Result, SharedGetOutcome,
        SharedTier,
    };

    #[cfg(feature = "local")]
    pub use crate::{LocalMemoryBackend, LocalTierConfig};
    #[cfg(feature = "shared")]
    pub use crate::{connect_shared_tier, RedisSharedTier, RedisTierConfig};
}
