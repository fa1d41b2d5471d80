//! Controller: the read-through policy tying key building, config
//! resolution, ramp gating, the cache chain, and the caller's fallback
//! together for one call.
//!
//! `gcache_core::Serializer` has generic methods, so it can't be
//! type-erased into a `dyn Serializer` the shared tier could hold onto.
//! Rather than work around that with double dispatch, serialization lives
//! here instead of in the shared tier: the controller is the only
//! component that ever holds the concrete result type `T`, and it is
//! therefore also the only place the `serialization_timer` metric from
//! §4.D can actually be taken. `size_histogram` stays with the shared
//! tier, which only needs the already-serialized byte length.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use serde::{de::DeserializeOwned, Serialize};
use tracing::warn;

use gcache_core::{
    ramp_participates, CacheKey, CacheMetrics, ConfigOracle, DisabledReason, ErrorStage,
    KeyConfig, KeyDescriptor, Layer, LocalTier, Result, SerializeDirection, Serializer,
    SharedTier,
};

use crate::chain::CacheChain;
use crate::scope;

#[derive(Debug, Clone)]
pub struct GCacheConfig {
    /// Prefix used in the canonical URN form (spec's own historical
    /// double-prefix form is preserved; see the design ledger).
    pub urn_prefix: String,
    /// Deserialization of payloads above this size is offloaded to
    /// `spawn_blocking` so a large value doesn't block the async runtime's
    /// worker thread. Serialization is not offloaded the same way: its
    /// size isn't known until after it runs.
    pub large_payload_threshold: usize,
}

impl Default for GCacheConfig {
    fn default() -> Self {
        Self {
            urn_prefix: "urn".to_string(),
            large_payload_threshold: 50 * 1024,
        }
    }
}

pub struct Controller<L, S, M, Ser, O> {
    chain: CacheChain<L, S>,
    metrics: Arc<M>,
    serializer: Arc<Ser>,
    oracle: Arc<O>,
    config: GCacheConfig,
}

impl<L, S, M, Ser, O> Controller<L, S, M, Ser, O>
where
    L: LocalTier,
    S: SharedTier,
    M: CacheMetrics,
    Ser: Serializer + 'static,
    O: ConfigOracle,
{
    pub fn new(
        local: Arc<L>,
        shared: Arc<S>,
        metrics: Arc<M>,
        serializer: Arc<Ser>,
        oracle: Arc<O>,
        config: GCacheConfig,
    ) -> Self {
        Self {
            chain: CacheChain::new(local, shared),
            metrics,
            serializer,
            oracle,
            config,
        }
    }

    /// Advances the shared-tier watermark for `(key_type, id)`.
    pub async fn invalidate(&self, key_type: &str, id: &str, buffer_ms: i64) -> Result<()> {
        let result = self.chain.invalidate(key_type, id, buffer_ms).await;
        if result.is_ok() {
            self.metrics.invalidation(key_type);
        }
        result
    }

    /// Clears both tiers entirely.
    pub async fn flushall(&self) -> Result<()> {
        self.chain.flushall().await
    }

    /// Removes one key from both tiers.
    pub async fn remove(&self, key: &CacheKey) -> Result<()> {
        let canonical = key.canonical(&self.config.urn_prefix);
        self.chain.remove(key, &canonical).await
    }

    /// The full read-through policy for one registered call.
    ///
    /// `fallback` runs, and its result is cached, exactly when the cache is
    /// disabled, bypassed (no config, key build failure), or misses on
    /// every participating layer. A deserialization failure on a hit is
    /// treated the same as a miss rather than propagated: a corrupted or
    /// incompatible cached payload should never fail a call the fallback
    /// could have served directly.
    pub async fn get_or_compute<Args, T, F, Fut>(
        &self,
        descriptor: &KeyDescriptor<Args>,
        args: &Args,
        fallback: F,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let use_case = descriptor.use_case();
        let key_type = descriptor.key_type();
        self.metrics.request(use_case, key_type);

        match scope::state() {
            scope::ScopeState::Enabled => {}
            scope::ScopeState::ExplicitlyDisabled => {
                self.metrics
                    .disabled(use_case, key_type, DisabledReason::ExplicitlyDisabled);
                return self.run_fallback_only(use_case, key_type, fallback).await;
            }
            scope::ScopeState::NoScope => {
                self.metrics.disabled(use_case, key_type, DisabledReason::NotEnabled);
                return self.run_fallback_only(use_case, key_type, fallback).await;
            }
        }

        let key = match descriptor.build_key(args) {
            Ok(key) => key,
            Err(err) => {
                self.metrics.disabled(use_case, key_type, DisabledReason::KeyError);
                warn!(error = %err, "key build failed, bypassing cache");
                return self.run_fallback_only(use_case, key_type, fallback).await;
            }
        };

        let resolved = self.oracle.lookup(&key).await.or_else(|| descriptor.default_config().cloned());
        let Some(resolved) = resolved else {
            self.metrics.disabled(use_case, key_type, DisabledReason::NoConfig);
            return self.run_fallback_only(use_case, key_type, fallback).await;
        };

        let local_cfg = gated_layer(&resolved, Layer::Local);
        let shared_cfg = gated_layer(&resolved, Layer::Remote);

        if local_cfg.is_none() && shared_cfg.is_none() {
            self.metrics.disabled(use_case, key_type, DisabledReason::RampedOff);
            return self.run_fallback_only(use_case, key_type, fallback).await;
        }

        let canonical = key.canonical(&self.config.urn_prefix);
        let track = descriptor.track_for_invalidation();

        let deepest = if shared_cfg.is_some() { Layer::Remote } else { Layer::Local };
        let started = Instant::now();
        let read = self
            .chain
            .get(&key, &canonical, local_cfg, shared_cfg, track)
            .await?;
        self.metrics.get_timer(use_case, key_type, deepest, started.elapsed());
        for layer in &read.missed_layers {
            self.metrics.miss(use_case, key_type, *layer);
        }

        if let Some(bytes) = read.value {
            match self.deserialize(use_case, key_type, bytes).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    warn!(error = %err, "cached payload failed to deserialize, recomputing");
                }
            }
        }

        let started = Instant::now();
        let value = fallback().await?;
        self.metrics.fallback_timer(use_case, key_type, started.elapsed());

        if let Err(err) = self
            .populate(use_case, key_type, &key, &canonical, &value, local_cfg, shared_cfg, track)
            .await
        {
            warn!(error = %err, "failed to populate cache after fallback");
        }

        Ok(value)
    }

    async fn run_fallback_only<T, F, Fut>(&self, use_case: &str, key_type: &str, fallback: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let started = Instant::now();
        let value = fallback().await?;
        self.metrics.fallback_timer(use_case, key_type, started.elapsed());
        Ok(value)
    }

    async fn deserialize<T>(&self, use_case: &str, key_type: &str, bytes: Vec<u8>) -> Result<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let serializer = Arc::clone(&self.serializer);
        let started = Instant::now();
        let value = if bytes.len() > self.config.large_payload_threshold {
            tokio::task::spawn_blocking(move || serializer.deserialize::<T>(&bytes))
                .await
                .map_err(|e| gcache_core::CacheError::Serialization(e.to_string()))?
        } else {
            serializer.deserialize::<T>(&bytes)
        };
        match &value {
            Ok(_) => self.metrics.serialization_timer(
                use_case,
                key_type,
                SerializeDirection::Deserialize,
                started.elapsed(),
            ),
            Err(_) => self.metrics.error(use_case, key_type, ErrorStage::Deserialize),
        }
        value
    }

    #[allow(clippy::too_many_arguments)]
    async fn populate<T>(
        &self,
        use_case: &str,
        key_type: &str,
        key: &CacheKey,
        canonical: &str,
        value: &T,
        local_cfg: Option<gcache_core::LayerConfig>,
        shared_cfg: Option<gcache_core::LayerConfig>,
        track: bool,
    ) -> Result<()>
    where
        T: Serialize,
    {
        let started = Instant::now();
        let bytes = match self.serializer.serialize(value) {
            Ok(bytes) => bytes,
            Err(err) => {
                self.metrics.error(use_case, key_type, ErrorStage::Serialize);
                return Err(err);
            }
        };
        self.metrics.serialization_timer(
            use_case,
            key_type,
            SerializeDirection::Serialize,
            started.elapsed(),
        );
        self.chain
            .set(key, canonical, bytes, local_cfg, shared_cfg, track)
            .await
    }
}

/// Resolves a key's config for `layer`, then runs the per-call ramp draw.
/// A layer with no config, or one whose draw comes up against it, is
/// treated identically: the layer does not participate in this call.
fn gated_layer(resolved: &KeyConfig, layer: Layer) -> Option<gcache_core::LayerConfig> {
    let cfg = resolved.get(layer)?;
    ramp_participates(cfg.ramp).then_some(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use gcache_core::{CacheError, LayerConfig, NoopConfigOracle, NoopMetrics, SharedGetOutcome};
    use gcache_storage::LocalMemoryBackend;
    use serde::Deserialize;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct Profile {
        id: u32,
        name: String,
    }

    struct CallArgs {
        id: u32,
    }

    #[derive(Default)]
    struct FakeShared {
        store: std::sync::Mutex<std::collections::HashMap<String, Vec<u8>>>,
    }

    #[async_trait]
    impl SharedTier for FakeShared {
        async fn get(&self, key: &CacheKey, _track: bool) -> Result<SharedGetOutcome> {
            let canonical = key.canonical("urn");
            Ok(match self.store.lock().unwrap().get(&canonical) {
                Some(bytes) => SharedGetOutcome::Hit(bytes.clone()),
                None => SharedGetOutcome::Miss,
            })
        }

        async fn set(&self, key: &CacheKey, value: Vec<u8>, _ttl: Duration, _track: bool) -> Result<()> {
            self.store.lock().unwrap().insert(key.canonical("urn"), value);
            Ok(())
        }

        async fn delete(&self, key: &CacheKey) -> Result<()> {
            self.store.lock().unwrap().remove(&key.canonical("urn"));
            Ok(())
        }

        async fn write_watermark(&self, _kt: &str, _id: &str, _buffer_ms: i64) -> Result<()> {
            Ok(())
        }

        async fn flushall(&self) -> Result<()> {
            self.store.lock().unwrap().clear();
            Ok(())
        }
    }

    fn descriptor() -> KeyDescriptor<CallArgs> {
        KeyDescriptor::builder("profile", "profile")
            .id_fn(|a: &CallArgs| Ok(a.id.to_string()))
            .default_config(KeyConfig::builder().local(60, 100).remote(300, 100).build())
            .build()
            .unwrap()
    }

    fn controller() -> Controller<LocalMemoryBackend, FakeShared, NoopMetrics, gcache_core::JsonSerializer, NoopConfigOracle> {
        Controller::new(
            Arc::new(LocalMemoryBackend::with_defaults()),
            Arc::new(FakeShared::default()),
            Arc::new(NoopMetrics),
            Arc::new(gcache_core::JsonSerializer),
            Arc::new(NoopConfigOracle),
            GCacheConfig::default(),
        )
    }

    #[tokio::test]
    async fn disabled_scope_always_calls_fallback() {
        let c = controller();
        let calls = AtomicUsize::new(0);
        let result = c
            .get_or_compute(&descriptor(), &CallArgs { id: 1 }, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(Profile { id: 1, name: "a".to_string() })
            })
            .await
            .unwrap();
        assert_eq!(result.id, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[derive(Default)]
    struct DisabledReasonMetrics {
        reasons: std::sync::Mutex<Vec<DisabledReason>>,
    }

    impl CacheMetrics for DisabledReasonMetrics {
        fn disabled(&self, _use_case: &str, _key_type: &str, reason: DisabledReason) {
            self.reasons.lock().unwrap().push(reason);
        }
    }

    #[tokio::test]
    async fn no_scope_and_explicit_disable_record_different_reasons() {
        let metrics = Arc::new(DisabledReasonMetrics::default());
        let c = Controller::new(
            Arc::new(LocalMemoryBackend::with_defaults()),
            Arc::new(FakeShared::default()),
            Arc::clone(&metrics),
            Arc::new(gcache_core::JsonSerializer),
            Arc::new(NoopConfigOracle),
            GCacheConfig::default(),
        );

        c.get_or_compute(&descriptor(), &CallArgs { id: 1 }, || async {
            Ok(Profile { id: 1, name: "a".to_string() })
        })
        .await
        .unwrap();

        scope::with_scope(false, async {
            c.get_or_compute(&descriptor(), &CallArgs { id: 1 }, || async {
                Ok(Profile { id: 1, name: "a".to_string() })
            })
            .await
        })
        .await
        .unwrap();

        let reasons = metrics.reasons.lock().unwrap().clone();
        assert_eq!(reasons, vec![DisabledReason::NotEnabled, DisabledReason::ExplicitlyDisabled]);
    }

    #[tokio::test]
    async fn enabled_scope_caches_fallback_result() {
        let c = controller();
        let calls = Arc::new(AtomicUsize::new(0));

        let first = scope::with_scope(true, {
            let calls = Arc::clone(&calls);
            async {
                c.get_or_compute(&descriptor(), &CallArgs { id: 7 }, move || {
                    let calls = Arc::clone(&calls);
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok(Profile { id: 7, name: "first".to_string() })
                    }
                })
                .await
            }
        })
        .await
        .unwrap();

        let second = scope::with_scope(true, {
            let calls = Arc::clone(&calls);
            async {
                c.get_or_compute(&descriptor(), &CallArgs { id: 7 }, move || {
                    let calls = Arc::clone(&calls);
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok(Profile { id: 7, name: "second".to_string() })
                    }
                })
                .await
            }
        })
        .await
        .unwrap();

        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn zero_ramp_bypasses_both_layers() {
        let c = Controller::new(
            Arc::new(LocalMemoryBackend::with_defaults()),
            Arc::new(FakeShared::default()),
            Arc::new(NoopMetrics),
            Arc::new(gcache_core::JsonSerializer),
            Arc::new(NoopConfigOracle),
            GCacheConfig::default(),
        );
        let descriptor = KeyDescriptor::builder("profile", "profile")
            .id_fn(|a: &CallArgs| Ok(a.id.to_string()))
            .default_config(KeyConfig::builder().local(60, 0).remote(60, 0).build())
            .build()
            .unwrap();
        let calls = AtomicUsize::new(0);

        scope::with_scope(true, async {
            c.get_or_compute(&descriptor, &CallArgs { id: 1 }, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(Profile { id: 1, name: "a".to_string() })
            })
            .await
        })
        .await
        .unwrap();

        scope::with_scope(true, async {
            c.get_or_compute(&descriptor, &CallArgs { id: 1 }, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(Profile { id: 1, name: "a".to_string() })
            })
            .await
        })
        .await
        .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[derive(Default)]
    struct RecordingMetrics {
        get_timer_ms: std::sync::Mutex<Vec<u128>>,
    }

    impl CacheMetrics for RecordingMetrics {
        fn get_timer(&self, _use_case: &str, _key_type: &str, _layer: Layer, elapsed: Duration) {
            self.get_timer_ms.lock().unwrap().push(elapsed.as_millis());
        }
    }

    #[tokio::test]
    async fn get_timer_excludes_fallback_time() {
        let metrics = Arc::new(RecordingMetrics::default());
        let c = Controller::new(
            Arc::new(LocalMemoryBackend::with_defaults()),
            Arc::new(FakeShared::default()),
            Arc::clone(&metrics),
            Arc::new(gcache_core::JsonSerializer),
            Arc::new(NoopConfigOracle),
            GCacheConfig::default(),
        );

        scope::with_scope(true, async {
            c.get_or_compute(&descriptor(), &CallArgs { id: 42 }, || async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok(Profile { id: 42, name: "slow".to_string() })
            })
            .await
        })
        .await
        .unwrap();

        let recorded = metrics.get_timer_ms.lock().unwrap().clone();
        assert_eq!(recorded.len(), 1);
        assert!(recorded[0] < 100, "get_timer leaked fallback time: {recorded:?}");
    }

    #[derive(Default)]
    struct ErrorCountingMetrics {
        shared_get_errors: AtomicUsize,
    }

    impl CacheMetrics for ErrorCountingMetrics {
        fn error(&self, _use_case: &str, _key_type: &str, stage: gcache_core::ErrorStage) {
            if matches!(stage, gcache_core::ErrorStage::SharedGet) {
                self.shared_get_errors.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    /// Mimics what `RedisSharedTier` does with a permanently unreachable
    /// transport: every call fails open, converting the transport error
    /// into a miss (reads) or a silent success (writes) and counting
    /// `error_counter{stage=shared_get}` rather than ever returning `Err`
    /// to its caller. Takes the same metrics sink the controller uses, the
    /// way a real deployment wires one shared recorder into both.
    struct PermanentlyFailingShared {
        metrics: Arc<ErrorCountingMetrics>,
    }

    #[async_trait]
    impl SharedTier for PermanentlyFailingShared {
        async fn get(&self, key: &CacheKey, _track: bool) -> Result<SharedGetOutcome> {
            self.metrics
                .error(&key.use_case, &key.key_type, gcache_core::ErrorStage::SharedGet);
            Ok(SharedGetOutcome::Miss)
        }
        async fn set(&self, _key: &CacheKey, _value: Vec<u8>, _ttl: Duration, _track: bool) -> Result<()> {
            Ok(())
        }
        async fn delete(&self, _key: &CacheKey) -> Result<()> {
            Ok(())
        }
        async fn write_watermark(&self, _kt: &str, _id: &str, _buffer_ms: i64) -> Result<()> {
            Ok(())
        }
        async fn flushall(&self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn shared_tier_failure_is_fully_transparent_to_the_caller() {
        let metrics = Arc::new(ErrorCountingMetrics::default());
        let c = Controller::new(
            Arc::new(LocalMemoryBackend::with_defaults()),
            Arc::new(PermanentlyFailingShared { metrics: Arc::clone(&metrics) }),
            Arc::clone(&metrics),
            Arc::new(gcache_core::JsonSerializer),
            Arc::new(NoopConfigOracle),
            GCacheConfig::default(),
        );
        // ramp LOCAL off entirely so every call is forced through the
        // failing REMOTE tier and none of it is masked by an earlier hit.
        let descriptor = KeyDescriptor::builder("user_id", "profile")
            .id_fn(|a: &CallArgs| Ok(a.id.to_string()))
            .default_config(KeyConfig::builder().remote(300, 100).build())
            .build()
            .unwrap();

        let result = scope::with_scope(true, async {
            c.get_or_compute(&descriptor, &CallArgs { id: 7 }, || async {
                Ok(Profile { id: 7, name: "from fallback".to_string() })
            })
            .await
        })
        .await
        .unwrap();

        assert_eq!(result.name, "from fallback");
        assert!(metrics.shared_get_errors.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn fallback_error_propagates_unchanged() {
        let c = controller();
        let result: Result<Profile> = scope::with_scope(true, async {
            c.get_or_compute(&descriptor(), &CallArgs { id: 9 }, || async {
                Err(CacheError::Transport("db down".to_string()))
            })
            .await
        })
        .await;
        assert!(matches!(result, Err(CacheError::Transport(_))));
    }
}
