//! Cache chain: ordered LOCAL-then-REMOTE read-through over the two tiers.
//!
//! Neither tier knows about the other. The chain is the only thing that
//! does: on a shared-tier hit it backfills the local tier so the next read
//! is local-only, and on a shared-tier `StaleMiss` it deliberately does
//! *not* backfill, since a watermark is declaring the value dead and
//! writing it back to LOCAL would make it outlive that declaration.

use std::sync::Arc;
use std::time::Duration;

use gcache_core::{CacheKey, LayerConfig, LocalTier, Result, SharedGetOutcome, SharedTier};

/// Outcome of a chain read: the bytes if found, and which layers were
/// consulted and missed on the way there (for the `miss_counter{layer}`
/// metric the controller emits per layer it had to pass through).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainRead {
    pub value: Option<Vec<u8>>,
    pub missed_layers: Vec<gcache_core::Layer>,
}

pub struct CacheChain<L, S> {
    local: Arc<L>,
    shared: Arc<S>,
}

impl<L, S> CacheChain<L, S>
where
    L: LocalTier,
    S: SharedTier,
{
    pub fn new(local: Arc<L>, shared: Arc<S>) -> Self {
        Self { local, shared }
    }

    /// Reads LOCAL first (if it participates), then REMOTE (if it
    /// participates and LOCAL missed). A REMOTE hit is backfilled into
    /// LOCAL using LOCAL's own configured TTL, if LOCAL participates.
    #[allow(clippy::too_many_arguments)]
    pub async fn get(
        &self,
        key: &CacheKey,
        canonical: &str,
        local_cfg: Option<LayerConfig>,
        shared_cfg: Option<LayerConfig>,
        track_for_invalidation: bool,
    ) -> Result<ChainRead> {
        let mut missed_layers = Vec::new();

        if local_cfg.is_some() {
            if let Some(bytes) = self.local.get(canonical).await? {
                return Ok(ChainRead {
                    value: Some(bytes),
                    missed_layers,
                });
            }
            missed_layers.push(gcache_core::Layer::Local);
        }

        let Some(shared_cfg) = shared_cfg else {
            return Ok(ChainRead {
                value: None,
                missed_layers,
            });
        };

        match self.shared.get(key, track_for_invalidation).await? {
            SharedGetOutcome::Hit(bytes) => {
                if let Some(local_cfg) = local_cfg {
                    let ttl = Duration::from_secs(local_cfg.ttl_sec);
                    self.local.set(canonical, bytes.clone(), ttl).await?;
                }
                Ok(ChainRead {
                    value: Some(bytes),
                    missed_layers,
                })
            }
            SharedGetOutcome::Miss | SharedGetOutcome::StaleMiss => {
                missed_layers.push(gcache_core::Layer::Remote);
                Ok(ChainRead {
                    value: None,
                    missed_layers,
                })
            }
        }
    }

    /// Writes to whichever layers participate for this call. LOCAL and
    /// REMOTE each get their own configured TTL.
    #[allow(clippy::too_many_arguments)]
    pub async fn set(
        &self,
        key: &CacheKey,
        canonical: &str,
        value: Vec<u8>,
        local_cfg: Option<LayerConfig>,
        shared_cfg: Option<LayerConfig>,
        track_for_invalidation: bool,
    ) -> Result<()> {
        if let Some(shared_cfg) = shared_cfg {
            let ttl = Duration::from_secs(shared_cfg.ttl_sec);
            self.shared
                .set(key, value.clone(), ttl, track_for_invalidation)
                .await?;
        }
        if let Some(local_cfg) = local_cfg {
            let ttl = Duration::from_secs(local_cfg.ttl_sec);
            self.local.set(canonical, value, ttl).await?;
        }
        Ok(())
    }

    /// Removes the key from both layers, for explicit `remove` calls.
    pub async fn remove(&self, key: &CacheKey, canonical: &str) -> Result<()> {
        self.local.delete(canonical).await?;
        self.shared.delete(key).await?;
        Ok(())
    }

    /// Advances the watermark for `(key_type, id)` on the shared tier. The
    /// local tier is watermark-blind by design (§4.C): entries already
    /// cached there keep serving until their own TTL expires.
    pub async fn invalidate(&self, key_type: &str, id: &str, buffer_ms: i64) -> Result<()> {
        self.shared.write_watermark(key_type, id, buffer_ms).await
    }

    /// Clears both tiers entirely.
    pub async fn flushall(&self) -> Result<()> {
        self.local.clear().await?;
        self.shared.flushall().await
    }
}
