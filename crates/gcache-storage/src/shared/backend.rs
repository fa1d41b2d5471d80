//! Redis-backed shared tier with folded-in watermark read.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bb8::{Pool, PooledConnection};
use bb8_redis::RedisConnectionManager;
use redis::AsyncCommands;

use gcache_core::{
    CacheError, CacheKey, CacheMetrics, ErrorStage, Envelope, NoopMetrics, Result,
    SharedGetOutcome, SharedTier,
};

use super::config::RedisTierConfig;

/// `bb8`-pooled async Redis client implementing [`SharedTier`].
///
/// Every public method is fail-open: any transport or protocol error from
/// the inner `try_*` helper is caught here, logged, counted against
/// `error_counter{stage}`, and converted into a miss (reads) or a silent
/// success (writes) rather than propagated: a cache failure must never
/// reach the caller.
#[derive(Clone)]
pub struct RedisSharedTier {
    pool: Pool<RedisConnectionManager>,
    config: RedisTierConfig,
    metrics: Arc<dyn CacheMetrics>,
}

impl RedisSharedTier {
    pub async fn new(config: RedisTierConfig) -> Result<Self> {
        Self::with_metrics(config, Arc::new(NoopMetrics)).await
    }

    pub async fn with_metrics(
        config: RedisTierConfig,
        metrics: Arc<dyn CacheMetrics>,
    ) -> Result<Self> {
        let manager = RedisConnectionManager::new(config.url.as_str())
            .map_err(|e| CacheError::Transport(e.to_string()))?;

        let pool = Pool::builder()
            .max_size(config.pool_size)
            .connection_timeout(config.connection_timeout)
            .build(manager)
            .await
            .map_err(|e| CacheError::Transport(e.to_string()))?;

        Ok(Self {
            pool,
            config,
            metrics,
        })
    }

    fn prefixed(&self, key: &str) -> String {
        match &self.config.key_prefix {
            Some(prefix) => format!("{prefix}:{key}"),
            None => key.to_string(),
        }
    }

    fn envelope_key(&self, key: &CacheKey) -> String {
        self.prefixed(&key.canonical(&self.config.urn_prefix))
    }

    fn watermark_redis_key(&self, key_type: &str, id: &str) -> String {
        self.prefixed(&CacheKey::watermark_key(key_type, id))
    }

    async fn connection(&self) -> Result<PooledConnection<'_, RedisConnectionManager>> {
        self.pool
            .get()
            .await
            .map_err(|e| CacheError::Transport(e.to_string()))
    }

    async fn try_get(
        &self,
        key: &CacheKey,
        track_for_invalidation: bool,
    ) -> Result<SharedGetOutcome> {
        let mut conn = self.connection().await?;
        let envelope_key = self.envelope_key(key);

        if !track_for_invalidation {
            let raw: Option<Vec<u8>> = conn
                .get(&envelope_key)
                .await
                .map_err(|e| CacheError::Transport(e.to_string()))?;
            return Ok(match raw {
                Some(bytes) => SharedGetOutcome::Hit(bytes),
                None => SharedGetOutcome::Miss,
            });
        }

        let watermark_key = self.watermark_redis_key(&key.key_type, &key.id);
        let (raw_envelope, raw_watermark): (Option<Vec<u8>>, Option<i64>) = redis::pipe()
            .get(&envelope_key)
            .get(&watermark_key)
            .query_async(&mut *conn)
            .await
            .map_err(|e| CacheError::Transport(e.to_string()))?;

        let Some(raw_envelope) = raw_envelope else {
            return Ok(SharedGetOutcome::Miss);
        };

        let envelope: Envelope = serde_json::from_slice(&raw_envelope)
            .map_err(|e| CacheError::Serialization(e.to_string()))?;

        if let Some(watermark_ms) = raw_watermark {
            if envelope.is_stale_under(watermark_ms) {
                return Ok(SharedGetOutcome::StaleMiss);
            }
        }

        Ok(SharedGetOutcome::Hit(envelope.bytes))
    }

    async fn try_set(
        &self,
        key: &CacheKey,
        value: Vec<u8>,
        ttl: Duration,
        track_for_invalidation: bool,
    ) -> Result<()> {
        let mut conn = self.connection().await?;
        let envelope_key = self.envelope_key(key);
        let size = value.len();

        let payload = if track_for_invalidation {
            let envelope = Envelope::new(value, now_ms());
            serde_json::to_vec(&envelope).map_err(|e| CacheError::Serialization(e.to_string()))?
        } else {
            value
        };

        self.metrics
            .size_histogram(&key.use_case, &key.key_type, size);

        let ttl_secs = ttl.as_secs().max(1);
        let _: () = conn
            .set_ex(&envelope_key, payload, ttl_secs)
            .await
            .map_err(|e| CacheError::Transport(e.to_string()))?;
        Ok(())
    }

    async fn try_delete(&self, key: &CacheKey) -> Result<()> {
        let mut conn = self.connection().await?;
        let envelope_key = self.envelope_key(key);
        let _: u64 = conn
            .del(&envelope_key)
            .await
            .map_err(|e| CacheError::Transport(e.to_string()))?;
        Ok(())
    }

    async fn try_write_watermark(&self, key_type: &str, id: &str, buffer_ms: i64) -> Result<()> {
        let mut conn = self.connection().await?;
        let watermark_key = self.watermark_redis_key(key_type, id);
        let value = now_ms() + buffer_ms;
        let ttl_secs = self.config.watermark_ttl.as_secs().max(1);
        let _: () = conn
            .set_ex(&watermark_key, value, ttl_secs)
            .await
            .map_err(|e| CacheError::Transport(e.to_string()))?;
        Ok(())
    }

    async fn try_flushall(&self) -> Result<()> {
        let mut conn = self.connection().await?;
        redis::cmd("FLUSHDB")
            .query_async::<()>(&mut *conn)
            .await
            .map_err(|e| CacheError::Transport(e.to_string()))?;
        Ok(())
    }
}

fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

#[async_trait]
impl SharedTier for RedisSharedTier {
    async fn get(&self, key: &CacheKey, track_for_invalidation: bool) -> Result<SharedGetOutcome> {
        match self.try_get(key, track_for_invalidation).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                tracing::warn!(error = %err, use_case = %key.use_case, key_type = %key.key_type, "shared tier get failed, treating as miss");
                self.metrics
                    .error(&key.use_case, &key.key_type, ErrorStage::SharedGet);
                Ok(SharedGetOutcome::Miss)
            }
        }
    }

    async fn set(
        &self,
        key: &CacheKey,
        value: Vec<u8>,
        ttl: Duration,
        track_for_invalidation: bool,
    ) -> Result<()> {
        match self.try_set(key, value, ttl, track_for_invalidation).await {
            Ok(()) => Ok(()),
            Err(err) => {
                tracing::warn!(error = %err, use_case = %key.use_case, key_type = %key.key_type, "shared tier set failed, dropping write");
                self.metrics
                    .error(&key.use_case, &key.key_type, ErrorStage::SharedSet);
                Ok(())
            }
        }
    }

    async fn delete(&self, key: &CacheKey) -> Result<()> {
        match self.try_delete(key).await {
            Ok(()) => Ok(()),
            Err(err) => {
                tracing::warn!(error = %err, use_case = %key.use_case, key_type = %key.key_type, "shared tier delete failed");
                self.metrics
                    .error(&key.use_case, &key.key_type, ErrorStage::SharedSet);
                Ok(())
            }
        }
    }

    async fn write_watermark(&self, key_type: &str, id: &str, buffer_ms: i64) -> Result<()> {
        match self.try_write_watermark(key_type, id, buffer_ms).await {
            Ok(()) => Ok(()),
            Err(err) => {
                tracing::warn!(error = %err, key_type = %key_type, "watermark write failed");
                self.metrics.error("watermark", key_type, ErrorStage::Watermark);
                Ok(())
            }
        }
    }

    async fn flushall(&self) -> Result<()> {
        match self.try_flushall().await {
            Ok(()) => Ok(()),
            Err(err) => {
                tracing::warn!(error = %err, "flushall failed");
                Ok(())
            }
        }
    }
}
