//! Registers an async function, runs it under an `enable` scope, and shows
//! the fallback only firing once across two calls.

use std::sync::Arc;

use gcache::prelude::*;
use gcache::JsonSerializer;
use gcache_storage::LocalMemoryBackend;

struct UserArgs {
    user_id: u32,
}

type Facade = GCache<LocalMemoryBackend, NullSharedTier, NoopMetrics, JsonSerializer, NoopConfigOracle>;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cache: Facade = GCache::builder(
        Arc::new(LocalMemoryBackend::with_defaults()),
        Arc::new(NullSharedTier),
    )
    .build()
    .expect("only one facade may be constructed per process");

    let descriptor = KeyDescriptor::builder("user_id", "profile")
        .id_fn(|a: &UserArgs| Ok(a.user_id.to_string()))
        .default_config(KeyConfig::builder().local(60, 100).build())
        .build()
        .unwrap();

    let profile = cache.register(descriptor);

    let load_profile = |user_id: u32| async move {
        println!("loading profile {user_id} from the database");
        Ok::<_, CacheError>(format!("user-{user_id}"))
    };

    cache
        .enable(true, async {
            let first = profile
                .call(&UserArgs { user_id: 42 }, || load_profile(42))
                .await
                .unwrap();
            let second = profile
                .call(&UserArgs { user_id: 42 }, || load_profile(42))
                .await
                .unwrap();
            assert_eq!(first, second);
        })
        .await;

    cache.ainvalidate("user_id", "42", 0).await.unwrap();
}

/// A shared tier that always misses, standing in for Redis in this example.
#[derive(Default)]
struct NullSharedTier;

#[async_trait::async_trait]
impl SharedTier for NullSharedTier {
    async fn get(&self, _key: &CacheKey, _track: bool) -> Result<SharedGetOutcome> {
        Ok(SharedGetOutcome::Miss)
    }
    async fn set(
        &self,
        _key: &CacheKey,
        _value: Vec<u8>,
        _ttl: std::time::Duration,
        _track: bool,
    ) -> Result<()> {
        Ok(())
    }
    async fn delete(&self, _key: &CacheKey) -> Result<()> {
        Ok(())
    }
    async fn write_watermark(&self, _key_type: &str, _id: &str, _buffer_ms: i64) -> Result<()> {
        Ok(())
    }
    async fn flushall(&self) -> Result<()> {
        Ok(())
    }
}
