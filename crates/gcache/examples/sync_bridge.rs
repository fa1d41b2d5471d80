//! Calls a `register_sync` function from inside an `enable` scope on an
//! async task. The scope is captured at dispatch time and re-installed on
//! the bridge worker, so the plain-thread call observes the same
//! enablement as an async caller would.

use std::sync::Arc;

use gcache::prelude::*;
use gcache::JsonSerializer;
use gcache_storage::LocalMemoryBackend;

struct OrderArgs {
    order_id: u32,
}

type Facade = GCache<LocalMemoryBackend, NullSharedTier, NoopMetrics, JsonSerializer, NoopConfigOracle>;

#[tokio::main]
async fn main() {
    let cache: Facade = GCache::builder(
        Arc::new(LocalMemoryBackend::with_defaults()),
        Arc::new(NullSharedTier),
    )
    .build()
    .expect("only one facade may be constructed per process");

    let descriptor = KeyDescriptor::builder("order_id", "receipt")
        .id_fn(|a: &OrderArgs| Ok(a.order_id.to_string()))
        .default_config(KeyConfig::builder().local(60, 100).build())
        .build()
        .unwrap();

    let receipt = cache.register_sync(descriptor);

    cache
        .enable(true, async {
            // `call` blocks the current thread while the bridge worker runs
            // the future, so hand it to `spawn_blocking` rather than call it
            // directly on the async task's own thread.
            let receipt = &receipt;
            let first = tokio::task::block_in_place(|| {
                receipt.call(OrderArgs { order_id: 1 }, |a| {
                    let order_id = a.order_id;
                    async move {
                        println!("rendering receipt for order {order_id}");
                        Ok::<_, CacheError>(format!("receipt-{order_id}"))
                    }
                })
            })
            .unwrap();

            let second = tokio::task::block_in_place(|| {
                receipt.call(OrderArgs { order_id: 1 }, |a| {
                    let order_id = a.order_id;
                    async move {
                        println!("this fallback must not run a second time");
                        Ok::<_, CacheError>(format!("receipt-{order_id}"))
                    }
                })
            })
            .unwrap();

            assert_eq!(first, second);
            println!("{first}");
        })
        .await;

    cache.ainvalidate("order_id", "1", 0).await.unwrap();
}

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
