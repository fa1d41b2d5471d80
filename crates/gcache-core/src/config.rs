//! Per-key configuration and the configuration oracle boundary.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::key::{CacheKey, Layer};

/// `{ttl_sec, ramp}` for a single tier. A missing `KeyConfig` entry for a
/// layer means that layer is disabled for this call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerConfig {
    pub ttl_sec: u64,
    /// Integer percentage in `0..=100`. `0` deterministically disables the
    /// layer; `100` deterministically enables it.
    pub ramp: u8,
}

impl LayerConfig {
    pub fn new(ttl_sec: u64, ramp: u8) -> Self {
        Self {
            ttl_sec: ttl_sec.min(u64::MAX),
            ramp: ramp.min(100),
        }
    }
}

/// Per-call configuration resolved for a [`CacheKey`]: TTL and ramp for
/// whichever layers are present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyConfig {
    layers: HashMap<Layer, LayerConfig>,
}

impl KeyConfig {
    pub fn builder() -> KeyConfigBuilder {
        KeyConfigBuilder::default()
    }

    pub fn get(&self, layer: Layer) -> Option<LayerConfig> {
        self.layers.get(&layer).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct KeyConfigBuilder {
    layers: HashMap<Layer, LayerConfig>,
}

impl KeyConfigBuilder {
    pub fn layer(mut self, layer: Layer, cfg: LayerConfig) -> Self {
        self.layers.insert(layer, cfg);
        self
    }

    pub fn local(self, ttl_sec: u64, ramp: u8) -> Self {
        self.layer(Layer::Local, LayerConfig::new(ttl_sec, ramp))
    }

    pub fn remote(self, ttl_sec: u64, ramp: u8) -> Self {
        self.layer(Layer::Remote, LayerConfig::new(ttl_sec, ramp))
    }

    pub fn build(self) -> KeyConfig {
        KeyConfig {
            layers: self.layers,
        }
    }
}

/// The user-supplied async collaborator that resolves per-key configuration
/// at call time. Out of scope to implement for real, callers bring their
/// own; `lookup` returning `None`, or erroring, both mean "use the
/// descriptor's default_config, or bypass if there isn't one."
#[async_trait]
pub trait ConfigOracle: Send + Sync {
    async fn lookup(&self, key: &CacheKey) -> Option<KeyConfig>;
}

/// An oracle that always returns `None`, useful in tests and as a stand-in
/// when a descriptor relies entirely on its `default_config`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopConfigOracle;

#[async_trait]
impl ConfigOracle for NoopConfigOracle {
    async fn lookup(&self, _key: &CacheKey) -> Option<KeyConfig> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_assembles_per_layer_config() {
        let cfg = KeyConfig::builder().local(60, 100).remote(300, 50).build();
        assert_eq!(
            cfg.get(Layer::Local),
            Some(LayerConfig::new(60, 100))
        );
        assert_eq!(cfg.get(Layer::Remote), Some(LayerConfig::new(300, 50)));
    }

    #[test]
    fn missing_layer_is_none() {
        let cfg = KeyConfig::builder().local(60, 100).build();
        assert_eq!(cfg.get(Layer::Remote), None);
    }

    #[test]
    fn ramp_is_clamped_to_100() {
        let cfg = LayerConfig::new(60, 250);
        assert_eq!(cfg.ramp, 100);
    }

    #[tokio::test]
    async fn noop_oracle_always_absent() {
        let oracle = NoopConfigOracle;
        let key = CacheKey::new("user_id", "1", Default::default(), "profile");
        assert!(oracle.lookup(&key).await.is_none());
    }
}
