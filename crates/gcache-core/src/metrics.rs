//! Metrics facade: counters and histograms labeled by `use_case`,
//! `key_type`, and (for cache-path metrics) `layer`.

use std::time::Duration;

use crate::error::{DisabledReason, ErrorStage};
use crate::key::Layer;

/// Direction of a serialization timer observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SerializeDirection {
    Serialize,
    Deserialize,
}

impl SerializeDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SerializeDirection::Serialize => "ser",
            SerializeDirection::Deserialize => "de",
        }
    }
}

/// The metrics sink boundary. Implementors receive every observation the
/// controller, chain, and shared tier make; a deployment's structured
/// metrics backend is wired in behind this trait.
///
/// `NoopMetrics` is the zero-overhead default; an optional adapter over the
/// `metrics` crate is available behind the `metrics` feature.
pub trait CacheMetrics: Send + Sync {
    fn request(&self, use_case: &str, key_type: &str) {
        let _ = (use_case, key_type);
    }

    fn miss(&self, use_case: &str, key_type: &str, layer: Layer) {
        let _ = (use_case, key_type, layer);
    }

    fn disabled(&self, use_case: &str, key_type: &str, reason: DisabledReason) {
        let _ = (use_case, key_type, reason);
    }

    fn error(&self, use_case: &str, key_type: &str, stage: ErrorStage) {
        let _ = (use_case, key_type, stage);
    }

    fn invalidation(&self, key_type: &str) {
        let _ = key_type;
    }

    fn get_timer(&self, use_case: &str, key_type: &str, layer: Layer, elapsed: Duration) {
        let _ = (use_case, key_type, layer, elapsed);
    }

    fn fallback_timer(&self, use_case: &str, key_type: &str, elapsed: Duration) {
        let _ = (use_case, key_type, elapsed);
    }

    fn serialization_timer(
        &self,
        use_case: &str,
        key_type: &str,
        direction: SerializeDirection,
        elapsed: Duration,
    ) {
        let _ = (use_case, key_type, direction, elapsed);
    }

    fn size_histogram(&self, use_case: &str, key_type: &str, bytes: usize) {
        let _ = (use_case, key_type, bytes);
    }
}

/// A `CacheMetrics` implementation that records nothing. The default for
/// consumers who have not wired in a real sink.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl CacheMetrics for NoopMetrics {}

/// Adapter onto the `metrics` crate's global recorder, using `prefix` to
/// namespace every emitted metric name (`<prefix>gcache_request_counter`,
/// etc., per the wire naming in the external interfaces).
#[cfg(feature = "metrics")]
pub struct MetricsCrateAdapter {
    prefix: String,
}

#[cfg(feature = "metrics")]
impl MetricsCrateAdapter {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    fn name(&self, suffix: &str) -> String {
        format!("{}gcache_{}", self.prefix, suffix)
    }
}

#[cfg(feature = "metrics")]
impl CacheMetrics for MetricsCrateAdapter {
    fn request(&self, use_case: &str, key_type: &str) {
        metrics::counter!(
            self.name("request_counter"),
            "use_case" => use_case.to_string(),
            "key_type" => key_type.to_string()
        )
        .increment(1);
    }

    fn miss(&self, use_case: &str, key_type: &str, layer: Layer) {
        metrics::counter!(
            self.name("miss_counter"),
            "use_case" => use_case.to_string(),
            "key_type" => key_type.to_string(),
            "layer" => layer.as_str()
        )
        .increment(1);
    }

    fn disabled(&self, use_case: &str, key_type: &str, reason: DisabledReason) {
        metrics::counter!(
            self.name("disabled_counter"),
            "use_case" => use_case.to_string(),
            "key_type" => key_type.to_string(),
            "reason" => reason.as_str()
        )
        .increment(1);
    }

    fn error(&self, use_case: &str, key_type: &str, stage: ErrorStage) {
        metrics::counter!(
            self.name("error_counter"),
            "use_case" => use_case.to_string(),
            "key_type" => key_type.to_string(),
            "stage" => stage.as_str()
        )
        .increment(1);
    }

    fn invalidation(&self, key_type: &str) {
        metrics::counter!(
            self.name("invalidation_counter"),
            "key_type" => key_type.to_string()
        )
        .increment(1);
    }

    fn get_timer(&self, use_case: &str, key_type: &str, layer: Layer, elapsed: Duration) {
        metrics::histogram!(
            self.name("get_timer"),
            "use_case" => use_case.to_string(),
            "key_type" => key_type.to_string(),
            "layer" => layer.as_str()
        )
        .record(elapsed.as_secs_f64());
    }

    fn fallback_timer(&self, use_case: &str, key_type: &str, elapsed: Duration) {
        metrics::histogram!(
            self.name("fallback_timer"),
            "use_case" => use_case.to_string(),
            "key_type" => key_type.to_string()
        )
        .record(elapsed.as_secs_f64());
    }

    fn serialization_timer(
        &self,
        use_case: &str,
        key_type: &str,
        direction: SerializeDirection,
        elapsed: Duration,
    ) {
        metrics::histogram!(
            self.name("serialization_timer"),
            "use_case" => use_case.to_string(),
            "key_type" => key_type.to_string(),
            "direction" => direction.as_str()
        )
        .record(elapsed.as_secs_f64());
    }

    fn size_histogram(&self, use_case: &str, key_type: &str, bytes: usize) {
        metrics::histogram!(
            self.name("size_histogram"),
            "use_case" => use_case.to_string(),
            "key_type" => key_type.to_string()
        )
        .record(bytes as f64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_metrics_accepts_every_call_without_panicking() {
        let m = NoopMetrics;
        m.request("profile", "user_id");
        m.miss("profile", "user_id", Layer::Local);
        m.disabled("profile", "user_id", DisabledReason::NotEnabled);
        m.error("profile", "user_id", ErrorStage::SharedGet);
        m.invalidation("user_id");
        m.get_timer("profile", "user_id", Layer::Remote, Duration::from_millis(1));
        m.fallback_timer("profile", "user_id", Duration::from_millis(1));
        m.serialization_timer(
            "profile",
            "user_id",
            SerializeDirection::Serialize,
            Duration::from_millis(1),
        );
        m.size_histogram("profile", "user_id", 128);
    }
}
