//! Prometheus metrics for the sync pipeline.
//!
//! All metrics follow the naming convention: `rumor_<metric>_<unit>`

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Encoder, Gauge, Histogram, HistogramOpts, IntCounter, Registry,
    TextEncoder,
};

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    /// Blocks committed to the replica
    pub static ref BLOCKS_INJECTED: IntCounter = IntCounter::new(
        "rumor_blocks_injected_total",
        "Total number of blocks injected and committed"
    ).expect("metric creation failed");

    /// Injections that failed, rejected or fatal
    pub static ref INJECT_ERRORS: IntCounter = IntCounter::new(
        "rumor_inject_errors_total",
        "Total number of failed block injections"
    ).expect("metric creation failed");

    /// Blocks fetched over HTTP to close a gap
    pub static ref CATCHUP_BLOCKS: IntCounter = IntCounter::new(
        "rumor_catchup_blocks_total",
        "Total number of blocks injected in catch-up mode"
    ).expect("metric creation failed");

    /// Feed reconnect attempts
    pub static ref FEED_RECONNECTS: IntCounter = IntCounter::new(
        "rumor_feed_reconnects_total",
        "Total number of block feed reconnect attempts"
    ).expect("metric creation failed");

    /// Time from opening the critical zone to releasing it
    pub static ref INJECT_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "rumor_inject_duration_seconds",
            "Time spent injecting one block, indexers included"
        ).buckets(
            exponential_buckets(0.001, 2.0, 15).unwrap_or_else(|_| prometheus::DEFAULT_BUCKETS.to_vec())
        )
    ).expect("metric creation failed");

    /// Height of the last committed block
    pub static ref LOCAL_HEIGHT: Gauge = Gauge::new(
        "rumor_local_height",
        "Height of the last block committed by the replica"
    ).expect("metric creation failed");
}

/// Handle to the registry the metrics live in.
#[derive(Clone)]
pub struct MetricsHandle {
    registry: Registry,
}

impl MetricsHandle {
    /// Render every registered metric in the text exposition format.
    pub fn encode(&self) -> Result<String, TelemetryError> {
        encode_registry(&self.registry)
    }
}

/// Register all metrics with the global registry.
///
/// Calling this more than once is harmless.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(BLOCKS_INJECTED.clone()),
        Box::new(INJECT_ERRORS.clone()),
        Box::new(CATCHUP_BLOCKS.clone()),
        Box::new(FEED_RECONNECTS.clone()),
        Box::new(INJECT_DURATION.clone()),
        Box::new(LOCAL_HEIGHT.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(MetricsHandle {
        registry: REGISTRY.clone(),
    })
}

/// Encode the global registry as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    encode_registry(&REGISTRY)
}

fn encode_registry(registry: &Registry) -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Timer guard for automatic histogram observation.
pub struct HistogramTimer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl HistogramTimer {
    /// Start a new timer for the given histogram.
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        self.histogram.observe(self.start.elapsed().as_secs_f64());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_twice() {
        register_metrics().unwrap();
        register_metrics().unwrap();
    }

    #[test]
    fn test_encode_lists_metrics() {
        let handle = register_metrics().unwrap();
        BLOCKS_INJECTED.inc();
        let text = handle.encode().unwrap();
        assert!(text.contains("rumor_blocks_injected_total"));
        assert!(text.contains("rumor_local_height"));
    }

    #[test]
    fn test_histogram_timer_observes_on_drop() {
        let before = INJECT_DURATION.get_sample_count();
        {
            let _timer = HistogramTimer::new(&INJECT_DURATION);
        }
        assert!(INJECT_DURATION.get_sample_count() > before);
    }
}
