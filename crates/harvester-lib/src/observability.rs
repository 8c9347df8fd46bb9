//! Observability infrastructure for the harvester
//!
//! Prometheus metrics for collection ticks, series appends, and drain
//! behavior. Structured logging goes through `tracing` at the call
//! sites; the binary installs the JSON subscriber.

use prometheus::{
    register_histogram, register_int_counter, register_int_gauge, Histogram, IntCounter, IntGauge,
};
use std::sync::OnceLock;

/// Histogram buckets for tick and drain durations (in seconds)
const DURATION_BUCKETS: &[f64] = &[0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<HarvesterMetricsInner> = OnceLock::new();

struct HarvesterMetricsInner {
    tick_duration_seconds: Histogram,
    drain_duration_seconds: Histogram,
    samples_appended: IntCounter,
    collection_errors: IntCounter,
    parse_errors: IntCounter,
    entities_last_tick: IntGauge,
    sessions_active: IntGauge,
}

impl HarvesterMetricsInner {
    fn new() -> Self {
        Self {
            tick_duration_seconds: register_histogram!(
                "harvester_tick_duration_seconds",
                "Time spent sampling all entities in one collection tick",
                DURATION_BUCKETS.to_vec()
            )
            .expect("Failed to register tick_duration_seconds"),

            drain_duration_seconds: register_histogram!(
                "harvester_drain_duration_seconds",
                "Time spent draining all sessions of a registry",
                DURATION_BUCKETS.to_vec()
            )
            .expect("Failed to register drain_duration_seconds"),

            samples_appended: register_int_counter!(
                "harvester_samples_appended_total",
                "Total number of samples appended to series stores"
            )
            .expect("Failed to register samples_appended"),

            collection_errors: register_int_counter!(
                "harvester_collection_errors_total",
                "Total number of per-entity metrics source failures"
            )
            .expect("Failed to register collection_errors"),

            parse_errors: register_int_counter!(
                "harvester_parse_errors_total",
                "Total number of discarded malformed usage tables"
            )
            .expect("Failed to register parse_errors"),

            entities_last_tick: register_int_gauge!(
                "harvester_entities_last_tick",
                "Number of ready entities resolved on the most recent tick"
            )
            .expect("Failed to register entities_last_tick"),

            sessions_active: register_int_gauge!(
                "harvester_sessions_active",
                "Number of collection sessions currently running"
            )
            .expect("Failed to register sessions_active"),
        }
    }
}

/// Lightweight handle to the global metrics instance. Clones share the
/// same underlying metrics.
#[derive(Clone)]
pub struct HarvesterMetrics {
    _private: (),
}

impl Default for HarvesterMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl HarvesterMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(HarvesterMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &HarvesterMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    pub fn observe_tick_duration(&self, duration_secs: f64) {
        self.inner().tick_duration_seconds.observe(duration_secs);
    }

    pub fn observe_drain_duration(&self, duration_secs: f64) {
        self.inner().drain_duration_seconds.observe(duration_secs);
    }

    pub fn inc_samples_appended(&self) {
        self.inner().samples_appended.inc();
    }

    pub fn inc_collection_errors(&self) {
        self.inner().collection_errors.inc();
    }

    pub fn inc_parse_errors(&self) {
        self.inner().parse_errors.inc();
    }

    pub fn set_entities_last_tick(&self, count: i64) {
        self.inner().entities_last_tick.set(count);
    }

    pub fn inc_sessions_active(&self) {
        self.inner().sessions_active.inc();
    }

    pub fn dec_sessions_active(&self) {
        self.inner().sessions_active.dec();
    }
}
