//! Metrics collection using metrics-rs.

use metrics::{Counter, Histogram, Unit, counter, histogram};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Whether metrics have been initialized.
static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

// Metric names as constants for consistency
const BATCHES_PROBED: &str = "bintr_batches_probed";
const BATCHES_DROPPED: &str = "bintr_batches_dropped";
const STATE_CHANGES: &str = "bintr_state_changes";
const STATE_FAILURES: &str = "bintr_state_failures";
const STATE_CHANGE_TIME_NS: &str = "bintr_state_change_time_ns";

/// Initialize metrics descriptions.
///
/// Call this once at application startup before using any metrics.
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init_metrics() {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        return;
    }

    metrics::describe_counter!(
        BATCHES_PROBED,
        Unit::Count,
        "Batches dispatched to pad-probe handlers"
    );
    metrics::describe_counter!(
        BATCHES_DROPPED,
        Unit::Count,
        "Batches dropped by a pad-probe handler"
    );
    metrics::describe_counter!(
        STATE_CHANGES,
        Unit::Count,
        "Component state changes that completed"
    );
    metrics::describe_counter!(
        STATE_FAILURES,
        Unit::Count,
        "Component state changes that failed or timed out"
    );
    metrics::describe_histogram!(
        STATE_CHANGE_TIME_NS,
        Unit::Nanoseconds,
        "Time from state-change request to settlement"
    );
}

/// Record a state change outcome for a component.
#[inline]
pub fn record_state_change(component: &str, to: &str, succeeded: bool, elapsed: Duration) {
    let name = if succeeded {
        STATE_CHANGES
    } else {
        STATE_FAILURES
    };
    counter!(name, "component" => component.to_string(), "to" => to.to_string()).increment(1);
    histogram!(STATE_CHANGE_TIME_NS, "component" => component.to_string())
        .record(elapsed.as_nanos() as f64);
}

/// Per-probe counters with pre-configured labels.
///
/// Built once when a probe is created so the data plane only increments.
#[derive(Clone)]
pub struct ProbeMetrics {
    probed: Counter,
    dropped: Counter,
    dispatch_time: Histogram,
}

impl ProbeMetrics {
    /// Create counters labelled with the probe name.
    pub fn new(probe: &str) -> Self {
        Self {
            probed: counter!(BATCHES_PROBED, "probe" => probe.to_string()),
            dropped: counter!(BATCHES_DROPPED, "probe" => probe.to_string()),
            dispatch_time: histogram!("bintr_probe_dispatch_time_ns", "probe" => probe.to_string()),
        }
    }

    /// Record one dispatched batch.
    #[inline]
    pub fn record_probed(&self, elapsed: Duration) {
        self.probed.increment(1);
        self.dispatch_time.record(elapsed.as_nanos() as f64);
    }

    /// Record one dropped batch.
    #[inline]
    pub fn record_dropped(&self) {
        self.dropped.increment(1);
    }
}

impl std::fmt::Debug for ProbeMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProbeMetrics").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_idempotent() {
        init_metrics();
        init_metrics();
    }

    #[test]
    fn test_recording_without_recorder() {
        // no recorder installed: everything is a no-op
        let m = ProbeMetrics::new("test-probe");
        m.record_probed(Duration::from_micros(3));
        m.record_dropped();
        record_state_change("pipeline", "PLAYING", true, Duration::from_millis(1));
    }
}
