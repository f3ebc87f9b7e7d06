//! Observability features: metrics and tracing.
//!
//! - **Metrics**: counters and histograms via `metrics-rs`
//! - **Tracing**: structured logging and spans via `tracing`, with
//!   [`init_logging`] to install a stderr or file subscriber
//!
//! ## Metrics
//!
//! | Metric | Type | Description |
//! |--------|------|-------------|
//! | `bintr_batches_probed` | Counter | Batches dispatched to probe handlers |
//! | `bintr_batches_dropped` | Counter | Batches dropped by a probe handler |
//! | `bintr_probe_dispatch_time_ns` | Histogram | Handler dispatch time per batch |
//! | `bintr_state_changes` | Counter | Completed state changes |
//! | `bintr_state_failures` | Counter | Failed or timed-out state changes |
//! | `bintr_state_change_time_ns` | Histogram | Request-to-settle time |
//!
//! ## Example
//!
//! ```rust,no_run
//! use bintr::observability::{LogConfig, init_logging, init_metrics};
//!
//! let _guard = init_logging(&LogConfig::default()).unwrap();
//! init_metrics();
//! ```

mod metrics;
mod tracing_support;

pub use metrics::{ProbeMetrics, init_metrics, record_state_change};
pub use tracing_support::{
    LogConfig, LogGuard, init_logging, span_component, trace_state_request,
};
