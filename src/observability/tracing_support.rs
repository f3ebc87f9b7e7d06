//! Tracing integration: spans for components and logging setup.

use crate::error::{Error, Result};
use std::path::PathBuf;
use tracing::{Level, Span, span};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Filter directive, e.g. `"info,bintr=debug"`. `RUST_LOG` overrides it.
    pub filter: String,
    /// Write logs to this file instead of stderr.
    pub file: Option<PathBuf>,
    /// Include the target module in each line.
    pub with_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            file: None,
            with_target: true,
        }
    }
}

impl LogConfig {
    /// Verbose config for debugging a graph.
    pub fn debug() -> Self {
        Self {
            filter: "info,bintr=trace".to_string(),
            ..Default::default()
        }
    }

    /// Log to `path` instead of stderr.
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }
}

/// Guard that keeps a file log writer alive; flushes on drop.
#[must_use = "dropping the guard stops file logging"]
pub struct LogGuard {
    _guard: Option<tracing_appender::non_blocking::WorkerGuard>,
}

/// Install a global subscriber.
///
/// Fails if a global subscriber is already set or the log file cannot be
/// opened.
pub fn init_logging(config: &LogConfig) -> Result<LogGuard> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .map_err(|e| Error::Config(format!("invalid log filter: {}", e)))?;

    match &config.file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("."));
            let file_name = path
                .file_name()
                .ok_or_else(|| Error::Config(format!("invalid log file path {:?}", path)))?;
            let appender = tracing_appender::rolling::never(dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(writer)
                        .with_ansi(false)
                        .with_target(config.with_target),
                )
                .try_init()
                .map_err(|e| Error::Config(e.to_string()))?;
            Ok(LogGuard {
                _guard: Some(guard),
            })
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_target(config.with_target))
                .try_init()
                .map_err(|e| Error::Config(e.to_string()))?;
            Ok(LogGuard { _guard: None })
        }
    }
}

/// Create a span for a component operation.
///
/// # Example
///
/// ```rust
/// use bintr::observability::span_component;
///
/// let span = span_component("pipeline-0", "link_all");
/// let _guard = span.enter();
/// ```
#[inline]
pub fn span_component(component: &str, operation: &'static str) -> Span {
    span!(Level::DEBUG, "component", component = %component, op = operation)
}

/// Log a component state transition request.
#[inline]
pub fn trace_state_request(component: &str, from: &str, to: &str) {
    tracing::info!(component = %component, from = %from, to = %to, "changing state");
}
