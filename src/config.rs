//! Runtime configuration.
//!
//! Timeouts used by state control and pipeline teardown. The struct can be
//! built in code, taken from one of the presets, or loaded from TOML:
//!
//! ```toml
//! state_change_timeout_ms = 10000
//! state_poll_interval_ms = 10
//! eos_timeout_ms = 2000
//! bus_capacity = 256
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default bound on an asynchronous state change.
pub const DEFAULT_STATE_CHANGE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default interval between completion polls of an async state change.
pub const DEFAULT_STATE_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Default time a stopping pipeline waits for EOS to reach its sinks.
pub const DEFAULT_EOS_TIMEOUT: Duration = Duration::from_secs(2);

/// Default bus channel capacity.
pub const DEFAULT_BUS_CAPACITY: usize = 256;

/// Configuration shared by components and their state controllers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Upper bound on waiting for an async state change, in milliseconds.
    pub state_change_timeout_ms: u64,
    /// Poll interval while waiting for an async state change, in milliseconds.
    pub state_poll_interval_ms: u64,
    /// Time a pipeline stop waits for the EOS message, in milliseconds.
    pub eos_timeout_ms: u64,
    /// Capacity of each pipeline bus.
    pub bus_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            state_change_timeout_ms: DEFAULT_STATE_CHANGE_TIMEOUT.as_millis() as u64,
            state_poll_interval_ms: DEFAULT_STATE_POLL_INTERVAL.as_millis() as u64,
            eos_timeout_ms: DEFAULT_EOS_TIMEOUT.as_millis() as u64,
            bus_capacity: DEFAULT_BUS_CAPACITY,
        }
    }
}

impl RuntimeConfig {
    /// Short timeouts for tests and simulated engines.
    pub fn fast() -> Self {
        Self {
            state_change_timeout_ms: 500,
            state_poll_interval_ms: 2,
            eos_timeout_ms: 200,
            bus_capacity: DEFAULT_BUS_CAPACITY,
        }
    }

    /// Builder-style override of the state-change timeout.
    pub fn with_state_change_timeout(mut self, timeout: Duration) -> Self {
        self.state_change_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Builder-style override of the poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.state_poll_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Builder-style override of the EOS wait.
    pub fn with_eos_timeout(mut self, timeout: Duration) -> Self {
        self.eos_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Bound on an async state change.
    pub fn state_change_timeout(&self) -> Duration {
        Duration::from_millis(self.state_change_timeout_ms)
    }

    /// Poll interval, never zero.
    pub fn state_poll_interval(&self) -> Duration {
        Duration::from_millis(self.state_poll_interval_ms.max(1))
    }

    /// EOS wait on pipeline stop.
    pub fn eos_timeout(&self) -> Duration {
        Duration::from_millis(self.eos_timeout_ms)
    }

    /// Check the values for consistency.
    pub fn validate(&self) -> Result<()> {
        if self.state_poll_interval_ms > self.state_change_timeout_ms {
            return Err(Error::Config(format!(
                "poll interval {}ms exceeds state change timeout {}ms",
                self.state_poll_interval_ms, self.state_change_timeout_ms
            )));
        }
        if self.bus_capacity == 0 {
            return Err(Error::Config("bus capacity must be non-zero".into()));
        }
        Ok(())
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: RuntimeConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.state_change_timeout(), Duration::from_secs(10));
        assert_eq!(config.state_poll_interval(), Duration::from_millis(10));
        assert_eq!(config.eos_timeout(), Duration::from_secs(2));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = RuntimeConfig::from_toml_str("state_change_timeout_ms = 250").unwrap();
        assert_eq!(config.state_change_timeout(), Duration::from_millis(250));
        assert_eq!(config.bus_capacity, DEFAULT_BUS_CAPACITY);
    }

    #[test]
    fn test_invalid_toml_rejected() {
        let err = RuntimeConfig::from_toml_str("state_change_timeout_ms = 5\nstate_poll_interval_ms = 50")
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(RuntimeConfig::from_toml_str("bus_capacity = \"lots\"").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bintr.toml");
        std::fs::write(&path, "eos_timeout_ms = 100\n").unwrap();
        let config = RuntimeConfig::load(&path).unwrap();
        assert_eq!(config.eos_timeout(), Duration::from_millis(100));
    }
}
