//! Timeouts and poll intervals for a session.
//!
//! ```yaml
//! timeout_ms: 10000
//! poll_interval_ms: 100
//! convergence_timeout_ms: 8000
//! ```
//!
//! Missing keys fall back to the defaults below.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::result::{EsperarError, EsperarResult};
use crate::wait::{WaitOptions, DEFAULT_POLL_INTERVAL_MS, DEFAULT_WAIT_TIMEOUT_MS};

/// Default deadline for convergence polling (8 seconds)
pub const DEFAULT_CONVERGENCE_TIMEOUT_MS: u64 = 8_000;

/// Default deadline for an alert to appear (5 seconds)
pub const DEFAULT_ALERT_TIMEOUT_MS: u64 = 5_000;

/// Default deadline for a modal overlay to appear
pub const DEFAULT_MODAL_APPEAR_TIMEOUT_MS: u64 = DEFAULT_WAIT_TIMEOUT_MS;

/// Default deadline for each modal close target
pub const DEFAULT_MODAL_CLOSE_TIMEOUT_MS: u64 = 5_000;

/// Fixed pause after a modal is dismissed
pub const DEFAULT_MODAL_SETTLE_MS: u64 = 500;

/// Session configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EsperarConfig {
    /// Default wait deadline
    pub timeout_ms: u64,
    /// Delay between poll ticks
    pub poll_interval_ms: u64,
    /// Deadline for `await_change`
    pub convergence_timeout_ms: u64,
    /// Deadline for an alert to appear
    pub alert_timeout_ms: u64,
    /// Deadline for a modal overlay to appear
    pub modal_appear_timeout_ms: u64,
    /// Deadline for each modal close target to become clickable
    pub modal_close_timeout_ms: u64,
    /// Pause after a modal is dismissed
    pub modal_settle_ms: u64,
}

impl Default for EsperarConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_WAIT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            convergence_timeout_ms: DEFAULT_CONVERGENCE_TIMEOUT_MS,
            alert_timeout_ms: DEFAULT_ALERT_TIMEOUT_MS,
            modal_appear_timeout_ms: DEFAULT_MODAL_APPEAR_TIMEOUT_MS,
            modal_close_timeout_ms: DEFAULT_MODAL_CLOSE_TIMEOUT_MS,
            modal_settle_ms: DEFAULT_MODAL_SETTLE_MS,
        }
    }
}

impl EsperarConfig {
    /// Create config with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set default wait timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set poll interval
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    /// Set convergence timeout
    #[must_use]
    pub const fn with_convergence_timeout(mut self, timeout_ms: u64) -> Self {
        self.convergence_timeout_ms = timeout_ms;
        self
    }

    /// Set alert timeout
    #[must_use]
    pub const fn with_alert_timeout(mut self, timeout_ms: u64) -> Self {
        self.alert_timeout_ms = timeout_ms;
        self
    }

    /// Set modal appear and close timeouts
    #[must_use]
    pub const fn with_modal_timeouts(mut self, appear_ms: u64, close_ms: u64) -> Self {
        self.modal_appear_timeout_ms = appear_ms;
        self.modal_close_timeout_ms = close_ms;
        self
    }

    /// Set the post-dismissal settle delay
    #[must_use]
    pub const fn with_modal_settle(mut self, settle_ms: u64) -> Self {
        self.modal_settle_ms = settle_ms;
        self
    }

    /// Parse from YAML and validate
    pub fn from_yaml_str(yaml: &str) -> EsperarResult<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a YAML file and validate
    pub fn from_yaml_file(path: impl AsRef<Path>) -> EsperarResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Reject a zero poll interval or one longer than any timeout
    pub fn validate(&self) -> EsperarResult<()> {
        if self.poll_interval_ms == 0 {
            return Err(EsperarError::invalid_config("poll_interval_ms must be > 0"));
        }

        let timeouts = [
            ("timeout_ms", self.timeout_ms),
            ("convergence_timeout_ms", self.convergence_timeout_ms),
            ("alert_timeout_ms", self.alert_timeout_ms),
            ("modal_appear_timeout_ms", self.modal_appear_timeout_ms),
            ("modal_close_timeout_ms", self.modal_close_timeout_ms),
        ];
        for (name, value) in timeouts {
            if self.poll_interval_ms > value {
                return Err(EsperarError::invalid_config(format!(
                    "poll_interval_ms ({}) exceeds {name} ({value})",
                    self.poll_interval_ms
                )));
            }
        }
        Ok(())
    }

    /// Options for ordinary waits
    #[must_use]
    pub const fn wait_options(&self) -> WaitOptions {
        self.options_with_timeout(self.timeout_ms)
    }

    /// Options for convergence polling
    #[must_use]
    pub const fn convergence_options(&self) -> WaitOptions {
        self.options_with_timeout(self.convergence_timeout_ms)
    }

    /// Options for alert waits
    #[must_use]
    pub const fn alert_options(&self) -> WaitOptions {
        self.options_with_timeout(self.alert_timeout_ms)
    }

    /// Settle delay as Duration
    #[must_use]
    pub const fn modal_settle(&self) -> Duration {
        Duration::from_millis(self.modal_settle_ms)
    }

    /// Poll interval paired with an arbitrary timeout
    #[must_use]
    pub const fn options_with_timeout(&self, timeout_ms: u64) -> WaitOptions {
        WaitOptions::new()
            .with_timeout(timeout_ms)
            .with_poll_interval(self.poll_interval_ms)
    }
}
