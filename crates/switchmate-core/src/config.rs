//! Driver and link configuration.
//!
//! [`DriverOptions`] configures the state machine itself; [`LinkConfig`]
//! configures the btleplug backend that connects to the peripheral.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default interval between poll ticks.
const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(60);

/// Shortest poll interval accepted by [`DriverOptions::validate`].
pub(crate) const MIN_UPDATE_INTERVAL: Duration = Duration::from_secs(1);

/// Options fixed at driver construction.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use switchmate_core::DriverOptions;
///
/// let options = DriverOptions::new("Hallway")
///     .notify(true)
///     .update_interval(Duration::from_secs(30));
/// assert!(options.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverOptions {
    /// Display name used in logs and status output.
    pub name: String,
    /// Subscribe to notifications instead of relying on polling alone.
    pub notify: bool,
    /// Interval between periodic polls.
    pub update_interval: Duration,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            name: "switchmate".to_string(),
            notify: false,
            update_interval: DEFAULT_UPDATE_INTERVAL,
        }
    }
}

impl DriverOptions {
    /// Create options with the given display name and defaults otherwise.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Enable or disable notify mode.
    #[must_use]
    pub fn notify(mut self, enabled: bool) -> Self {
        self.notify = enabled;
        self
    }

    /// Set the poll interval.
    #[must_use]
    pub fn update_interval(mut self, interval: Duration) -> Self {
        self.update_interval = interval;
        self
    }

    /// Validate the options and return an error if invalid.
    ///
    /// Checks that:
    /// - `name` is not blank
    /// - `update_interval` is at least one second
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::invalid_config("name must not be empty"));
        }
        if self.update_interval < MIN_UPDATE_INTERVAL {
            return Err(Error::invalid_config(format!(
                "update_interval must be >= {:?}",
                MIN_UPDATE_INTERVAL
            )));
        }
        Ok(())
    }
}

/// Default timeout for BLE connection operations.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Default timeout for service discovery.
const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout for a single read, write or subscribe.
const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(10);

/// Default pause between losing a link and reconnecting.
const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Default scan duration when looking for the peripheral.
const DEFAULT_SCAN_DURATION: Duration = Duration::from_secs(10);

/// Configuration for BLE connection timeouts and reconnection.
///
/// Use this to customize timeout values for different environments.
///
/// ```
/// use std::time::Duration;
/// use switchmate_core::LinkConfig;
///
/// let config = LinkConfig::default()
///     .connection_timeout(Duration::from_secs(20))
///     .reconnect_delay(Duration::from_secs(2));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Timeout for establishing a BLE connection.
    pub connection_timeout: Duration,
    /// Timeout for service discovery after connection.
    pub discovery_timeout: Duration,
    /// Timeout for each read, write or subscribe.
    pub operation_timeout: Duration,
    /// Pause before reconnecting after the link is lost.
    pub reconnect_delay: Duration,
    /// How long to scan when the peripheral is not already known.
    pub scan_duration: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            connection_timeout: DEFAULT_CONNECT_TIMEOUT,
            discovery_timeout: DEFAULT_DISCOVERY_TIMEOUT,
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            scan_duration: DEFAULT_SCAN_DURATION,
        }
    }
}

impl LinkConfig {
    /// Create a new link config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorter timeouts for a peripheral that is close by.
    pub fn fast() -> Self {
        Self {
            connection_timeout: Duration::from_secs(8),
            discovery_timeout: Duration::from_secs(5),
            operation_timeout: Duration::from_secs(5),
            reconnect_delay: Duration::from_secs(2),
            scan_duration: Duration::from_secs(5),
        }
    }

    /// Set the connection timeout.
    #[must_use]
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Set the service discovery timeout.
    #[must_use]
    pub fn discovery_timeout(mut self, timeout: Duration) -> Self {
        self.discovery_timeout = timeout;
        self
    }

    /// Set the per-operation timeout.
    #[must_use]
    pub fn operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Set the reconnect delay.
    #[must_use]
    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Set the scan duration.
    #[must_use]
    pub fn scan_duration(mut self, duration: Duration) -> Self {
        self.scan_duration = duration;
        self
    }

    /// Validate the config. All timeouts must be non-zero.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("connection_timeout", self.connection_timeout),
            ("discovery_timeout", self.discovery_timeout),
            ("operation_timeout", self.operation_timeout),
            ("scan_duration", self.scan_duration),
        ];
        for (field, value) in fields {
            if value.is_zero() {
                return Err(Error::invalid_config(format!("{} must be > 0", field)));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_options_defaults() {
        let options = DriverOptions::default();
        assert!(!options.notify);
        assert_eq!(options.update_interval, Duration::from_secs(60));
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_driver_options_rejects_blank_name() {
        let err = DriverOptions::new("  ").validate().unwrap_err();
        assert!(err.to_string().contains("name"));
    }

    #[test]
    fn test_driver_options_rejects_short_interval() {
        let options = DriverOptions::new("a").update_interval(Duration::from_millis(200));
        assert!(matches!(options.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_link_config_builders() {
        let config = LinkConfig::new()
            .operation_timeout(Duration::from_secs(3))
            .scan_duration(Duration::from_secs(4));
        assert_eq!(config.operation_timeout, Duration::from_secs(3));
        assert_eq!(config.scan_duration, Duration::from_secs(4));
        assert!(LinkConfig::fast().connection_timeout < LinkConfig::default().connection_timeout);
    }

    #[test]
    fn test_link_config_rejects_zero_timeout() {
        let config = LinkConfig::default().operation_timeout(Duration::ZERO);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("operation_timeout"));
    }

    #[test]
    fn test_zero_reconnect_delay_is_allowed() {
        let config = LinkConfig::default().reconnect_delay(Duration::ZERO);
        assert!(config.validate().is_ok());
    }
}
