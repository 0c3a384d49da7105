//! Watchdog configuration

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Watchdog configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchdogConfig {
    /// Channel buffer size for watchdog requests
    #[serde(rename = "channel-buffer", default = "default_channel_buffer")]
    pub channel_buffer: usize,

    /// Capacity of the cluster notification bus
    #[serde(rename = "bus-capacity", default = "default_bus_capacity")]
    pub bus_capacity: usize,

    /// Number of servers that must report in before `startOver` is announced
    #[serde(rename = "expected-servers", default, skip_serializing_if = "Option::is_none")]
    pub expected_servers: Option<usize>,
}

fn default_channel_buffer() -> usize {
    debug!("default_channel_buffer: called");
    1000
}

fn default_bus_capacity() -> usize {
    debug!("default_bus_capacity: called");
    1024
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        debug!("WatchdogConfig::default: called");
        Self {
            channel_buffer: 1000,
            bus_capacity: 1024,
            expected_servers: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = WatchdogConfig::default();
        assert_eq!(config.channel_buffer, 1000);
        assert_eq!(config.bus_capacity, 1024);
        assert_eq!(config.expected_servers, None);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: WatchdogConfig = serde_yaml::from_str("expected-servers: 4\n").unwrap();
        assert_eq!(config.expected_servers, Some(4));
        assert_eq!(config.channel_buffer, 1000);
        assert_eq!(config.bus_capacity, 1024);
    }
}
