//! Relay configuration.

use serde::{Deserialize, Serialize};

/// Where the relay listens.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub host: String,

    /// First port to try.
    pub port: u16,

    /// How many ports above `port` to try when it is taken. The port
    /// actually bound is reported by [`Relay::port`](crate::Relay::port).
    pub port_scan_range: u16,

    /// Decode forwarded frames for trace logging. Forwarding never depends
    /// on the result.
    pub inspect: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            port_scan_range: duelnet_transport::DEFAULT_PORT_SCAN_RANGE,
            inspect: false,
        }
    }
}

impl RelayConfig {
    pub fn with_port(port: u16) -> Self {
        Self {
            port,
            ..Self::default()
        }
    }
}
