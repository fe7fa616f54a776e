use std::time::Duration;

/// How a retry run behaves.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// Pause between a failed attempt and the next one.
    pub retry_delay: Duration,
    /// Total attempts in one run, the first included.
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_secs(2),
            max_attempts: 5,
        }
    }
}

/// Where the relay is and how hard to try reaching it.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub address: String,
    pub port: u16,
    pub reconnect: ReconnectPolicy,
}

impl SessionConfig {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
            reconnect: ReconnectPolicy::default(),
        }
    }

    /// `address:port`, as handed to the connector.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new("127.0.0.1", 5000)
    }
}
