//! Coordinator configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timeout knobs for the coordinator's bounded waits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// How long a freshly accepted connection has to send READY, in ms
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,

    /// Bound on one collection round (step completions, state gathers), in ms
    #[serde(default = "default_response_timeout_ms")]
    pub response_timeout_ms: u64,

    /// Bound on a single accept while waiting for workers, in ms
    #[serde(default = "default_accept_timeout_ms")]
    pub accept_timeout_ms: u64,
}

fn default_handshake_timeout_ms() -> u64 {
    5000
}

fn default_response_timeout_ms() -> u64 {
    5000
}

fn default_accept_timeout_ms() -> u64 {
    2000
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            handshake_timeout_ms: 5000,
            response_timeout_ms: 5000,
            accept_timeout_ms: 2000,
        }
    }
}

impl CoordinatorConfig {
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    pub fn accept_timeout(&self) -> Duration {
        Duration::from_millis(self.accept_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CoordinatorConfig::default();
        assert_eq!(config.handshake_timeout(), Duration::from_secs(5));
        assert_eq!(config.response_timeout(), Duration::from_secs(5));
        assert_eq!(config.accept_timeout(), Duration::from_secs(2));
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let config: CoordinatorConfig = serde_yaml::from_str("response_timeout_ms: 250").unwrap();
        assert_eq!(config.response_timeout_ms, 250);
        assert_eq!(config.handshake_timeout_ms, 5000);
        assert_eq!(config.accept_timeout_ms, 2000);
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = CoordinatorConfig {
            handshake_timeout_ms: 100,
            response_timeout_ms: 200,
            accept_timeout_ms: 300,
        };
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: CoordinatorConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.response_timeout_ms, 200);
    }
}
