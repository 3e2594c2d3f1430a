use bitcoincore_rpc::bitcoin::Network;
use serde::{Deserialize, Serialize};

fn default_network() -> Network {
    Network::Bitcoin
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BTCConfig {
    #[serde(default = "default_network")]
    pub network: Network,
}

impl BTCConfig {
    pub fn network(&self) -> Network {
        self.network
    }
}

impl Default for BTCConfig {
    fn default() -> Self {
        BTCConfig {
            network: default_network(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElectrsConfig {
    #[serde(default = "default_electrs_rpc_url")]
    pub rpc_url: String,

    // How often the subscription connection is polled for status notifications
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    // Delay before a broken connection is re-established
    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,
}

fn default_electrs_rpc_url() -> String {
    "tcp://127.0.0.1:50001".to_string()
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_reconnect_interval_ms() -> u64 {
    5000
}

impl ElectrsConfig {
    pub fn rpc_url(&self) -> &str {
        self.rpc_url.as_str()
    }

    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.poll_interval_ms)
    }

    pub fn reconnect_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.reconnect_interval_ms)
    }
}

impl Default for ElectrsConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_electrs_rpc_url(),
            poll_interval_ms: default_poll_interval_ms(),
            reconnect_interval_ms: default_reconnect_interval_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_electrs_config_defaults() {
        let config = ElectrsConfig::default();
        assert_eq!(config.rpc_url(), "tcp://127.0.0.1:50001");
        assert_eq!(config.poll_interval(), std::time::Duration::from_secs(1));
        assert_eq!(config.reconnect_interval(), std::time::Duration::from_secs(5));
    }
}
