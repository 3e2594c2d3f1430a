use merchant_util::{
    BTCConfig, ElectrsConfig, PAYMENT_NOTIFIER_SERVICE_HTTP_PORT, PAYMENT_NOTIFIER_SERVICE_NAME,
    PAYMENT_NOTIFIER_WEBSOCKET_PORT, REQUESTS_DIR_NAME,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestsConfig {
    // Directory the merchant wallet writes payment requests into
    #[serde(default)]
    pub requests_dir: Option<PathBuf>,
}

impl RequestsConfig {
    pub fn requests_dir(&self) -> PathBuf {
        match self.requests_dir {
            Some(ref dir) => dir.clone(),
            None => merchant_util::get_service_dir(PAYMENT_NOTIFIER_SERVICE_NAME)
                .join(REQUESTS_DIR_NAME),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebSocketServer {
    #[serde(default = "default_websocket_port")]
    pub port: u16,
}

fn default_websocket_port() -> u16 {
    PAYMENT_NOTIFIER_WEBSOCKET_PORT
}

impl Default for WebSocketServer {
    fn default() -> Self {
        WebSocketServer {
            port: default_websocket_port(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcServer {
    #[serde(default = "default_rpc_port")]
    pub port: u16,
}

fn default_rpc_port() -> u16 {
    PAYMENT_NOTIFIER_SERVICE_HTTP_PORT
}

impl Default for RpcServer {
    fn default() -> Self {
        RpcServer {
            port: default_rpc_port(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentNotifierConfig {
    #[serde(default)]
    pub btc: BTCConfig,

    #[serde(default)]
    pub electrs: ElectrsConfig,

    #[serde(default)]
    pub requests: RequestsConfig,

    #[serde(default)]
    pub websocket: WebSocketServer,

    #[serde(default)]
    pub rpc_server: RpcServer,
}

impl PaymentNotifierConfig {
    pub fn load(root_dir: &Path) -> Result<Self, String> {
        let path = root_dir.join("config.toml");
        if !path.exists() {
            let default_config = PaymentNotifierConfig::default();
            info!(
                "Config file {} does not exist. Using default configuration.",
                path.display()
            );
            match toml::to_string_pretty(&default_config) {
                Ok(s) => info!("Default config: {}", s),
                Err(e) => warn!("Failed to serialize default config: {}", e),
            }
            Ok(default_config)
        } else {
            info!("Loading config from {}", path.display());
            let config_data = std::fs::read_to_string(&path).map_err(|e| {
                let msg = format!("Failed to read config file {}: {}", path.display(), e);
                error!("{}", msg);
                msg
            })?;
            info!("Config data: {}", config_data);

            let config: PaymentNotifierConfig = toml::from_str(&config_data).map_err(|e| {
                let msg = format!("Failed to parse config file {}: {}", path.display(), e);
                error!("{}", msg);
                msg
            })?;

            Ok(config)
        }
    }
}

pub type PaymentNotifierConfigRef = Arc<PaymentNotifierConfig>;

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoincore_rpc::bitcoin::Network;

    fn test_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("payment-notifier").join(name);
        if dir.exists() {
            std::fs::remove_dir_all(&dir).unwrap();
        }
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_load_missing_config() {
        let dir = test_dir("test_load_missing_config");
        let config = PaymentNotifierConfig::load(&dir).unwrap();
        assert_eq!(config, PaymentNotifierConfig::default());
        assert_eq!(config.websocket.port, PAYMENT_NOTIFIER_WEBSOCKET_PORT);
        assert_eq!(config.rpc_server.port, PAYMENT_NOTIFIER_SERVICE_HTTP_PORT);
        assert!(config.requests.requests_dir().ends_with(REQUESTS_DIR_NAME));
    }

    #[test]
    fn test_load_partial_config() {
        let dir = test_dir("test_load_partial_config");
        let data = r#"
[btc]
network = "testnet"

[electrs]
rpc_url = "ssl://electrum.example.com:50002"

[requests]
requests_dir = "/var/lib/merchant/requests"
"#;
        std::fs::write(dir.join("config.toml"), data).unwrap();

        let config = PaymentNotifierConfig::load(&dir).unwrap();
        assert_eq!(config.btc.network(), Network::Testnet);
        assert_eq!(config.electrs.rpc_url(), "ssl://electrum.example.com:50002");
        assert_eq!(config.electrs.poll_interval_ms, 1000);
        assert_eq!(
            config.requests.requests_dir(),
            PathBuf::from("/var/lib/merchant/requests")
        );
        assert_eq!(config.websocket, WebSocketServer::default());
    }

    #[test]
    fn test_load_invalid_config() {
        let dir = test_dir("test_load_invalid_config");
        std::fs::write(dir.join("config.toml"), "[websocket]\nport = \"abc\"\n").unwrap();
        assert!(PaymentNotifierConfig::load(&dir).is_err());
    }
}
