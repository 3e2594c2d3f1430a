use crate::monitor::{AddressBalance, AddressSubscriber, BalanceProvider};
use bitcoincore_rpc::bitcoin::{Network, ScriptBuf};
use merchant_util::{ElectrsClient, ElectrsClientRef, ElectrsConfig};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::{mpsc, watch};

/// Address subscriptions and balances backed by an electrs server.
///
/// Every subscribed address is remembered, so that when the connection is
/// lost a new one is created and all addresses are subscribed again. Status
/// changes are emitted as addresses on the channel returned by `new`.
pub struct ElectrsSubscriber {
    config: ElectrsConfig,
    network: Network,

    // None while disconnected
    client: RwLock<Option<ElectrsClientRef>>,

    // address -> script, ordered for deterministic resubscription
    scripts: Mutex<BTreeMap<String, ScriptBuf>>,

    status_tx: mpsc::UnboundedSender<String>,
}

impl ElectrsSubscriber {
    pub fn new(config: ElectrsConfig, network: Network) -> (Self, mpsc::UnboundedReceiver<String>) {
        let (status_tx, status_rx) = mpsc::unbounded_channel();
        let ret = Self {
            config,
            network,
            client: RwLock::new(None),
            scripts: Mutex::new(BTreeMap::new()),
            status_tx,
        };

        (ret, status_rx)
    }

    pub fn is_connected(&self) -> bool {
        self.client.read().unwrap().is_some()
    }

    pub fn watched_addresses(&self) -> Vec<String> {
        self.scripts.lock().unwrap().keys().cloned().collect()
    }

    fn client(&self) -> Option<ElectrsClientRef> {
        self.client.read().unwrap().clone()
    }

    fn reset_client(&self) {
        let mut client = self.client.write().unwrap();
        if client.take().is_some() {
            warn!(
                "Electrs connection dropped: module=electrs, server={}",
                self.config.rpc_url()
            );
        }
    }

    fn snapshot_scripts(&self) -> Vec<(String, ScriptBuf)> {
        self.scripts
            .lock()
            .unwrap()
            .iter()
            .map(|(address, script)| (address.clone(), script.clone()))
            .collect()
    }

    fn emit_status(&self, address: String) {
        if let Err(e) = self.status_tx.send(address) {
            warn!("Failed to emit status event, no receiver: address={}", e.0);
        }
    }

    // Blocking. The new client is published before the scripts are read, so
    // an address added concurrently is either seen here or subscribed by
    // `subscribe` on the new client.
    fn connect(&self) -> Result<Vec<String>, String> {
        let client = ElectrsClient::new(self.config.rpc_url())?;
        let client = Arc::new(client);
        *self.client.write().unwrap() = Some(client.clone());

        let scripts = self.snapshot_scripts();
        let mut addresses = Vec::with_capacity(scripts.len());
        for (address, script) in scripts {
            client.subscribe_script(&script)?;
            addresses.push(address);
        }

        info!(
            "Electrs connected: module=electrs, server={}, resubscribed={}",
            self.config.rpc_url(),
            addresses.len()
        );
        Ok(addresses)
    }

    // Blocking. Returns the addresses whose status changed since last poll.
    fn poll(&self, client: &ElectrsClient) -> Result<Vec<String>, String> {
        client.ping()?;

        let mut changed = Vec::new();
        for (address, script) in self.snapshot_scripts() {
            if client.pop_script_status(&script)? {
                changed.push(address);
            }
        }

        Ok(changed)
    }

    async fn poll_once(self: &Arc<Self>) -> Result<Vec<String>, String> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || match this.client() {
            // Anything missed while disconnected is re-evaluated by
            // reporting every address as changed
            None => this.connect(),
            Some(client) => this.poll(&client),
        })
        .await
        .map_err(|e| format!("Electrs poll task failed: {}", e))?
    }

    /// Connection and notification loop. Runs until `shutdown_rx` fires.
    pub async fn run(self: Arc<Self>, mut shutdown_rx: watch::Receiver<bool>) {
        info!(
            "Electrs subscriber started: server={}, network={}",
            self.config.rpc_url(),
            self.network
        );

        loop {
            let delay = match self.poll_once().await {
                Ok(changed) => {
                    for address in changed {
                        debug!("Address status changed: module=electrs, address={}", address);
                        self.emit_status(address);
                    }
                    self.config.poll_interval()
                }
                Err(e) => {
                    error!(
                        "Electrs poll failed, will reconnect: module=electrs, server={}, error={}",
                        self.config.rpc_url(),
                        e
                    );
                    self.reset_client();
                    self.config.reconnect_interval()
                }
            };

            tokio::select! {
                _ = shutdown_rx.changed() => {
                    info!("Electrs subscriber received shutdown signal");
                    break;
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }

        self.reset_client();
        info!("Electrs subscriber stopped");
    }
}

#[async_trait::async_trait]
impl AddressSubscriber for ElectrsSubscriber {
    async fn subscribe(&self, address: &str) -> Result<(), String> {
        let script = merchant_util::address_to_script(address, self.network)?;
        self.scripts
            .lock()
            .unwrap()
            .insert(address.to_string(), script.clone());

        let client = match self.client() {
            Some(client) => client,
            None => {
                info!(
                    "Electrs not connected, subscription deferred: module=electrs, address={}",
                    address
                );
                return Ok(());
            }
        };

        let ret = tokio::task::spawn_blocking(move || client.subscribe_script(&script))
            .await
            .map_err(|e| format!("Subscribe task failed: {}", e))?;
        match ret {
            Ok(created) => {
                debug!(
                    "Address subscribed: module=electrs, address={}, new={}",
                    address, created
                );
                Ok(())
            }
            Err(e) => {
                // The run loop reconnects and subscribes everything again
                self.reset_client();
                Err(e)
            }
        }
    }
}

#[async_trait::async_trait]
impl BalanceProvider for ElectrsSubscriber {
    async fn get_balance(&self, address: &str) -> Result<AddressBalance, String> {
        let script = merchant_util::address_to_script(address, self.network)?;
        let client = self.client().ok_or_else(|| {
            format!(
                "Electrs not connected, cannot get balance for {}",
                address
            )
        })?;

        let ret = tokio::task::spawn_blocking(move || client.get_balance(&script))
            .await
            .map_err(|e| format!("Balance task failed: {}", e))?;
        match ret {
            Ok(balance) => Ok(AddressBalance::new(balance.confirmed, balance.unconfirmed)),
            Err(e) => {
                self.reset_client();
                Err(e)
            }
        }
    }
}

pub type ElectrsSubscriberRef = Arc<ElectrsSubscriber>;

#[cfg(test)]
mod tests {
    use super::*;

    const ADDRESS: &str = "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa";

    fn unreachable_config() -> ElectrsConfig {
        ElectrsConfig {
            rpc_url: "tcp://127.0.0.1:1".to_string(),
            poll_interval_ms: 10,
            reconnect_interval_ms: 10,
        }
    }

    #[tokio::test]
    async fn test_subscribe_while_disconnected() {
        let (subscriber, _status_rx) = ElectrsSubscriber::new(unreachable_config(), Network::Bitcoin);
        assert!(!subscriber.is_connected());

        subscriber.subscribe(ADDRESS).await.unwrap();
        subscriber.subscribe(ADDRESS).await.unwrap();
        assert_eq!(subscriber.watched_addresses(), vec![ADDRESS.to_string()]);

        assert!(subscriber.subscribe("not-an-address").await.is_err());
        assert_eq!(subscriber.watched_addresses().len(), 1);
    }

    #[tokio::test]
    async fn test_balance_while_disconnected() {
        let (subscriber, _status_rx) = ElectrsSubscriber::new(unreachable_config(), Network::Bitcoin);
        assert!(subscriber.get_balance(ADDRESS).await.is_err());
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let (subscriber, _status_rx) = ElectrsSubscriber::new(unreachable_config(), Network::Bitcoin);
        let subscriber = Arc::new(subscriber);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(subscriber.clone().run(shutdown_rx));
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(!subscriber.is_connected());

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
