use bitcoincore_rpc::bitcoin::{Script, ScriptBuf};
use electrum_client::{Client, ElectrumApi, Error as ElectrumError, GetBalanceRes};
use std::collections::HashSet;
use std::sync::Mutex;

// Thin blocking wrapper around the electrum protocol client.
// Callers on the async runtime should go through spawn_blocking.
pub struct ElectrsClient {
    server_url: String,
    client: Client,

    // Scripts subscribed on this connection
    subscribed: Mutex<HashSet<ScriptBuf>>,
}

impl ElectrsClient {
    pub fn new(server_url: &str) -> Result<Self, String> {
        let client = Client::new(server_url).map_err(|e| {
            let msg = format!("Failed to create Electrs client for {}: {}", server_url, e);
            error!("{}", msg);
            msg
        })?;

        info!("Electrs client connected: server={}", server_url);
        Ok(Self {
            server_url: server_url.to_string(),
            client,
            subscribed: Mutex::new(HashSet::new()),
        })
    }

    pub fn is_subscribed(&self, script: &Script) -> bool {
        self.subscribed.lock().unwrap().contains(script)
    }

    // Also flushes any pending notifications from the socket into the
    // per-script queues read by pop_script_status
    pub fn ping(&self) -> Result<(), String> {
        self.client.ping().map_err(|e| {
            let msg = format!("Failed to ping electrs server {}: {}", self.server_url, e);
            error!("{}", msg);
            msg
        })
    }

    // Returns true if a new subscription was created, false if the script
    // was already subscribed on this connection
    pub fn subscribe_script(&self, script: &Script) -> Result<bool, String> {
        match self.client.script_subscribe(script) {
            Ok(_) => {
                self.subscribed.lock().unwrap().insert(script.to_owned());
                Ok(true)
            }
            Err(ElectrumError::AlreadySubscribed(_)) => {
                debug!("Script already subscribed: script={}", script);
                self.subscribed.lock().unwrap().insert(script.to_owned());
                Ok(false)
            }
            Err(e) => {
                let msg = format!("Failed to subscribe script {}: {}", script, e);
                error!("{}", msg);
                Err(msg)
            }
        }
    }

    // Drain all queued status notifications for the script, returns true if
    // at least one was queued. A script whose subscription has not completed
    // on this connection yet has nothing queued and is not sent to the
    // server, where it would fail as not subscribed.
    pub fn pop_script_status(&self, script: &Script) -> Result<bool, String> {
        if !self.is_subscribed(script) {
            debug!("Script not subscribed yet, skip pop: script={}", script);
            return Ok(false);
        }

        let mut changed = false;
        loop {
            match self.client.script_pop(script) {
                Ok(Some(_)) => changed = true,
                Ok(None) => break,
                Err(e) => {
                    let msg = format!("Failed to pop status for script {}: {}", script, e);
                    error!("{}", msg);
                    return Err(msg);
                }
            }
        }

        Ok(changed)
    }

    pub fn get_balance(&self, script: &Script) -> Result<GetBalanceRes, String> {
        self.client.script_get_balance(script).map_err(|e| {
            let msg = format!("Failed to get balance for script {}: {}", script, e);
            error!("{}", msg);
            msg
        })
    }
}

pub type ElectrsClientRef = std::sync::Arc<ElectrsClient>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address_to_script;
    use bitcoincore_rpc::bitcoin::Network;

    #[test]
    fn test_pop_before_subscribe() {
        // Accepts the connection but never answers, so any request would fail
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let server_url = format!("tcp://{}", listener.local_addr().unwrap());
        let client = ElectrsClient::new(&server_url).unwrap();

        let script = address_to_script("1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa", Network::Bitcoin)
            .unwrap();
        assert!(!client.is_subscribed(&script));
        assert!(!client.pop_script_status(&script).unwrap());
    }

    // Needs a local electrs server on mainnet
    #[test]
    #[ignore]
    fn test_electrs_client() {
        let server_url = "tcp://127.0.0.1:50001";
        let client = ElectrsClient::new(server_url).expect("Failed to create Electrs client");
        client.ping().expect("Failed to ping");

        let script = address_to_script("1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa", Network::Bitcoin)
            .expect("Failed to parse address");
        let balance = client.get_balance(&script).expect("Failed to get balance");
        println!(
            "Balance: confirmed={}, unconfirmed={}",
            balance.confirmed, balance.unconfirmed
        );
        assert!(balance.confirmed > 0);

        assert!(client.subscribe_script(&script).unwrap());
        assert!(!client.subscribe_script(&script).unwrap());
        assert!(client.is_subscribed(&script));
        client.pop_script_status(&script).expect("Failed to pop status");
    }
}
