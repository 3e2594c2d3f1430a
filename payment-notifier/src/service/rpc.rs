use crate::status::MonitorStatus;
use jsonrpc_core::Result as JsonResult;
use jsonrpc_derive::rpc;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchedAddress {
    pub address: String,
    pub expected_amounts: Vec<u64>, // in Satoshi, registration order
}

#[rpc(server)]
pub trait PaymentNotifierRpc {
    /// Gets the bitcoin network the service watches
    #[rpc(name = "get_network_type")]
    fn get_network_type(&self) -> JsonResult<String>;

    /// Gets the monitor phase, registry size and counters
    #[rpc(name = "get_status")]
    fn get_status(&self) -> JsonResult<MonitorStatus>;

    /// Gets every watched address with its pending waiters
    #[rpc(name = "get_watched_addresses")]
    fn get_watched_addresses(&self) -> JsonResult<Vec<WatchedAddress>>;

    #[rpc(name = "stop")]
    fn stop(&self) -> JsonResult<()>;
}
