use super::rpc::*;
use crate::config::PaymentNotifierConfigRef;
use crate::monitor::PaymentMonitorRef;
use crate::status::MonitorStatus;
use jsonrpc_core::IoHandler;
use jsonrpc_core::{Error as JsonError, ErrorCode, Result as JsonResult};
use jsonrpc_http_server::{AccessControlAllowOrigin, DomainsValidation, ServerBuilder};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

#[derive(Clone)]
pub struct PaymentNotifierRpcServer {
    config: PaymentNotifierConfigRef,
    monitor: PaymentMonitorRef,
    shutdown_tx: watch::Sender<()>,
    listen_url: String,
    server_handle: Arc<Mutex<Option<jsonrpc_http_server::CloseHandle>>>,
}

impl PaymentNotifierRpcServer {
    pub fn new(
        config: PaymentNotifierConfigRef,
        monitor: PaymentMonitorRef,
        shutdown_tx: watch::Sender<()>,
    ) -> Self {
        let listen_url = format!("http://127.0.0.1:{}", config.rpc_server.port);
        Self {
            config,
            monitor,
            shutdown_tx,
            listen_url,
            server_handle: Arc::new(Mutex::new(None)),
        }
    }

    pub fn start(
        config: PaymentNotifierConfigRef,
        monitor: PaymentMonitorRef,
        shutdown_tx: watch::Sender<()>,
    ) -> Result<Self, String> {
        let ret = Self::new(config.clone(), monitor, shutdown_tx);

        let mut io = IoHandler::new();
        io.extend_with(ret.clone().to_delegate());

        let addr = format!("127.0.0.1:{}", config.rpc_server.port)
            .parse()
            .map_err(|e| {
                let msg = format!("Failed to parse RPC server address: {}", e);
                error!("{}", msg);
                msg
            })?;

        let server = ServerBuilder::new(io)
            .cors(DomainsValidation::AllowOnly(vec![
                AccessControlAllowOrigin::Any,
            ]))
            .start_http(&addr)
            .map_err(|e| {
                let msg = format!("Unable to start RPC server: {}", e);
                error!("{}", msg);
                msg
            })?;

        let handle = server.close_handle();
        info!("RPC server listening on {}", addr);
        tokio::task::spawn_blocking(move || {
            server.wait();
        });

        {
            let mut current = ret.server_handle.lock().unwrap();
            if current.is_some() {
                let msg = "RPC server is already running".to_string();
                error!("{}", msg);
                return Err(msg);
            }
            *current = Some(handle);
        }

        Ok(ret)
    }

    pub fn get_listen_url(&self) -> &str {
        &self.listen_url
    }

    pub async fn close(&self) {
        let handle = self.server_handle.lock().unwrap().take();
        if let Some(handle) = handle {
            info!("Closing RPC server.");
            if let Err(e) = tokio::task::spawn_blocking(move || handle.close()).await {
                error!("Failed to close RPC server: {}", e);
            }
            info!("RPC server closed.");
        } else {
            warn!("RPC server handle not found.");
        }
    }
}

impl PaymentNotifierRpc for PaymentNotifierRpcServer {
    fn get_network_type(&self) -> JsonResult<String> {
        let network = self.config.btc.network();

        Ok(network.to_string())
    }

    fn get_status(&self) -> JsonResult<MonitorStatus> {
        Ok(self.monitor.get_status())
    }

    fn get_watched_addresses(&self) -> JsonResult<Vec<WatchedAddress>> {
        let registry = self.monitor.registry();
        let list = registry
            .addresses()
            .into_iter()
            .map(|address| {
                let expected_amounts = registry.expected_amounts(&address);
                WatchedAddress {
                    address,
                    expected_amounts,
                }
            })
            // Pruned between the two reads
            .filter(|item| !item.expected_amounts.is_empty())
            .collect();

        Ok(list)
    }

    fn stop(&self) -> JsonResult<()> {
        info!("Received stop command via RPC.");
        if let Err(e) = self.shutdown_tx.send(()) {
            let msg = format!("Failed to send shutdown signal: {}", e);
            error!("{}", msg);
            return Err(JsonError {
                code: ErrorCode::InternalError,
                message: msg,
                data: None,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PaymentNotifierConfig;
    use crate::monitor::mock::*;
    use crate::monitor::{PaymentMonitor, Waiter};
    use crate::status::{MonitorPhase, MonitorStatusManager};

    fn new_server() -> (PaymentNotifierRpcServer, watch::Receiver<()>) {
        let log = new_call_log();
        let monitor = PaymentMonitor::new(
            MockSubscriber::new(log.clone()),
            MockBalanceProvider::new(log.clone()),
            MockResolver::new(log.clone()),
            Arc::new(MonitorStatusManager::new()),
        );
        let (shutdown_tx, shutdown_rx) = watch::channel(());
        let server = PaymentNotifierRpcServer::new(
            Arc::new(PaymentNotifierConfig::default()),
            Arc::new(monitor),
            shutdown_tx,
        );

        (server, shutdown_rx)
    }

    #[test]
    fn test_rpc_methods() {
        let (server, shutdown_rx) = new_server();
        assert_eq!(server.get_network_type().unwrap(), "bitcoin");

        let ws1 = MockChannel::new(1);
        let registry = server.monitor.registry();
        registry.add_waiter("addr2", Waiter::new(ws1.clone(), 900, "R2"));
        registry.add_waiter("addr1", Waiter::new(ws1.clone(), 100, "R1"));
        registry.add_waiter("addr1", Waiter::new(ws1.clone(), 300, "R3"));

        let list = server.get_watched_addresses().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].address, "addr1");
        assert_eq!(list[0].expected_amounts, vec![100, 300]);
        assert_eq!(list[1].expected_amounts, vec![900]);

        let status = server.get_status().unwrap();
        assert_eq!(status.phase, MonitorPhase::Initializing);
        assert_eq!(status.watched_addresses, 2);
        assert_eq!(status.pending_waiters, 3);

        server.stop().unwrap();
        assert!(shutdown_rx.has_changed().unwrap());
    }
}
