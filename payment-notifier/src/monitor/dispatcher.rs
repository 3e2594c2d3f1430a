use super::monitor::PaymentMonitorRef;
use tokio::sync::{mpsc, watch};

/// Forward status change events to the monitor, one task per event so a slow
/// balance lookup for one address never delays another.
pub async fn run_status_dispatcher(
    monitor: PaymentMonitorRef,
    mut status_rx: mpsc::UnboundedReceiver<String>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    info!("Status dispatcher started");

    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                info!("Status dispatcher received shutdown signal");
                break;
            }
            event = status_rx.recv() => {
                let address = match event {
                    Some(address) => address,
                    None => {
                        warn!("Status event channel closed");
                        break;
                    }
                };

                let monitor = monitor.clone();
                tokio::spawn(async move {
                    monitor.on_status_changed(&address).await;
                });
            }
        }
    }

    info!("Status dispatcher stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::mock::*;
    use crate::monitor::{PaymentMonitor, Waiter};
    use crate::status::MonitorStatusManager;
    use merchant_util::PAID_NOTIFICATION;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_dispatch_status_events() {
        let log = new_call_log();
        let balances = MockBalanceProvider::new(log.clone());
        let monitor = PaymentMonitor::new(
            MockSubscriber::new(log.clone()),
            balances.clone(),
            MockResolver::new(log.clone()),
            Arc::new(MonitorStatusManager::new()),
        );
        let monitor = Arc::new(monitor);

        let ws1 = MockChannel::new(1);
        let ws2 = MockChannel::new(2);
        monitor
            .registry()
            .add_waiter("addr1", Waiter::new(ws1.clone(), 100, "R1"));
        monitor
            .registry()
            .add_waiter("addr2", Waiter::new(ws2.clone(), 100, "R2"));
        balances.set_balance("addr1", 100, 0);
        balances.set_error("addr2", "timeout");

        let (status_tx, status_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(run_status_dispatcher(
            monitor.clone(),
            status_rx,
            shutdown_rx,
        ));

        status_tx.send("addr2".to_string()).unwrap();
        status_tx.send("addr1".to_string()).unwrap();

        for _ in 0..200 {
            if !ws1.sent().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(ws1.sent(), vec![PAID_NOTIFICATION.to_string()]);
        assert!(ws2.sent().is_empty());
        assert_eq!(monitor.registry().waiter_count("addr2"), 1);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
