use super::channel::NotifyChannelRef;
use super::client::{AddressSubscriberRef, BalanceProviderRef, RequestResolverRef};
use super::registry::{WaiterRegistry, WaiterRegistryRef};
use super::types::{AddressBalance, Waiter, WatchRequest};
use crate::status::{MonitorCounter, MonitorPhase, MonitorStatus, MonitorStatusManagerRef};
use merchant_util::PAID_NOTIFICATION;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, mpsc, watch};

/// Coordinates watch requests, address subscriptions and balance changes.
///
/// Requests submitted through [`PaymentMonitor::submit`] are consumed in order
/// by a single intake loop ([`PaymentMonitor::run`]). Status changes reported
/// by the subscription backend are handled by
/// [`PaymentMonitor::on_status_changed`], which may run concurrently for
/// any number of addresses.
pub struct PaymentMonitor {
    registry: WaiterRegistryRef,
    subscriber: AddressSubscriberRef,
    balance_provider: BalanceProviderRef,
    resolver: RequestResolverRef,
    status: MonitorStatusManagerRef,

    request_tx: mpsc::UnboundedSender<WatchRequest>,
    request_rx: Mutex<mpsc::UnboundedReceiver<WatchRequest>>,

    accepting: AtomicBool,
    recovered: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
}

impl PaymentMonitor {
    pub fn new(
        subscriber: AddressSubscriberRef,
        balance_provider: BalanceProviderRef,
        resolver: RequestResolverRef,
        status: MonitorStatusManagerRef,
    ) -> Self {
        Self::with_registry(
            std::sync::Arc::new(WaiterRegistry::new()),
            subscriber,
            balance_provider,
            resolver,
            status,
        )
    }

    pub fn with_registry(
        registry: WaiterRegistryRef,
        subscriber: AddressSubscriberRef,
        balance_provider: BalanceProviderRef,
        resolver: RequestResolverRef,
        status: MonitorStatusManagerRef,
    ) -> Self {
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            registry,
            subscriber,
            balance_provider,
            resolver,
            status,
            request_tx,
            request_rx: Mutex::new(request_rx),
            accepting: AtomicBool::new(true),
            recovered: AtomicBool::new(false),
            shutdown_tx,
        }
    }

    pub fn registry(&self) -> &WaiterRegistryRef {
        &self.registry
    }

    pub fn status(&self) -> &MonitorStatusManagerRef {
        &self.status
    }

    pub fn get_status(&self) -> MonitorStatus {
        self.status.get_status(
            self.registry.address_count() as u64,
            self.registry.total_waiters() as u64,
        )
    }

    /// Queue a watch request. Processing happens later on the intake loop;
    /// the only error is a monitor that has been shut down.
    pub fn submit(&self, channel: NotifyChannelRef, request_id: &str) -> Result<(), String> {
        if !self.accepting.load(Ordering::SeqCst) {
            let msg = format!(
                "Monitor is shutting down, reject watch request: request_id={}, channel={}",
                request_id,
                channel.id()
            );
            warn!("{}", msg);
            return Err(msg);
        }

        debug!(
            "Watch request submitted: module=intake, request_id={}, channel={}",
            request_id,
            channel.id()
        );
        let request = WatchRequest {
            channel,
            request_id: request_id.to_string(),
        };
        self.request_tx.send(request).map_err(|e| {
            let msg = format!("Failed to queue watch request: {}", e);
            error!("{}", msg);
            msg
        })?;

        self.status.incr(MonitorCounter::RequestsSubmitted);
        Ok(())
    }

    /// Subscribe every address already in the registry. Must complete before
    /// status changes are dispatched; only the first call has any effect.
    pub async fn recover_subscriptions(&self) {
        if self.recovered.swap(true, Ordering::SeqCst) {
            warn!("Subscriptions already recovered, skip");
            return;
        }

        self.status.update_phase(MonitorPhase::Recovering, None);

        let addresses = self.registry.addresses();
        info!(
            "Recovering subscriptions: module=recovery, addresses={}",
            addresses.len()
        );

        let mut failed = 0;
        for address in &addresses {
            if let Err(e) = self.subscriber.subscribe(address).await {
                error!(
                    "Failed to recover subscription: module=recovery, kind=subscribe, address={}, error={}",
                    address, e
                );
                failed += 1;
            }
        }

        let msg = if failed > 0 {
            Some(format!(
                "{} of {} subscriptions failed to recover",
                failed,
                addresses.len()
            ))
        } else {
            None
        };
        self.status.update_phase(MonitorPhase::Running, msg);
        info!(
            "Subscriptions recovered: count={}, failed={}",
            addresses.len(),
            failed
        );
    }

    /// Intake loop, returns once `shutdown` is called. The request being
    /// resolved when the signal arrives is finished first.
    pub async fn run(&self) {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        if *shutdown_rx.borrow() {
            return;
        }

        // Holding the receiver for the whole loop keeps a single consumer
        let mut request_rx = self.request_rx.lock().await;
        info!("Intake loop started");

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    info!("Intake loop received shutdown signal");
                    break;
                }
                request = request_rx.recv() => {
                    match request {
                        Some(request) => self.process_request(request).await,
                        None => {
                            warn!("Watch request queue closed");
                            break;
                        }
                    }
                }
            }
        }

        info!("Intake loop stopped");
    }

    /// Stop accepting requests and stop the intake loop. Queued requests that
    /// were not processed yet are dropped; their channels stay open.
    pub fn shutdown(&self) {
        if !self.accepting.swap(false, Ordering::SeqCst) {
            return;
        }

        self.status.update_phase(MonitorPhase::Stopping, None);
        self.shutdown_tx.send_replace(true);
    }

    pub(crate) async fn process_request(&self, request: WatchRequest) {
        let WatchRequest {
            channel,
            request_id,
        } = request;

        let payment = match self.resolver.resolve_request(&request_id).await {
            Ok(payment) => payment,
            Err(e) => {
                // A bad request is dropped so it can never stall the queue
                error!(
                    "Failed to resolve watch request, dropped: module=intake, kind=resolution, request_id={}, channel={}, error={}",
                    request_id,
                    channel.id(),
                    e
                );
                self.status.incr(MonitorCounter::RequestsDropped);
                return;
            }
        };

        let count = self.registry.add_waiter(
            &payment.address,
            Waiter::new(channel.clone(), payment.amount, &request_id),
        );
        self.status.incr(MonitorCounter::RequestsResolved);
        info!(
            "Waiter registered: module=intake, request_id={}, channel={}, address={}, amount={}, waiters={}",
            request_id,
            channel.id(),
            payment.address,
            payment.amount,
            count
        );

        if let Err(e) = self.subscriber.subscribe(&payment.address).await {
            error!(
                "Failed to subscribe address: module=intake, kind=subscribe, address={}, error={}",
                payment.address, e
            );
        }
    }

    /// Re-check the balance of `address` and notify every waiter it now
    /// covers. Safe to call redundantly: a waiter is removed from the registry
    /// before it is notified, so it is notified at most once.
    pub async fn on_status_changed(&self, address: &str) {
        debug!("New status for address: module=handler, address={}", address);

        if !self.registry.contains(address) {
            debug!("No waiters for address, skip: address={}", address);
            return;
        }

        let balance = match self.balance_provider.get_balance(address).await {
            Ok(balance) => balance,
            Err(e) => {
                // Nothing changed, the next status change retries
                error!(
                    "Failed to get balance: module=handler, kind=balance_fetch, address={}, error={}",
                    address, e
                );
                self.status.incr(MonitorCounter::BalanceFetchFailures);
                return;
            }
        };

        let settlement = match self.registry.settle(address, &balance) {
            Some(settlement) => settlement,
            None => return,
        };

        info!(
            "Address settled: module=handler, address={}, confirmed={}, unconfirmed={}, paid={}, dropped={}, pending={}, pruned={}",
            address,
            balance.confirmed,
            balance.unconfirmed,
            settlement.paid.len(),
            settlement.dropped,
            settlement.pending,
            settlement.pruned
        );

        for waiter in settlement.paid {
            self.notify_paid(address, &balance, waiter).await;
        }
    }

    async fn notify_paid(&self, address: &str, balance: &AddressBalance, waiter: Waiter) {
        let channel = &waiter.channel;

        // Several waiters may share one channel, only the first one notifies
        if channel.is_closed() {
            debug!(
                "Channel closed before notification, skip: request_id={}, channel={}",
                waiter.request_id,
                channel.id()
            );
            return;
        }

        match channel.send(PAID_NOTIFICATION).await {
            Ok(()) => {
                self.status.incr(MonitorCounter::NotificationsSent);
                info!(
                    "Payment notified: module=handler, address={}, request_id={}, channel={}, amount={}, balance={}",
                    address,
                    waiter.request_id,
                    channel.id(),
                    waiter.expected_amount,
                    balance.total()
                );
            }
            Err(e) => {
                error!(
                    "Failed to send notification: module=handler, kind=transport, address={}, request_id={}, channel={}, error={}",
                    address,
                    waiter.request_id,
                    channel.id(),
                    e
                );
                self.status.incr(MonitorCounter::TransportFailures);
            }
        }

        // Closed even after a failed send
        if let Err(e) = channel.close().await {
            error!(
                "Failed to close channel: module=handler, kind=transport, address={}, channel={}, error={}",
                address,
                channel.id(),
                e
            );
            self.status.incr(MonitorCounter::TransportFailures);
        }
    }
}

pub type PaymentMonitorRef = std::sync::Arc<PaymentMonitor>;
