use super::channel::NotifyChannel;
use super::client::{AddressSubscriber, BalanceProvider, RequestResolver};
use super::types::{AddressBalance, PaymentRequest};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// Shared call log, lets tests assert the order of collaborator calls
pub type CallLog = Arc<Mutex<Vec<String>>>;

pub fn new_call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub struct MockChannel {
    id: u64,
    closed: AtomicBool,
    fail_send: AtomicBool,
    sent: Mutex<Vec<String>>,
    close_count: AtomicUsize,
}

impl MockChannel {
    pub fn new(id: u64) -> Arc<Self> {
        Arc::new(Self {
            id,
            closed: AtomicBool::new(false),
            fail_send: AtomicBool::new(false),
            sent: Mutex::new(Vec::new()),
            close_count: AtomicUsize::new(0),
        })
    }

    // Peer went away without the monitor closing the channel
    pub fn close_externally(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn set_fail_send(&self, fail: bool) {
        self.fail_send.store(fail, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    pub fn close_count(&self) -> usize {
        self.close_count.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl NotifyChannel for MockChannel {
    fn id(&self) -> u64 {
        self.id
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn send(&self, payload: &str) -> Result<(), String> {
        if self.fail_send.load(Ordering::SeqCst) {
            return Err(format!("mock send failure on channel {}", self.id));
        }

        self.sent.lock().unwrap().push(payload.to_string());
        Ok(())
    }

    async fn close(&self) -> Result<(), String> {
        self.close_count.fetch_add(1, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

pub struct MockSubscriber {
    log: CallLog,
    subscribed: Mutex<Vec<String>>,
}

impl MockSubscriber {
    pub fn new(log: CallLog) -> Arc<Self> {
        Arc::new(Self {
            log,
            subscribed: Mutex::new(Vec::new()),
        })
    }

    pub fn subscribed(&self) -> Vec<String> {
        self.subscribed.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl AddressSubscriber for MockSubscriber {
    async fn subscribe(&self, address: &str) -> Result<(), String> {
        self.log.lock().unwrap().push(format!("subscribe:{}", address));
        self.subscribed.lock().unwrap().push(address.to_string());
        Ok(())
    }
}

pub struct MockBalanceProvider {
    log: CallLog,
    balances: Mutex<HashMap<String, Result<AddressBalance, String>>>,
}

impl MockBalanceProvider {
    pub fn new(log: CallLog) -> Arc<Self> {
        Arc::new(Self {
            log,
            balances: Mutex::new(HashMap::new()),
        })
    }

    pub fn set_balance(&self, address: &str, confirmed: u64, unconfirmed: i64) {
        self.balances.lock().unwrap().insert(
            address.to_string(),
            Ok(AddressBalance::new(confirmed, unconfirmed)),
        );
    }

    pub fn set_error(&self, address: &str, error: &str) {
        self.balances
            .lock()
            .unwrap()
            .insert(address.to_string(), Err(error.to_string()));
    }
}

#[async_trait::async_trait]
impl BalanceProvider for MockBalanceProvider {
    async fn get_balance(&self, address: &str) -> Result<AddressBalance, String> {
        self.log.lock().unwrap().push(format!("balance:{}", address));
        self.balances
            .lock()
            .unwrap()
            .get(address)
            .cloned()
            .unwrap_or(Ok(AddressBalance::default()))
    }
}

pub struct MockResolver {
    log: CallLog,
    requests: Mutex<HashMap<String, PaymentRequest>>,
    delay: Mutex<Option<Duration>>,
}

impl MockResolver {
    pub fn new(log: CallLog) -> Arc<Self> {
        Arc::new(Self {
            log,
            requests: Mutex::new(HashMap::new()),
            delay: Mutex::new(None),
        })
    }

    // Every resolution sleeps this long after it is logged
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn add_request(&self, request_id: &str, address: &str, amount: u64) {
        let request = PaymentRequest {
            request_id: request_id.to_string(),
            address: address.to_string(),
            amount,
        };
        self.requests
            .lock()
            .unwrap()
            .insert(request_id.to_string(), request);
    }
}

#[async_trait::async_trait]
impl RequestResolver for MockResolver {
    async fn resolve_request(&self, request_id: &str) -> Result<PaymentRequest, String> {
        self.log.lock().unwrap().push(format!("resolve:{}", request_id));
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.requests
            .lock()
            .unwrap()
            .get(request_id)
            .cloned()
            .ok_or_else(|| format!("Request not found: {}", request_id))
    }
}
