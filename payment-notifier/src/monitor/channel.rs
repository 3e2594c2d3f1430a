use std::sync::Arc;

/// A real-time client connection that waits for a payment.
///
/// `send` and `close` may suspend on I/O. `is_closed` must be cheap and
/// non-blocking since it is checked while the registry entry is locked.
#[async_trait::async_trait]
pub trait NotifyChannel: Send + Sync {
    /// Identifier used in logs
    fn id(&self) -> u64;

    fn is_closed(&self) -> bool;

    async fn send(&self, payload: &str) -> Result<(), String>;

    async fn close(&self) -> Result<(), String>;
}

pub type NotifyChannelRef = Arc<dyn NotifyChannel>;
