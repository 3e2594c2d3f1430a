use super::types::{AddressBalance, PaymentRequest};
use std::sync::Arc;

// Collaborators the monitor depends on. All of them may suspend on I/O.

#[async_trait::async_trait]
pub trait AddressSubscriber: Send + Sync {
    /// Must tolerate repeated calls for the same address.
    async fn subscribe(&self, address: &str) -> Result<(), String>;
}

#[async_trait::async_trait]
pub trait BalanceProvider: Send + Sync {
    async fn get_balance(&self, address: &str) -> Result<AddressBalance, String>;
}

#[async_trait::async_trait]
pub trait RequestResolver: Send + Sync {
    async fn resolve_request(&self, request_id: &str) -> Result<PaymentRequest, String>;
}

pub type AddressSubscriberRef = Arc<dyn AddressSubscriber>;
pub type BalanceProviderRef = Arc<dyn BalanceProvider>;
pub type RequestResolverRef = Arc<dyn RequestResolver>;
