use super::channel::NotifyChannelRef;
use serde::{Deserialize, Serialize};

/// Balance of a watched address as reported by the backend, in satoshis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressBalance {
    pub confirmed: u64,
    pub unconfirmed: i64, // Negative while an unconfirmed spend is pending
}

impl AddressBalance {
    pub fn new(confirmed: u64, unconfirmed: i64) -> Self {
        Self {
            confirmed,
            unconfirmed,
        }
    }

    /// Aggregate balance, exact over the full range of both components.
    pub fn total(&self) -> i128 {
        self.confirmed as i128 + self.unconfirmed as i128
    }

    /// Overpayment also satisfies the expected amount.
    pub fn covers(&self, amount: u64) -> bool {
        self.total() >= amount as i128
    }
}

/// A payment request after resolution: where to pay and how much.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub request_id: String,
    pub address: String,
    pub amount: u64, // in Satoshi
}

pub struct WatchRequest {
    pub channel: NotifyChannelRef,
    pub request_id: String,
}

#[derive(Clone)]
pub struct Waiter {
    pub channel: NotifyChannelRef,
    pub expected_amount: u64,
    pub request_id: String,
}

impl Waiter {
    pub fn new(channel: NotifyChannelRef, expected_amount: u64, request_id: &str) -> Self {
        Self {
            channel,
            expected_amount,
            request_id: request_id.to_string(),
        }
    }
}

impl std::fmt::Debug for Waiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Waiter")
            .field("channel", &self.channel.id())
            .field("expected_amount", &self.expected_amount)
            .field("request_id", &self.request_id)
            .finish()
    }
}
