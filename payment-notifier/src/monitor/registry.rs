use super::types::{AddressBalance, Waiter};
use dashmap::DashMap;

/// Outcome of evaluating the waiters of one address against a balance.
#[derive(Debug, Default)]
pub struct Settlement {
    // Removed from the registry, must be notified by the caller
    pub paid: Vec<Waiter>,

    // Channel was already closed, removed without notification
    pub dropped: usize,

    // Still registered after this pass
    pub pending: usize,

    // The address entry was removed because no waiter is left
    pub pruned: bool,
}

/// Address -> waiters, in registration order.
///
/// Every mutation of one address happens under that address's map shard lock,
/// so an append from intake and a removal from the balance handler never
/// lose each other's update. No lock is held across an await point.
/// Entries are pruned once their last waiter is removed.
pub struct WaiterRegistry {
    waiters: DashMap<String, Vec<Waiter>>,
}

impl WaiterRegistry {
    pub fn new() -> Self {
        Self {
            waiters: DashMap::new(),
        }
    }

    /// Seed the registry, e.g. with waiters that survived a backend reconnect.
    pub fn with_waiters(entries: impl IntoIterator<Item = (String, Waiter)>) -> Self {
        let registry = Self::new();
        for (address, waiter) in entries {
            registry.add_waiter(&address, waiter);
        }

        registry
    }

    /// Append a waiter, creating the entry if needed. Returns the number of
    /// waiters now registered for the address.
    pub fn add_waiter(&self, address: &str, waiter: Waiter) -> usize {
        let mut entry = self.waiters.entry(address.to_string()).or_default();
        entry.push(waiter);
        entry.len()
    }

    pub fn contains(&self, address: &str) -> bool {
        self.waiters.contains_key(address)
    }

    /// Sorted so that replays are deterministic.
    pub fn addresses(&self) -> Vec<String> {
        let mut list: Vec<String> = self.waiters.iter().map(|e| e.key().clone()).collect();
        list.sort();
        list
    }

    pub fn waiter_count(&self, address: &str) -> usize {
        self.waiters.get(address).map(|e| e.len()).unwrap_or(0)
    }

    pub fn expected_amounts(&self, address: &str) -> Vec<u64> {
        self.waiters
            .get(address)
            .map(|e| e.iter().map(|w| w.expected_amount).collect())
            .unwrap_or_default()
    }

    pub fn address_count(&self) -> usize {
        self.waiters.len()
    }

    pub fn total_waiters(&self) -> usize {
        self.waiters.iter().map(|e| e.value().len()).sum()
    }

    /// Remove every waiter of `address` that is either closed or covered by
    /// `balance`, keeping the rest in order. Returns None if the address has
    /// no entry.
    ///
    /// Covered waiters are claimed here, under the entry lock, so two
    /// overlapping evaluations of the same address can never both notify the
    /// same waiter.
    pub fn settle(&self, address: &str, balance: &AddressBalance) -> Option<Settlement> {
        let mut settlement = Settlement::default();
        {
            let mut entry = self.waiters.get_mut(address)?;

            let waiters = std::mem::take(entry.value_mut());
            let mut pending = Vec::with_capacity(waiters.len());
            for waiter in waiters {
                if waiter.channel.is_closed() {
                    settlement.dropped += 1;
                } else if balance.covers(waiter.expected_amount) {
                    settlement.paid.push(waiter);
                } else {
                    pending.push(waiter);
                }
            }

            settlement.pending = pending.len();
            *entry.value_mut() = pending;
        }

        // The entry guard must be released before touching the map again.
        // remove_if re-checks under the lock, so a waiter appended in between
        // keeps the entry alive.
        if settlement.pending == 0 {
            settlement.pruned = self
                .waiters
                .remove_if(address, |_, list| list.is_empty())
                .is_some();
        }

        Some(settlement)
    }
}

pub type WaiterRegistryRef = std::sync::Arc<WaiterRegistry>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::mock::MockChannel;

    fn waiter(channel: &std::sync::Arc<MockChannel>, amount: u64, request_id: &str) -> Waiter {
        Waiter::new(channel.clone(), amount, request_id)
    }

    #[test]
    fn test_add_waiter_keeps_order() {
        let registry = WaiterRegistry::new();
        let ws1 = MockChannel::new(1);
        let ws2 = MockChannel::new(2);

        assert_eq!(registry.add_waiter("addr1", waiter(&ws1, 500, "r1")), 1);
        assert_eq!(registry.add_waiter("addr1", waiter(&ws2, 100, "r2")), 2);
        assert_eq!(registry.add_waiter("addr2", waiter(&ws2, 700, "r3")), 1);

        assert_eq!(registry.expected_amounts("addr1"), vec![500, 100]);
        assert_eq!(registry.addresses(), vec!["addr1".to_string(), "addr2".to_string()]);
        assert_eq!(registry.address_count(), 2);
        assert_eq!(registry.total_waiters(), 3);
        assert_eq!(registry.waiter_count("missing"), 0);
    }

    #[test]
    fn test_settle_partial() {
        let registry = WaiterRegistry::new();
        let ws1 = MockChannel::new(1);
        let ws2 = MockChannel::new(2);
        let ws3 = MockChannel::new(3);
        registry.add_waiter("addr1", waiter(&ws1, 100, "r1"));
        registry.add_waiter("addr1", waiter(&ws2, 900, "r2"));
        registry.add_waiter("addr1", waiter(&ws3, 500, "r3"));

        let settlement = registry
            .settle("addr1", &AddressBalance::new(500, 0))
            .unwrap();
        let paid: Vec<&str> = settlement.paid.iter().map(|w| w.request_id.as_str()).collect();
        assert_eq!(paid, vec!["r1", "r3"]);
        assert_eq!(settlement.dropped, 0);
        assert_eq!(settlement.pending, 1);
        assert!(!settlement.pruned);
        assert_eq!(registry.expected_amounts("addr1"), vec![900]);
    }

    #[test]
    fn test_settle_prunes_empty_entry() {
        let registry = WaiterRegistry::new();
        let ws1 = MockChannel::new(1);
        let ws2 = MockChannel::new(2);
        registry.add_waiter("addr1", waiter(&ws1, 100, "r1"));
        registry.add_waiter("addr1", waiter(&ws2, 900, "r2"));
        ws2.close_externally();

        let settlement = registry
            .settle("addr1", &AddressBalance::new(100, 0))
            .unwrap();
        assert_eq!(settlement.paid.len(), 1);
        assert_eq!(settlement.dropped, 1);
        assert_eq!(settlement.pending, 0);
        assert!(settlement.pruned);
        assert!(!registry.contains("addr1"));

        assert!(registry.settle("addr1", &AddressBalance::new(100, 0)).is_none());
    }

    #[test]
    fn test_seeded_registry() {
        let ws1 = MockChannel::new(1);
        let ws2 = MockChannel::new(2);
        let registry = WaiterRegistry::with_waiters(vec![
            ("addr2".to_string(), waiter(&ws1, 10, "r1")),
            ("addr1".to_string(), waiter(&ws2, 20, "r2")),
            ("addr2".to_string(), waiter(&ws2, 30, "r3")),
        ]);

        assert_eq!(registry.addresses(), vec!["addr1".to_string(), "addr2".to_string()]);
        assert_eq!(registry.expected_amounts("addr2"), vec![10, 30]);
    }
}
