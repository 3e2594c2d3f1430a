use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MonitorPhase {
    Initializing = 0,
    Recovering = 1,
    Running = 2,
    Stopping = 3,
}

#[derive(Debug, Clone, Copy)]
pub enum MonitorCounter {
    RequestsSubmitted,
    RequestsResolved,
    RequestsDropped,
    NotificationsSent,
    TransportFailures,
    BalanceFetchFailures,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MonitorCounters {
    pub requests_submitted: u64,
    pub requests_resolved: u64,
    pub requests_dropped: u64,
    pub notifications_sent: u64,
    pub transport_failures: u64,
    pub balance_fetch_failures: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorStatus {
    pub phase: MonitorPhase,
    pub watched_addresses: u64,
    pub pending_waiters: u64,
    pub counters: MonitorCounters,
    pub message: Option<String>,
}

struct PhaseState {
    phase: MonitorPhase,
    message: Option<String>,
}

pub struct MonitorStatusManager {
    state: Mutex<PhaseState>,

    requests_submitted: AtomicU64,
    requests_resolved: AtomicU64,
    requests_dropped: AtomicU64,
    notifications_sent: AtomicU64,
    transport_failures: AtomicU64,
    balance_fetch_failures: AtomicU64,
}

impl MonitorStatusManager {
    pub fn new() -> Self {
        let state = PhaseState {
            phase: MonitorPhase::Initializing,
            message: None,
        };

        Self {
            state: Mutex::new(state),
            requests_submitted: AtomicU64::new(0),
            requests_resolved: AtomicU64::new(0),
            requests_dropped: AtomicU64::new(0),
            notifications_sent: AtomicU64::new(0),
            transport_failures: AtomicU64::new(0),
            balance_fetch_failures: AtomicU64::new(0),
        }
    }

    pub fn phase(&self) -> MonitorPhase {
        self.state.lock().unwrap().phase
    }

    pub fn update_phase(&self, phase: MonitorPhase, msg: Option<String>) {
        let mut state = self.state.lock().unwrap();
        info!("Monitor phase changed: {:?} -> {:?}", state.phase, phase);
        state.phase = phase;
        if msg.is_some() {
            state.message = msg;
        }
    }

    fn counter(&self, counter: MonitorCounter) -> &AtomicU64 {
        match counter {
            MonitorCounter::RequestsSubmitted => &self.requests_submitted,
            MonitorCounter::RequestsResolved => &self.requests_resolved,
            MonitorCounter::RequestsDropped => &self.requests_dropped,
            MonitorCounter::NotificationsSent => &self.notifications_sent,
            MonitorCounter::TransportFailures => &self.transport_failures,
            MonitorCounter::BalanceFetchFailures => &self.balance_fetch_failures,
        }
    }

    pub fn incr(&self, counter: MonitorCounter) {
        self.counter(counter).fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_counters(&self) -> MonitorCounters {
        MonitorCounters {
            requests_submitted: self.requests_submitted.load(Ordering::Relaxed),
            requests_resolved: self.requests_resolved.load(Ordering::Relaxed),
            requests_dropped: self.requests_dropped.load(Ordering::Relaxed),
            notifications_sent: self.notifications_sent.load(Ordering::Relaxed),
            transport_failures: self.transport_failures.load(Ordering::Relaxed),
            balance_fetch_failures: self.balance_fetch_failures.load(Ordering::Relaxed),
        }
    }

    // Registry sizes are owned by the monitor and passed in here
    pub fn get_status(&self, watched_addresses: u64, pending_waiters: u64) -> MonitorStatus {
        let (phase, message) = {
            let state = self.state.lock().unwrap();
            (state.phase, state.message.clone())
        };

        MonitorStatus {
            phase,
            watched_addresses,
            pending_waiters,
            counters: self.get_counters(),
            message,
        }
    }
}

pub type MonitorStatusManagerRef = std::sync::Arc<MonitorStatusManager>;
