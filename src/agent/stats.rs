use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for the agent's otherwise silent outcomes
#[derive(Debug, Default)]
pub struct AgentStats {
    captured: AtomicU64,
    skipped: AtomicU64,
    ship_failures: AtomicU64,
    registrations: AtomicU64,
    registration_failures: AtomicU64,
    syncs: AtomicU64,
    sync_failures: AtomicU64,
}

/// Point-in-time copy of [`AgentStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub captured: u64,
    pub skipped: u64,
    pub ship_failures: u64,
    pub registrations: u64,
    pub registration_failures: u64,
    pub syncs: u64,
    pub sync_failures: u64,
}

impl AgentStats {
    pub(crate) fn record_captured(&self) {
        self.captured.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_ship_failure(&self) {
        self.ship_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_registration(&self, succeeded: bool) {
        if succeeded {
            self.registrations.fetch_add(1, Ordering::Relaxed);
        } else {
            self.registration_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_sync(&self, succeeded: bool) {
        if succeeded {
            self.syncs.fetch_add(1, Ordering::Relaxed);
        } else {
            self.sync_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            captured: self.captured.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            ship_failures: self.ship_failures.load(Ordering::Relaxed),
            registrations: self.registrations.load(Ordering::Relaxed),
            registration_failures: self.registration_failures.load(Ordering::Relaxed),
            syncs: self.syncs.load(Ordering::Relaxed),
            sync_failures: self.sync_failures.load(Ordering::Relaxed),
        }
    }
}
