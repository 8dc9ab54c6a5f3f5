//! Filter counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counters shared by the query path and the reload path.
#[derive(Debug, Default)]
pub struct FilterStats {
    inspected: AtomicU64,
    blocked_by_name: AtomicU64,
    blocked_by_uncloak: AtomicU64,
    records_stripped: AtomicU64,
    reloads: AtomicU64,
    skipped_reloads: AtomicU64,
    failed_reloads: AtomicU64,
}

impl FilterStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_inspected(&self) {
        self.inspected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_blocked_by_name(&self) {
        self.blocked_by_name.fetch_add(1, Ordering::Relaxed);
    }

    /// One upstream reply was blocked or stripped.
    pub fn record_blocked_by_uncloak(&self, stripped: usize) {
        self.blocked_by_uncloak.fetch_add(1, Ordering::Relaxed);
        self.records_stripped
            .fetch_add(stripped as u64, Ordering::Relaxed);
    }

    pub fn record_reload(&self) {
        self.reloads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped_reload(&self) {
        self.skipped_reloads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed_reload(&self) {
        self.failed_reloads.fetch_add(1, Ordering::Relaxed);
    }

    /// Total blocked queries, whichever stage blocked them.
    pub fn blocked(&self) -> u64 {
        self.blocked_by_name.load(Ordering::Relaxed) + self.blocked_by_uncloak.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            inspected: self.inspected.load(Ordering::Relaxed),
            blocked_by_name: self.blocked_by_name.load(Ordering::Relaxed),
            blocked_by_uncloak: self.blocked_by_uncloak.load(Ordering::Relaxed),
            records_stripped: self.records_stripped.load(Ordering::Relaxed),
            reloads: self.reloads.load(Ordering::Relaxed),
            skipped_reloads: self.skipped_reloads.load(Ordering::Relaxed),
            failed_reloads: self.failed_reloads.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`FilterStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub inspected: u64,
    pub blocked_by_name: u64,
    pub blocked_by_uncloak: u64,
    pub records_stripped: u64,
    pub reloads: u64,
    pub skipped_reloads: u64,
    pub failed_reloads: u64,
}

impl StatsSnapshot {
    pub fn blocked(&self) -> u64 {
        self.blocked_by_name + self.blocked_by_uncloak
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let stats = FilterStats::new();
        stats.record_inspected();
        stats.record_inspected();
        stats.record_blocked_by_name();
        stats.record_blocked_by_uncloak(2);
        stats.record_blocked_by_uncloak(0);
        stats.record_skipped_reload();

        let snap = stats.snapshot();
        assert_eq!(snap.inspected, 2);
        assert_eq!(snap.blocked_by_name, 1);
        assert_eq!(snap.blocked_by_uncloak, 2);
        assert_eq!(snap.records_stripped, 2);
        assert_eq!(snap.skipped_reloads, 1);
        assert_eq!(snap.reloads, 0);
        assert_eq!(snap.blocked(), 3);
        assert_eq!(stats.blocked(), 3);
    }
}
