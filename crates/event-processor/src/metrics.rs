use std::sync::atomic::{AtomicU64, Ordering};

/// Optional counters for monitoring ring activity.
///
/// All updates are `Relaxed`: the counters are statistics, they never
/// participate in the synchronization protocol.
#[derive(Debug, Default)]
pub struct Metrics {
    reservations: AtomicU64,
    slots_reserved: AtomicU64,
    reserve_full: AtomicU64,
    reserve_retries: AtomicU64,
    commits: AtomicU64,
    frontier_advances: AtomicU64,
    consumed: AtomicU64,
    consume_retries: AtomicU64,
}

/// Point-in-time copy of [`Metrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Successful reservations.
    pub reservations: u64,
    /// Slots covered by successful reservations.
    pub slots_reserved: u64,
    /// Reservations rejected for lack of free slots.
    pub reserve_full: u64,
    /// Lost CAS races on the reserve counter.
    pub reserve_retries: u64,
    /// Commit calls.
    pub commits: u64,
    /// Slots absorbed into the commit frontier.
    pub frontier_advances: u64,
    /// Successfully consumed items.
    pub consumed: u64,
    /// Lost CAS races on the consume counter.
    pub consume_retries: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn add_reservation(&self, slots: u64) {
        self.reservations.fetch_add(1, Ordering::Relaxed);
        self.slots_reserved.fetch_add(slots, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn add_reserve_full(&self) {
        self.reserve_full.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn add_reserve_retry(&self) {
        self.reserve_retries.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn add_commit(&self, absorbed: u64) {
        self.commits.fetch_add(1, Ordering::Relaxed);
        self.frontier_advances.fetch_add(absorbed, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn add_consumed(&self) {
        self.consumed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn add_consume_retry(&self) {
        self.consume_retries.fetch_add(1, Ordering::Relaxed);
    }

    /// Reads every counter.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            reservations: self.reservations.load(Ordering::Relaxed),
            slots_reserved: self.slots_reserved.load(Ordering::Relaxed),
            reserve_full: self.reserve_full.load(Ordering::Relaxed),
            reserve_retries: self.reserve_retries.load(Ordering::Relaxed),
            commits: self.commits.load(Ordering::Relaxed),
            frontier_advances: self.frontier_advances.load(Ordering::Relaxed),
            consumed: self.consumed.load(Ordering::Relaxed),
            consume_retries: self.consume_retries.load(Ordering::Relaxed),
        }
    }
}
