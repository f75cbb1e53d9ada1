use std::sync::atomic::{AtomicUsize, Ordering};

/// Statistics for a topology view.
#[derive(Debug, Default)]
pub struct TopologyStats {
    /// Events that changed the topology
    applied: AtomicUsize,
    /// Events parked on missing prerequisites
    parked: AtomicUsize,
    /// Parked events retried once their prerequisites were met
    retried: AtomicUsize,
    /// Parked events dropped after the expiry window
    expired: AtomicUsize,
    /// Events dropped because they contradicted the current state
    rejected: AtomicUsize,
}

impl TopologyStats {
    #[inline]
    pub(crate) fn increment_applied(&self) {
        self.applied.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn increment_parked(&self) {
        self.parked.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn increment_retried(&self) {
        self.retried.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn add_expired(&self, n: usize) {
        self.expired.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn increment_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn applied(&self) -> usize {
        self.applied.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn parked(&self) -> usize {
        self.parked.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn retried(&self) -> usize {
        self.retried.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn expired(&self) -> usize {
        self.expired.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn rejected(&self) -> usize {
        self.rejected.load(Ordering::Relaxed)
    }
}
