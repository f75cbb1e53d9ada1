use std::sync::atomic::{AtomicUsize, Ordering};

/// Statistics for a rule graph.
#[derive(Debug, Default)]
pub struct RuleGraphStats {
    /// Rules inserted
    rules_added: AtomicUsize,
    /// Rules deleted, including rules replaced by a modify
    rules_removed: AtomicUsize,
    /// Insertions rejected on an equal priority overlap
    conflicts: AtomicUsize,
    edges_added: AtomicUsize,
    edges_removed: AtomicUsize,
}

impl RuleGraphStats {
    #[inline]
    pub(crate) fn increment_rules_added(&self) {
        self.rules_added.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn increment_rules_removed(&self) {
        self.rules_removed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn increment_conflicts(&self) {
        self.conflicts.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn increment_edges_added(&self) {
        self.edges_added.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn increment_edges_removed(&self) {
        self.edges_removed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn rules_added(&self) -> usize {
        self.rules_added.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn rules_removed(&self) -> usize {
        self.rules_removed.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn conflicts(&self) -> usize {
        self.conflicts.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn edges_added(&self) -> usize {
        self.edges_added.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn edges_removed(&self) -> usize {
        self.edges_removed.load(Ordering::Relaxed)
    }
}
