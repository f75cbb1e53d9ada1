use std::time::{Duration, Instant};

use rustc_hash::FxHashMap;

use crate::{Fingerprint, TopologyEvent};

/// A topology event parked until its prerequisites have been applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEvent {
    event: TopologyEvent,
    since: Instant,
    remaining: usize,
}

impl PendingEvent {
    #[inline]
    pub const fn event(&self) -> &TopologyEvent {
        &self.event
    }

    /// Returns the number of prerequisites that have not been applied yet.
    #[inline]
    pub const fn remaining(&self) -> usize {
        self.remaining
    }

    /// Returns the instant the event was parked.
    #[inline]
    pub const fn since(&self) -> Instant {
        self.since
    }

    /// Returns `true` if the event has been parked for longer than `window`.
    #[inline]
    pub fn is_expired(&self, now: Instant, window: Duration) -> bool {
        now.saturating_duration_since(self.since) > window
    }
}

/// Parked events, indexed by the fingerprints of their missing prerequisites.
#[derive(Debug, Default)]
pub(crate) struct PendingEvents {
    entries: FxHashMap<u64, PendingEvent>,
    waiting: FxHashMap<Fingerprint, Vec<u64>>,
    next_id: u64,
}

impl PendingEvents {
    /// Parks `event` until every fingerprint in `prerequisites` has been notified.
    pub(crate) fn park(&mut self, event: TopologyEvent, prerequisites: &[Fingerprint], now: Instant) {
        let id = self.next_id;
        self.next_id += 1;

        self.entries.insert(id, PendingEvent { event, since: now, remaining: prerequisites.len() });
        for fingerprint in prerequisites {
            self.waiting.entry(*fingerprint).or_default().push(id);
        }
    }

    /// Notifies every event waiting on `fingerprint`. Returns the events whose last
    /// prerequisite this was, in the order they were parked, and the number of waiting
    /// events dropped because they expired.
    pub(crate) fn notify(
        &mut self,
        fingerprint: &Fingerprint,
        now: Instant,
        window: Duration,
    ) -> (Vec<TopologyEvent>, usize) {
        let Some(ids) = self.waiting.remove(fingerprint) else {
            return (Vec::new(), 0);
        };

        let mut ready = Vec::new();
        let mut expired = 0;
        for id in ids {
            let Some(entry) = self.entries.get_mut(&id) else { continue };

            if entry.is_expired(now, window) {
                self.entries.remove(&id);
                expired += 1;
                continue;
            }

            entry.remaining = entry.remaining.saturating_sub(1);
            if entry.remaining == 0 {
                if let Some(entry) = self.entries.remove(&id) {
                    ready.push(entry.event);
                }
            }
        }

        (ready, expired)
    }

    /// Drops every expired event. Returns how many were dropped.
    pub(crate) fn sweep(&mut self, now: Instant, window: Duration) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now, window));
        let expired = before - self.entries.len();

        if expired > 0 {
            let entries = &self.entries;
            self.waiting.retain(|_, ids| {
                ids.retain(|id| entries.contains_key(id));
                !ids.is_empty()
            });
        }

        expired
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns the parked events, oldest first.
    pub(crate) fn snapshot(&self) -> Vec<PendingEvent> {
        let mut entries: Vec<_> = self.entries.iter().collect();
        entries.sort_by_key(|(id, _)| **id);
        entries.into_iter().map(|(_, entry)| entry.clone()).collect()
    }
}
