//! The topology view.
//!
//! [`TopologyView`] tracks switches, ports and unidirectional links as reported by link
//! discovery. Discovery notifications may arrive out of order (a link before the ports it
//! connects, a port before its switch). Such events are *masked*: they are parked until the
//! notifications they depend on have been applied, then retried. An event that stays parked
//! for longer than [`TopologyOptions::event_expiry`] is dropped.
use std::time::Duration;

mod event;
pub use event::{EventKind, Fingerprint, TopologyChange, TopologyEvent};

mod listener;
pub use listener::TopologyListener;

mod pending;
pub use pending::PendingEvent;

mod stats;
pub use stats::TopologyStats;

mod view;
pub use view::TopologyView;

/// How long a parked event may wait for its prerequisites.
pub const DEFAULT_EVENT_EXPIRY: Duration = Duration::from_secs(3);

#[derive(Debug, Clone)]
pub struct TopologyOptions {
    /// How long a parked event may wait for its prerequisites before it is dropped.
    event_expiry: Duration,
    /// Whether switch, port and link removals change the view. When disabled, down events
    /// are accepted and ignored.
    apply_down_events: bool,
    /// Whether to dump the whole topology at trace level after every batch.
    dump_on_change: bool,
}

impl Default for TopologyOptions {
    fn default() -> Self {
        Self { event_expiry: DEFAULT_EVENT_EXPIRY, apply_down_events: false, dump_on_change: false }
    }
}

impl TopologyOptions {
    /// Sets how long a parked event may wait for its prerequisites before it is dropped.
    pub fn event_expiry(mut self, event_expiry: Duration) -> Self {
        self.event_expiry = event_expiry;
        self
    }

    /// Sets whether switch, port and link removals change the view.
    pub fn apply_down_events(mut self, apply_down_events: bool) -> Self {
        self.apply_down_events = apply_down_events;
        self
    }

    /// Sets whether to dump the whole topology at trace level after every batch.
    pub fn dump_on_change(mut self, dump_on_change: bool) -> Self {
        self.dump_on_change = dump_on_change;
        self
    }

    #[inline]
    pub fn expiry(&self) -> Duration {
        self.event_expiry
    }

    #[inline]
    pub fn applies_down_events(&self) -> bool {
        self.apply_down_events
    }
}
