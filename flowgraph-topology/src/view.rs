use std::{
    sync::{Arc, Weak},
    time::Instant,
};

use flowgraph_common::{PortNo, SwitchId, SwitchPort};
use parking_lot::{Mutex, RwLock};
use rustc_hash::{FxHashMap, FxHashSet};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::{
    pending::PendingEvents, Fingerprint, PendingEvent, TopologyChange, TopologyEvent,
    TopologyListener, TopologyOptions, TopologyStats,
};

/// The result of handling one event against the current state.
#[derive(Debug)]
enum Outcome {
    /// The state changed.
    Applied(TopologyChange),
    /// The state already reflects the event.
    Unchanged,
    /// The event needs these events applied first.
    Deferred(Vec<TopologyEvent>),
    /// Down events are disabled.
    Ignored,
    /// The event contradicts the current state and was dropped.
    Rejected { port: SwitchPort, existing: SwitchPort },
}

#[derive(Debug, Default)]
struct TopologyState {
    switches: FxHashSet<SwitchId>,
    ports: FxHashMap<SwitchId, FxHashSet<PortNo>>,
    /// Unidirectional links, `src -> dst`.
    links: FxHashMap<SwitchPort, SwitchPort>,
    /// `dst -> src` for every entry of `links`.
    reverse: FxHashMap<SwitchPort, SwitchPort>,
    /// Ports without an outgoing link.
    outer_ports: FxHashSet<SwitchPort>,
    /// Number of links from a switch to each neighbour.
    downstream: FxHashMap<SwitchId, FxHashMap<SwitchId, usize>>,
    pending: PendingEvents,
}

impl TopologyState {
    fn has_port(&self, port: &SwitchPort) -> bool {
        self.ports.get(&port.switch).is_some_and(|ports| ports.contains(&port.port))
    }

    fn handle(&mut self, event: TopologyEvent, options: &TopologyOptions) -> Outcome {
        if event.is_down() && !options.applies_down_events() {
            return Outcome::Ignored;
        }

        match event {
            TopologyEvent::SwitchUp(switch) => self.switch_up(switch),
            TopologyEvent::PortUp(port) => self.port_up(port),
            TopologyEvent::LinkUp { src, dst } => self.link_up(src, dst),
            TopologyEvent::SwitchDown(switch) => self.switch_down(switch),
            TopologyEvent::PortDown(port) => self.port_down(port),
            TopologyEvent::LinkDown { src, dst } => self.link_down(src, dst),
        }
    }

    fn switch_up(&mut self, switch: SwitchId) -> Outcome {
        if !self.switches.insert(switch) {
            return Outcome::Unchanged;
        }
        Outcome::Applied(TopologyChange::SwitchAdded(switch))
    }

    /// Requires the switch.
    fn port_up(&mut self, port: SwitchPort) -> Outcome {
        if self.has_port(&port) {
            return Outcome::Unchanged;
        }
        if !self.switches.contains(&port.switch) {
            return Outcome::Deferred(vec![TopologyEvent::SwitchUp(port.switch)]);
        }

        self.ports.entry(port.switch).or_default().insert(port.port);
        // New ports have no link yet.
        self.outer_ports.insert(port);
        Outcome::Applied(TopologyChange::PortAdded(port))
    }

    /// Requires both ports. A port carries at most one link in each direction.
    fn link_up(&mut self, src: SwitchPort, dst: SwitchPort) -> Outcome {
        match self.links.get(&src) {
            Some(existing) if *existing == dst => return Outcome::Unchanged,
            Some(existing) => return Outcome::Rejected { port: src, existing: *existing },
            None => {}
        }
        if let Some(existing) = self.reverse.get(&dst) {
            return Outcome::Rejected { port: dst, existing: *existing };
        }

        let missing: Vec<_> = [src, dst]
            .into_iter()
            .filter(|port| !self.has_port(port))
            .map(TopologyEvent::PortUp)
            .collect();
        if !missing.is_empty() {
            return Outcome::Deferred(missing);
        }

        self.links.insert(src, dst);
        self.reverse.insert(dst, src);
        *self.downstream.entry(src.switch).or_default().entry(dst.switch).or_default() += 1;
        self.outer_ports.remove(&src);

        Outcome::Applied(TopologyChange::LinkAdded { src, dst })
    }

    /// Requires every port of the switch to be down.
    fn switch_down(&mut self, switch: SwitchId) -> Outcome {
        if !self.switches.contains(&switch) {
            return Outcome::Unchanged;
        }

        let ports: Vec<_> = self
            .ports
            .get(&switch)
            .into_iter()
            .flatten()
            .map(|port| TopologyEvent::PortDown(SwitchPort::new(switch, *port)))
            .collect();
        if !ports.is_empty() {
            return Outcome::Deferred(ports);
        }

        self.switches.remove(&switch);
        self.ports.remove(&switch);
        self.downstream.remove(&switch);
        Outcome::Applied(TopologyChange::SwitchRemoved(switch))
    }

    /// Requires every link touching the port to be down.
    fn port_down(&mut self, port: SwitchPort) -> Outcome {
        if !self.has_port(&port) {
            return Outcome::Unchanged;
        }

        let mut links = Vec::new();
        if let Some(dst) = self.links.get(&port) {
            links.push(TopologyEvent::LinkDown { src: port, dst: *dst });
        }
        if let Some(src) = self.reverse.get(&port) {
            links.push(TopologyEvent::LinkDown { src: *src, dst: port });
        }
        if !links.is_empty() {
            return Outcome::Deferred(links);
        }

        if let Some(ports) = self.ports.get_mut(&port.switch) {
            ports.remove(&port.port);
            if ports.is_empty() {
                self.ports.remove(&port.switch);
            }
        }
        self.outer_ports.remove(&port);
        Outcome::Applied(TopologyChange::PortRemoved(port))
    }

    fn link_down(&mut self, src: SwitchPort, dst: SwitchPort) -> Outcome {
        if self.links.get(&src) != Some(&dst) {
            return Outcome::Unchanged;
        }

        self.links.remove(&src);
        self.reverse.remove(&dst);
        if let Some(neighbours) = self.downstream.get_mut(&src.switch) {
            if let Some(count) = neighbours.get_mut(&dst.switch) {
                *count -= 1;
                if *count == 0 {
                    neighbours.remove(&dst.switch);
                }
            }
            if neighbours.is_empty() {
                self.downstream.remove(&src.switch);
            }
        }
        if self.has_port(&src) {
            self.outer_ports.insert(src);
        }

        Outcome::Applied(TopologyChange::LinkRemoved { src, dst })
    }
}

/// Switch, port and link state, fed by batches of [`TopologyEvent`]s.
///
/// Every batch is applied under a single write lock, in arrival order. Queries take the read
/// lock and return owned snapshots. Changes are delivered to listeners and subscribers once
/// the batch is done and the lock has been released.
#[derive(Debug)]
pub struct TopologyView {
    state: RwLock<TopologyState>,
    options: TopologyOptions,
    stats: TopologyStats,
    listeners: RwLock<Vec<Weak<dyn TopologyListener>>>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<TopologyChange>>>,
}

impl Default for TopologyView {
    fn default() -> Self {
        Self::new(TopologyOptions::default())
    }
}

impl TopologyView {
    pub fn new(options: TopologyOptions) -> Self {
        Self {
            state: RwLock::new(TopologyState::default()),
            options,
            stats: TopologyStats::default(),
            listeners: RwLock::new(Vec::new()),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    #[inline]
    pub fn options(&self) -> &TopologyOptions {
        &self.options
    }

    #[inline]
    pub fn stats(&self) -> &TopologyStats {
        &self.stats
    }

    /// Registers a listener. The view only keeps a weak reference: the listener stops
    /// receiving changes once it is dropped.
    pub fn add_listener<L: TopologyListener + 'static>(&self, listener: &Arc<L>) {
        let listener: Weak<L> = Arc::downgrade(listener);
        let listener: Weak<dyn TopologyListener> = listener;
        self.listeners.write().push(listener);
    }

    /// Unregisters a listener. Returns `false` if it was not registered.
    pub fn remove_listener<L: TopologyListener + 'static>(&self, listener: &Arc<L>) -> bool {
        let target = Arc::as_ptr(listener) as *const ();
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|l| l.as_ptr() as *const () != target);
        listeners.len() != before
    }

    /// Returns a channel receiving every change applied from now on.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<TopologyChange> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Applies a batch of events in order.
    ///
    /// Events missing a prerequisite are parked; applying an event releases every parked event
    /// that was waiting on it. An event contradicting the current state (a second link on a
    /// port) is logged and dropped, and the rest of the batch carries on.
    pub fn apply(&self, events: impl IntoIterator<Item = TopologyEvent>) {
        let mut changes = Vec::new();

        {
            let mut state = self.state.write();

            let expired = state.pending.sweep(Instant::now(), self.options.expiry());
            if expired > 0 {
                self.stats.add_expired(expired);
                warn!(expired, "Dropped expired topology events");
            }

            for event in events {
                self.process(&mut state, event, &mut changes);
            }

            if self.options.dump_on_change {
                Self::dump_state(&state);
            }
        }

        self.dispatch(&changes);
    }

    fn process(
        &self,
        state: &mut TopologyState,
        event: TopologyEvent,
        changes: &mut Vec<TopologyChange>,
    ) {
        match state.handle(event, &self.options) {
            Outcome::Applied(change) => {
                self.stats.increment_applied();
                debug!(%event, "Applied topology event");
                changes.push(change);
                self.release(state, event.fingerprint(), changes)
            }
            Outcome::Unchanged => {
                debug!(%event, "Topology already up to date");
                self.release(state, event.fingerprint(), changes)
            }
            Outcome::Deferred(prerequisites) => {
                self.stats.increment_parked();
                debug!(%event, missing = prerequisites.len(), "Parking topology event");
                let fingerprints: Vec<_> =
                    prerequisites.iter().map(TopologyEvent::fingerprint).collect();
                state.pending.park(event, &fingerprints, Instant::now());
            }
            Outcome::Ignored => trace!(%event, "Ignoring down event"),
            Outcome::Rejected { port, existing } => {
                self.stats.increment_rejected();
                warn!(%event, %port, %existing, "Port already linked, dropping topology event");
            }
        }
    }

    /// Retries every parked event whose last prerequisite was `fingerprint`.
    fn release(
        &self,
        state: &mut TopologyState,
        fingerprint: Fingerprint,
        changes: &mut Vec<TopologyChange>,
    ) {
        let (ready, expired) =
            state.pending.notify(&fingerprint, Instant::now(), self.options.expiry());
        if expired > 0 {
            self.stats.add_expired(expired);
            warn!(expired, kind = ?fingerprint.kind(), "Dropped expired topology events");
        }

        for event in ready {
            self.stats.increment_retried();
            debug!(%event, "Retrying parked topology event");
            self.process(state, event, changes);
        }
    }

    fn dispatch(&self, changes: &[TopologyChange]) {
        if changes.is_empty() {
            return;
        }

        let listeners: Vec<_> = {
            let mut listeners = self.listeners.write();
            listeners.retain(|l| l.strong_count() > 0);
            listeners.iter().filter_map(Weak::upgrade).collect()
        };

        for change in changes {
            for listener in &listeners {
                change.dispatch(listener.as_ref());
            }
        }

        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| changes.iter().all(|change| tx.send(*change).is_ok()));
    }

    /// Returns the ports of `switch`.
    pub fn ports(&self, switch: SwitchId) -> Vec<PortNo> {
        let state = self.state.read();
        let mut ports: Vec<_> = state.ports.get(&switch).into_iter().flatten().copied().collect();
        ports.sort_unstable();
        ports
    }

    /// Returns `true` if `port` exists and has no outgoing link.
    pub fn is_outer_port(&self, port: SwitchPort) -> bool {
        self.state.read().outer_ports.contains(&port)
    }

    /// Returns every port without an outgoing link.
    pub fn outer_ports(&self) -> Vec<SwitchPort> {
        let mut ports: Vec<_> = self.state.read().outer_ports.iter().copied().collect();
        ports.sort_unstable();
        ports
    }

    /// Returns the far end of the link leaving `port`.
    pub fn linked_port(&self, port: SwitchPort) -> Option<SwitchPort> {
        self.state.read().links.get(&port).copied()
    }

    /// Returns the switches `switch` has a link to, or `None` if the switch is unknown.
    pub fn downstream_switches(&self, switch: SwitchId) -> Option<Vec<SwitchId>> {
        let state = self.state.read();
        if !state.switches.contains(&switch) {
            return None;
        }

        let mut switches: Vec<_> =
            state.downstream.get(&switch).into_iter().flat_map(|n| n.keys()).copied().collect();
        switches.sort_unstable();
        Some(switches)
    }

    /// Returns the switches with a link into `switch`, restricted to links arriving at `port`
    /// if one is given.
    pub fn upstream_switches(&self, switch: SwitchId, port: Option<PortNo>) -> Vec<SwitchId> {
        let state = self.state.read();
        let Some(ports) = state.ports.get(&switch) else { return Vec::new() };

        let mut switches: Vec<_> = match port {
            Some(port) if !ports.contains(&port) => return Vec::new(),
            Some(port) => {
                state.reverse.get(&SwitchPort::new(switch, port)).map(|src| src.switch).into_iter().collect()
            }
            None => ports
                .iter()
                .filter_map(|port| state.reverse.get(&SwitchPort::new(switch, *port)))
                .map(|src| src.switch)
                .collect(),
        };
        switches.sort_unstable();
        switches.dedup();
        switches
    }

    /// Returns the ports of a link from `src` to `dst`, if there is one.
    pub fn link(&self, src: SwitchId, dst: SwitchId) -> Option<(PortNo, PortNo)> {
        let state = self.state.read();
        if !state.downstream.get(&src).is_some_and(|n| n.contains_key(&dst)) {
            return None;
        }

        state
            .links
            .iter()
            .filter(|(from, to)| from.switch == src && to.switch == dst)
            .map(|(from, to)| (from.port, to.port))
            .min()
    }

    /// Returns every known switch.
    pub fn switches(&self) -> Vec<SwitchId> {
        let mut switches: Vec<_> = self.state.read().switches.iter().copied().collect();
        switches.sort_unstable();
        switches
    }

    pub fn contains_switch(&self, switch: SwitchId) -> bool {
        self.state.read().switches.contains(&switch)
    }

    /// Returns every link as `(src, dst)`.
    pub fn links(&self) -> Vec<(SwitchPort, SwitchPort)> {
        let mut links: Vec<_> = self.state.read().links.iter().map(|(s, d)| (*s, *d)).collect();
        links.sort_unstable();
        links
    }

    /// Returns the parked events, oldest first. Expired events that have not been swept yet
    /// are included.
    pub fn pending_events(&self) -> Vec<PendingEvent> {
        self.state.read().pending.snapshot()
    }

    /// Logs the whole topology at trace level.
    pub fn dump(&self) {
        Self::dump_state(&self.state.read());
    }

    fn dump_state(state: &TopologyState) {
        trace!(
            switches = state.switches.len(),
            links = state.links.len(),
            pending = state.pending.len(),
            "Topology dump"
        );
        for (src, dst) in &state.links {
            trace!("{src} --- {dst}");
        }
    }
}
