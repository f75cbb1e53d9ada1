use std::sync::{Arc, Weak};

use flowgraph_common::{SwitchId, SwitchPort};
use flowgraph_hsa::HsaError;
use flowgraph_topology::{TopologyListener, TopologyView};
use parking_lot::{Mutex, RwLock, RwLockWriteGuard};
use rustc_hash::FxHashMap;
use tokio::sync::mpsc;
use tracing::{debug, error, trace, warn};

use crate::{
    adjacency::Adjacency, classify::ClassSet, store::RuleStore, GraphEvent, RuleGraphError,
    RuleGraphListener, RuleGraphOptions, RuleGraphStats, RuleId, RuleKey, RuleNode,
};

/// Rules of every switch and the forwarding edges between them.
///
/// Locks are always taken in the same order: rule store, adjacency, input class, output class,
/// dropping class, selection priorities. Mutators collect their [`GraphEvent`]s and deliver
/// them to listeners and subscribers after every lock has been released, so callbacks may
/// query or mutate the graph.
///
/// The graph follows a [`TopologyView`] to resolve links. Register it as a listener of that
/// view (see [`TopologyView::add_listener`]) to keep edges in sync with topology changes.
#[derive(Debug)]
pub struct RuleGraph {
    store: RwLock<RuleStore>,
    adjacency: RwLock<Adjacency>,
    input: RwLock<ClassSet>,
    output: RwLock<ClassSet>,
    dropping: RwLock<ClassSet>,
    /// Selection priority of every rule. Lower is selected first.
    priorities: RwLock<FxHashMap<RuleId, i64>>,
    topology: Arc<TopologyView>,
    options: RuleGraphOptions,
    stats: RuleGraphStats,
    listeners: RwLock<Vec<Weak<dyn RuleGraphListener>>>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<GraphEvent>>>,
}

impl RuleGraph {
    pub fn new(topology: Arc<TopologyView>, options: RuleGraphOptions) -> Self {
        Self {
            store: RwLock::new(RuleStore::new(options.width())),
            adjacency: RwLock::new(Adjacency::default()),
            input: RwLock::new(ClassSet::default()),
            output: RwLock::new(ClassSet::default()),
            dropping: RwLock::new(ClassSet::default()),
            priorities: RwLock::new(FxHashMap::default()),
            topology,
            options,
            stats: RuleGraphStats::default(),
            listeners: RwLock::new(Vec::new()),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    #[inline]
    pub fn options(&self) -> &RuleGraphOptions {
        &self.options
    }

    #[inline]
    pub fn stats(&self) -> &RuleGraphStats {
        &self.stats
    }

    #[inline]
    pub fn topology(&self) -> &Arc<TopologyView> {
        &self.topology
    }

    /// Registers a listener. The graph only keeps a weak reference: the listener stops
    /// receiving events once it is dropped.
    pub fn add_listener<L: RuleGraphListener + 'static>(&self, listener: &Arc<L>) {
        let listener: Weak<L> = Arc::downgrade(listener);
        let listener: Weak<dyn RuleGraphListener> = listener;
        self.listeners.write().push(listener);
    }

    /// Unregisters a listener. Returns `false` if it was not registered.
    pub fn remove_listener<L: RuleGraphListener + 'static>(&self, listener: &Arc<L>) -> bool {
        let target = Arc::as_ptr(listener) as *const ();
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|l| l.as_ptr() as *const () != target);
        listeners.len() != before
    }

    /// Returns a channel receiving every graph event from now on.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<GraphEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Installs a rule.
    ///
    /// The rule is robbed by every overlapping rule of higher priority and robs every
    /// overlapping rule of lower priority. It is then linked to the rules it forwards into and
    /// from the rules forwarding into it, and every edge of the rules it robbed is checked
    /// again.
    ///
    /// Fails without changing anything if an identical rule is installed
    /// ([`RuleGraphError::Duplicate`]) or an overlapping rule has the same priority
    /// ([`RuleGraphError::StructuralConflict`]).
    pub fn add_rule_node(&self, node: RuleNode) -> Result<RuleId, RuleGraphError> {
        let mut events = Vec::new();
        let description = node.to_string();
        let result = self.insert(node, &mut events);
        if let Err(err) = &result {
            Self::log_rejection("insert", &description, err);
        }
        self.dispatch(&events);
        result
    }

    /// Deletes the rule structurally equal to `node` if `strict`, otherwise every rule of its
    /// switch overlapping it. Returns the deleted rules.
    ///
    /// Rules robbed by a deleted rule get their headers back and are linked again.
    pub fn remove_rule_node(
        &self,
        node: &RuleNode,
        strict: bool,
    ) -> Result<Vec<RuleId>, RuleGraphError> {
        let mut events = Vec::new();
        let result = self.remove_matching(node, strict, &mut events);
        if let Err(err) = &result {
            Self::log_rejection("remove", &node.to_string(), err);
        }
        self.dispatch(&events);
        result
    }

    /// Replaces the rule structurally equal to `node` if `strict`, otherwise every rule of its
    /// switch whose key is covered by `node`'s, with `node`. Returns the id of the new rule.
    pub fn modify_rule_node(&self, node: RuleNode, strict: bool) -> Result<RuleId, RuleGraphError> {
        let mut events = Vec::new();
        let description = node.to_string();
        let result = self.replace(node, strict, &mut events);
        if let Err(err) = &result {
            Self::log_rejection("modify", &description, err);
        }
        self.dispatch(&events);
        result
    }

    fn log_rejection(operation: &str, node: &str, err: &RuleGraphError) {
        match err {
            RuleGraphError::Hsa(_) => error!(operation, node, ?err, "Rule operation failed"),
            _ => warn!(operation, node, ?err, "Rejected rule operation"),
        }
    }

    fn insert(&self, node: RuleNode, events: &mut Vec<GraphEvent>) -> Result<RuleId, RuleGraphError> {
        let switch = node.switch();
        let mut store = self.store.write();
        let (id, affected) = match store.insert(node) {
            Ok(inserted) => inserted,
            Err(err) => {
                if matches!(err, RuleGraphError::StructuralConflict { .. }) {
                    self.stats.increment_conflicts();
                }
                return Err(err);
            }
        };
        self.stats.increment_rules_added();
        debug!(rule = %id, %switch, robbed = affected.len(), "Inserted rule");
        events.push(GraphEvent::RuleAdded { id, switch });

        let store = RwLockWriteGuard::downgrade(store);
        let mut adjacency = self.adjacency.write();
        let mut touched = vec![id];

        for robbed in affected {
            for next in adjacency.next(robbed) {
                if !self.connects(&store, robbed, next)? {
                    self.unlink(&mut adjacency, robbed, next, events, &mut touched);
                }
            }
            for prev in adjacency.prev(robbed) {
                if !self.connects(&store, prev, robbed)? {
                    self.unlink(&mut adjacency, prev, robbed, events, &mut touched);
                }
            }
            touched.push(robbed);
        }

        for target in self.forward_candidates(&store, id)? {
            self.link(&mut adjacency, id, target, events, &mut touched);
        }
        for source in self.backward_candidates(&store, id)? {
            self.link(&mut adjacency, source, id, events, &mut touched);
        }

        let adjacency = RwLockWriteGuard::downgrade(adjacency);
        self.reclassify(&store, &adjacency, &touched);
        if self.options.dump_on_change {
            Self::dump_locked(&store, &adjacency);
        }

        Ok(id)
    }

    fn remove_matching(
        &self,
        node: &RuleNode,
        strict: bool,
        events: &mut Vec<GraphEvent>,
    ) -> Result<Vec<RuleId>, RuleGraphError> {
        let mut store = self.store.write();
        let ids = if strict {
            vec![store.reference(node.switch(), node.key())?]
        } else {
            store.overlapping(node.switch(), node.key())?
        };
        if ids.is_empty() {
            return Err(RuleGraphError::NotFound);
        }

        self.delete_all(&mut store, &ids, events)?;
        Ok(ids)
    }

    fn replace(
        &self,
        node: RuleNode,
        strict: bool,
        events: &mut Vec<GraphEvent>,
    ) -> Result<RuleId, RuleGraphError> {
        {
            let mut store = self.store.write();
            let ids = if strict {
                vec![store.reference(node.switch(), node.key())?]
            } else {
                store.subset_of(node.switch(), node.key()).unwrap_or_default()
            };
            debug!(switch = %node.switch(), replaced = ids.len(), "Modifying rules");
            self.delete_all(&mut store, &ids, events)?;
        }

        self.insert(node, events)
    }

    /// Deletes `ids` and reclassifies everything they touched. Must be called with the store
    /// write lock held.
    fn delete_all(
        &self,
        store: &mut RuleStore,
        ids: &[RuleId],
        events: &mut Vec<GraphEvent>,
    ) -> Result<(), RuleGraphError> {
        if ids.is_empty() {
            return Ok(());
        }

        let mut adjacency = self.adjacency.write();
        let mut touched = Vec::new();
        let mut result = Ok(());
        for id in ids {
            result = self.delete(store, &mut adjacency, *id, events, &mut touched);
            if result.is_err() {
                break;
            }
        }

        self.reclassify(store, &adjacency, &touched);
        if self.options.dump_on_change {
            Self::dump_locked(store, &adjacency);
        }
        result
    }

    fn delete(
        &self,
        store: &mut RuleStore,
        adjacency: &mut Adjacency,
        id: RuleId,
        events: &mut Vec<GraphEvent>,
        touched: &mut Vec<RuleId>,
    ) -> Result<(), RuleGraphError> {
        let (next, prev) = adjacency.remove_node(id);
        for to in next {
            self.edge_removed(id, to, events, touched);
        }
        for from in prev {
            self.edge_removed(from, id, events, touched);
        }
        touched.push(id);

        let (node, restored) = store.remove(id)?;
        self.stats.increment_rules_removed();
        debug!(rule = %id, switch = %node.switch(), restored = restored.len(), "Removed rule");
        events.push(GraphEvent::RuleRemoved { id, switch: node.switch() });

        // Restored rules only gain headers: existing edges stay valid.
        for rule in restored {
            for target in self.forward_candidates(store, rule)? {
                self.link(adjacency, rule, target, events, touched);
            }
            for source in self.backward_candidates(store, rule)? {
                self.link(adjacency, source, rule, events, touched);
            }
            touched.push(rule);
        }

        Ok(())
    }

    fn link(
        &self,
        adjacency: &mut Adjacency,
        from: RuleId,
        to: RuleId,
        events: &mut Vec<GraphEvent>,
        touched: &mut Vec<RuleId>,
    ) {
        if !adjacency.add(from, to) {
            return;
        }
        self.stats.increment_edges_added();
        debug!(%from, %to, "Linked rules");
        events.push(GraphEvent::LinkAdded { from, to });
        touched.extend([from, to]);
    }

    fn unlink(
        &self,
        adjacency: &mut Adjacency,
        from: RuleId,
        to: RuleId,
        events: &mut Vec<GraphEvent>,
        touched: &mut Vec<RuleId>,
    ) {
        if adjacency.remove(from, to) {
            self.edge_removed(from, to, events, touched);
        }
    }

    fn edge_removed(
        &self,
        from: RuleId,
        to: RuleId,
        events: &mut Vec<GraphEvent>,
        touched: &mut Vec<RuleId>,
    ) {
        self.stats.increment_edges_removed();
        debug!(%from, %to, "Unlinked rules");
        events.push(GraphEvent::LinkRemoved { from, to });
        touched.extend([from, to]);
    }

    /// Returns `true` if a link carries `from`'s out-port to `to`'s switch and in-port, and
    /// some header really emitted by `from` is really matched by `to`.
    fn connects(&self, store: &RuleStore, from: RuleId, to: RuleId) -> Result<bool, HsaError> {
        let (Some(source), Some(target)) = (store.get(from), store.get(to)) else {
            return Ok(false);
        };
        let Some(out_port) = source.out_port() else { return Ok(false) };
        let Some(dst) = self.topology.linked_port(SwitchPort::new(source.switch(), out_port))
        else {
            return Ok(false);
        };

        if dst.switch != target.switch() || target.in_port().is_some_and(|port| port != dst.port) {
            return Ok(false);
        }
        source.really_output().has_intersection(target.really_match())
    }

    /// Returns the rules `id` forwards into.
    fn forward_candidates(&self, store: &RuleStore, id: RuleId) -> Result<Vec<RuleId>, HsaError> {
        let Some(node) = store.get(id) else { return Ok(Vec::new()) };
        let Some(out_port) = node.out_port() else { return Ok(Vec::new()) };
        let Some(dst) = self.topology.linked_port(SwitchPort::new(node.switch(), out_port)) else {
            return Ok(Vec::new());
        };

        let probe = RuleKey::new(Some(dst.port), node.output_array().clone());
        let mut targets = Vec::new();
        for target in store.overlapping(dst.switch, &probe).unwrap_or_default() {
            let Some(next) = store.get(target) else { continue };
            if node.really_output().has_intersection(next.really_match())? {
                targets.push(target);
            }
        }

        Ok(targets)
    }

    /// Returns the rules forwarding into `id`.
    fn backward_candidates(&self, store: &RuleStore, id: RuleId) -> Result<Vec<RuleId>, HsaError> {
        let Some(node) = store.get(id) else { return Ok(Vec::new()) };

        let mut sources = Vec::new();
        for upstream in self.topology.upstream_switches(node.switch(), node.in_port()) {
            for source in store.switch_rules(upstream) {
                if self.connects(store, source, id)? {
                    sources.push(source);
                }
            }
        }

        Ok(sources)
    }

    /// Recomputes the classes of every rule in `touched`. Rules that no longer exist leave
    /// every class.
    fn reclassify(&self, store: &RuleStore, adjacency: &Adjacency, touched: &[RuleId]) {
        let mut input = self.input.write();
        let mut output = self.output.write();
        let mut dropping = self.dropping.write();
        let mut priorities = self.priorities.write();

        let mut touched = touched.to_vec();
        touched.sort_unstable();
        touched.dedup();

        for id in touched {
            match store.get(id) {
                Some(node) => {
                    let priority = *priorities.entry(id).or_default();
                    input.set(id, priority, !adjacency.has_prev(id));
                    output.set(id, priority, !adjacency.has_next(id));
                    dropping.set(id, priority, node.is_dropping());
                }
                None => {
                    input.remove(id);
                    output.remove(id);
                    dropping.remove(id);
                    priorities.remove(&id);
                }
            }
        }
    }

    /// Links every rule sending out of `src` to the rules behind the new link.
    fn relink_port(&self, src: SwitchPort, events: &mut Vec<GraphEvent>) -> Result<(), HsaError> {
        let store = self.store.read();
        let mut adjacency = self.adjacency.write();
        let mut touched = Vec::new();

        let mut result = Ok(());
        for id in store.switch_rules(src.switch) {
            if store.get(id).and_then(RuleNode::out_port) != Some(src.port) {
                continue;
            }
            match self.forward_candidates(&store, id) {
                Ok(targets) => {
                    for target in targets {
                        self.link(&mut adjacency, id, target, events, &mut touched);
                    }
                }
                Err(err) => {
                    result = Err(err);
                    break;
                }
            }
        }

        let adjacency = RwLockWriteGuard::downgrade(adjacency);
        self.reclassify(&store, &adjacency, &touched);
        result
    }

    /// Drops every edge leaving `src`.
    fn unlink_port(&self, src: SwitchPort, events: &mut Vec<GraphEvent>) {
        let store = self.store.read();
        let mut adjacency = self.adjacency.write();
        let mut touched = Vec::new();

        for id in store.switch_rules(src.switch) {
            if store.get(id).and_then(RuleNode::out_port) != Some(src.port) {
                continue;
            }
            for next in adjacency.next(id) {
                self.unlink(&mut adjacency, id, next, events, &mut touched);
            }
        }

        let adjacency = RwLockWriteGuard::downgrade(adjacency);
        self.reclassify(&store, &adjacency, &touched);
    }

    /// Deletes every rule of `switch` and forgets the switch.
    fn drop_switch(&self, switch: SwitchId, events: &mut Vec<GraphEvent>) -> Result<(), RuleGraphError> {
        let mut store = self.store.write();
        let ids = store.switch_rules(switch);
        self.delete_all(&mut store, &ids, events)?;
        store.remove_switch(switch);
        Ok(())
    }

    fn dispatch(&self, events: &[GraphEvent]) {
        if events.is_empty() {
            return;
        }

        let listeners: Vec<_> = {
            let mut listeners = self.listeners.write();
            listeners.retain(|l| l.strong_count() > 0);
            listeners.iter().filter_map(Weak::upgrade).collect()
        };

        for event in events {
            for listener in &listeners {
                event.dispatch(listener.as_ref());
            }
        }

        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| events.iter().all(|event| tx.send(*event).is_ok()));
    }

    /// Returns a snapshot of rule `id`.
    pub fn rule(&self, id: RuleId) -> Option<RuleNode> {
        self.store.read().get(id).cloned()
    }

    /// Returns the id of the rule structurally equal to `node`.
    pub fn lookup(&self, node: &RuleNode) -> Option<RuleId> {
        self.store.read().lookup(node.switch(), node.key())
    }

    /// Returns every rule of `switch`.
    pub fn switch_rules(&self, switch: SwitchId) -> Vec<RuleId> {
        self.store.read().switch_rules(switch)
    }

    /// Returns `true` if the graph holds a rule table for `switch`.
    pub fn contains_switch(&self, switch: SwitchId) -> bool {
        self.store.read().contains_switch(switch)
    }

    /// Returns the rules `id` forwards into.
    pub fn next_hops(&self, id: RuleId) -> Vec<RuleId> {
        self.adjacency.read().next(id)
    }

    /// Returns the rules forwarding into `id`.
    pub fn prev_hops(&self, id: RuleId) -> Vec<RuleId> {
        self.adjacency.read().prev(id)
    }

    /// Returns `true` if rule `from` forwards into rule `to`.
    pub fn is_link_exist(&self, from: RuleId, to: RuleId) -> bool {
        self.adjacency.read().contains(from, to)
    }

    /// Returns the higher priority rules overlapping `id`, which rob its headers.
    pub fn depends_on(&self, id: RuleId) -> Vec<RuleId> {
        self.store.read().depends_on(id)
    }

    /// Returns the lower priority rules overlapping `id`, whose headers it robs.
    pub fn affects(&self, id: RuleId) -> Vec<RuleId> {
        self.store.read().affects(id)
    }

    pub fn rule_count(&self) -> usize {
        self.store.read().len()
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.read().edge_count()
    }

    /// Returns the selection priority of `id`, if it exists.
    pub fn rule_node_priority(&self, id: RuleId) -> Option<i64> {
        self.priorities.read().get(&id).copied()
    }

    /// Sets the selection priority of `id` and returns the previous one. Rules with a lower
    /// selection priority are returned first by the class queries. Returns `None` and changes
    /// nothing if the rule does not exist.
    pub fn set_rule_node_priority(&self, id: RuleId, priority: i64) -> Option<i64> {
        let store = self.store.read();
        store.get(id)?;

        let mut input = self.input.write();
        let mut output = self.output.write();
        let mut dropping = self.dropping.write();
        let mut priorities = self.priorities.write();

        input.rekey(id, priority);
        output.rekey(id, priority);
        dropping.rekey(id, priority);
        Some(priorities.insert(id, priority).unwrap_or_default())
    }

    /// Returns up to `limit` rules without predecessors, lowest selection priority first.
    /// Selection does not change priorities; callers rotating through the rules should call
    /// [`RuleGraph::set_rule_node_priority`] on what they consume.
    pub fn input_rule_nodes(&self, limit: usize) -> Vec<RuleId> {
        self.input.read().take(limit)
    }

    /// Returns up to `limit` rules without successors, lowest selection priority first.
    pub fn output_rule_nodes(&self, limit: usize) -> Vec<RuleId> {
        self.output.read().take(limit)
    }

    /// Returns up to `limit` rules without an output action, lowest selection priority first.
    pub fn dropping_rule_nodes(&self, limit: usize) -> Vec<RuleId> {
        self.dropping.read().take(limit)
    }

    pub fn is_input_rule_node(&self, id: RuleId) -> bool {
        self.input.read().contains(id)
    }

    pub fn is_output_rule_node(&self, id: RuleId) -> bool {
        self.output.read().contains(id)
    }

    pub fn is_dropping_rule_node(&self, id: RuleId) -> bool {
        self.dropping.read().contains(id)
    }

    /// Logs the whole graph at trace level.
    pub fn dump(&self) {
        let store = self.store.read();
        let adjacency = self.adjacency.read();
        Self::dump_locked(&store, &adjacency);
    }

    fn dump_locked(store: &RuleStore, adjacency: &Adjacency) {
        trace!(rules = store.len(), edges = adjacency.edge_count(), "Rule graph dump");
        for (id, node) in store.nodes() {
            trace!(
                rule = %id,
                really_match = %node.really_match(),
                depends_on = ?store.depends_on(id),
                "{node}"
            );
        }
        for (from, to) in adjacency.edges() {
            trace!("{from} ---> {to}");
        }
    }
}

impl TopologyListener for RuleGraph {
    fn switch_added(&self, switch: SwitchId) {
        if self.store.write().add_switch(switch) {
            debug!(%switch, "Created rule table");
        }
    }

    fn switch_removed(&self, switch: SwitchId) {
        let mut events = Vec::new();
        if let Err(err) = self.drop_switch(switch, &mut events) {
            error!(%switch, ?err, "Failed to drop rules of removed switch");
        }
        self.dispatch(&events);
    }

    fn link_added(&self, src: SwitchPort, dst: SwitchPort) {
        let mut events = Vec::new();
        if let Err(err) = self.relink_port(src, &mut events) {
            error!(%src, %dst, ?err, "Failed to link rules over new link");
        }
        self.dispatch(&events);
    }

    fn link_removed(&self, src: SwitchPort, _dst: SwitchPort) {
        let mut events = Vec::new();
        self.unlink_port(src, &mut events);
        self.dispatch(&events);
    }
}

#[cfg(test)]
mod tests {
    use flowgraph_common::PortNo;
    use flowgraph_hsa::{HeaderSpace, Rewrite, TernaryArray};
    use flowgraph_topology::{TopologyEvent, TopologyOptions};

    use super::*;

    fn ta(s: &str) -> TernaryArray {
        s.parse().unwrap()
    }

    fn sw(id: u64) -> SwitchId {
        SwitchId::new(id)
    }

    fn port(switch: u64, port: u32) -> SwitchPort {
        SwitchPort::from((switch, port))
    }

    fn setup(options: TopologyOptions) -> (Arc<TopologyView>, Arc<RuleGraph>) {
        let topology = Arc::new(TopologyView::new(options));
        let graph = Arc::new(RuleGraph::new(Arc::clone(&topology), RuleGraphOptions::default()));
        topology.add_listener(&graph);
        (topology, graph)
    }

    /// `1/1 -> 2/2`
    fn linked() -> (Arc<TopologyView>, Arc<RuleGraph>) {
        let (topology, graph) = setup(TopologyOptions::default().apply_down_events(true));
        topology.apply([
            TopologyEvent::SwitchUp(sw(1)),
            TopologyEvent::SwitchUp(sw(2)),
            TopologyEvent::PortUp(port(1, 1)),
            TopologyEvent::PortUp(port(2, 2)),
            TopologyEvent::LinkUp { src: port(1, 1), dst: port(2, 2) },
        ]);
        (topology, graph)
    }

    fn forwarding(switch: u64, priority: u16, s: &str, out: u32) -> RuleNode {
        RuleNode::new(sw(switch), priority, ta(s)).with_out_port(PortNo::new(out))
    }

    fn ingress(switch: u64, priority: u16, s: &str, in_port: u32) -> RuleNode {
        RuleNode::new(sw(switch), priority, ta(s)).with_in_port(PortNo::new(in_port))
    }

    #[test]
    fn graph_insert_is_idempotent() {
        let _ = tracing_subscriber::fmt::try_init();
        let (_, graph) = setup(TopologyOptions::default());

        let id = graph.add_rule_node(forwarding(1, 5, "0xxx", 1)).unwrap();
        assert_eq!(
            graph.add_rule_node(forwarding(1, 5, "0xxx", 1)),
            Err(RuleGraphError::Duplicate(id))
        );
        assert_eq!(graph.rule_count(), 1);
        assert_eq!(graph.stats().rules_added(), 1);
        assert_eq!(graph.lookup(&forwarding(1, 0, "0xxx", 7)), Some(id));
    }

    #[test]
    fn graph_overlap_is_restored() {
        let (_, graph) = setup(TopologyOptions::default());

        let high = forwarding(1, 10, "01xx", 1);
        let low = graph.add_rule_node(forwarding(1, 1, "xxxx", 2)).unwrap();
        let high_id = graph.add_rule_node(high.clone()).unwrap();
        assert_eq!(graph.depends_on(low), vec![high_id]);
        assert_eq!(graph.affects(high_id), vec![low]);

        let robbed = graph.rule(low).unwrap();
        assert!(!robbed
            .really_match()
            .has_intersection(&HeaderSpace::from_array(ta("01xx")))
            .unwrap());

        assert_eq!(graph.remove_rule_node(&high, true), Ok(vec![high_id]));
        let restored = graph.rule(low).unwrap();
        assert!(restored.really_match().equivalent(&HeaderSpace::from_array(ta("xxxx"))).unwrap());
    }

    #[test]
    fn graph_equal_priority_rejected() {
        let (_, graph) = setup(TopologyOptions::default());

        let first = graph.add_rule_node(forwarding(1, 5, "0xxx", 1)).unwrap();
        let before = graph.rule(first).unwrap();

        assert_eq!(
            graph.add_rule_node(forwarding(1, 5, "00xx", 2)),
            Err(RuleGraphError::StructuralConflict { existing: first, priority: 5 })
        );
        assert_eq!(graph.rule(first).unwrap(), before);
        assert_eq!(graph.rule_count(), 1);
        assert_eq!(graph.stats().conflicts(), 1);
    }

    #[test]
    fn graph_links_rules_before_topology() {
        let (topology, graph) = setup(TopologyOptions::default());

        let r1 = graph.add_rule_node(forwarding(1, 1, "xxxx", 1)).unwrap();
        let r2 = graph.add_rule_node(ingress(2, 1, "xxxx", 2)).unwrap();
        assert!(graph.next_hops(r1).is_empty());

        topology.apply([
            TopologyEvent::SwitchUp(sw(1)),
            TopologyEvent::SwitchUp(sw(2)),
            TopologyEvent::PortUp(port(1, 1)),
            TopologyEvent::PortUp(port(2, 2)),
            TopologyEvent::LinkUp { src: port(1, 1), dst: port(2, 2) },
        ]);

        assert_eq!(graph.next_hops(r1), vec![r2]);
        assert_eq!(graph.prev_hops(r2), vec![r1]);
        assert!(!graph.is_output_rule_node(r1));
        assert!(!graph.is_input_rule_node(r2));
        assert!(graph.is_input_rule_node(r1));
        assert!(graph.is_output_rule_node(r2));
    }

    #[test]
    fn graph_edges_need_intersection() {
        let (_, graph) = linked();

        let r2 = graph.add_rule_node(ingress(2, 1, "1xxx", 2)).unwrap();
        let r3 = graph.add_rule_node(ingress(2, 2, "00xx", 2)).unwrap();
        let r5 = graph.add_rule_node(ingress(2, 3, "0xxx", 3)).unwrap();

        let r1 = graph.add_rule_node(forwarding(1, 1, "0xxx", 1)).unwrap();
        let rewrite = Rewrite::new(ta("0111"), ta("0000")).unwrap();
        let r4 = graph
            .add_rule_node(forwarding(1, 2, "1xxx", 1).with_rewrite(rewrite).unwrap())
            .unwrap();

        assert_eq!(graph.next_hops(r1), vec![r3]);
        assert_eq!(graph.next_hops(r4), vec![r3]);
        assert_eq!(graph.prev_hops(r3), vec![r1, r4]);
        assert!(graph.is_link_exist(r4, r3));
        assert!(!graph.is_link_exist(r3, r4));
        assert!(graph.is_input_rule_node(r2));
        assert!(graph.prev_hops(r5).is_empty());
        assert_eq!(graph.edge_count(), 2);
    }

    #[test]
    fn graph_robbing_moves_edges() {
        let (_, graph) = linked();

        let up = graph.add_rule_node(forwarding(1, 1, "xxxx", 1)).unwrap();
        let down = graph.add_rule_node(ingress(2, 1, "0xxx", 2)).unwrap();
        assert_eq!(graph.next_hops(up), vec![down]);

        let high = forwarding(1, 10, "0xxx", 1);
        let high_id = graph.add_rule_node(high.clone()).unwrap();
        assert!(graph.next_hops(up).is_empty());
        assert!(graph.is_output_rule_node(up));
        assert_eq!(graph.prev_hops(down), vec![high_id]);

        graph.remove_rule_node(&high, true).unwrap();
        assert_eq!(graph.next_hops(up), vec![down]);
        assert!(!graph.is_output_rule_node(up));
        assert_eq!(graph.stats().edges_removed(), 2);
    }

    #[test]
    fn graph_classes_and_priorities() {
        let (_, graph) = setup(TopologyOptions::default());

        let a = graph.add_rule_node(forwarding(1, 1, "0xxx", 1)).unwrap();
        let b = graph.add_rule_node(RuleNode::new(sw(1), 1, ta("1xxx"))).unwrap();

        assert_eq!(graph.input_rule_nodes(10), vec![a, b]);
        assert_eq!(graph.output_rule_nodes(10), vec![a, b]);
        assert_eq!(graph.dropping_rule_nodes(10), vec![b]);
        assert!(!graph.is_dropping_rule_node(a));
        assert_eq!(graph.rule_node_priority(a), Some(0));

        assert_eq!(graph.set_rule_node_priority(a, 5), Some(0));
        assert_eq!(graph.rule_node_priority(a), Some(5));
        assert_eq!(graph.input_rule_nodes(10), vec![b, a]);
        assert_eq!(graph.input_rule_nodes(1), vec![b]);

        graph.remove_rule_node(&RuleNode::new(sw(1), 1, ta("1xxx")), true).unwrap();
        assert_eq!(graph.set_rule_node_priority(b, 1), None);
        assert_eq!(graph.rule_node_priority(b), None);
        assert!(!graph.is_input_rule_node(b));
        assert!(graph.dropping_rule_nodes(10).is_empty());
    }

    #[test]
    fn graph_remove() {
        let (_, graph) = setup(TopologyOptions::default());

        let a = graph.add_rule_node(forwarding(1, 1, "00xx", 1)).unwrap();
        let b = graph.add_rule_node(forwarding(1, 2, "01xx", 1)).unwrap();
        graph.add_rule_node(forwarding(1, 3, "1xxx", 1)).unwrap();

        let probe = RuleNode::new(sw(1), 0, ta("0xxx"));
        assert_eq!(graph.remove_rule_node(&probe, true), Err(RuleGraphError::NotFound));
        assert_eq!(graph.remove_rule_node(&probe, false), Ok(vec![a, b]));
        assert_eq!(graph.remove_rule_node(&probe, false), Err(RuleGraphError::NotFound));
        assert_eq!(graph.rule_count(), 1);
        assert_eq!(
            graph.remove_rule_node(&RuleNode::new(sw(9), 0, ta("0xxx")), false),
            Err(RuleGraphError::UnknownSwitch(sw(9)))
        );
    }

    #[test]
    fn graph_modify() {
        let (_, graph) = setup(TopologyOptions::default());

        let a = graph.add_rule_node(forwarding(1, 5, "0xxx", 1)).unwrap();
        let b = graph.modify_rule_node(forwarding(1, 5, "0xxx", 2), true).unwrap();
        assert_ne!(a, b);
        assert!(graph.rule(a).is_none());
        assert_eq!(graph.rule(b).unwrap().out_port(), Some(PortNo::new(2)));

        assert_eq!(
            graph.modify_rule_node(forwarding(1, 5, "1xxx", 2), true),
            Err(RuleGraphError::NotFound)
        );
        assert_eq!(
            graph.modify_rule_node(forwarding(9, 5, "1xxx", 2), true),
            Err(RuleGraphError::UnknownSwitch(sw(9)))
        );

        // Covers b: replaced.
        let c = graph.modify_rule_node(forwarding(1, 1, "xxxx", 3), false).unwrap();
        assert_eq!(graph.switch_rules(sw(1)), vec![c]);
        assert_eq!(graph.stats().rules_removed(), 2);
    }

    #[test]
    fn graph_link_and_switch_removed() {
        let (topology, graph) = linked();

        let r1 = graph.add_rule_node(forwarding(1, 1, "xxxx", 1)).unwrap();
        let r2 = graph.add_rule_node(ingress(2, 1, "xxxx", 2)).unwrap();
        assert!(graph.is_link_exist(r1, r2));

        topology.apply([TopologyEvent::LinkDown { src: port(1, 1), dst: port(2, 2) }]);
        assert!(!graph.is_link_exist(r1, r2));
        assert!(graph.is_output_rule_node(r1));
        assert!(graph.is_input_rule_node(r2));

        topology
            .apply([TopologyEvent::PortDown(port(2, 2)), TopologyEvent::SwitchDown(sw(2))]);
        assert!(!graph.contains_switch(sw(2)));
        assert!(graph.rule(r2).is_none());
        assert!(!graph.is_input_rule_node(r2));
        assert_eq!(graph.rule_count(), 1);
    }

    struct Reentrant {
        graph: Arc<RuleGraph>,
        counts: Mutex<Vec<usize>>,
    }

    impl RuleGraphListener for Reentrant {
        fn rule_added(&self, _id: RuleId, _switch: SwitchId) {
            self.counts.lock().push(self.graph.rule_count());
        }
    }

    #[test]
    fn graph_listener_may_reenter() {
        let (_, graph) = setup(TopologyOptions::default());
        let listener = Arc::new(Reentrant { graph: Arc::clone(&graph), counts: Mutex::new(Vec::new()) });
        graph.add_listener(&listener);

        graph.add_rule_node(forwarding(1, 1, "0xxx", 1)).unwrap();
        graph.add_rule_node(forwarding(1, 1, "1xxx", 1)).unwrap();
        assert_eq!(*listener.counts.lock(), vec![1, 2]);

        assert!(graph.remove_listener(&listener));
        graph.add_rule_node(forwarding(1, 1, "xxxx", 1)).unwrap_err();
        assert_eq!(listener.counts.lock().len(), 2);
    }

    #[tokio::test]
    async fn graph_subscribe() {
        let (_, graph) = linked();
        let mut rx = graph.subscribe();

        let down = graph.add_rule_node(ingress(2, 1, "xxxx", 2)).unwrap();
        let up = graph.add_rule_node(forwarding(1, 1, "xxxx", 1)).unwrap();

        assert_eq!(rx.recv().await, Some(GraphEvent::RuleAdded { id: down, switch: sw(2) }));
        assert_eq!(rx.recv().await, Some(GraphEvent::RuleAdded { id: up, switch: sw(1) }));
        assert_eq!(rx.recv().await, Some(GraphEvent::LinkAdded { from: up, to: down }));
    }
}
