#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

use std::sync::Arc;

use tracing::{debug, trace};

pub use flowgraph_common::*;
pub use flowgraph_hsa::*;
pub use flowgraph_rules::*;
pub use flowgraph_topology::*;

#[derive(Debug, Clone, Default)]
pub struct NetworkOptions {
    topology: TopologyOptions,
    rules: RuleGraphOptions,
}

impl NetworkOptions {
    /// Sets the options of the topology view.
    pub fn topology(mut self, topology: TopologyOptions) -> Self {
        self.topology = topology;
        self
    }

    /// Sets the options of the rule graph.
    pub fn rules(mut self, rules: RuleGraphOptions) -> Self {
        self.rules = rules;
        self
    }
}

/// A topology view and the rule graph following it.
///
/// The rule graph is registered as a listener of the topology view: links, switches and their
/// removals reported through [`Network::apply_topology`] relink rules as they are applied.
#[derive(Debug, Clone)]
pub struct Network {
    topology: Arc<TopologyView>,
    rules: Arc<RuleGraph>,
}

impl Default for Network {
    fn default() -> Self {
        Self::new(NetworkOptions::default())
    }
}

impl Network {
    pub fn new(options: NetworkOptions) -> Self {
        let topology = Arc::new(TopologyView::new(options.topology));
        let rules = Arc::new(RuleGraph::new(Arc::clone(&topology), options.rules));
        topology.add_listener(&rules);
        debug!("Rule graph subscribed to topology");

        Self { topology, rules }
    }

    /// Applies a batch of topology events. See [`TopologyView::apply`].
    pub fn apply_topology(&self, events: impl IntoIterator<Item = TopologyEvent>) {
        self.topology.apply(events);
    }

    /// Converts `rule` through `layout` and installs it.
    pub fn add_flow_rule(&self, rule: &FlowRule, layout: &FieldLayout) -> Result<RuleId, RuleGraphError> {
        self.rules.add_rule_node(RuleNode::from_flow_rule(rule, layout)?)
    }

    #[inline]
    pub fn topology(&self) -> &Arc<TopologyView> {
        &self.topology
    }

    #[inline]
    pub fn rules(&self) -> &Arc<RuleGraph> {
        &self.rules
    }

    /// Logs the topology and the rule graph at trace level.
    pub fn dump(&self) {
        trace!(timestamp = unix_millis(), "Network dump");
        self.topology.dump();
        self.rules.dump();
    }
}
