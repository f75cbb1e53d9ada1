//! The rule dependency graph.
//!
//! A [`RuleGraph`] holds every forwarding rule of the network as a [`RuleNode`]. Per switch,
//! rules are indexed in a trie keyed by in-port and match so that overlapping rules can be
//! found without scanning the flow table. When rules overlap, the higher priority one *robs*
//! the shared headers from the lower priority one, which leaves every rule with the header
//! space it really matches.
//!
//! Across switches, the graph links rule `a` to rule `b` when a topology link carries `a`'s
//! out-port to `b`'s switch and in-port, and some header really emitted by `a` is really
//! matched by `b`. Rules without predecessors are *input* rules, rules without successors are
//! *output* rules, rules without an output action are *dropping* rules.
use flowgraph_common::SwitchId;
use flowgraph_hsa::HsaError;
use thiserror::Error;

mod adjacency;

mod classify;

mod graph;
pub use graph::RuleGraph;

mod key;
pub use key::{RuleKey, RuleSymbol};

mod listener;
pub use listener::{GraphEvent, RuleGraphListener};

mod node;
pub use node::{Action, FlowRule, RuleId, RuleNode};

mod stats;
pub use stats::RuleGraphStats;

mod store;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleGraphError {
    #[error("Rule is already installed as {0}")]
    Duplicate(RuleId),
    #[error("Rule overlaps {existing} at equal priority {priority}")]
    StructuralConflict { existing: RuleId, priority: u16 },
    #[error("No matching rule")]
    NotFound,
    #[error("Unknown switch {0}")]
    UnknownSwitch(SwitchId),
    #[error(transparent)]
    Hsa(#[from] HsaError),
}

#[derive(Debug, Clone, Default)]
pub struct RuleGraphOptions {
    /// The width every rule match must have. When unset, the first inserted rule decides.
    header_width: Option<usize>,
    /// Whether to dump the whole graph at trace level after every mutation.
    dump_on_change: bool,
}

impl RuleGraphOptions {
    /// Sets the width every rule match must have.
    pub fn header_width(mut self, width: usize) -> Self {
        self.header_width = Some(width);
        self
    }

    /// Sets whether to dump the whole graph at trace level after every mutation.
    pub fn dump_on_change(mut self, dump_on_change: bool) -> Self {
        self.dump_on_change = dump_on_change;
        self
    }

    #[inline]
    pub fn width(&self) -> Option<usize> {
        self.header_width
    }
}
