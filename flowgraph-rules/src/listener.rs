use flowgraph_common::SwitchId;

use crate::RuleId;

/// A change of the rule graph, delivered to listeners and subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GraphEvent {
    RuleAdded { id: RuleId, switch: SwitchId },
    RuleRemoved { id: RuleId, switch: SwitchId },
    /// Rule `from` now forwards into rule `to`.
    LinkAdded { from: RuleId, to: RuleId },
    LinkRemoved { from: RuleId, to: RuleId },
}

impl GraphEvent {
    /// Invokes the callback of `listener` matching this event.
    pub fn dispatch(&self, listener: &dyn RuleGraphListener) {
        match *self {
            Self::RuleAdded { id, switch } => listener.rule_added(id, switch),
            Self::RuleRemoved { id, switch } => listener.rule_removed(id, switch),
            Self::LinkAdded { from, to } => listener.link_added(from, to),
            Self::LinkRemoved { from, to } => listener.link_removed(from, to),
        }
    }
}

/// Receives rule graph changes once the mutation that caused them is complete and every graph
/// lock has been released.
pub trait RuleGraphListener: Send + Sync {
    fn rule_added(&self, _id: RuleId, _switch: SwitchId) {}

    fn rule_removed(&self, _id: RuleId, _switch: SwitchId) {}

    fn link_added(&self, _from: RuleId, _to: RuleId) {}

    fn link_removed(&self, _from: RuleId, _to: RuleId) {}
}
