mod classification;
mod concurrency;
mod masking;
mod overlap;
mod scenario;

use flowgraph::{PortNo, RuleNode, SwitchId, SwitchPort, TernaryArray, TopologyEvent};

pub(crate) fn ta(s: &str) -> TernaryArray {
    s.parse().unwrap()
}

pub(crate) fn sw(id: u64) -> SwitchId {
    SwitchId::new(id)
}

pub(crate) fn port(switch: u64, port: u32) -> SwitchPort {
    SwitchPort::from((switch, port))
}

/// A rule on `switch` forwarding `s` out of `out`.
pub(crate) fn forwarding(switch: u64, priority: u16, s: &str, out: u32) -> RuleNode {
    RuleNode::new(sw(switch), priority, ta(s)).with_out_port(PortNo::new(out))
}

/// A rule on `switch` matching `s` arriving at `in_port`, without actions.
pub(crate) fn ingress(switch: u64, priority: u16, s: &str, in_port: u32) -> RuleNode {
    RuleNode::new(sw(switch), priority, ta(s)).with_in_port(PortNo::new(in_port))
}

/// The events bringing up both ends of `src -> dst` and the link itself.
pub(crate) fn link_up(src: SwitchPort, dst: SwitchPort) -> Vec<TopologyEvent> {
    vec![
        TopologyEvent::SwitchUp(src.switch),
        TopologyEvent::SwitchUp(dst.switch),
        TopologyEvent::PortUp(src),
        TopologyEvent::PortUp(dst),
        TopologyEvent::LinkUp { src, dst },
    ]
}
