use flowgraph_common::{SwitchId, SwitchPort};

use crate::TopologyChange;

/// Receives topology changes after they have been applied.
///
/// Callbacks run on the thread that applied the batch, after the view's lock has been
/// released, so they may query or even mutate the view.
pub trait TopologyListener: Send + Sync {
    fn switch_added(&self, _switch: SwitchId) {}

    fn switch_removed(&self, _switch: SwitchId) {}

    fn port_added(&self, _port: SwitchPort) {}

    fn port_removed(&self, _port: SwitchPort) {}

    fn link_added(&self, _src: SwitchPort, _dst: SwitchPort) {}

    fn link_removed(&self, _src: SwitchPort, _dst: SwitchPort) {}
}

impl TopologyChange {
    /// Invokes the callback of `listener` matching this change.
    pub fn dispatch(&self, listener: &dyn TopologyListener) {
        match *self {
            Self::SwitchAdded(switch) => listener.switch_added(switch),
            Self::SwitchRemoved(switch) => listener.switch_removed(switch),
            Self::PortAdded(port) => listener.port_added(port),
            Self::PortRemoved(port) => listener.port_removed(port),
            Self::LinkAdded { src, dst } => listener.link_added(src, dst),
            Self::LinkRemoved { src, dst } => listener.link_removed(src, dst),
        }
    }
}
