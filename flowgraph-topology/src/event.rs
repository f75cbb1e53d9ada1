use std::fmt;

use flowgraph_common::{PortNo, SwitchId, SwitchPort};

/// A discrete topology notification, as reported by link discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TopologyEvent {
    SwitchUp(SwitchId),
    PortUp(SwitchPort),
    /// A unidirectional link from `src` to `dst`.
    LinkUp { src: SwitchPort, dst: SwitchPort },
    SwitchDown(SwitchId),
    PortDown(SwitchPort),
    LinkDown { src: SwitchPort, dst: SwitchPort },
}

impl TopologyEvent {
    /// Returns the kind of this event.
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::SwitchUp(_) => EventKind::SwitchUp,
            Self::PortUp(_) => EventKind::PortUp,
            Self::LinkUp { .. } => EventKind::LinkUp,
            Self::SwitchDown(_) => EventKind::SwitchDown,
            Self::PortDown(_) => EventKind::PortDown,
            Self::LinkDown { .. } => EventKind::LinkDown,
        }
    }

    /// Returns `true` for removal notifications.
    pub const fn is_down(&self) -> bool {
        matches!(self, Self::SwitchDown(_) | Self::PortDown(_) | Self::LinkDown { .. })
    }

    /// Computes the fingerprint that parked events wait on.
    pub const fn fingerprint(&self) -> Fingerprint {
        let (switch, port, peer) = match *self {
            Self::SwitchUp(switch) | Self::SwitchDown(switch) => (switch, None, None),
            Self::PortUp(port) | Self::PortDown(port) => (port.switch, Some(port.port), None),
            Self::LinkUp { src, dst } | Self::LinkDown { src, dst } => {
                (src.switch, Some(src.port), Some(dst))
            }
        };
        Fingerprint { kind: self.kind(), switch, port, peer }
    }
}

impl fmt::Display for TopologyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SwitchUp(switch) => write!(f, "switch up {switch}"),
            Self::PortUp(port) => write!(f, "port up {port}"),
            Self::LinkUp { src, dst } => write!(f, "link up {src} -> {dst}"),
            Self::SwitchDown(switch) => write!(f, "switch down {switch}"),
            Self::PortDown(port) => write!(f, "port down {port}"),
            Self::LinkDown { src, dst } => write!(f, "link down {src} -> {dst}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    SwitchUp,
    PortUp,
    LinkUp,
    SwitchDown,
    PortDown,
    LinkDown,
}

/// The structural identity of a [`TopologyEvent`]. Two notifications describing the same
/// transition share a fingerprint regardless of when they arrive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    kind: EventKind,
    switch: SwitchId,
    port: Option<PortNo>,
    peer: Option<SwitchPort>,
}

impl Fingerprint {
    #[inline]
    pub const fn kind(&self) -> EventKind {
        self.kind
    }
}

/// A change applied to the topology view, delivered to listeners and subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TopologyChange {
    SwitchAdded(SwitchId),
    SwitchRemoved(SwitchId),
    PortAdded(SwitchPort),
    PortRemoved(SwitchPort),
    LinkAdded { src: SwitchPort, dst: SwitchPort },
    LinkRemoved { src: SwitchPort, dst: SwitchPort },
}
