use crate::{NodeId, PortId};

/// A directed link from an output (or trigger) port to an input port.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct Cable {
    pub from_node: NodeId,
    pub from_port: PortId,
    pub to_node: NodeId,
    pub to_port: PortId,
    /// Event-only regardless of endpoint data capability.
    pub always_event_only: bool,
    /// Not rendered by the editor; irrelevant to analysis.
    pub hidden: bool,
    /// True for pseudo-cables contributed by the published pseudo-nodes.
    pub published: bool,
}

impl Cable {
    /// Create a new cable between the given ports.
    pub fn new(from_node: NodeId, from_port: PortId, to_node: NodeId, to_port: PortId) -> Self {
        Self {
            from_node,
            from_port,
            to_node,
            to_port,
            always_event_only: false,
            hidden: false,
            published: false,
        }
    }
}
