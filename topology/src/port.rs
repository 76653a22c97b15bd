use crate::NodeId;

/// Per-input-port policy governing whether an event arriving on one cable is
/// enough to fire the node, or whether it is gated on sibling ports.
#[derive(Debug, Default, Clone, Copy, Hash, PartialEq, Eq)]
pub enum EventBlocking {
    /// The event always passes through, combinatorially with data.
    #[default]
    None,
    /// Conditional gate: the event may be blocked depending on sibling ports.
    Door,
    /// Blocks propagation unless this exact port receives an event.
    Wall,
}

/// What a trigger port does with new firings while a previous event
/// is still propagating.
#[derive(Debug, Default, Clone, Copy, Hash, PartialEq, Eq)]
pub enum EventThrottling {
    /// Never drop; serialize firings.
    #[default]
    Enqueue,
    /// Discard new firings until the previous one finishes.
    Drop,
}

/// Closed set of port kinds; the analysis switches exhaustively on this
/// instead of downcasting.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum PortKind {
    Input { blocking: EventBlocking },
    Output,
    /// An output-like port that spontaneously emits events.
    Trigger { throttling: EventThrottling },
}

/// A single port, owned by exactly one node.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct Port {
    /// Node this port belongs to.
    pub node: NodeId,
    pub name: String,
    pub kind: PortKind,
    /// False for event-only ports.
    pub carries_data: bool,
}

impl Port {
    /// True if this is an input port.
    #[inline]
    pub fn is_input(&self) -> bool {
        matches!(self.kind, PortKind::Input { .. })
    }

    /// True if this is a trigger port.
    #[inline]
    pub fn is_trigger(&self) -> bool {
        matches!(self.kind, PortKind::Trigger { .. })
    }

    /// Event-blocking behavior, for input ports only.
    #[inline]
    pub fn blocking(&self) -> Option<EventBlocking> {
        match self.kind {
            PortKind::Input { blocking } => Some(blocking),
            _ => None,
        }
    }
}
