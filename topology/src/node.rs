use crate::PortId;

/// Distinguishes ordinary nodes from the synthetic pseudo-nodes the
/// analysis folds into the graph.
#[derive(Debug, Default, Clone, Copy, Hash, PartialEq, Eq)]
pub enum NodeKind {
    #[default]
    Ordinary,
    /// Stands in for the composition's externally visible input ports.
    PublishedInput,
    /// Stands in for the composition's externally visible output ports.
    PublishedOutput,
    /// Hosts the debug/test-harness trigger.
    ManualFire,
}

/// A processing unit instance in the composition.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct Node {
    pub name: String,
    pub kind: NodeKind,
    /// Input ports, in declaration order.
    pub inputs: Vec<PortId>,
    /// Output ports (including trigger ports), in declaration order.
    pub outputs: Vec<PortId>,
    /// True for stateless passthrough nodes whose outputs carry fresh data
    /// on every upstream data change, even with no event.
    pub transmits_eventlessly: bool,
}

impl Node {
    /// Create a new ordinary node with no ports yet.
    pub fn new(name: &str, kind: NodeKind) -> Self {
        Self {
            name: name.to_owned(),
            kind,
            inputs: Vec::with_capacity(4),
            outputs: Vec::with_capacity(4),
            transmits_eventlessly: false,
        }
    }
}
