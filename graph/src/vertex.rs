use std::hash::{Hash, Hasher};

use topology::{id, Cable, CableId, EventBlocking, NodeId, TriggerId};

id!(VertexId, u32);

// Index into the graph's snapshot cable table. Distinct from `CableId`
// because potential cables (not yet committed to the composition) live in
// the snapshot too.
id!(CableIx, u32);

/// One cable in the analysis snapshot: the structural facts, plus the
/// composition id if the cable is committed (`None` for potential cables
/// supplied for what-if validity checks).
#[derive(Debug, Clone)]
pub struct CableInfo {
    pub cable: Cable,
    pub id: Option<CableId>,
    /// Blocking of the destination input port, captured at build time so
    /// queries never need the composition back.
    pub to_blocking: EventBlocking,
}

/// Where a vertex's cable bundle originates: a trigger port, or the output
/// ports of a node.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum VertexSource {
    Trigger(TriggerId),
    Node(NodeId),
}

/// A vertex in the analysis graph: the bundle of all cables between one
/// source (trigger or node) and one destination node. All cables in the
/// bundle are triggered together, which is what makes the bundle the right
/// granularity for feedback and event-blocking rules.
///
/// Identity is by (source, destination) only; the cable contents don't
/// participate in equality.
#[derive(Debug, Clone)]
pub struct Vertex {
    pub source: VertexSource,
    pub to_node: NodeId,
    pub cables: Vec<CableIx>,
}

impl Vertex {
    pub fn new(source: VertexSource, to_node: NodeId) -> Self {
        Self {
            source,
            to_node,
            cables: Vec::with_capacity(1),
        }
    }

    /// Identity key: source and destination.
    #[inline]
    pub fn key(&self) -> (VertexSource, NodeId) {
        (self.source, self.to_node)
    }

    /// The source node, unless this vertex comes straight from a trigger.
    #[inline]
    pub fn from_node(&self) -> Option<NodeId> {
        match self.source {
            VertexSource::Node(n) => Some(n),
            VertexSource::Trigger(_) => None,
        }
    }

    /// The source trigger, for vertices straight out of a trigger port.
    #[inline]
    pub fn from_trigger(&self) -> Option<TriggerId> {
        match self.source {
            VertexSource::Trigger(t) => Some(t),
            VertexSource::Node(_) => None,
        }
    }
}

impl PartialEq for Vertex {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Vertex {}

impl Hash for Vertex {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}
