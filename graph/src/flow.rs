use std::sync::OnceLock;

use topology::{NodeId, TriggerId, TriggerKind};
use util::{HashMap, IdVec};

use crate::chains::Chain;
use crate::threads::ThreadBudget;
use crate::vertex::{Vertex, VertexId, VertexSource};

/// Everything the analysis knows about the subgraph downstream of one
/// trigger. Built once by the builder, then read-only; the chain and
/// thread-budget results are computed behind one-time-init barriers the
/// first time a query needs them, so concurrent readers are fine.
#[derive(Debug, Default)]
pub struct TriggerFlow {
    pub trigger: TriggerId,
    /// Node hosting the trigger port.
    pub host: NodeId,
    pub kind: TriggerKind,
    pub(crate) vertices: IdVec<VertexId, Vertex>,
    pub(crate) by_key: HashMap<(VertexSource, NodeId), VertexId>,
    /// Vertex ids in topological order.
    pub(crate) order: Vec<VertexId>,
    pub(crate) out_edges: IdVec<VertexId, Vec<VertexId>>,
    pub(crate) in_edges: IdVec<VertexId, Vec<VertexId>>,
    /// For each vertex, all vertices an event can flow to from it (sorted).
    pub(crate) downstream: IdVec<VertexId, Vec<VertexId>>,
    /// Vertices inside an infinite feedback loop (sorted).
    pub(crate) repeated: Vec<VertexId>,
    /// Minimum vertex-hops from the trigger (trigger-sourced vertices are 0).
    pub(crate) distance: IdVec<VertexId, u32>,
    /// Per vertex: certainly reached on every firing (some path with no
    /// door/wall gating on any hop). Computed on first use.
    pub(crate) certain: OnceLock<Vec<bool>>,
    pub(crate) chains: OnceLock<Vec<Chain>>,
    pub(crate) budget: OnceLock<ThreadBudget>,
}

impl TriggerFlow {
    pub(crate) fn new(trigger: TriggerId, host: NodeId, kind: TriggerKind) -> Self {
        Self {
            trigger,
            host,
            kind,
            ..Self::default()
        }
    }

    /// Get the vertex with the given id.
    #[inline]
    pub fn vertex(&self, id: VertexId) -> &Vertex {
        self.vertices.get(id)
    }

    #[inline]
    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// Vertex ids in topological order.
    #[inline]
    pub fn order(&self) -> &[VertexId] {
        &self.order
    }

    /// Look up a vertex by its identity key.
    pub fn vertex_for(&self, source: VertexSource, to_node: NodeId) -> Option<VertexId> {
        self.by_key.get(&(source, to_node)).copied()
    }

    /// Vertices immediately reachable from `id`.
    #[inline]
    pub fn outgoing(&self, id: VertexId) -> &[VertexId] {
        self.out_edges.get(id)
    }

    /// Vertices with an edge into `id`.
    #[inline]
    pub fn incoming(&self, id: VertexId) -> &[VertexId] {
        self.in_edges.get(id)
    }

    /// All vertices an event can flow to from `id` (memoized at build time).
    #[inline]
    pub fn downstream(&self, id: VertexId) -> &[VertexId] {
        self.downstream.get(id)
    }

    /// True if `id` sits inside an infinite feedback loop.
    pub fn is_repeated(&self, id: VertexId) -> bool {
        self.repeated.binary_search(&id).is_ok()
    }

    /// Vertices inside infinite feedback loops.
    #[inline]
    pub fn repeated(&self) -> &[VertexId] {
        &self.repeated
    }

    /// Minimum vertex-hops from the trigger to this vertex.
    #[inline]
    pub fn distance(&self, id: VertexId) -> u32 {
        *self.distance.get(id)
    }

    /// Count of vertices whose bundles leave `node`.
    pub fn num_vertices_from_node(&self, node: NodeId) -> usize {
        self.vertices
            .iter()
            .filter(|v| v.from_node() == Some(node))
            .count()
    }

    /// Count of vertices whose bundles land on `node`.
    pub fn num_vertices_to_node(&self, node: NodeId) -> usize {
        self.vertices.iter().filter(|v| v.to_node == node).count()
    }

    /// Count of vertices sourced directly at the trigger.
    pub fn num_trigger_vertices(&self) -> usize {
        self.vertices
            .iter()
            .filter(|v| v.from_trigger() == Some(self.trigger))
            .count()
    }

    /// Destination nodes in topological order, deduplicated.
    /// This is exactly the set of nodes downstream of the trigger.
    pub fn nodes_in_order(&self) -> Vec<NodeId> {
        let mut seen = util::HashSet::default();
        let mut nodes = Vec::with_capacity(self.order.len());
        for &v in &self.order {
            let node = self.vertices.get(v).to_node;
            if seen.insert(node) {
                nodes.push(node);
            }
        }
        nodes
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_fresh_flow_starts_empty() {
        let flow = TriggerFlow::new(
            TriggerId::from(0usize),
            NodeId::from(0usize),
            TriggerKind::Ordinary,
        );
        assert_eq!(flow.num_vertices(), 0);
        assert!(flow.order().is_empty());
        assert!(flow.repeated().is_empty());
        assert_eq!(flow.num_trigger_vertices(), 0);
    }
}
