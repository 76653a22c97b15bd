use topology::{NodeId, TriggerId};
use util::HashSet;

use crate::flow::TriggerFlow;
use crate::graph::Graph;

/// A linear run of nodes that execute in sequence for one trigger: each
/// node (after the first) is the only destination of the previous node's
/// bundles, and has no other bundles landing on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chain {
    /// Nodes in execution order.
    pub nodes: Vec<NodeId>,
    /// True for the single-node chain of a loop's repeated node, which the
    /// scheduler re-runs until the loop stops producing events.
    pub last_node_in_loop: bool,
}

impl Chain {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn last_node(&self) -> NodeId {
        *self.nodes.last().expect("chain has no nodes")
    }
}

impl Graph {
    /// The chains downstream of `trigger`, in topological order of their
    /// first nodes. Computed on first use, then cached.
    pub fn chains(&self, trigger: TriggerId) -> &[Chain] {
        let flow = self.flow(trigger);
        flow.chains.get_or_init(|| make_chains(flow))
    }
}

fn make_chains(flow: &TriggerFlow) -> Vec<Chain> {
    let mut chains: Vec<Chain> = Vec::new();
    let mut added: HashSet<NodeId> = HashSet::default();

    for &v_id in flow.order() {
        let vertex = flow.vertex(v_id);
        // a gather: the node already belongs to some chain
        if !added.insert(vertex.to_node) {
            continue;
        }

        let mut extended = false;
        if let Some(from) = vertex.from_node() {
            // extend only through single-out, single-in links
            if flow.num_vertices_from_node(from) == 1
                && flow.num_vertices_to_node(vertex.to_node) == 1
            {
                for chain in chains.iter_mut() {
                    if !chain.last_node_in_loop && chain.last_node() == from {
                        chain.nodes.push(vertex.to_node);
                        extended = true;
                        break;
                    }
                }
            }
        }
        if !extended {
            chains.push(Chain {
                nodes: vec![vertex.to_node],
                last_node_in_loop: false,
            });
        }
    }

    // each feedback loop's repeated node gets a chain of its own, re-run
    // until the loop stops producing events
    let mut seen: HashSet<NodeId> = HashSet::default();
    for &v_id in flow.order() {
        let node = flow.vertex(v_id).to_node;
        if !seen.insert(node) || !node_repeats(flow, node) {
            continue;
        }
        match chains
            .iter_mut()
            .find(|c| c.nodes.len() == 1 && c.nodes[0] == node)
        {
            // the node already stands alone; tag it rather than duplicate it
            Some(chain) => chain.last_node_in_loop = true,
            None => chains.push(Chain {
                nodes: vec![node],
                last_node_in_loop: true,
            }),
        }
    }

    chains
}

/// True if `node` is downstream of itself in this flow.
fn node_repeats(flow: &TriggerFlow, node: NodeId) -> bool {
    flow.order().iter().any(|&v| {
        let vertex = flow.vertex(v);
        vertex.from_node() == Some(node)
            && (vertex.to_node == node
                || flow
                    .downstream(v)
                    .iter()
                    .any(|&w| flow.vertex(w).to_node == node))
    })
}
