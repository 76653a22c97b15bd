use std::collections::VecDeque;

use colored::Colorize;

use topology::{Cable, Composition, EventBlocking, NodeId, PortId, TriggerId, TriggerKind};
use util::{HashMap, HashSet, IdVec};

use crate::flow::TriggerFlow;
use crate::graph::Graph;
use crate::vertex::{CableInfo, CableIx, Vertex, VertexId, VertexSource};

/// Builds a `Graph` from a snapshot of a composition, optionally including
/// potential cables that are not yet committed (for what-if validity
/// checks before the editor finalizes an edit).
///
/// The build runs to completion before any reader sees the graph; after
/// that the graph is read-only.
pub struct GraphBuilder<'a> {
    comp: &'a Composition,
    /// snapshot cable table: committed cables first, then potential ones
    cables: IdVec<CableIx, CableInfo>,
    /// candidate vertices (merged cable bundles), all triggers pooled.
    /// Ordered by first cable declaration, which keeps the later
    /// topological sort deterministic.
    candidates: Vec<Vertex>,
    /// per candidate: bundle lands on at least one non-wall input
    passes: Vec<bool>,
}

impl<'a> GraphBuilder<'a> {
    /// Create a new builder over the given composition snapshot.
    pub fn new(comp: &'a Composition, potential: &'a [Cable]) -> Self {
        let num_cables = comp.cables().count() + potential.len();
        let mut cables = IdVec::with_capacity(num_cables);
        for (id, cable) in comp.cables() {
            cables.push(CableInfo {
                cable: cable.clone(),
                id: Some(id),
                to_blocking: input_blocking(comp, cable.to_port),
            });
        }
        for cable in potential {
            cables.push(CableInfo {
                cable: cable.clone(),
                id: None,
                to_blocking: input_blocking(comp, cable.to_port),
            });
        }
        Self {
            comp,
            cables,
            candidates: Vec::with_capacity(num_cables),
            passes: Vec::with_capacity(num_cables),
        }
    }

    /// Consume this builder and return the completed graph.
    pub fn build(mut self) -> Graph {
        let trigger_order = self.trigger_order();
        self.make_candidates();

        let mut flows = Vec::with_capacity(trigger_order.len());
        for &trigger in &trigger_order {
            flows.push(self.build_flow(trigger));
        }
        let (eventless, eventless_cycle) = self.make_eventless();

        Graph::new(self.cables, flows, eventless, eventless_cycle)
    }

    /// Triggers in scheduling order: node triggers and per-port published
    /// triggers in declaration order, then the aggregate published trigger,
    /// then the manually-firable trigger.
    fn trigger_order(&self) -> Vec<TriggerId> {
        let mut order = Vec::with_capacity(self.comp.triggers().count());
        let mut tail = Vec::with_capacity(2);
        for (id, trigger) in self.comp.triggers() {
            match trigger.kind {
                TriggerKind::Ordinary | TriggerKind::PublishedInput => order.push(id),
                TriggerKind::PublishedInputAggregate | TriggerKind::ManuallyFirable => {
                    tail.push((trigger.kind, id))
                }
            }
        }
        tail.sort_by_key(|&(kind, _)| matches!(kind, TriggerKind::ManuallyFirable));
        order.extend(tail.into_iter().map(|(_, id)| id));
        order
    }

    /// Merge cables sharing a (source, destination) pair into candidate
    /// vertices, and give the aggregate published trigger its own copies of
    /// every per-port published vertex (re-sourced, not duplicated cables).
    fn make_candidates(&mut self) {
        let mut trigger_for_port: HashMap<PortId, TriggerId> = HashMap::default();
        for (id, trigger) in self.comp.triggers() {
            trigger_for_port.insert(trigger.port, id);
        }

        let mut by_key: HashMap<(VertexSource, NodeId), usize> = HashMap::default();
        for (ix, info) in self.cables.iter_with_ids() {
            let cable = &info.cable;
            let source = match trigger_for_port.get(&cable.from_port) {
                Some(&trigger) => VertexSource::Trigger(trigger),
                None => VertexSource::Node(cable.from_node),
            };
            let slot = *by_key.entry((source, cable.to_node)).or_insert_with(|| {
                self.candidates.push(Vertex::new(source, cable.to_node));
                self.candidates.len() - 1
            });
            self.candidates[slot].cables.push(ix);
        }

        if let Some(aggregate) = self.comp.aggregate_trigger() {
            let source = VertexSource::Trigger(aggregate);
            let published: Vec<(NodeId, Vec<CableIx>)> = self
                .candidates
                .iter()
                .filter(|c| {
                    c.from_trigger().is_some_and(|t| {
                        self.comp.trigger(t).kind == TriggerKind::PublishedInput
                    })
                })
                .map(|c| (c.to_node, c.cables.clone()))
                .collect();
            for (to_node, bundle) in published {
                let slot = *by_key.entry((source, to_node)).or_insert_with(|| {
                    self.candidates.push(Vertex::new(source, to_node));
                    self.candidates.len() - 1
                });
                self.candidates[slot].cables.extend(bundle);
            }
        }

        self.passes = self
            .candidates
            .iter()
            .map(|c| self.bundle_passes(&c.cables))
            .collect();
    }

    /// True if an event arriving through this bundle may transmit onward:
    /// at least one cable lands on a non-wall input port.
    fn bundle_passes(&self, bundle: &[CableIx]) -> bool {
        bundle
            .iter()
            .any(|&ix| self.cables.get(ix).to_blocking != EventBlocking::Wall)
    }

    /// Build the flow for one trigger: worklist traversal over candidate
    /// vertices, following each edge exactly once. The bounded revisit is
    /// what keeps loop traversal finite; re-encounters are left for the
    /// downstream-set pass to classify.
    fn build_flow(&self, trigger: TriggerId) -> TriggerFlow {
        let info = self.comp.trigger(trigger);
        let mut flow = TriggerFlow::new(trigger, info.node, info.kind);

        let mut queue: VecDeque<usize> = self
            .candidates
            .iter()
            .enumerate()
            .filter(|(_, c)| c.from_trigger() == Some(trigger))
            .map(|(ix, _)| ix)
            .collect();

        let mut added: HashMap<usize, VertexId> = HashMap::default();
        let mut edges_visited: HashSet<(usize, usize)> = HashSet::default();
        let mut edges: Vec<(usize, usize)> = Vec::with_capacity(self.candidates.len());

        while let Some(ci) = queue.pop_front() {
            if !added.contains_key(&ci) {
                let vertex = self.candidates[ci].clone();
                log::trace!(
                    "trigger {:?}: visiting vertex into {}",
                    trigger,
                    self.comp.node(vertex.to_node).name.cyan(),
                );
                let id = flow.vertices.push(vertex);
                added.insert(ci, id);
            }
            if !self.passes[ci] {
                continue;
            }
            let to_node = self.candidates[ci].to_node;
            for (cj, cand) in self.candidates.iter().enumerate() {
                if cand.source == VertexSource::Node(to_node) && edges_visited.insert((ci, cj)) {
                    edges.push((ci, cj));
                    queue.push_back(cj);
                }
            }
        }

        let num = flow.vertices.len();
        flow.by_key = flow
            .vertices
            .iter_with_ids()
            .map(|(id, v)| (v.key(), id))
            .collect();
        flow.out_edges = IdVec::fill(Vec::new(), num);
        flow.in_edges = IdVec::fill(Vec::new(), num);
        for (ci, cj) in edges {
            let from = added[&ci];
            let to = added[&cj];
            flow.out_edges.get_mut(from).push(to);
            flow.in_edges.get_mut(to).push(from);
        }

        self.make_downstream(&mut flow);
        self.sort_vertices(&mut flow);
        self.make_distances(&mut flow);

        log::debug!(
            "trigger {:?}: {} vertices, {} repeated",
            trigger,
            flow.vertices.len(),
            flow.repeated.len(),
        );
        flow
    }

    /// Compute each vertex's downstream set, flagging vertices that are
    /// re-encountered while still on the completion stack: those are inside
    /// an infinite feedback loop. A vertex's set is complete once all of
    /// its outgoing vertices' sets are.
    fn make_downstream(&self, flow: &mut TriggerFlow) {
        let num = flow.vertices.len();
        let mut complete: Vec<Option<Vec<VertexId>>> = vec![None; num];
        let mut repeated: HashSet<VertexId> = HashSet::default();

        let mut stack: Vec<VertexId> = flow
            .vertices
            .iter_with_ids()
            .filter(|(_, v)| v.from_trigger() == Some(flow.trigger))
            .map(|(id, _)| id)
            .collect();

        while let Some(&current) = stack.last() {
            if complete[usize::from(current)].is_some() {
                stack.pop();
                continue;
            }

            let mut down: HashSet<VertexId> = HashSet::default();
            let mut all_complete = true;
            for &out in flow.out_edges.get(current) {
                down.insert(out);
                if let Some(further) = &complete[usize::from(out)] {
                    // already visited; fold its downstream set into ours
                    down.extend(further.iter().copied());
                } else if stack.contains(&out) {
                    // still on the stack: an infinite feedback loop
                    repeated.insert(out);
                } else {
                    stack.push(out);
                    all_complete = false;
                }
            }

            if all_complete {
                let mut sorted: Vec<VertexId> = down.into_iter().collect();
                sorted.sort_unstable();
                complete[usize::from(current)] = Some(sorted);
                stack.pop();
            }
        }

        flow.downstream = IdVec::with_capacity(num);
        for set in complete {
            flow.downstream
                .push(set.expect("downstream set never completed"));
        }

        // keep only vertices genuinely inside a loop body, not other
        // outgoing vertices from nodes in the loop:
        let mut kept: Vec<VertexId> = repeated
            .into_iter()
            .filter(|&v| flow.downstream.get(v).binary_search(&v).is_ok())
            .collect();
        kept.sort_unstable();
        flow.repeated = kept;
    }

    /// Topologically order the vertices: descending count of vertices that
    /// can't be reached until after this one, accounting for gathers (a
    /// vertex that joins a gather drags the gather's dependents with it).
    fn sort_vertices(&self, flow: &mut TriggerFlow) {
        let num = flow.vertices.len();
        let mut dependent: Vec<HashSet<VertexId>> = Vec::with_capacity(num);
        for id in flow.vertices.keys() {
            dependent.push(flow.downstream.get(id).iter().copied().collect());
        }

        for v_id in flow.vertices.keys() {
            let to_node = flow.vertices.get(v_id).to_node;
            if !self.node_passes_events(flow, to_node) {
                continue;
            }
            // skip vertices that feed back into their own source
            let downstream_nodes = self.nodes_downstream_of(flow, to_node);
            if let Some(from) = flow.vertices.get(v_id).from_node() {
                if downstream_nodes.contains(&from) {
                    continue;
                }
            }

            let mut deps: HashSet<VertexId> = HashSet::default();
            for o_id in flow.vertices.keys() {
                if flow.vertices.get(o_id).from_node() == Some(to_node) {
                    deps.insert(o_id);
                    deps.extend(dependent[usize::from(o_id)].iter().copied());
                }
            }
            for o_id in flow.vertices.keys() {
                if o_id == v_id || dependent[usize::from(o_id)].contains(&v_id) {
                    dependent[usize::from(o_id)].extend(deps.iter().copied());
                }
            }
        }

        let mut order: Vec<VertexId> = flow.vertices.keys().collect();
        // ties broken by first-visit order, which follows cable declaration
        order.sort_by(|a, b| {
            dependent[usize::from(*b)]
                .len()
                .cmp(&dependent[usize::from(*a)].len())
                .then(a.cmp(b))
        });
        flow.order = order;
    }

    /// True if an event coming into `node` from this trigger may transmit
    /// to any of the node's outgoing cables.
    fn node_passes_events(&self, flow: &TriggerFlow, node: NodeId) -> bool {
        flow.vertices
            .iter()
            .filter(|v| v.to_node == node)
            .any(|v| self.bundle_passes(&v.cables))
    }

    /// Nodes reachable from `node` within this flow.
    fn nodes_downstream_of(&self, flow: &TriggerFlow, node: NodeId) -> HashSet<NodeId> {
        let mut nodes = HashSet::default();
        for (v_id, vertex) in flow.vertices.iter_with_ids() {
            if vertex.from_node() == Some(node) {
                nodes.insert(vertex.to_node);
                for &down in flow.downstream.get(v_id) {
                    nodes.insert(flow.vertices.get(down).to_node);
                }
            }
        }
        nodes
    }

    /// Minimum vertex-hops from the trigger, breadth-first.
    fn make_distances(&self, flow: &mut TriggerFlow) {
        let num = flow.vertices.len();
        let mut distance: Vec<u32> = vec![u32::MAX; num];
        let mut queue: VecDeque<VertexId> = VecDeque::with_capacity(num);
        for (id, vertex) in flow.vertices.iter_with_ids() {
            if vertex.from_trigger() == Some(flow.trigger) {
                distance[usize::from(id)] = 0;
                queue.push_back(id);
            }
        }
        while let Some(current) = queue.pop_front() {
            let next = distance[usize::from(current)] + 1;
            for &out in flow.out_edges.get(current) {
                if next < distance[usize::from(out)] {
                    distance[usize::from(out)] = next;
                    queue.push_back(out);
                }
            }
        }
        flow.distance = IdVec::with_capacity(num);
        for d in distance {
            flow.distance.push(d);
        }
    }

    /// Build the trigger-agnostic data-only transmission graph: nodes whose
    /// outputs carry fresh data with no event, their data cables, and the
    /// nodes downstream of each purely by data, in topological order. Also
    /// returns the transmitters caught in a data cycle, for validation.
    fn make_eventless(&self) -> (HashMap<NodeId, Vec<NodeId>>, Vec<NodeId>) {
        let transmitters: Vec<NodeId> = self
            .comp
            .nodes()
            .filter(|(_, n)| n.transmits_eventlessly)
            .map(|(id, _)| id)
            .collect();
        let mut result: HashMap<NodeId, Vec<NodeId>> = HashMap::default();
        if transmitters.is_empty() {
            return (result, Vec::new());
        }
        let transmitter_set: HashSet<NodeId> = transmitters.iter().copied().collect();

        // data edges out of transmitters (committed cables only)
        let mut outgoing: HashMap<NodeId, Vec<NodeId>> = HashMap::default();
        let mut incoming_count: HashMap<NodeId, usize> = HashMap::default();
        let mut members: Vec<NodeId> = transmitters.clone();
        for (_, cable) in self.comp.cables() {
            if self.comp.port(cable.from_port).is_trigger()
                || !self.comp.cable_carries_data(cable)
                || !transmitter_set.contains(&cable.from_node)
            {
                continue;
            }
            let outs = outgoing.entry(cable.from_node).or_default();
            if !outs.contains(&cable.to_node) {
                outs.push(cable.to_node);
                *incoming_count.entry(cable.to_node).or_default() += 1;
                if !members.contains(&cable.to_node) {
                    members.push(cable.to_node);
                }
            }
        }

        // topological order over the data subgraph
        let mut queue: VecDeque<NodeId> = members
            .iter()
            .copied()
            .filter(|n| incoming_count.get(n).copied().unwrap_or(0) == 0)
            .collect();
        let mut sorted: Vec<NodeId> = Vec::with_capacity(members.len());
        while let Some(node) = queue.pop_front() {
            sorted.push(node);
            if let Some(outs) = outgoing.get(&node) {
                for &out in outs {
                    let count = incoming_count.get_mut(&out).expect("missing incoming count");
                    *count -= 1;
                    if *count == 0 {
                        queue.push_back(out);
                    }
                }
            }
        }
        // leftovers mean a data cycle among the transmitters; append them
        // so the query surface stays total, and remember the transmitters
        // involved so validation can warn about them
        let mut cycle: Vec<NodeId> = Vec::new();
        for &m in &members {
            if !sorted.contains(&m) {
                if transmitter_set.contains(&m) {
                    cycle.push(m);
                }
                sorted.push(m);
            }
        }

        // downstream lists, back to front so each list can reuse the next
        for i in (0..sorted.len()).rev() {
            let node = sorted[i];
            let mut list: Vec<NodeId> = Vec::new();
            for &maybe_down in &sorted[i + 1..] {
                if outgoing.get(&node).is_some_and(|outs| outs.contains(&maybe_down)) {
                    if !list.contains(&maybe_down) {
                        list.push(maybe_down);
                    }
                    for further in result.get(&maybe_down).into_iter().flatten() {
                        if !list.contains(further) {
                            list.push(*further);
                        }
                    }
                }
            }
            result.insert(node, list);
        }
        (result, cycle)
    }
}

fn input_blocking(comp: &Composition, port: PortId) -> EventBlocking {
    comp.port(port)
        .blocking()
        .expect("cable destination is not an input port")
}
