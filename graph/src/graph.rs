use topology::{Cable, Composition, EventBlocking, NodeId, TriggerId, TriggerKind};
use util::{HashMap, HashSet, IdVec};

use crate::builder::GraphBuilder;
use crate::flow::TriggerFlow;
use crate::vertex::{CableInfo, CableIx, VertexId, VertexSource};

/// The analysis graph for one composition snapshot: a per-trigger event-flow
/// graph over cable-bundle vertices, plus the trigger-agnostic data-only
/// transmission graph. Immutable once built; all queries take `&self`.
pub struct Graph {
    cables: IdVec<CableIx, CableInfo>,
    /// One flow per trigger, in scheduling order.
    flows: Vec<TriggerFlow>,
    flow_ix: HashMap<TriggerId, usize>,
    /// Per node, the nodes downstream of it purely by data transmission.
    eventless: HashMap<NodeId, Vec<NodeId>>,
    /// Transmitters caught in a data-only cycle, in declaration order.
    eventless_cycle: Vec<NodeId>,
}

impl Graph {
    /// Analyze the composition as it stands.
    pub fn build(comp: &Composition) -> Self {
        GraphBuilder::new(comp, &[]).build()
    }

    /// Analyze the composition as if the given cables were already added,
    /// so the editor can check validity before committing an edit.
    pub fn build_with_potential_cables(comp: &Composition, potential: &[Cable]) -> Self {
        GraphBuilder::new(comp, potential).build()
    }

    pub(crate) fn new(
        cables: IdVec<CableIx, CableInfo>,
        flows: Vec<TriggerFlow>,
        eventless: HashMap<NodeId, Vec<NodeId>>,
        eventless_cycle: Vec<NodeId>,
    ) -> Self {
        let flow_ix = flows
            .iter()
            .enumerate()
            .map(|(ix, f)| (f.trigger, ix))
            .collect();
        Self {
            cables,
            flows,
            flow_ix,
            eventless,
            eventless_cycle,
        }
    }

    /// Triggers in scheduling order.
    pub fn triggers(&self) -> impl Iterator<Item = TriggerId> + '_ {
        self.flows.iter().map(|f| f.trigger)
    }

    /// Per-trigger flows, in scheduling order.
    pub fn flows(&self) -> &[TriggerFlow] {
        &self.flows
    }

    /// The flow for one trigger. Panics on a trigger id from a different
    /// composition snapshot, which is a caller bug.
    pub fn flow(&self, trigger: TriggerId) -> &TriggerFlow {
        let ix = self
            .flow_ix
            .get(&trigger)
            .expect("trigger does not belong to this graph");
        &self.flows[*ix]
    }

    #[inline]
    pub fn cable_info(&self, ix: CableIx) -> &CableInfo {
        self.cables.get(ix)
    }

    /// Node hosting the trigger port.
    pub fn trigger_host(&self, trigger: TriggerId) -> NodeId {
        self.flow(trigger).host
    }

    /// True for the per-port published triggers and the aggregate trigger.
    pub fn is_published_input_trigger(&self, trigger: TriggerId) -> bool {
        matches!(
            self.flow(trigger).kind,
            TriggerKind::PublishedInput | TriggerKind::PublishedInputAggregate
        )
    }

    pub fn is_manually_firable_trigger(&self, trigger: TriggerId) -> bool {
        self.flow(trigger).kind == TriggerKind::ManuallyFirable
    }

    /// At least one cable in the bundle lands on a non-wall input.
    pub(crate) fn bundle_passes_events(&self, bundle: &[CableIx]) -> bool {
        bundle
            .iter()
            .any(|&ix| self.cables.get(ix).to_blocking != EventBlocking::Wall)
    }

    /// At least one cable in the bundle lands on an unblocked input, so the
    /// event gets through on every firing rather than at the node's option.
    pub(crate) fn bundle_certainly_passes(&self, bundle: &[CableIx]) -> bool {
        bundle
            .iter()
            .any(|&ix| self.cables.get(ix).to_blocking == EventBlocking::None)
    }

    /// May an event from `trigger` ever travel through cables directly from
    /// `from` into `to`?
    pub fn may_transmit(&self, from: NodeId, to: NodeId, trigger: TriggerId) -> bool {
        self.flow(trigger)
            .vertex_for(VertexSource::Node(from), to)
            .is_some()
    }

    /// May an event from `trigger` ever reach `node`?
    pub fn may_reach(&self, trigger: TriggerId, node: NodeId) -> bool {
        let flow = self.flow(trigger);
        flow.order().iter().any(|&v| flow.vertex(v).to_node == node)
    }

    /// Does every firing of `trigger` reach `node`? Holds only when some
    /// path to the node has no door or wall gating on any hop.
    pub fn must_reach(&self, trigger: TriggerId, node: NodeId) -> bool {
        let flow = self.flow(trigger);
        let certain = flow.certain.get_or_init(|| self.compute_certain(flow));
        flow.order()
            .iter()
            .any(|&v| flow.vertex(v).to_node == node && certain[usize::from(v)])
    }

    /// Propagate certainty along the topological order: a vertex is certain
    /// when its own bundle has an unblocked input and some certain vertex
    /// (or the trigger itself) feeds it. Back edges are conservatively
    /// treated as uncertain.
    fn compute_certain(&self, flow: &TriggerFlow) -> Vec<bool> {
        let mut certain = vec![false; flow.num_vertices()];
        for &v in flow.order() {
            let vertex = flow.vertex(v);
            if !self.bundle_certainly_passes(&vertex.cables) {
                continue;
            }
            certain[usize::from(v)] = vertex.from_trigger().is_some()
                || flow.incoming(v).iter().any(|&u| certain[usize::from(u)]);
        }
        certain
    }

    /// Nodes one cable-hop below the trigger port, in topological order.
    pub fn nodes_immediately_downstream_of_trigger(&self, trigger: TriggerId) -> Vec<NodeId> {
        let flow = self.flow(trigger);
        flow.order()
            .iter()
            .map(|&v| flow.vertex(v))
            .filter(|v| v.from_trigger() == Some(trigger))
            .map(|v| v.to_node)
            .collect()
    }

    /// Nodes one cable-hop below `node` within the flow of `trigger`,
    /// in topological order.
    pub fn nodes_immediately_downstream(&self, node: NodeId, trigger: TriggerId) -> Vec<NodeId> {
        let flow = self.flow(trigger);
        flow.order()
            .iter()
            .map(|&v| flow.vertex(v))
            .filter(|v| v.from_node() == Some(node))
            .map(|v| v.to_node)
            .collect()
    }

    /// All nodes an event from `trigger` can reach, in topological order.
    pub fn nodes_downstream_of_trigger(&self, trigger: TriggerId) -> Vec<NodeId> {
        self.flow(trigger).nodes_in_order()
    }

    /// All nodes an event can reach from `node` within the flow of
    /// `trigger`, in topological order.
    pub fn nodes_downstream(&self, node: NodeId, trigger: TriggerId) -> Vec<NodeId> {
        let flow = self.flow(trigger);
        let mut members: HashSet<VertexId> = HashSet::default();
        for (v_id, vertex) in flow.order().iter().map(|&v| (v, flow.vertex(v))) {
            if vertex.from_node() == Some(node) {
                members.insert(v_id);
                members.extend(flow.downstream(v_id).iter().copied());
            }
        }
        let mut seen: HashSet<NodeId> = HashSet::default();
        let mut nodes = Vec::with_capacity(members.len());
        for &v in flow.order() {
            if members.contains(&v) {
                let to_node = flow.vertex(v).to_node;
                if seen.insert(to_node) {
                    nodes.push(to_node);
                }
            }
        }
        nodes
    }

    /// Nodes downstream of `node` purely by data transmission, in
    /// topological order. Empty unless the node transmits eventlessly or
    /// sits in the data subgraph below one that does.
    pub fn nodes_downstream_eventlessly(&self, node: NodeId) -> &[NodeId] {
        self.eventless
            .get(&node)
            .map(|nodes| nodes.as_slice())
            .unwrap_or(&[])
    }

    /// Eventless transmitters whose data feeds back on itself, so their
    /// outputs have no consistent refresh order. Empty for a well-formed
    /// composition.
    pub fn eventless_cycle(&self) -> &[NodeId] {
        &self.eventless_cycle
    }

    /// The trigger whose port is fewest vertex-hops upstream of `node`.
    /// Ties go to the earlier trigger in scheduling order.
    pub fn nearest_upstream_trigger(&self, node: NodeId) -> Option<TriggerId> {
        let mut best: Option<(u32, TriggerId)> = None;
        for flow in &self.flows {
            let nearest = flow
                .order()
                .iter()
                .filter(|&&v| flow.vertex(v).to_node == node)
                .map(|&v| flow.distance(v))
                .min();
            if let Some(d) = nearest {
                if best.map_or(true, |(bd, _)| d < bd) {
                    best = Some((d, flow.trigger));
                }
            }
        }
        best.map(|(_, trigger)| trigger)
    }

    /// True if `node` sits inside a feedback loop fed by `trigger`, i.e.
    /// the node is downstream of itself.
    pub fn is_repeated_in_feedback_loop(&self, node: NodeId, trigger: TriggerId) -> bool {
        let flow = self.flow(trigger);
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

    /// True if any node downstream of `trigger` receives bundles from more
    /// than one source, so events can rejoin after splitting.
    pub fn has_gather_downstream(&self, trigger: TriggerId) -> bool {
        let flow = self.flow(trigger);
        let mut landings: HashMap<NodeId, usize> = HashMap::default();
        for &v in flow.order() {
            let count = landings.entry(flow.vertex(v).to_node).or_default();
            *count += 1;
            if *count >= 2 {
                return true;
            }
        }
        false
    }

    /// True if the trigger port or any node downstream of it sends bundles
    /// to more than one destination, so one event can split.
    pub fn has_scatter_downstream(&self, trigger: TriggerId) -> bool {
        let flow = self.flow(trigger);
        if flow.num_trigger_vertices() >= 2 {
            return true;
        }
        let mut launches: HashMap<NodeId, usize> = HashMap::default();
        for &v in flow.order() {
            if let Some(from) = flow.vertex(v).from_node() {
                let count = launches.entry(from).or_default();
                *count += 1;
                if *count >= 2 {
                    return true;
                }
            }
        }
        false
    }

    /// Minimum vertex-hops from the trigger port to `node`, if reachable.
    pub fn node_distance(&self, trigger: TriggerId, node: NodeId) -> Option<u32> {
        let flow = self.flow(trigger);
        flow.order()
            .iter()
            .filter(|&&v| flow.vertex(v).to_node == node)
            .map(|&v| flow.distance(v))
            .min()
    }
}

#[cfg(test)]
mod test {
    use topology::{Cable, Composition, EventBlocking};

    use crate::testutil::{node, trigger_node};
    use crate::Graph;

    #[test]
    fn test_may_transmit_is_directional() {
        let mut comp = Composition::default();
        let (t, t_port, trigger) = trigger_node(&mut comp, "fire");
        let (a, a_in, a_out) = node(&mut comp, "a");
        let (b, b_in, _) = node(&mut comp, "b");
        comp.add_cable(t, t_port, a, a_in);
        comp.add_cable(a, a_out, b, b_in);

        let graph = Graph::build(&comp);
        assert!(graph.may_transmit(a, b, trigger));
        assert!(!graph.may_transmit(b, a, trigger));
        assert!(graph.may_reach(trigger, b));
    }

    #[test]
    fn test_gated_inputs_reach_but_not_certainly() {
        let mut comp = Composition::default();
        let (t, t_port, trigger) = trigger_node(&mut comp, "fire");
        let a = comp.add_node("a");
        let a_wall = comp.add_input_port(a, "gate", EventBlocking::Wall, true);
        let a_door = comp.add_input_port(a, "maybe", EventBlocking::Door, true);
        let a_out = comp.add_output_port(a, "out", true);
        let (d, d_in, _) = node(&mut comp, "d");
        comp.add_cable(t, t_port, a, a_wall);
        comp.add_cable(t, t_port, a, a_door);
        comp.add_cable(a, a_out, d, d_in);

        let graph = Graph::build(&comp);
        assert!(graph.may_reach(trigger, a));
        assert!(graph.may_reach(trigger, d));
        // the door may swallow the event, so neither node is guaranteed
        assert!(!graph.must_reach(trigger, a));
        assert!(!graph.must_reach(trigger, d));
    }

    #[test]
    fn test_unblocked_path_is_certain() {
        let mut comp = Composition::default();
        let (t, t_port, trigger) = trigger_node(&mut comp, "fire");
        let (a, a_in, a_out) = node(&mut comp, "a");
        let (b, b_in, _) = node(&mut comp, "b");
        comp.add_cable(t, t_port, a, a_in);
        comp.add_cable(a, a_out, b, b_in);

        let graph = Graph::build(&comp);
        assert!(graph.must_reach(trigger, a));
        assert!(graph.must_reach(trigger, b));
    }

    #[test]
    fn test_immediate_downstream_stops_at_one_hop() {
        let mut comp = Composition::default();
        let (t, t_port, trigger) = trigger_node(&mut comp, "fire");
        let (a, a_in, a_out) = node(&mut comp, "a");
        let (b, b_in, _) = node(&mut comp, "b");
        comp.add_cable(t, t_port, a, a_in);
        comp.add_cable(a, a_out, b, b_in);

        let graph = Graph::build(&comp);
        assert_eq!(graph.nodes_immediately_downstream_of_trigger(trigger), vec![a]);
        assert_eq!(graph.nodes_immediately_downstream(a, trigger), vec![b]);
        assert_eq!(graph.nodes_downstream(a, trigger), vec![b]);
    }

    #[test]
    fn test_nearest_upstream_trigger_prefers_fewer_hops() {
        let mut comp = Composition::default();
        let (t1, t1_port, trigger1) = trigger_node(&mut comp, "far");
        let (t2, t2_port, trigger2) = trigger_node(&mut comp, "near");
        let (a, a_in, a_out) = node(&mut comp, "a");
        let (b, b_in, _) = node(&mut comp, "b");
        let b_in2 = comp.add_input_port(b, "in2", EventBlocking::None, true);
        comp.add_cable(t1, t1_port, a, a_in);
        comp.add_cable(a, a_out, b, b_in);
        comp.add_cable(t2, t2_port, b, b_in2);

        let graph = Graph::build(&comp);
        assert_eq!(graph.nearest_upstream_trigger(b), Some(trigger2));
        assert_eq!(graph.nearest_upstream_trigger(a), Some(trigger1));
    }

    #[test]
    fn test_scatter_and_gather_flags() {
        let mut comp = Composition::default();
        let (t, t_port, trigger) = trigger_node(&mut comp, "fire");
        let (a, a_in, a_out) = node(&mut comp, "a");
        let (b, b_in, b_out) = node(&mut comp, "b");
        let (c, c_in, _) = node(&mut comp, "c");
        let c_in2 = comp.add_input_port(c, "in2", EventBlocking::None, true);
        comp.add_cable(t, t_port, a, a_in);
        comp.add_cable(t, t_port, b, b_in);
        comp.add_cable(a, a_out, c, c_in);
        comp.add_cable(b, b_out, c, c_in2);

        let graph = Graph::build(&comp);
        assert!(graph.has_scatter_downstream(trigger));
        assert!(graph.has_gather_downstream(trigger));
    }

    #[test]
    fn test_straight_line_has_no_scatter_or_gather() {
        let mut comp = Composition::default();
        let (t, t_port, trigger) = trigger_node(&mut comp, "fire");
        let (a, a_in, a_out) = node(&mut comp, "a");
        let (b, b_in, _) = node(&mut comp, "b");
        comp.add_cable(t, t_port, a, a_in);
        comp.add_cable(a, a_out, b, b_in);

        let graph = Graph::build(&comp);
        assert!(!graph.has_scatter_downstream(trigger));
        assert!(!graph.has_gather_downstream(trigger));
    }

    #[test]
    fn test_potential_cable_extends_reach_without_committing() {
        let mut comp = Composition::default();
        let (t, t_port, trigger) = trigger_node(&mut comp, "fire");
        let (a, a_in, a_out) = node(&mut comp, "a");
        let (b, b_in, _) = node(&mut comp, "b");
        comp.add_cable(t, t_port, a, a_in);

        let committed = Graph::build(&comp);
        assert!(!committed.may_reach(trigger, b));

        let potential = [Cable::new(a, a_out, b, b_in)];
        let what_if = Graph::build_with_potential_cables(&comp, &potential);
        assert!(what_if.may_reach(trigger, b));
        let flow = what_if.flow(trigger);
        let ab = flow
            .vertex_for(crate::VertexSource::Node(a), b)
            .unwrap();
        // the extra cable has no composition id
        let ix = flow.vertex(ab).cables[0];
        assert!(what_if.cable_info(ix).id.is_none());
    }

    #[test]
    fn test_analysis_is_deterministic() {
        let mut comp = Composition::default();
        let (t, t_port, trigger) = trigger_node(&mut comp, "fire");
        let (a, a_in, a_out) = node(&mut comp, "a");
        let (b, b_in, b_out) = node(&mut comp, "b");
        let (c, c_in, _) = node(&mut comp, "c");
        let c_in2 = comp.add_input_port(c, "in2", EventBlocking::None, true);
        comp.add_cable(t, t_port, a, a_in);
        comp.add_cable(t, t_port, b, b_in);
        comp.add_cable(a, a_out, c, c_in);
        comp.add_cable(b, b_out, c, c_in2);

        let first = Graph::build(&comp);
        let second = Graph::build(&comp);
        assert_eq!(
            first.nodes_downstream_of_trigger(trigger),
            second.nodes_downstream_of_trigger(trigger)
        );
        assert_eq!(first.chains(trigger), second.chains(trigger));
    }
}
