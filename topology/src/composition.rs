use std::hash::{BuildHasher, Hash, Hasher as _};

use util::IdVec;

use crate::{
    Cable, CableId, Error, EventBlocking, EventThrottling, Node, NodeId, NodeKind, Port, PortId,
    PortKind, Trigger, TriggerId, TriggerKind,
};

pub const PUBLISHED_INPUT_NODE_NAME: &str = "PublishedInputs";
pub const PUBLISHED_OUTPUT_NODE_NAME: &str = "PublishedOutputs";
pub const MANUAL_FIRE_NODE_NAME: &str = "ManualFire";
// name of the synthetic trigger that fires all published inputs at once:
pub const AGGREGATE_TRIGGER_NAME: &str = "allInputs";

/// Contains all the structural facts about a composition, in a form the
/// analysis can snapshot. Populated by the (external) parser or editor;
/// getters panic on dangling ids, since input validity is the caller's
/// responsibility.
#[derive(Debug)]
pub struct Composition {
    nodes: IdVec<NodeId, Node>,
    ports: IdVec<PortId, Port>,
    cables: IdVec<CableId, Cable>,
    triggers: IdVec<TriggerId, Trigger>,
    published_input_node: Option<NodeId>,
    published_output_node: Option<NodeId>,
    aggregate_trigger: Option<TriggerId>,
    manual_fire_node: Option<NodeId>,
    manual_trigger: Option<TriggerId>,
}

impl Default for Composition {
    fn default() -> Self {
        Self {
            nodes: IdVec::with_capacity(16),
            ports: IdVec::with_capacity(64),
            cables: IdVec::with_capacity(32),
            triggers: IdVec::with_capacity(8),
            published_input_node: None,
            published_output_node: None,
            aggregate_trigger: None,
            manual_fire_node: None,
            manual_trigger: None,
        }
    }
}

// building the composition /////////////
impl Composition {
    /// Add an ordinary node with the given name.
    pub fn add_node(&mut self, name: &str) -> NodeId {
        self.nodes.push(Node::new(name, NodeKind::Ordinary))
    }

    /// Mark a node as able to transmit data through its output cables
    /// without an event.
    pub fn mark_transmits_eventlessly(&mut self, node: NodeId) {
        self.nodes.get_mut(node).transmits_eventlessly = true;
    }

    /// Add an input port to `node`.
    pub fn add_input_port(
        &mut self,
        node: NodeId,
        name: &str,
        blocking: EventBlocking,
        carries_data: bool,
    ) -> PortId {
        let port = self.ports.push(Port {
            node,
            name: name.to_owned(),
            kind: PortKind::Input { blocking },
            carries_data,
        });
        self.nodes.get_mut(node).inputs.push(port);
        port
    }

    /// Add a plain output port to `node`.
    pub fn add_output_port(&mut self, node: NodeId, name: &str, carries_data: bool) -> PortId {
        let port = self.ports.push(Port {
            node,
            name: name.to_owned(),
            kind: PortKind::Output,
            carries_data,
        });
        self.nodes.get_mut(node).outputs.push(port);
        port
    }

    /// Add a trigger port to `node` and register it with the composition.
    pub fn add_trigger_port(
        &mut self,
        node: NodeId,
        name: &str,
        throttling: EventThrottling,
        carries_data: bool,
    ) -> (PortId, TriggerId) {
        self.add_trigger_of_kind(node, name, throttling, carries_data, TriggerKind::Ordinary)
    }

    fn add_trigger_of_kind(
        &mut self,
        node: NodeId,
        name: &str,
        throttling: EventThrottling,
        carries_data: bool,
        kind: TriggerKind,
    ) -> (PortId, TriggerId) {
        let port = self.ports.push(Port {
            node,
            name: name.to_owned(),
            kind: PortKind::Trigger { throttling },
            carries_data,
        });
        self.nodes.get_mut(node).outputs.push(port);
        let trigger = self.triggers.push(Trigger { port, node, kind });
        (port, trigger)
    }

    /// Add a cable from an output (or trigger) port to an input port.
    /// Endpoint consistency is a contract with the parser, so violations
    /// are fatal rather than recoverable.
    pub fn add_cable(
        &mut self,
        from_node: NodeId,
        from_port: PortId,
        to_node: NodeId,
        to_port: PortId,
    ) -> CableId {
        assert!(
            self.ports.get(from_port).node == from_node && !self.ports.get(from_port).is_input(),
            "cable source must be an output or trigger port of its from-node"
        );
        assert!(
            self.ports.get(to_port).node == to_node && self.ports.get(to_port).is_input(),
            "cable destination must be an input port of its to-node"
        );
        let mut cable = Cable::new(from_node, from_port, to_node, to_port);
        cable.published = self.nodes.get(from_node).kind != NodeKind::Ordinary
            || self.nodes.get(to_node).kind != NodeKind::Ordinary;
        self.cables.push(cable)
    }

    /// Force a cable to propagate events only, regardless of whether its
    /// endpoints could carry data.
    pub fn make_event_only(&mut self, cable: CableId) {
        self.cables.get_mut(cable).always_event_only = true;
    }

    /// Hide a cable in the editor. Analysis ignores this.
    pub fn set_hidden(&mut self, cable: CableId) {
        self.cables.get_mut(cable).hidden = true;
    }

    /// Expose a published input port: a synthetic trigger on the
    /// published-input pseudo-node. Connect it to internal input ports with
    /// ordinary `add_cable` calls. The first published input also creates
    /// the aggregate trigger that fires all published inputs at once.
    pub fn publish_input(
        &mut self,
        name: &str,
        carries_data: bool,
    ) -> Result<(PortId, TriggerId), Error> {
        let node = self.ensure_pseudo_node(
            PUBLISHED_INPUT_NODE_NAME,
            NodeKind::PublishedInput,
            |c| &mut c.published_input_node,
        );
        if self.port_name_in_use(node, name) {
            return Err(Error::DuplicatePublishedPort(name.to_owned()));
        }
        if self.aggregate_trigger.is_none() {
            let (_, agg) = self.add_trigger_of_kind(
                node,
                AGGREGATE_TRIGGER_NAME,
                EventThrottling::Enqueue,
                false,
                TriggerKind::PublishedInputAggregate,
            );
            self.aggregate_trigger = Some(agg);
        }
        Ok(self.add_trigger_of_kind(
            node,
            name,
            EventThrottling::Enqueue,
            carries_data,
            TriggerKind::PublishedInput,
        ))
    }

    /// Expose a published output port: an input port on the published-output
    /// pseudo-node. Connect internal output ports to it with ordinary
    /// `add_cable` calls.
    pub fn publish_output(&mut self, name: &str, carries_data: bool) -> Result<PortId, Error> {
        let node = self.ensure_pseudo_node(
            PUBLISHED_OUTPUT_NODE_NAME,
            NodeKind::PublishedOutput,
            |c| &mut c.published_output_node,
        );
        if self.port_name_in_use(node, name) {
            return Err(Error::DuplicatePublishedPort(name.to_owned()));
        }
        Ok(self.add_input_port(node, name, EventBlocking::None, carries_data))
    }

    /// Install the manually-firable trigger, aimed at the given input port.
    /// Used by debug/test harnesses; scheduled like any other trigger.
    pub fn set_manually_firable(&mut self, to_node: NodeId, to_port: PortId) -> TriggerId {
        let node = self.ensure_pseudo_node(MANUAL_FIRE_NODE_NAME, NodeKind::ManualFire, |c| {
            &mut c.manual_fire_node
        });
        let trigger = match self.manual_trigger {
            Some(t) => t,
            None => {
                let (_, t) = self.add_trigger_of_kind(
                    node,
                    "fire",
                    EventThrottling::Enqueue,
                    false,
                    TriggerKind::ManuallyFirable,
                );
                self.manual_trigger = Some(t);
                t
            }
        };
        let from_port = self.triggers.get(trigger).port;
        self.add_cable(node, from_port, to_node, to_port);
        trigger
    }

    fn ensure_pseudo_node(
        &mut self,
        name: &str,
        kind: NodeKind,
        slot: impl Fn(&mut Self) -> &mut Option<NodeId>,
    ) -> NodeId {
        if let Some(node) = *slot(self) {
            return node;
        }
        let node = self.nodes.push(Node::new(name, kind));
        *slot(self) = Some(node);
        node
    }

    fn port_name_in_use(&self, node: NodeId, name: &str) -> bool {
        let node = self.nodes.get(node);
        node.inputs
            .iter()
            .chain(node.outputs.iter())
            .any(|p| self.ports.get(*p).name == name)
    }
}

// reading the composition /////////////
impl Composition {
    /// Get the node with the given id.
    #[inline]
    pub fn node(&self, id: NodeId) -> &Node {
        self.nodes.get(id)
    }

    /// Get the port with the given id.
    #[inline]
    pub fn port(&self, id: PortId) -> &Port {
        self.ports.get(id)
    }

    /// Get the cable with the given id.
    #[inline]
    pub fn cable(&self, id: CableId) -> &Cable {
        self.cables.get(id)
    }

    /// Get the trigger with the given id.
    #[inline]
    pub fn trigger(&self, id: TriggerId) -> &Trigger {
        self.triggers.get(id)
    }

    /// Iterate nodes in declaration order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter_with_ids()
    }

    /// Iterate cables in declaration order.
    pub fn cables(&self) -> impl Iterator<Item = (CableId, &Cable)> {
        self.cables.iter_with_ids()
    }

    /// Iterate registered triggers in declaration order.
    pub fn triggers(&self) -> impl Iterator<Item = (TriggerId, &Trigger)> {
        self.triggers.iter_with_ids()
    }

    /// Number of nodes, including pseudo-nodes.
    #[inline]
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// The trigger registered for the given port, if any.
    pub fn trigger_for_port(&self, port: PortId) -> Option<TriggerId> {
        self.triggers
            .iter_with_ids()
            .find(|(_, t)| t.port == port)
            .map(|(id, _)| id)
    }

    /// The published-input pseudo-node, if any inputs are published.
    #[inline]
    pub fn published_input_node(&self) -> Option<NodeId> {
        self.published_input_node
    }

    /// The published-output pseudo-node, if any outputs are published.
    #[inline]
    pub fn published_output_node(&self) -> Option<NodeId> {
        self.published_output_node
    }

    /// The synthetic trigger that fires all published inputs at once.
    #[inline]
    pub fn aggregate_trigger(&self) -> Option<TriggerId> {
        self.aggregate_trigger
    }

    /// The manually-firable trigger, if installed.
    #[inline]
    pub fn manual_trigger(&self) -> Option<TriggerId> {
        self.manual_trigger
    }

    /// True if the cable transmits a data value (not just an event):
    /// both endpoints carry data and the cable is not forced event-only.
    pub fn cable_carries_data(&self, cable: &Cable) -> bool {
        !cable.always_event_only
            && self.ports.get(cable.from_port).carries_data
            && self.ports.get(cable.to_port).carries_data
    }

    /// Content hash of the full structure. Any structural edit changes it;
    /// analysis results are cached against this value and must be dropped
    /// wholesale when it changes.
    pub fn content_hash(&self) -> u64 {
        let mut h = util::Hasher::default().build_hasher();
        self.nodes.hash(&mut h);
        self.ports.hash(&mut h);
        self.cables.hash(&mut h);
        self.triggers.hash(&mut h);
        self.aggregate_trigger.hash(&mut h);
        self.manual_trigger.hash(&mut h);
        h.finish()
    }
}
