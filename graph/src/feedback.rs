use topology::{Composition, NodeId};
use util::{HashMap, HashSet};

use crate::errors::{Diagnostic, Error, Errors, Severity};
use crate::graph::Graph;
use crate::vertex::VertexId;

impl Graph {
    /// Run all validity checks, collecting every issue into `errors`.
    pub fn check_feedback(&self, comp: &Composition, errors: &mut Errors) {
        self.check_infinite_feedback(comp, errors);
        self.check_deadlocked_feedback(comp, errors);
        self.check_eventless_cycles(comp, errors);
    }

    /// Run both feedback checks, aborting on the first issue found.
    pub fn validate(&self, comp: &Composition) -> Result<(), Error> {
        let mut errors = Errors::default();
        self.check_feedback(comp, &mut errors);
        match errors.first_error() {
            Some(diag) => Err(Error::GraphValidity(diag.clone())),
            None => Ok(()),
        }
    }

    /// Report each feedback loop an event can circle forever: a loop with
    /// no wall anywhere along it, detected as vertices that are downstream
    /// of themselves. One diagnostic per loop; vertices in the same loop
    /// are mutually downstream.
    pub fn check_infinite_feedback(&self, comp: &Composition, errors: &mut Errors) {
        let mut seen_loops: HashSet<Vec<String>> = HashSet::default();
        for flow in self.flows() {
            let mut reported: HashSet<VertexId> = HashSet::default();
            for &repeat in flow.repeated() {
                if reported.contains(&repeat) {
                    continue;
                }
                let mut members: Vec<VertexId> = Vec::new();
                for &other in flow.order() {
                    if other == repeat
                        || (flow.downstream(repeat).binary_search(&other).is_ok()
                            && flow.downstream(other).binary_search(&repeat).is_ok())
                    {
                        members.push(other);
                        if flow.is_repeated(other) {
                            reported.insert(other);
                        }
                    }
                }

                let mut nodes: Vec<String> = Vec::new();
                for &v in flow.order() {
                    if members.contains(&v) {
                        let name = comp.node(flow.vertex(v).to_node).name.clone();
                        if !nodes.contains(&name) {
                            nodes.push(name);
                        }
                    }
                }
                // the same loop shows up under every trigger that feeds it
                if !seen_loops.insert(nodes.clone()) {
                    continue;
                }
                errors.add(Diagnostic {
                    severity: Severity::Error,
                    summary: "Infinite feedback loop".to_owned(),
                    detail: "An event could flow through this series of cables repeatedly, \
                             forever. To prevent this, make one of the cables leading into \
                             the loop connect to a walled port."
                        .to_owned(),
                    nodes,
                });
            }
        }
    }

    /// Report node pairs that are each downstream of the other without a
    /// legal feedback loop between them, so no execution order satisfies
    /// both. Legal loops (those passing through a repeated node) are
    /// excluded before comparing.
    pub fn check_deadlocked_feedback(&self, comp: &Composition, errors: &mut Errors) {
        let mut seen_pairs: HashSet<(NodeId, NodeId)> = HashSet::default();
        for flow in self.flows() {
            let mut downstream_nodes: HashMap<NodeId, HashSet<NodeId>> = HashMap::default();
            for &v in flow.order() {
                let node = flow.vertex(v).to_node;
                let mut nodes: HashSet<NodeId> = HashSet::default();
                let mut any_repeated = false;
                for &w in flow.downstream(v) {
                    let to_node = flow.vertex(w).to_node;
                    if to_node == node {
                        any_repeated = true;
                        break;
                    }
                    nodes.insert(to_node);
                }
                if !any_repeated {
                    downstream_nodes.entry(node).or_default().extend(nodes);
                }
            }

            let order = flow.nodes_in_order();
            for (i, &a) in order.iter().enumerate() {
                for &b in &order[i + 1..] {
                    let a_below_b = downstream_nodes.get(&b).is_some_and(|d| d.contains(&a));
                    let b_below_a = downstream_nodes.get(&a).is_some_and(|d| d.contains(&b));
                    if a_below_b && b_below_a && seen_pairs.insert((a, b)) {
                        errors.add(Diagnostic {
                            severity: Severity::Error,
                            summary: "Deadlocked feedback loop".to_owned(),
                            detail: "An event can't travel through this composition without \
                                     going through these nodes in conflicting orders. To fix, \
                                     remove or reroute cables between them."
                                .to_owned(),
                            nodes: vec![comp.node(a).name.clone(), comp.node(b).name.clone()],
                        });
                    }
                }
            }
        }
    }

    /// Warn when eventless transmitters feed data back to each other: their
    /// outputs have no consistent refresh order. A warning rather than an
    /// error, since event propagation through the same cables is validated
    /// separately.
    pub fn check_eventless_cycles(&self, comp: &Composition, errors: &mut Errors) {
        let cycle = self.eventless_cycle();
        if cycle.is_empty() {
            return;
        }
        errors.add(Diagnostic {
            severity: Severity::Warning,
            summary: "Data-only transmission cycle".to_owned(),
            detail: "Data flows among these nodes in a cycle, so there is no consistent \
                     order to refresh their outputs in. Consider making one of the cables \
                     in the cycle event-only."
                .to_owned(),
            nodes: cycle.iter().map(|&n| comp.node(n).name.clone()).collect(),
        });
    }
}

#[cfg(test)]
mod test {
    use topology::{Composition, EventBlocking};

    use crate::testutil::{node, trigger_node};
    use crate::{Errors, Graph};

    #[test]
    fn test_unwalled_loop_reported_as_infinite() {
        let mut comp = Composition::default();
        let (t, t_port, _) = trigger_node(&mut comp, "fire");
        let (a, a_in, a_out) = node(&mut comp, "a");
        let (b, b_in, b_out) = node(&mut comp, "b");
        let a_in2 = comp.add_input_port(a, "in2", EventBlocking::None, true);
        comp.add_cable(t, t_port, a, a_in);
        comp.add_cable(a, a_out, b, b_in);
        comp.add_cable(b, b_out, a, a_in2);

        let graph = Graph::build(&comp);
        let mut errors = Errors::default();
        graph.check_feedback(&comp, &mut errors);
        assert_eq!(errors.len(), 1);
        let diag = errors.iter().next().unwrap();
        assert_eq!(diag.summary, "Infinite feedback loop");
        let mut names = diag.nodes.clone();
        names.sort();
        assert_eq!(names, vec!["a".to_owned(), "b".to_owned()]);
        assert!(graph.validate(&comp).is_err());
    }

    #[test]
    fn test_walled_loop_is_legal() {
        let mut comp = Composition::default();
        let (t, t_port, _) = trigger_node(&mut comp, "fire");
        let (a, a_in, a_out) = node(&mut comp, "a");
        let (b, b_in, b_out) = node(&mut comp, "b");
        let a_wall = comp.add_input_port(a, "loopback", EventBlocking::Wall, true);
        comp.add_cable(t, t_port, a, a_in);
        comp.add_cable(a, a_out, b, b_in);
        comp.add_cable(b, b_out, a, a_wall);

        let graph = Graph::build(&comp);
        assert!(graph.validate(&comp).is_ok());
    }

    #[test]
    fn test_conflicting_orders_reported_as_deadlock() {
        let mut comp = Composition::default();
        let (t, t_port, _) = trigger_node(&mut comp, "fire");
        let (a, a_in, a_out) = node(&mut comp, "a");
        let (b, b_in, b_out) = node(&mut comp, "b");
        let a_wall = comp.add_input_port(a, "back", EventBlocking::Wall, true);
        let b_wall = comp.add_input_port(b, "back", EventBlocking::Wall, true);
        // the trigger feeds both nodes, and each feeds the other through a
        // wall, so neither execution order satisfies both
        comp.add_cable(t, t_port, a, a_in);
        comp.add_cable(t, t_port, b, b_in);
        comp.add_cable(a, a_out, b, b_wall);
        comp.add_cable(b, b_out, a, a_wall);

        let graph = Graph::build(&comp);
        let mut errors = Errors::default();
        graph.check_feedback(&comp, &mut errors);
        assert_eq!(errors.len(), 1);
        let diag = errors.iter().next().unwrap();
        assert_eq!(diag.summary, "Deadlocked feedback loop");
        assert_eq!(diag.nodes.len(), 2);
    }

    #[test]
    fn test_loop_reported_once_across_triggers() {
        let mut comp = Composition::default();
        let (t1, t1_port, _) = trigger_node(&mut comp, "first");
        let (t2, t2_port, _) = trigger_node(&mut comp, "second");
        let (a, a_in, a_out) = node(&mut comp, "a");
        let (b, b_in, b_out) = node(&mut comp, "b");
        let a_in2 = comp.add_input_port(a, "in2", EventBlocking::None, true);
        let a_in3 = comp.add_input_port(a, "in3", EventBlocking::None, true);
        comp.add_cable(t1, t1_port, a, a_in);
        comp.add_cable(t2, t2_port, a, a_in3);
        comp.add_cable(a, a_out, b, b_in);
        comp.add_cable(b, b_out, a, a_in2);

        let graph = Graph::build(&comp);
        let mut errors = Errors::default();
        graph.check_infinite_feedback(&comp, &mut errors);
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_data_cycle_reported_as_warning() {
        let mut comp = Composition::default();
        let (a, a_in, a_out) = node(&mut comp, "a");
        let (b, b_in, b_out) = node(&mut comp, "b");
        comp.mark_transmits_eventlessly(a);
        comp.mark_transmits_eventlessly(b);
        comp.add_cable(a, a_out, b, b_in);
        comp.add_cable(b, b_out, a, a_in);

        let graph = Graph::build(&comp);
        assert_eq!(graph.eventless_cycle(), &[a, b]);

        let mut errors = Errors::default();
        graph.check_feedback(&comp, &mut errors);
        assert_eq!(errors.len(), 1);
        let diag = errors.iter().next().unwrap();
        assert_eq!(diag.severity, crate::Severity::Warning);
        assert_eq!(diag.nodes, vec!["a".to_owned(), "b".to_owned()]);
        // a warning alone doesn't fail validation
        assert!(!errors.has_errors());
        assert!(graph.validate(&comp).is_ok());
    }

    #[test]
    fn test_valid_composition_has_no_diagnostics() {
        let mut comp = Composition::default();
        let (t, t_port, _) = trigger_node(&mut comp, "fire");
        let (a, a_in, a_out) = node(&mut comp, "a");
        let (b, b_in, _) = node(&mut comp, "b");
        comp.add_cable(t, t_port, a, a_in);
        comp.add_cable(a, a_out, b, b_in);

        let graph = Graph::build(&comp);
        let mut errors = Errors::default();
        graph.check_feedback(&comp, &mut errors);
        assert!(errors.is_empty());
    }
}
