//! End-to-end tests driving the public API the way the compiler would:
//! build a composition, analyze it, then ask scheduling questions.

use weft::{
    Analysis, AnalysisCache, Cable, Composition, Errors, EventBlocking, EventThrottling, NodeId,
    PortId, ThreadBudget, TriggerId,
};

fn node(comp: &mut Composition, name: &str) -> (NodeId, PortId, PortId) {
    let n = comp.add_node(name);
    let input = comp.add_input_port(n, "in", EventBlocking::None, true);
    let output = comp.add_output_port(n, "out", true);
    (n, input, output)
}

fn trigger_node(comp: &mut Composition, name: &str) -> (NodeId, PortId, TriggerId) {
    let n = comp.add_node(name);
    let (port, trigger) = comp.add_trigger_port(n, "fired", EventThrottling::Enqueue, false);
    (n, port, trigger)
}

#[test]
fn independent_branches_get_parallel_chains() {
    let mut comp = Composition::default();
    let (t, t_port, trigger) = trigger_node(&mut comp, "fire");
    let (a, a_in, _) = node(&mut comp, "a");
    let (b, b_in, _) = node(&mut comp, "b");
    comp.add_cable(t, t_port, a, a_in);
    comp.add_cable(t, t_port, b, b_in);

    let analysis = Analysis::new(&comp);
    assert!(analysis.validate(&comp).is_ok());

    let graph = analysis.graph();
    let chains = graph.chains(trigger);
    assert_eq!(chains.len(), 2);
    assert_eq!(chains[0].nodes, vec![a]);
    assert_eq!(chains[1].nodes, vec![b]);
    assert_eq!(
        graph.worker_threads_needed(trigger),
        ThreadBudget { min: 2, max: 2 }
    );
}

#[test]
fn straight_chain_runs_sequentially() {
    let mut comp = Composition::default();
    let (t, t_port, trigger) = trigger_node(&mut comp, "fire");
    let (a, a_in, a_out) = node(&mut comp, "a");
    let (b, b_in, b_out) = node(&mut comp, "b");
    let (c, c_in, _) = node(&mut comp, "c");
    comp.add_cable(t, t_port, a, a_in);
    comp.add_cable(a, a_out, b, b_in);
    comp.add_cable(b, b_out, c, c_in);

    let analysis = Analysis::new(&comp);
    let graph = analysis.graph();
    let chains = graph.chains(trigger);
    assert_eq!(chains.len(), 1);
    assert_eq!(chains[0].nodes, vec![a, b, c]);
    assert_eq!(graph.worker_threads_needed(trigger), ThreadBudget::SINGLE);
    assert!(graph.must_reach(trigger, c));
}

#[test]
fn scatter_gather_rejoins_in_one_chain() {
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

    let analysis = Analysis::new(&comp);
    let graph = analysis.graph();
    let chains = graph.chains(trigger);
    assert_eq!(chains.len(), 3);
    assert_eq!(chains[0].nodes, vec![a]);
    assert_eq!(chains[1].nodes, vec![b]);
    assert_eq!(chains[2].nodes, vec![c]);
    assert_eq!(graph.worker_threads_needed(trigger).max, 2);
    assert!(graph.has_gather_downstream(trigger));
}

#[test]
fn walled_self_loop_is_a_tagged_chain() {
    let mut comp = Composition::default();
    let (t, t_port, trigger) = trigger_node(&mut comp, "fire");
    let (a, a_in, a_out) = node(&mut comp, "a");
    let loopback = comp.add_input_port(a, "loopback", EventBlocking::Wall, true);
    comp.add_cable(t, t_port, a, a_in);
    comp.add_cable(a, a_out, a, loopback);

    let analysis = Analysis::new(&comp);
    assert!(analysis.validate(&comp).is_ok());

    let graph = analysis.graph();
    let chains = graph.chains(trigger);
    assert_eq!(chains.len(), 1);
    assert_eq!(chains[0].nodes, vec![a]);
    assert!(chains[0].last_node_in_loop);
    assert!(graph.is_repeated_in_feedback_loop(a, trigger));
}

#[test]
fn unwalled_loop_fails_validation() {
    let mut comp = Composition::default();
    let (t, t_port, _) = trigger_node(&mut comp, "fire");
    let (a, a_in, a_out) = node(&mut comp, "a");
    let (b, b_in, b_out) = node(&mut comp, "b");
    let a_in2 = comp.add_input_port(a, "in2", EventBlocking::None, true);
    comp.add_cable(t, t_port, a, a_in);
    comp.add_cable(a, a_out, b, b_in);
    comp.add_cable(b, b_out, a, a_in2);

    let analysis = Analysis::new(&comp);
    assert!(analysis.validate(&comp).is_err());

    let mut errors = Errors::default();
    analysis.check(&comp, &mut errors);
    assert_eq!(errors.len(), 1);
    let diag = errors.iter().next().unwrap();
    let mut names = diag.nodes.clone();
    names.sort();
    assert_eq!(names, vec!["a".to_owned(), "b".to_owned()]);

    // validation is read-only, so asking twice reports the same issues
    let mut again = Errors::default();
    analysis.check(&comp, &mut again);
    assert_eq!(again.len(), 1);
}

#[test]
fn gated_bundle_reaches_but_not_certainly() {
    let mut comp = Composition::default();
    let (t, t_port, trigger) = trigger_node(&mut comp, "fire");
    let a = comp.add_node("a");
    let a_wall = comp.add_input_port(a, "gate", EventBlocking::Wall, true);
    let a_door = comp.add_input_port(a, "maybe", EventBlocking::Door, true);
    comp.add_output_port(a, "out", true);
    comp.add_cable(t, t_port, a, a_wall);
    comp.add_cable(t, t_port, a, a_door);

    let analysis = Analysis::new(&comp);
    let graph = analysis.graph();
    assert!(graph.may_reach(trigger, a));
    assert!(!graph.must_reach(trigger, a));
}

#[test]
fn must_reach_implies_may_reach() {
    let mut comp = Composition::default();
    let (t, t_port, trigger) = trigger_node(&mut comp, "fire");
    let (a, a_in, a_out) = node(&mut comp, "a");
    let (b, b_in, _) = node(&mut comp, "b");
    let c = comp.add_node("c");
    let c_door = comp.add_input_port(c, "maybe", EventBlocking::Door, true);
    comp.add_cable(t, t_port, a, a_in);
    comp.add_cable(a, a_out, b, b_in);
    comp.add_cable(a, a_out, c, c_door);

    let analysis = Analysis::new(&comp);
    let graph = analysis.graph();
    for n in [a, b, c] {
        if graph.must_reach(trigger, n) {
            assert!(graph.may_reach(trigger, n));
        }
    }
    assert!(graph.must_reach(trigger, b));
    assert!(!graph.must_reach(trigger, c));
    assert!(graph.may_reach(trigger, c));
}

#[test]
fn chains_cover_every_downstream_node_once() {
    let mut comp = Composition::default();
    let (t, t_port, trigger) = trigger_node(&mut comp, "fire");
    let (a, a_in, a_out) = node(&mut comp, "a");
    let (b, b_in, b_out) = node(&mut comp, "b");
    let (c, c_in, c_out) = node(&mut comp, "c");
    let (d, d_in, _) = node(&mut comp, "d");
    let d_in2 = comp.add_input_port(d, "in2", EventBlocking::None, true);
    comp.add_cable(t, t_port, a, a_in);
    comp.add_cable(a, a_out, b, b_in);
    comp.add_cable(a, a_out, c, c_in);
    comp.add_cable(b, b_out, d, d_in);
    comp.add_cable(c, c_out, d, d_in2);

    let analysis = Analysis::new(&comp);
    let graph = analysis.graph();
    let mut covered: Vec<NodeId> = Vec::new();
    for chain in graph.chains(trigger) {
        for &n in &chain.nodes {
            assert!(!covered.contains(&n), "node in two chains");
            covered.push(n);
        }
    }
    let mut downstream = graph.nodes_downstream_of_trigger(trigger);
    covered.sort();
    downstream.sort();
    assert_eq!(covered, downstream);
}

#[test]
fn trigger_with_no_cables_is_harmless() {
    let mut comp = Composition::default();
    let (_, _, trigger) = trigger_node(&mut comp, "fire");

    let analysis = Analysis::new(&comp);
    assert!(analysis.validate(&comp).is_ok());
    let graph = analysis.graph();
    assert!(graph.nodes_downstream_of_trigger(trigger).is_empty());
    assert!(graph.chains(trigger).is_empty());
    assert_eq!(graph.worker_threads_needed(trigger), ThreadBudget::SINGLE);
}

#[test]
fn published_inputs_fire_individually_and_together() {
    let mut comp = Composition::default();
    let (a, a_in, a_out) = node(&mut comp, "a");
    let (b, b_in, _) = node(&mut comp, "b");
    let b_in2 = comp.add_input_port(b, "in2", EventBlocking::None, true);
    let (x_port, x_trigger) = comp.publish_input("x", true).unwrap();
    let (y_port, y_trigger) = comp.publish_input("y", true).unwrap();
    let pub_node = comp.published_input_node().unwrap();
    comp.add_cable(pub_node, x_port, a, a_in);
    comp.add_cable(a, a_out, b, b_in);
    comp.add_cable(pub_node, y_port, b, b_in2);

    let analysis = Analysis::new(&comp);
    let graph = analysis.graph();
    assert!(graph.is_published_input_trigger(x_trigger));
    assert_eq!(graph.nodes_downstream_of_trigger(x_trigger), vec![a, b]);
    assert_eq!(graph.nodes_downstream_of_trigger(y_trigger), vec![b]);

    let aggregate = comp.aggregate_trigger().unwrap();
    assert!(graph.is_published_input_trigger(aggregate));
    assert_eq!(graph.nodes_downstream_of_trigger(aggregate), vec![a, b]);
    assert_eq!(graph.triggers().last(), Some(aggregate));
}

#[test]
fn manual_trigger_behaves_like_any_other() {
    let mut comp = Composition::default();
    let (a, a_in, a_out) = node(&mut comp, "a");
    let (b, b_in, _) = node(&mut comp, "b");
    let manual = comp.set_manually_firable(a, a_in);
    comp.add_cable(a, a_out, b, b_in);

    let analysis = Analysis::new(&comp);
    let graph = analysis.graph();
    assert!(graph.is_manually_firable_trigger(manual));
    assert_eq!(graph.nodes_downstream_of_trigger(manual), vec![a, b]);
    assert_eq!(graph.chains(manual).len(), 1);
}

#[test]
fn potential_cable_previews_an_illegal_edit() {
    let mut comp = Composition::default();
    let (t, t_port, _) = trigger_node(&mut comp, "fire");
    let (a, a_in, a_out) = node(&mut comp, "a");
    let (b, b_in, b_out) = node(&mut comp, "b");
    let a_in2 = comp.add_input_port(a, "in2", EventBlocking::None, true);
    comp.add_cable(t, t_port, a, a_in);
    comp.add_cable(a, a_out, b, b_in);

    // legal today
    assert!(Analysis::new(&comp).validate(&comp).is_ok());

    // closing the loop without a wall would make feedback infinite
    let closing = [Cable::new(b, b_out, a, a_in2)];
    let what_if = Analysis::with_potential_cables(&comp, &closing);
    assert!(what_if.validate(&comp).is_err());
    // and the committed composition is untouched
    assert!(Analysis::new(&comp).validate(&comp).is_ok());
}

#[test]
fn cache_serves_repeated_queries() {
    let mut comp = Composition::default();
    let (t, t_port, trigger) = trigger_node(&mut comp, "fire");
    let (a, a_in, _) = node(&mut comp, "a");
    comp.add_cable(t, t_port, a, a_in);

    let mut cache = AnalysisCache::default();
    let first = cache.analysis_for(&comp);
    let second = cache.analysis_for(&comp);
    assert!(std::sync::Arc::ptr_eq(&first, &second));
    assert_eq!(first.graph().nodes_downstream_of_trigger(trigger), vec![a]);

    comp.add_node("b");
    let third = cache.analysis_for(&comp);
    assert!(!std::sync::Arc::ptr_eq(&first, &third));
}

#[test]
fn adding_a_scatter_branch_never_shrinks_the_budget() {
    let mut comp = Composition::default();
    let (t, t_port, trigger) = trigger_node(&mut comp, "fire");
    let (a, a_in, a_out) = node(&mut comp, "a");
    let (b, b_in, _) = node(&mut comp, "b");
    comp.add_cable(t, t_port, a, a_in);
    comp.add_cable(a, a_out, b, b_in);

    let before = Analysis::new(&comp).graph().worker_threads_needed(trigger);

    let (c, c_in, _) = node(&mut comp, "c");
    comp.add_cable(a, a_out, c, c_in);
    let after = Analysis::new(&comp).graph().worker_threads_needed(trigger);

    assert!(after.max >= before.max);
}

#[test]
fn analysis_is_deterministic_across_builds() {
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

    let first = Analysis::new(&comp);
    let second = Analysis::new(&comp);
    assert_eq!(
        first.graph().nodes_downstream_of_trigger(trigger),
        second.graph().nodes_downstream_of_trigger(trigger)
    );
    assert_eq!(first.graph().chains(trigger), second.graph().chains(trigger));
    assert_eq!(
        first.graph().worker_threads_needed(trigger),
        second.graph().worker_threads_needed(trigger)
    );
    assert_eq!(first.composition_hash(), second.composition_hash());
}
