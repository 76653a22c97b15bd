use topology::{NodeId, TriggerId};
use util::{HashMap, HashSet};

use crate::chains::Chain;
use crate::graph::Graph;

/// How many worker threads an event from one trigger needs: `min` to make
/// progress without deadlocking, `max` to exploit all the parallelism the
/// flow's shape allows. The runtime sizes its pool from these before the
/// event fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadBudget {
    pub min: u16,
    pub max: u16,
}

impl ThreadBudget {
    /// A straight line of execution.
    pub const SINGLE: Self = Self { min: 1, max: 1 };
}

impl Graph {
    /// Thread budget for one firing of `trigger`. Computed on first use,
    /// then cached.
    pub fn worker_threads_needed(&self, trigger: TriggerId) -> ThreadBudget {
        *self
            .flow(trigger)
            .budget
            .get_or_init(|| self.compute_budget(trigger))
    }

    /// Each chain executes its nodes strictly in sequence.
    pub fn worker_threads_for_chain(&self, _trigger: TriggerId, _chain: &Chain) -> ThreadBudget {
        ThreadBudget::SINGLE
    }

    fn compute_budget(&self, trigger: TriggerId) -> ThreadBudget {
        let chains = self.chains(trigger);
        if chains.is_empty() {
            return ThreadBudget::SINGLE;
        }
        let flow = self.flow(trigger);

        // min: the widest scatter front, since every branch of a scatter
        // gets a worker before any branch finishes
        let mut min = flow.num_trigger_vertices().max(1);
        let mut launches: HashMap<NodeId, usize> = HashMap::default();
        for &v in flow.order() {
            if let Some(from) = flow.vertex(v).from_node() {
                let count = launches.entry(from).or_default();
                *count += 1;
                min = min.max(*count);
            }
        }

        // max: the widest level of the chain DAG. Loop-repeat chains whose
        // node already executes inside another chain don't occupy an extra
        // slot.
        let mut chain_of: HashMap<NodeId, usize> = HashMap::default();
        let mut shadow = vec![false; chains.len()];
        for (i, chain) in chains.iter().enumerate() {
            for &node in &chain.nodes {
                if let Some(&j) = chain_of.get(&node) {
                    if chain.last_node_in_loop && j != i {
                        shadow[i] = true;
                    }
                } else {
                    chain_of.insert(node, i);
                }
            }
        }

        let mut level = vec![0usize; chains.len()];
        for (i, chain) in chains.iter().enumerate() {
            if shadow[i] {
                continue;
            }
            let first = chain.nodes[0];
            for &v in flow.order() {
                let vertex = flow.vertex(v);
                if vertex.to_node != first {
                    continue;
                }
                if let Some(from) = vertex.from_node() {
                    if let Some(&j) = chain_of.get(&from) {
                        if j != i {
                            level[i] = level[i].max(level[j] + 1);
                        }
                    }
                }
            }
        }
        let mut width: HashMap<usize, usize> = HashMap::default();
        for (i, _) in chains.iter().enumerate().filter(|(i, _)| !shadow[*i]) {
            *width.entry(level[i]).or_default() += 1;
        }
        let mut max = width.values().copied().max().unwrap_or(1);

        // when another trigger's events can interleave with part of this
        // one's flow, one extra worker keeps the overlapped branch moving
        if self.has_scatter_partially_overlapped_by_another_trigger(trigger)
            || self.has_overlap_with_spin_off(trigger)
        {
            max += 1;
        }

        let min = min.min(u16::MAX as usize) as u16;
        let max = (max.min(u16::MAX as usize) as u16).max(min);
        ThreadBudget { min, max }
    }

    /// True if this trigger scatters and another trigger's downstream nodes
    /// cover part, but not all, of this trigger's downstream nodes.
    pub fn has_scatter_partially_overlapped_by_another_trigger(&self, trigger: TriggerId) -> bool {
        if !self.has_scatter_downstream(trigger) {
            return false;
        }
        let mine: HashSet<NodeId> = self
            .nodes_downstream_of_trigger(trigger)
            .into_iter()
            .collect();
        if mine.is_empty() {
            return false;
        }
        for other in self.triggers() {
            if other == trigger {
                continue;
            }
            let theirs: HashSet<NodeId> = self
                .nodes_downstream_of_trigger(other)
                .into_iter()
                .collect();
            let covered = mine.intersection(&theirs).count();
            if covered > 0 && covered < mine.len() {
                return true;
            }
        }
        false
    }

    /// True if a node downstream of `trigger` hosts another trigger whose
    /// own downstream nodes overlap this trigger's, so an event spun off
    /// mid-flow can contend with the original event.
    pub fn has_overlap_with_spin_off(&self, trigger: TriggerId) -> bool {
        let mine: HashSet<NodeId> = self
            .nodes_downstream_of_trigger(trigger)
            .into_iter()
            .collect();
        if mine.is_empty() {
            return false;
        }
        for other in self.triggers() {
            if other == trigger || !mine.contains(&self.trigger_host(other)) {
                continue;
            }
            if self
                .nodes_downstream_of_trigger(other)
                .iter()
                .any(|n| mine.contains(n))
            {
                return true;
            }
        }
        false
    }
}
