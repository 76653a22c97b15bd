use graph::{Error, Errors, Graph};
use topology::{Cable, Composition};
use util::Timer;

/// One completed analysis of a composition snapshot, tagged with the
/// snapshot's content hash so callers can tell when it has gone stale.
/// Immutable once built; share it behind an `Arc` (see `AnalysisCache`).
pub struct Analysis {
    hash: u64,
    graph: Graph,
}

impl Analysis {
    /// Analyze the composition as it stands.
    pub fn new(comp: &Composition) -> Self {
        Self::build(comp, &[])
    }

    /// Analyze the composition as if the given cables were already added.
    /// The hash still describes the committed composition only, so a
    /// what-if analysis never masquerades as current in a cache.
    pub fn with_potential_cables(comp: &Composition, potential: &[Cable]) -> Self {
        Self::build(comp, potential)
    }

    fn build(comp: &Composition, potential: &[Cable]) -> Self {
        let timer = Timer::now();
        let graph = if potential.is_empty() {
            Graph::build(comp)
        } else {
            Graph::build_with_potential_cables(comp, potential)
        };
        // elapsed-time logging is best-effort; a clock step is not our problem
        timer.log_elapsed("analyzing composition graph").ok();
        Self {
            hash: comp.content_hash(),
            graph,
        }
    }

    /// Content hash of the composition this analysis describes.
    #[inline]
    pub fn composition_hash(&self) -> u64 {
        self.hash
    }

    /// True if the composition is structurally unchanged since this
    /// analysis was built.
    pub fn is_current(&self, comp: &Composition) -> bool {
        self.hash == comp.content_hash()
    }

    /// The analyzed graph, for reachability, chain, and budget queries.
    #[inline]
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Run the feedback checks, aborting on the first issue.
    pub fn validate(&self, comp: &Composition) -> Result<(), Error> {
        self.graph.validate(comp)
    }

    /// Run the feedback checks, collecting every issue into `errors`.
    pub fn check(&self, comp: &Composition, errors: &mut Errors) {
        self.graph.check_feedback(comp, errors);
    }

    /// Run the feedback checks and print a recap of every issue to stderr,
    /// failing if any had error severity.
    pub fn validate_and_report(&self, comp: &Composition) -> anyhow::Result<()> {
        let mut errors = Errors::default();
        self.check(comp, &mut errors);
        errors
            .print_recap("validating the composition")
            .map_err(Into::into)
    }
}
