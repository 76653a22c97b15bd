//!
//! Event-flow analysis over a composition snapshot.
//!
//! The central structure is [`Graph`]: one flow per trigger, where each
//! vertex is the bundle of cables between one source (trigger or node) and
//! one destination node. On top of the per-trigger flows the crate answers
//! reachability queries, validates feedback loops, partitions each flow
//! into linear [`Chain`]s, and sizes thread budgets for the scheduler.
//!
//! Everything is computed from an immutable snapshot; an edited
//! composition gets a fresh `Graph`.

mod errors;
pub use errors::{Diagnostic, Error, Errors, Severity};

mod vertex;
pub use vertex::{CableInfo, CableIx, Vertex, VertexId, VertexSource};

mod flow;
pub use flow::TriggerFlow;

mod builder;
pub use builder::GraphBuilder;

mod graph;
pub use graph::Graph;

mod chains;
pub use chains::Chain;

mod threads;
pub use threads::ThreadBudget;

mod feedback;
