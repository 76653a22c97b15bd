//!
//! Composition graph analysis for the weft dataflow compiler.
//!
//! A composition is a directed graph of nodes joined by cables, where
//! events originate at trigger ports and flow downstream. This workspace
//! answers the questions the compiler and scheduler ask about that flow:
//!
//! - which nodes an event from a given trigger may, or must, reach;
//! - whether feedback loops are legal (walled) or infinite/deadlocked;
//! - how each trigger's flow partitions into sequential chains;
//! - how many worker threads one firing needs.
//!
//! The structural facts live in the `topology` crate; all analysis lives
//! in the `graph` crate. This crate ties them together: [`Analysis`] pairs
//! an analyzed graph with its composition's content hash, and
//! [`AnalysisCache`] reuses analyses until the composition changes.

mod analysis;
pub use analysis::Analysis;

mod cache;
pub use cache::AnalysisCache;

pub use graph::{
    Chain, Diagnostic, Error, Errors, Graph, Severity, ThreadBudget, TriggerFlow, Vertex,
    VertexSource,
};
pub use topology::{
    Cable, CableId, Composition, EventBlocking, EventThrottling, Node, NodeId, NodeKind, Port,
    PortId, PortKind, Trigger, TriggerId, TriggerKind,
};
