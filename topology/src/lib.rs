//!
//! Structural model of a composition: nodes, ports, cables, and trigger
//! ports, plus the synthetic pseudo-nodes standing in for published ports
//! and the manually-firable debug trigger.
//!
//! This crate holds facts only; all event-flow reasoning lives in the
//! `graph` crate, which takes a snapshot of a `Composition` and never
//! mutates it.

mod id;
pub use id::{CableId, NodeId, PortId, TriggerId};

mod port;
pub use port::{EventBlocking, EventThrottling, Port, PortKind};

mod node;
pub use node::{Node, NodeKind};

mod cable;
pub use cable::Cable;

mod trigger;
pub use trigger::{Trigger, TriggerKind};

mod composition;
pub use composition::{
    Composition, AGGREGATE_TRIGGER_NAME, MANUAL_FIRE_NODE_NAME, PUBLISHED_INPUT_NODE_NAME,
    PUBLISHED_OUTPUT_NODE_NAME,
};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("A published port named \"{0}\" already exists")]
    DuplicatePublishedPort(String),
}
