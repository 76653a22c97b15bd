use crate::{NodeId, PortId};

/// Which flavor of trigger this is; synthetic triggers are scheduled like
/// ordinary ones but are classified so code generation can tell them apart.
#[derive(Debug, Default, Clone, Copy, Hash, PartialEq, Eq)]
pub enum TriggerKind {
    #[default]
    Ordinary,
    /// Synthetic trigger for one published input port.
    PublishedInput,
    /// Synthetic trigger that fires all published inputs at once.
    /// Always ordered last among the published-input triggers.
    PublishedInputAggregate,
    /// Synthetic trigger for the debug/test-harness hook.
    ManuallyFirable,
}

/// One registered trigger port: the port itself plus the node hosting it.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct Trigger {
    pub port: PortId,
    pub node: NodeId,
    pub kind: TriggerKind,
}
