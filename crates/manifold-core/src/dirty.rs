use crate::id::NodeId;
use std::collections::BTreeSet;

/// Pending set of nodes whose edges must be re-evaluated.
///
/// Queueing is idempotent: a node already pending is not queued twice, so
/// a burst of structural changes in one tick collapses into a single entry
/// per node. [`drain`](DirtyQueue::drain) hands the batch to the recompute
/// pass in ascending id order, which keeps the pass deterministic.
#[derive(Debug, Clone, Default)]
pub struct DirtyQueue {
    pending: BTreeSet<NodeId>,
}

impl DirtyQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a node. Returns `true` if it was not already pending.
    pub fn mark(&mut self, node: NodeId) -> bool {
        self.pending.insert(node)
    }

    /// Drop a node from the batch (e.g. it was destroyed).
    pub fn forget(&mut self, node: NodeId) -> bool {
        self.pending.remove(&node)
    }

    pub fn is_pending(&self, node: NodeId) -> bool {
        self.pending.contains(&node)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Take the whole batch, leaving the queue empty.
    pub fn drain(&mut self) -> Vec<NodeId> {
        std::mem::take(&mut self.pending).into_iter().collect()
    }
}
