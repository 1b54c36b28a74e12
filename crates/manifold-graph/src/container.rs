use manifold_core::id::NodeId;
use std::collections::BTreeMap;

/// The named node slots attached to one entity.
///
/// Appliances resolve nodes through `(entity, slot name)`; this is the only
/// lookup path from outside the graph into a node.
#[derive(Debug, Clone, Default)]
pub struct NodeContainer {
    slots: BTreeMap<String, NodeId>,
}

impl NodeContainer {
    pub fn get(&self, slot: &str) -> Option<NodeId> {
        self.slots.get(slot).copied()
    }

    pub fn contains(&self, slot: &str) -> bool {
        self.slots.contains_key(slot)
    }

    /// `(slot, node)` pairs in slot-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, NodeId)> {
        self.slots.iter().map(|(name, id)| (name.as_str(), *id))
    }

    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.slots.values().copied()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub(crate) fn insert(&mut self, slot: &str, node: NodeId) {
        self.slots.insert(slot.to_string(), node);
    }

    pub(crate) fn remove(&mut self, slot: &str) -> Option<NodeId> {
        self.slots.remove(slot)
    }
}
