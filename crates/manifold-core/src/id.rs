use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Identifies an entity that owns a node container.
    pub struct EntityId;

    /// Identifies a node (connection point) in the node graph.
    pub struct NodeId;

    /// Identifies a live group. Keys compare by slot index first, so the
    /// "lower identifier" tie-break is deterministic for a given history.
    pub struct GroupId;
}

/// Identifies a group kind in the registry. Cheap to copy and compare.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct GroupKindId(pub u16);

/// Identifies a grid that entities can be anchored to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct GridId(pub u32);

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    #[test]
    fn group_kind_id_equality() {
        assert_eq!(GroupKindId(0), GroupKindId(0));
        assert_ne!(GroupKindId(0), GroupKindId(1));
    }

    #[test]
    fn group_ids_order_by_allocation() {
        let mut sm: SlotMap<GroupId, ()> = SlotMap::with_key();
        let a = sm.insert(());
        let b = sm.insert(());
        assert!(a < b);
    }

    #[test]
    fn ids_are_hashable() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(GridId(0), "station");
        map.insert(GridId(1), "shuttle");
        assert_eq!(map[&GridId(1)], "shuttle");
    }
}
