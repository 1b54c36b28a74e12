//! Shared test helpers for unit tests, integration tests, and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]`.

use crate::id::{EntityId, NodeId};
use slotmap::SlotMap;

/// Allocate `count` fresh entity handles. Keep the returned map alive so
/// the keys stay unique.
pub fn make_entities(count: usize) -> (SlotMap<EntityId, ()>, Vec<EntityId>) {
    let mut sm: SlotMap<EntityId, ()> = SlotMap::with_key();
    let ids = (0..count).map(|_| sm.insert(())).collect();
    (sm, ids)
}

/// Allocate `count` fresh node handles.
pub fn make_node_ids(count: usize) -> (SlotMap<NodeId, ()>, Vec<NodeId>) {
    let mut sm: SlotMap<NodeId, ()> = SlotMap::with_key();
    let ids = (0..count).map(|_| sm.insert(())).collect();
    (sm, ids)
}

/// Relative float comparison used by conservation checks.
pub fn approx_eq(a: f64, b: f64, rel: f64) -> bool {
    let scale = a.abs().max(b.abs()).max(1.0);
    (a - b).abs() <= rel * scale
}
