//! Shared test helpers for unit tests, integration tests, and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]`.

use crate::engine::NodeGraph;
use crate::event::GraphEvent;
use crate::group::{Group, MemberRef};
use crate::node::NodeSpec;
use crate::policy::LinkerSpec;
use crate::registry::GroupRegistryBuilder;
use manifold_core::Ticks;
use manifold_core::id::{EntityId, GridId, GroupId, GroupKindId, NodeId};
use manifold_spatial::{DirectionMask, Rotation, SpatialIndex, TileRef};
use slotmap::SlotMap;
use std::any::Any;

// ===========================================================================
// TallyGroup
// ===========================================================================

/// Minimal group whose conserved quantity is a single scalar `charge`.
#[derive(Debug, Clone, Default)]
pub struct TallyGroup {
    pub volume: f64,
    pub charge: f64,
    pub seed: Option<NodeId>,
    pub updates: u64,
    pub splits: u32,
}

impl Group for TallyGroup {
    fn initialize(&mut self, seed: &MemberRef) {
        self.seed = Some(seed.node);
    }

    fn load_members(&mut self, members: &[MemberRef]) {
        self.volume += members.iter().map(|m| m.volume).sum::<f64>();
    }

    fn remove_member(&mut self, member: &MemberRef) {
        self.volume = (self.volume - member.volume).max(0.0);
    }

    fn absorb(&mut self, other: &mut dyn Group) {
        if let Some(other) = other.downcast_mut::<TallyGroup>() {
            self.charge += std::mem::take(&mut other.charge);
        }
    }

    fn after_split(&mut self, fragments: &mut [Box<dyn Group>]) {
        self.splits += 1;
        let buffer = std::mem::take(&mut self.charge);
        let total = self.volume + fragments.iter().map(|g| g.volume()).sum::<f64>();
        if total <= 0.0 {
            self.charge = buffer;
            return;
        }
        self.charge = buffer * self.volume / total;
        for fragment in fragments.iter_mut() {
            let share = buffer * fragment.volume() / total;
            if let Some(tally) = fragment.downcast_mut::<TallyGroup>() {
                tally.charge += share;
            }
        }
    }

    fn update(&mut self, _tick: Ticks) {
        self.updates += 1;
    }

    fn volume(&self) -> f64 {
        self.volume
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ===========================================================================
// World fixture
// ===========================================================================

/// A node graph plus the spatial index and entity allocator it reads.
///
/// Registers two kinds: `tally` and `cable`, both backed by [`TallyGroup`].
pub struct World {
    pub graph: NodeGraph,
    pub spatial: SpatialIndex,
    pub tally: GroupKindId,
    pub cable: GroupKindId,
    entities: SlotMap<EntityId, ()>,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    pub fn new() -> Self {
        let mut builder = GroupRegistryBuilder::new();
        let tally = builder
            .register("tally", || Box::new(TallyGroup::default()), Box::new(TallyGroup::default()))
            .unwrap();
        let cable = builder
            .register("cable", || Box::new(TallyGroup::default()), Box::new(TallyGroup::default()))
            .unwrap();
        Self {
            graph: NodeGraph::new(builder.build()),
            spatial: SpatialIndex::new(),
            tally,
            cable,
            entities: SlotMap::with_key(),
        }
    }

    /// Anchor a new entity at `(x, y)` with one node in slot `"pipe"`.
    pub fn spawn(&mut self, x: i32, y: i32, rotation: Rotation, spec: &NodeSpec) -> (EntityId, NodeId) {
        let entity = self.entities.insert(());
        let event = self
            .spatial
            .place_anchored(entity, TileRef::new(GridId(0), x, y), rotation)
            .unwrap();
        let node = self.graph.add_node(entity, "pipe", spec).unwrap();
        self.graph.notify(&self.spatial, entity, event);
        (entity, node)
    }

    /// A directional `tally` node of volume 1.
    pub fn pipe(&mut self, x: i32, y: i32, mask: DirectionMask) -> NodeId {
        let spec = NodeSpec::new(self.tally, 1.0).with_linker(LinkerSpec::directional(mask));
        self.spawn(x, y, Rotation::None, &spec).1
    }

    /// A straight east-west pipe run from `x0` to `x1` inclusive on row `y`.
    pub fn pipe_row(&mut self, x0: i32, x1: i32, y: i32) -> Vec<NodeId> {
        (x0..=x1)
            .map(|x| self.pipe(x, y, DirectionMask::EAST | DirectionMask::WEST))
            .collect()
    }

    pub fn despawn(&mut self, node: NodeId) {
        let entity = self.graph.node(node).unwrap().entity();
        self.graph.remove_entity(entity);
        self.spatial.remove(entity).unwrap();
        self.entities.remove(entity);
    }

    pub fn recompute(&mut self) -> Vec<GraphEvent> {
        self.graph.recompute(&self.spatial)
    }

    pub fn group(&self, node: NodeId) -> GroupId {
        self.graph.group_id(node).unwrap()
    }

    pub fn tally_of(&self, node: NodeId) -> &TallyGroup {
        self.graph.state_as::<TallyGroup>(node).unwrap()
    }

    pub fn tally_of_mut(&mut self, node: NodeId) -> &mut TallyGroup {
        self.graph.state_as_mut::<TallyGroup>(node).unwrap()
    }
}
