//! Shared fixtures for atmos unit tests, integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]`.

use std::sync::Arc;

use manifold_core::id::{EntityId, GridId, GroupKindId, NodeId};
use manifold_graph::{GroupRegistryBuilder, LinkerSpec, NodeGraph, NodeSpec};
use manifold_spatial::{DirectionMask, Rotation, SpatialIndex, TileRef};
use slotmap::SlotMap;

use crate::gas::Gas;
use crate::mixture::GasMixture;
use crate::pipe_net::{PipeNet, register_pipe_kind};
use crate::reaction::ReactionSet;

/// A node graph with one `gas_pipe` kind, plus the spatial index it reads.
pub struct PipeWorld {
    pub graph: NodeGraph,
    pub spatial: SpatialIndex,
    pub pipe: GroupKindId,
    entities: SlotMap<EntityId, ()>,
}

impl Default for PipeWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl PipeWorld {
    pub fn new() -> Self {
        Self::with_reactions(ReactionSet::standard())
    }

    pub fn with_reactions(reactions: ReactionSet) -> Self {
        let mut builder = GroupRegistryBuilder::new();
        let pipe = register_pipe_kind(&mut builder, "gas_pipe", Arc::new(reactions)).unwrap();
        Self {
            graph: NodeGraph::new(builder.build()),
            spatial: SpatialIndex::new(),
            pipe,
            entities: SlotMap::with_key(),
        }
    }

    /// Anchor a new entity at `(x, y)` carrying the given `(slot, spec)` nodes.
    pub fn spawn(&mut self, x: i32, y: i32, nodes: &[(&str, NodeSpec)]) -> EntityId {
        let entity = self.entities.insert(());
        let event = self
            .spatial
            .place_anchored(entity, TileRef::new(GridId(0), x, y), Rotation::None)
            .unwrap();
        for (slot, spec) in nodes {
            self.graph.add_node(entity, slot, spec).unwrap();
        }
        self.graph.notify(&self.spatial, entity, event);
        entity
    }

    /// A one-volume directional pipe in slot `"pipe"`.
    pub fn pipe(&mut self, x: i32, y: i32, mask: DirectionMask) -> NodeId {
        let spec = NodeSpec::new(self.pipe, 1.0).with_linker(LinkerSpec::directional(mask));
        let entity = self.spawn(x, y, &[("pipe", spec)]);
        self.graph.node_by_slot(entity, "pipe").unwrap()
    }

    /// A straight east-west run from `x0` to `x1` inclusive.
    pub fn pipe_row(&mut self, x0: i32, x1: i32, y: i32) -> Vec<NodeId> {
        (x0..=x1)
            .map(|x| self.pipe(x, y, DirectionMask::EAST | DirectionMask::WEST))
            .collect()
    }

    /// A two-port device: `"inlet"` faces west, `"outlet"` faces east.
    pub fn device(&mut self, x: i32, y: i32) -> EntityId {
        let inlet = NodeSpec::new(self.pipe, 1.0).with_linker(LinkerSpec::directional(DirectionMask::WEST));
        let outlet = NodeSpec::new(self.pipe, 1.0).with_linker(LinkerSpec::directional(DirectionMask::EAST));
        self.spawn(x, y, &[("inlet", inlet), ("outlet", outlet)])
    }

    pub fn despawn(&mut self, entity: EntityId) {
        self.graph.remove_entity(entity);
        self.spatial.remove(entity).unwrap();
        self.entities.remove(entity);
    }

    pub fn despawn_node(&mut self, node: NodeId) {
        let entity = self.graph.node(node).unwrap().entity();
        self.despawn(entity);
    }

    /// Hand the graph and spatial index to a longer-lived owner.
    pub fn into_parts(self) -> (NodeGraph, SpatialIndex) {
        (self.graph, self.spatial)
    }

    pub fn recompute(&mut self) {
        self.graph.recompute(&self.spatial);
    }

    /// Set one gas in the net behind `node`.
    pub fn fill_node(&mut self, node: NodeId, gas: Gas, moles: f64, temperature: f64) {
        let net = self.graph.state_as_mut::<PipeNet>(node).unwrap();
        net.air_mut().set_moles(gas, moles);
        net.air_mut().set_temperature(temperature);
    }

    pub fn fill(&mut self, entity: EntityId, slot: &str, gas: Gas, moles: f64, temperature: f64) {
        let node = self.graph.node_by_slot(entity, slot).unwrap();
        self.fill_node(node, gas, moles, temperature);
    }

    /// The mixture a node sees, the vacuum placeholder included.
    pub fn air_of(&self, node: NodeId) -> &GasMixture {
        self.graph
            .group_of(node)
            .and_then(|g| g.downcast_ref::<PipeNet>())
            .unwrap()
            .air()
    }

    pub fn air_at(&self, entity: EntityId, slot: &str) -> &GasMixture {
        self.air_of(self.graph.node_by_slot(entity, slot).unwrap())
    }

    /// Moles summed over every live net.
    pub fn total_moles(&self) -> f64 {
        self.nets().map(|net| net.air().total_moles()).sum()
    }

    /// Thermal energy summed over every live net.
    pub fn total_energy(&self) -> f64 {
        self.nets().map(|net| net.air().thermal_energy()).sum()
    }

    fn nets(&self) -> impl Iterator<Item = &PipeNet> + '_ {
        self.graph
            .group_ids()
            .filter_map(|gid| self.graph.group(gid)?.downcast_ref::<PipeNet>())
    }
}
