//! Per-tick driver for pipe networks and the appliances attached to them.

use manifold_core::Ticks;
use manifold_core::id::EntityId;
use manifold_graph::{GraphEvent, NodeGraph};
use manifold_spatial::SpatialIndex;
use serde::{Deserialize, Serialize};

use crate::appliance::Appliance;

/// What one tick did.
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    pub tick: Ticks,
    /// Graph events from this tick's recompute, in emission order.
    pub events: Vec<GraphEvent>,
    /// Moles moved by each appliance, in registration order.
    pub transfers: Vec<f64>,
}

impl TickReport {
    pub fn moved(&self) -> f64 {
        self.transfers.iter().sum()
    }
}

/// Index of an appliance within its [`AtmosSystem`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ApplianceId(pub u32);

/// Owns the node graph and the appliances, and runs them in the fixed
/// order: recompute, then group updates, then appliances.
///
/// Structural changes made between ticks only queue work; nothing touches
/// groups until the next [`tick`](Self::tick).
#[derive(Debug)]
pub struct AtmosSystem {
    graph: NodeGraph,
    appliances: Vec<Option<Appliance>>,
    current_tick: Ticks,
}

impl AtmosSystem {
    pub fn new(graph: NodeGraph) -> Self {
        Self {
            graph,
            appliances: Vec::new(),
            current_tick: 0,
        }
    }

    pub fn graph(&self) -> &NodeGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut NodeGraph {
        &mut self.graph
    }

    pub fn current_tick(&self) -> Ticks {
        self.current_tick
    }

    pub fn add_appliance(&mut self, appliance: impl Into<Appliance>) -> ApplianceId {
        let id = ApplianceId(self.appliances.len() as u32);
        self.appliances.push(Some(appliance.into()));
        id
    }

    pub fn appliance(&self, id: ApplianceId) -> Option<&Appliance> {
        self.appliances.get(id.0 as usize)?.as_ref()
    }

    pub fn appliance_mut(&mut self, id: ApplianceId) -> Option<&mut Appliance> {
        self.appliances.get_mut(id.0 as usize)?.as_mut()
    }

    pub fn remove_appliance(&mut self, id: ApplianceId) -> Option<Appliance> {
        self.appliances.get_mut(id.0 as usize)?.take()
    }

    /// Remove every appliance owned by `entity`. Returns how many went.
    pub fn remove_appliances_of(&mut self, entity: EntityId) -> usize {
        let mut removed = 0;
        for slot in &mut self.appliances {
            if slot.as_ref().is_some_and(|a| a.entity() == entity) {
                *slot = None;
                removed += 1;
            }
        }
        removed
    }

    pub fn appliance_count(&self) -> usize {
        self.appliances.iter().flatten().count()
    }

    /// Advance one tick.
    pub fn tick(&mut self, spatial: &SpatialIndex) -> TickReport {
        self.current_tick += 1;
        let tick = self.current_tick;

        let events = self.graph.recompute(spatial);
        self.graph.update_groups(tick);
        let transfers: Vec<f64> = self
            .appliances
            .iter()
            .flatten()
            .map(|appliance| appliance.run(&mut self.graph))
            .collect();

        tracing::debug!(
            tick,
            events = events.len(),
            appliances = transfers.len(),
            "atmos tick"
        );
        TickReport {
            tick,
            events,
            transfers,
        }
    }
}
