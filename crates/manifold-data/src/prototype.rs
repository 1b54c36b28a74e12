//! Resolved prototypes, ready to be stamped onto entities.

use std::collections::BTreeMap;

use manifold_atmos::{Appliance, PassiveGate, PressurePump, VolumePump};
use manifold_core::id::{EntityId, NodeId};
use manifold_graph::{GraphError, NodeGraph, NodeSpec};

use crate::schema::ApplianceData;

/// An entity prototype whose group kinds and policies have been validated.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityPrototype {
    pub name: String,
    /// `(slot, spec)` in file order.
    pub nodes: Vec<(String, NodeSpec)>,
    pub appliance: Option<ApplianceData>,
}

impl EntityPrototype {
    /// Add this prototype's nodes to `entity`. Either every node is added or,
    /// on error, none are.
    pub fn attach(&self, graph: &mut NodeGraph, entity: EntityId) -> Result<Vec<NodeId>, GraphError> {
        let mut added = Vec::with_capacity(self.nodes.len());
        for (slot, spec) in &self.nodes {
            match graph.add_node(entity, slot, spec) {
                Ok(id) => added.push(id),
                Err(err) => {
                    for id in added {
                        let _ = graph.remove_node(id);
                    }
                    return Err(err);
                }
            }
        }
        Ok(added)
    }

    /// The appliance this prototype drives, bound to `entity`.
    pub fn appliance_for(&self, entity: EntityId) -> Option<Appliance> {
        let appliance = match self.appliance.as_ref()? {
            ApplianceData::PressurePump {
                inlet,
                outlet,
                target_pressure,
                max_transfer,
            } => PressurePump::new(entity, inlet, outlet, *target_pressure, *max_transfer).into(),
            ApplianceData::VolumePump {
                inlet,
                outlet,
                rate,
                max_outlet_pressure,
            } => VolumePump::new(entity, inlet, outlet, *rate, *max_outlet_pressure).into(),
            ApplianceData::PassiveGate {
                inlet,
                outlet,
                target_pressure,
            } => PassiveGate::new(entity, inlet, outlet, *target_pressure).into(),
        };
        Some(appliance)
    }
}

/// All loaded prototypes, by name.
#[derive(Debug, Clone, Default)]
pub struct PrototypeSet {
    by_name: BTreeMap<String, EntityPrototype>,
}

impl PrototypeSet {
    pub(crate) fn insert(&mut self, prototype: EntityPrototype) {
        self.by_name.insert(prototype.name.clone(), prototype);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&EntityPrototype> {
        self.by_name.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &EntityPrototype> {
        self.by_name.values()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}
