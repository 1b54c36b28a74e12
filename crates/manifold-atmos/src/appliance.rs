//! Devices that move gas between two pipe networks each tick.
//!
//! Every appliance names its owning entity and the slots of its inlet and
//! outlet nodes, and resolves them through the graph on each run. Nothing
//! is cached across ticks: merges and splits may change which net backs a
//! node between runs.
//!
//! An appliance is a no-op when either node is missing, when either side is
//! ungrouped (it would only see the vacuum placeholder), or when both nodes
//! already share a net.

use manifold_core::id::{EntityId, NodeId};
use manifold_graph::NodeGraph;
use serde::{Deserialize, Serialize};

use crate::gas::R;
use crate::mixture::GasMixture;
use crate::pipe_net::PipeNet;

/// Pressures closer than this are treated as equal.
pub const MIN_PRESSURE_DELTA: f64 = 0.01;

/// Read-only view of one side of a transfer.
#[derive(Debug, Clone, Copy)]
struct Side {
    pressure: f64,
    temperature: f64,
    volume: f64,
    moles: f64,
}

impl Side {
    fn of(air: &GasMixture) -> Self {
        Self {
            pressure: air.pressure(),
            temperature: air.temperature(),
            volume: air.volume(),
            moles: air.total_moles(),
        }
    }
}

/// Resolve inlet and outlet to nodes in two distinct pipe nets.
fn endpoints(graph: &NodeGraph, entity: EntityId, inlet: &str, outlet: &str) -> Option<(NodeId, NodeId)> {
    let a = graph.node_by_slot(entity, inlet)?;
    let b = graph.node_by_slot(entity, outlet)?;
    let (ga, gb) = (graph.group_id(a)?, graph.group_id(b)?);
    if ga == gb {
        return None;
    }
    graph.state_as::<PipeNet>(a)?;
    graph.state_as::<PipeNet>(b)?;
    Some((a, b))
}

fn sides(graph: &NodeGraph, inlet: NodeId, outlet: NodeId) -> Option<(Side, Side)> {
    let a = Side::of(graph.state_as::<PipeNet>(inlet)?.air());
    let b = Side::of(graph.state_as::<PipeNet>(outlet)?.air());
    Some((a, b))
}

/// Move gas from `inlet` to `outlet` with one borrow at a time. Returns the
/// moles actually moved.
fn transfer(graph: &mut NodeGraph, inlet: NodeId, outlet: NodeId, take: impl FnOnce(&mut GasMixture) -> GasMixture) -> f64 {
    let Some(source) = graph.state_as_mut::<PipeNet>(inlet) else {
        return 0.0;
    };
    let parcel = take(source.air_mut());
    let moved = parcel.total_moles();
    match graph.state_as_mut::<PipeNet>(outlet) {
        Some(sink) => sink.air_mut().merge(parcel),
        None => {
            // Outlet vanished between reads; put the gas back.
            if let Some(source) = graph.state_as_mut::<PipeNet>(inlet) {
                source.air_mut().merge(parcel);
            }
            return 0.0;
        }
    }
    moved
}

// ---------------------------------------------------------------------------
// Pressure pump
// ---------------------------------------------------------------------------

/// Pushes gas until the outlet reaches `target_pressure`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PressurePump {
    pub entity: EntityId,
    pub inlet: String,
    pub outlet: String,
    pub target_pressure: f64,
    /// Upper bound on moles moved per tick.
    pub max_transfer: f64,
    #[serde(default = "enabled")]
    pub enabled: bool,
}

fn enabled() -> bool {
    true
}

impl PressurePump {
    pub fn new(entity: EntityId, inlet: &str, outlet: &str, target_pressure: f64, max_transfer: f64) -> Self {
        Self {
            entity,
            inlet: inlet.to_string(),
            outlet: outlet.to_string(),
            target_pressure,
            max_transfer,
            enabled: true,
        }
    }

    pub fn run(&self, graph: &mut NodeGraph) -> f64 {
        if !self.enabled {
            return 0.0;
        }
        let Some((inlet, outlet)) = endpoints(graph, self.entity, &self.inlet, &self.outlet) else {
            return 0.0;
        };
        let Some((input, output)) = sides(graph, inlet, outlet) else {
            return 0.0;
        };
        let delta = self.target_pressure - output.pressure;
        if delta < MIN_PRESSURE_DELTA || input.moles <= 0.0 || input.temperature <= 0.0 {
            return 0.0;
        }
        let moles = (delta * output.volume / (input.temperature * R)).min(self.max_transfer);
        transfer(graph, inlet, outlet, |air| air.remove(moles))
    }
}

// ---------------------------------------------------------------------------
// Volume pump
// ---------------------------------------------------------------------------

/// Moves a fixed volume of inlet gas per tick, unless the outlet is already
/// above `max_outlet_pressure`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumePump {
    pub entity: EntityId,
    pub inlet: String,
    pub outlet: String,
    /// Volume drawn from the inlet per tick.
    pub rate: f64,
    pub max_outlet_pressure: f64,
    #[serde(default = "enabled")]
    pub enabled: bool,
}

impl VolumePump {
    pub fn new(entity: EntityId, inlet: &str, outlet: &str, rate: f64, max_outlet_pressure: f64) -> Self {
        Self {
            entity,
            inlet: inlet.to_string(),
            outlet: outlet.to_string(),
            rate,
            max_outlet_pressure,
            enabled: true,
        }
    }

    pub fn run(&self, graph: &mut NodeGraph) -> f64 {
        if !self.enabled || self.rate <= 0.0 {
            return 0.0;
        }
        let Some((inlet, outlet)) = endpoints(graph, self.entity, &self.inlet, &self.outlet) else {
            return 0.0;
        };
        let Some((input, output)) = sides(graph, inlet, outlet) else {
            return 0.0;
        };
        if output.pressure > self.max_outlet_pressure || input.moles <= 0.0 {
            return 0.0;
        }
        let rate = self.rate;
        transfer(graph, inlet, outlet, |air| air.remove_volume(rate))
    }
}

// ---------------------------------------------------------------------------
// Passive gate
// ---------------------------------------------------------------------------

/// Lets gas flow downhill only, and only while the outlet is below
/// `target_pressure`. Moves at most half the pressure difference per tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassiveGate {
    pub entity: EntityId,
    pub inlet: String,
    pub outlet: String,
    pub target_pressure: f64,
    #[serde(default = "enabled")]
    pub enabled: bool,
}

impl PassiveGate {
    pub fn new(entity: EntityId, inlet: &str, outlet: &str, target_pressure: f64) -> Self {
        Self {
            entity,
            inlet: inlet.to_string(),
            outlet: outlet.to_string(),
            target_pressure,
            enabled: true,
        }
    }

    pub fn run(&self, graph: &mut NodeGraph) -> f64 {
        if !self.enabled {
            return 0.0;
        }
        let Some((inlet, outlet)) = endpoints(graph, self.entity, &self.inlet, &self.outlet) else {
            return 0.0;
        };
        let Some((input, output)) = sides(graph, inlet, outlet) else {
            return 0.0;
        };
        if output.pressure >= self.target_pressure.min(input.pressure) - MIN_PRESSURE_DELTA {
            return 0.0;
        }
        if input.moles <= 0.0 || input.temperature <= 0.0 {
            return 0.0;
        }
        let delta = (self.target_pressure - output.pressure).min((input.pressure - output.pressure) / 2.0);
        let moles = delta * output.volume / (input.temperature * R);
        transfer(graph, inlet, outlet, |air| air.remove(moles))
    }
}

// ---------------------------------------------------------------------------
// Appliance
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Appliance {
    PressurePump(PressurePump),
    VolumePump(VolumePump),
    PassiveGate(PassiveGate),
}

impl Appliance {
    pub fn entity(&self) -> EntityId {
        match self {
            Appliance::PressurePump(p) => p.entity,
            Appliance::VolumePump(p) => p.entity,
            Appliance::PassiveGate(g) => g.entity,
        }
    }

    /// Run one tick. Returns the moles moved.
    pub fn run(&self, graph: &mut NodeGraph) -> f64 {
        match self {
            Appliance::PressurePump(p) => p.run(graph),
            Appliance::VolumePump(p) => p.run(graph),
            Appliance::PassiveGate(g) => g.run(graph),
        }
    }
}

impl From<PressurePump> for Appliance {
    fn from(p: PressurePump) -> Self {
        Appliance::PressurePump(p)
    }
}

impl From<VolumePump> for Appliance {
    fn from(p: VolumePump) -> Self {
        Appliance::VolumePump(p)
    }
}

impl From<PassiveGate> for Appliance {
    fn from(g: PassiveGate) -> Self {
        Appliance::PassiveGate(g)
    }
}
