//! On-disk shapes for prototypes. Resolved into engine types by the loader.
//!
//! Reactions need no separate schema: [`manifold_atmos::GasReaction`] is
//! deserialized directly.

use manifold_spatial::{Direction, DirectionMask};
use manifold_graph::LinkerSpec;
use serde::Deserialize;

/// Volume given to a node whose data omits it.
pub const DEFAULT_NODE_VOLUME: f64 = 200.0;

fn default_volume() -> f64 {
    DEFAULT_NODE_VOLUME
}

fn default_true() -> bool {
    true
}

// ===========================================================================
// Prototypes
// ===========================================================================

/// An entity prototype: the nodes it carries and an optional appliance.
#[derive(Debug, Clone, Deserialize)]
pub struct PrototypeData {
    pub name: String,
    #[serde(default)]
    pub nodes: Vec<NodeData>,
    #[serde(default)]
    pub appliance: Option<ApplianceData>,
}

/// One node slot on a prototype.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeData {
    pub slot: String,
    /// Group kind name, resolved against the registry at load time.
    pub kind: String,
    #[serde(default = "default_volume")]
    pub volume: f64,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub linkers: Vec<LinkerData>,
    #[serde(default = "default_true")]
    pub need_anchored: bool,
}

/// An edge policy as written in data. Directional masks are spelled out as
/// a list of directions.
#[derive(Debug, Clone, Deserialize)]
pub enum LinkerData {
    TileLocal {
        #[serde(default)]
        tag: Option<String>,
    },
    Adjacent {
        #[serde(default)]
        tag: Option<String>,
    },
    Directional {
        directions: Vec<Direction>,
        #[serde(default = "default_true")]
        rotates: bool,
    },
}

impl LinkerData {
    pub fn to_spec(&self) -> LinkerSpec {
        match self {
            LinkerData::TileLocal { tag } => LinkerSpec::TileLocal { tag: tag.clone() },
            LinkerData::Adjacent { tag } => LinkerSpec::Adjacent { tag: tag.clone() },
            LinkerData::Directional { directions, rotates } => LinkerSpec::Directional {
                mask: DirectionMask::from_directions(directions.iter().copied()),
                rotates: *rotates,
            },
        }
    }
}

// ===========================================================================
// Appliances
// ===========================================================================

/// Appliance parameters. Slots name nodes on the same prototype.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub enum ApplianceData {
    PressurePump {
        inlet: String,
        outlet: String,
        target_pressure: f64,
        max_transfer: f64,
    },
    VolumePump {
        inlet: String,
        outlet: String,
        rate: f64,
        max_outlet_pressure: f64,
    },
    PassiveGate {
        inlet: String,
        outlet: String,
        target_pressure: f64,
    },
}

impl ApplianceData {
    pub fn slots(&self) -> [&str; 2] {
        match self {
            ApplianceData::PressurePump { inlet, outlet, .. }
            | ApplianceData::VolumePump { inlet, outlet, .. }
            | ApplianceData::PassiveGate { inlet, outlet, .. } => [inlet.as_str(), outlet.as_str()],
        }
    }
}
