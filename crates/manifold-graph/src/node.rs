//! Nodes, half-edges, and edge flags.

use crate::policy::{Autolinker, LinkerSpec};
use manifold_core::id::{EntityId, GroupId, GroupKindId, NodeId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign, Not};

// ---------------------------------------------------------------------------
// Edge flags
// ---------------------------------------------------------------------------

/// Properties of an edge as seen from one endpoint.
///
/// `IN`/`OUT` record which side's policies want the edge; they are swapped
/// when the same edge is viewed from the other endpoint.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct EdgeFlags(u8);

impl EdgeFlags {
    pub const NONE: EdgeFlags = EdgeFlags(0);
    /// The edge exists but does not join the endpoints' groups.
    pub const NO_MERGE: EdgeFlags = EdgeFlags(1 << 0);
    /// Maintained by edge policies.
    pub const AUTO: EdgeFlags = EdgeFlags(1 << 1);
    /// Managed externally; policy re-evaluation never removes it.
    pub const MANUAL: EdgeFlags = EdgeFlags(1 << 2);
    /// This endpoint's policies want the edge.
    pub const OUT: EdgeFlags = EdgeFlags(1 << 3);
    /// The other endpoint's policies want the edge.
    pub const IN: EdgeFlags = EdgeFlags(1 << 4);

    /// Bits that describe who created the edge.
    pub const SOURCE_MASK: EdgeFlags = EdgeFlags(0b1_1110);

    pub fn contains(self, other: EdgeFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn intersects(self, other: EdgeFlags) -> bool {
        self.0 & other.0 != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Whether the edge joins the two endpoints' groups.
    pub fn merges(self) -> bool {
        !self.contains(Self::NO_MERGE)
    }

    /// The same edge seen from the other endpoint.
    pub fn invert(self) -> EdgeFlags {
        let mut out = self & !(Self::IN | Self::OUT);
        if self.contains(Self::IN) {
            out |= Self::OUT;
        }
        if self.contains(Self::OUT) {
            out |= Self::IN;
        }
        out
    }
}

impl BitOr for EdgeFlags {
    type Output = EdgeFlags;

    fn bitor(self, rhs: EdgeFlags) -> EdgeFlags {
        EdgeFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for EdgeFlags {
    fn bitor_assign(&mut self, rhs: EdgeFlags) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for EdgeFlags {
    type Output = EdgeFlags;

    fn bitand(self, rhs: EdgeFlags) -> EdgeFlags {
        EdgeFlags(self.0 & rhs.0)
    }
}

impl Not for EdgeFlags {
    type Output = EdgeFlags;

    fn not(self) -> EdgeFlags {
        EdgeFlags(!self.0 & 0b1_1111)
    }
}

impl fmt::Debug for EdgeFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(EdgeFlags, &str); 5] = [
            (EdgeFlags::NO_MERGE, "NO_MERGE"),
            (EdgeFlags::AUTO, "AUTO"),
            (EdgeFlags::MANUAL, "MANUAL"),
            (EdgeFlags::OUT, "OUT"),
            (EdgeFlags::IN, "IN"),
        ];
        if self.is_empty() {
            return f.write_str("EdgeFlags(NONE)");
        }
        let names: Vec<&str> = NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "EdgeFlags({})", names.join(" | "))
    }
}

// ---------------------------------------------------------------------------
// Half-edge
// ---------------------------------------------------------------------------

/// One endpoint's view of an edge. Every edge is stored on both endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub to: NodeId,
    pub flags: EdgeFlags,
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// Everything needed to attach a node to an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub kind: GroupKindId,
    /// Volume this node contributes to its group.
    #[serde(default)]
    pub volume: f64,
    /// Optional tag that tag-filtered policies match against.
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub linkers: Vec<LinkerSpec>,
    /// When set, policies only run while the owning entity is anchored.
    #[serde(default = "default_need_anchored")]
    pub need_anchored: bool,
}

fn default_need_anchored() -> bool {
    true
}

impl NodeSpec {
    pub fn new(kind: GroupKindId, volume: f64) -> Self {
        Self {
            kind,
            volume,
            tag: None,
            linkers: Vec::new(),
            need_anchored: true,
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_linker(mut self, linker: LinkerSpec) -> Self {
        self.linkers.push(linker);
        self
    }

    pub fn loose(mut self) -> Self {
        self.need_anchored = false;
        self
    }
}

/// A connection point on an entity.
pub struct Node {
    pub(crate) entity: EntityId,
    pub(crate) slot: String,
    pub(crate) kind: GroupKindId,
    pub(crate) tag: Option<String>,
    pub(crate) volume: f64,
    pub(crate) need_anchored: bool,
    pub(crate) connections_enabled: bool,
    pub(crate) linkers: Vec<Box<dyn Autolinker>>,
    pub(crate) edges: Vec<Edge>,
    pub(crate) group: Option<GroupId>,
}

impl Node {
    pub fn entity(&self) -> EntityId {
        self.entity
    }

    /// Name of the slot this node occupies in its entity's container.
    pub fn slot(&self) -> &str {
        &self.slot
    }

    pub fn kind(&self) -> GroupKindId {
        self.kind
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn need_anchored(&self) -> bool {
        self.need_anchored
    }

    pub fn connections_enabled(&self) -> bool {
        self.connections_enabled
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn group(&self) -> Option<GroupId> {
        self.group
    }

    pub fn linkers(&self) -> &[Box<dyn Autolinker>] {
        &self.linkers
    }

    pub(crate) fn edge_to(&self, other: NodeId) -> Option<EdgeFlags> {
        self.edges.iter().find(|e| e.to == other).map(|e| e.flags)
    }

    /// Neighbours this node shares a group with, for flood fills.
    pub(crate) fn merge_neighbors(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.edges
            .iter()
            .filter(|e| e.flags.merges())
            .map(|e| e.to)
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("entity", &self.entity)
            .field("slot", &self.slot)
            .field("kind", &self.kind)
            .field("tag", &self.tag)
            .field("volume", &self.volume)
            .field("edges", &self.edges)
            .field("group", &self.group)
            .finish_non_exhaustive()
    }
}
