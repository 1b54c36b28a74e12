//! Edge policies ("autolinkers").
//!
//! A policy attached to a node proposes edges from that node's current
//! placement and answers, for any other node, whether it wants, tolerates,
//! or refuses an edge to it. The engine evaluates every candidate edge from
//! both endpoints on every recompute:
//!
//! - the edge exists if at least one side returns [`LinkVerdict::Wanted`]
//! - and neither side returns [`LinkVerdict::Rejected`].
//!
//! Policies are pure functions of the [`LinkContext`]; they cache nothing
//! between recomputes.

use crate::container::NodeContainer;
use crate::node::{EdgeFlags, Node};
use manifold_core::id::{EntityId, NodeId};
use manifold_spatial::{DirectionMask, Rotation, SpatialIndex, StructuralEvent, TileRef};
use serde::{Deserialize, Serialize};
use slotmap::{SecondaryMap, SlotMap};
use std::fmt;

// ---------------------------------------------------------------------------
// Verdicts
// ---------------------------------------------------------------------------

/// One side's opinion of a candidate edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkVerdict {
    /// No opinion. The edge may still form if the other side wants it.
    Neutral,
    /// This side wants the edge, with any extra flags (e.g. `NO_MERGE`).
    Wanted(EdgeFlags),
    /// This side vetoes the edge.
    Rejected,
}

impl LinkVerdict {
    /// Fold the verdicts of several policies on one node. A veto wins, then
    /// any wish (flags are unioned), then indifference.
    pub fn combine(self, other: LinkVerdict) -> LinkVerdict {
        match (self, other) {
            (LinkVerdict::Rejected, _) | (_, LinkVerdict::Rejected) => LinkVerdict::Rejected,
            (LinkVerdict::Wanted(a), LinkVerdict::Wanted(b)) => LinkVerdict::Wanted(a | b),
            (LinkVerdict::Wanted(a), LinkVerdict::Neutral)
            | (LinkVerdict::Neutral, LinkVerdict::Wanted(a)) => LinkVerdict::Wanted(a),
            (LinkVerdict::Neutral, LinkVerdict::Neutral) => LinkVerdict::Neutral,
        }
    }
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Read-only view of the world handed to policies during a recompute.
pub struct LinkContext<'a> {
    spatial: &'a SpatialIndex,
    nodes: &'a SlotMap<NodeId, Node>,
    containers: &'a SecondaryMap<EntityId, NodeContainer>,
}

impl<'a> LinkContext<'a> {
    pub(crate) fn new(
        spatial: &'a SpatialIndex,
        nodes: &'a SlotMap<NodeId, Node>,
        containers: &'a SecondaryMap<EntityId, NodeContainer>,
    ) -> Self {
        Self {
            spatial,
            nodes,
            containers,
        }
    }

    pub fn node(&self, id: NodeId) -> Option<&'a Node> {
        self.nodes.get(id)
    }

    /// The tile a node links from, or `None` if its entity is not placed or
    /// the node needs anchoring and the entity is loose.
    pub fn tile_of(&self, id: NodeId) -> Option<TileRef> {
        let node = self.nodes.get(id)?;
        let placement = self.spatial.placement(node.entity)?;
        if node.need_anchored && !placement.anchored {
            return None;
        }
        Some(placement.tile)
    }

    pub fn rotation_of(&self, id: NodeId) -> Rotation {
        self.nodes
            .get(id)
            .and_then(|node| self.spatial.placement(node.entity))
            .map(|placement| placement.rotation)
            .unwrap_or_default()
    }

    /// Nodes of every entity anchored on `tile`.
    pub fn nodes_on_tile(&self, tile: TileRef) -> impl Iterator<Item = NodeId> + 'a {
        let containers = self.containers;
        self.spatial
            .anchored_at(tile)
            .filter_map(move |entity| containers.get(entity))
            .flat_map(|container| container.nodes())
    }

    /// Union of the direction masks every policy on `id` currently exposes.
    pub fn direction_mask(&self, id: NodeId) -> DirectionMask {
        self.nodes.get(id).map_or(DirectionMask::NONE, |node| {
            node.linkers
                .iter()
                .fold(DirectionMask::NONE, |mask, linker| {
                    mask | linker.direction_mask(self, id)
                })
        })
    }

    /// Same kind, distinct nodes, and `other` carries `tag` when one is given.
    pub fn compatible(&self, node: NodeId, other: NodeId, tag: Option<&str>) -> bool {
        if node == other {
            return false;
        }
        let (Some(a), Some(b)) = (self.nodes.get(node), self.nodes.get(other)) else {
            return false;
        };
        a.kind == b.kind && tag.is_none_or(|t| b.tag.as_deref() == Some(t))
    }
}

// ---------------------------------------------------------------------------
// Policy trait
// ---------------------------------------------------------------------------

/// A rule attached to a node that proposes edges from spatial criteria.
pub trait Autolinker: fmt::Debug {
    /// Push every node this policy might want an edge to. Candidates are
    /// filtered through [`check`](Autolinker::check) from both sides, so a
    /// loose superset is fine.
    fn candidates(&self, ctx: &LinkContext<'_>, node: NodeId, out: &mut Vec<NodeId>);

    /// This policy's verdict on an edge between `node` (its owner) and `other`.
    fn check(&self, ctx: &LinkContext<'_>, node: NodeId, other: NodeId) -> LinkVerdict;

    /// Directions this policy currently opens towards, after rotation.
    fn direction_mask(&self, _ctx: &LinkContext<'_>, _node: NodeId) -> DirectionMask {
        DirectionMask::NONE
    }

    /// Whether `event` on the owning entity could change this policy's edges.
    fn subscribes(&self, event: StructuralEvent) -> bool;
}

fn placement_event(event: StructuralEvent) -> bool {
    matches!(
        event,
        StructuralEvent::AnchorChanged | StructuralEvent::Moved | StructuralEvent::ReAnchored
    )
}

// ---------------------------------------------------------------------------
// Tile-local
// ---------------------------------------------------------------------------

/// Links to every compatible node anchored on the same tile.
#[derive(Debug, Clone, Default)]
pub struct TileLocalLinker {
    pub tag: Option<String>,
}

impl Autolinker for TileLocalLinker {
    fn candidates(&self, ctx: &LinkContext<'_>, node: NodeId, out: &mut Vec<NodeId>) {
        if let Some(tile) = ctx.tile_of(node) {
            out.extend(ctx.nodes_on_tile(tile));
        }
    }

    fn check(&self, ctx: &LinkContext<'_>, node: NodeId, other: NodeId) -> LinkVerdict {
        let same_tile = match (ctx.tile_of(node), ctx.tile_of(other)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        };
        if same_tile && ctx.compatible(node, other, self.tag.as_deref()) {
            LinkVerdict::Wanted(EdgeFlags::NONE)
        } else {
            LinkVerdict::Neutral
        }
    }

    fn subscribes(&self, event: StructuralEvent) -> bool {
        placement_event(event)
    }
}

// ---------------------------------------------------------------------------
// Adjacent
// ---------------------------------------------------------------------------

/// Links to compatible nodes on any of the four neighbouring tiles.
#[derive(Debug, Clone, Default)]
pub struct AdjacentLinker {
    pub tag: Option<String>,
}

impl Autolinker for AdjacentLinker {
    fn candidates(&self, ctx: &LinkContext<'_>, node: NodeId, out: &mut Vec<NodeId>) {
        let Some(tile) = ctx.tile_of(node) else {
            return;
        };
        for dir in manifold_spatial::Direction::all() {
            out.extend(ctx.nodes_on_tile(tile.neighbor(dir)));
        }
    }

    fn check(&self, ctx: &LinkContext<'_>, node: NodeId, other: NodeId) -> LinkVerdict {
        let adjacent = match (ctx.tile_of(node), ctx.tile_of(other)) {
            (Some(a), Some(b)) => a.direction_to(&b).is_some(),
            _ => false,
        };
        if adjacent && ctx.compatible(node, other, self.tag.as_deref()) {
            LinkVerdict::Wanted(EdgeFlags::NONE)
        } else {
            LinkVerdict::Neutral
        }
    }

    fn subscribes(&self, event: StructuralEvent) -> bool {
        placement_event(event)
    }
}

// ---------------------------------------------------------------------------
// Directional
// ---------------------------------------------------------------------------

/// Links through the sides named by a direction mask.
///
/// An edge towards direction `d` forms only when the neighbour's own mask
/// contains `d.opposite()`. Sides outside the owner's mask are closed:
/// links arriving there are vetoed, whatever policy proposes them.
#[derive(Debug, Clone)]
pub struct DirectionalLinker {
    pub mask: DirectionMask,
    /// Rotate the mask by the owning entity's facing.
    pub rotates: bool,
}

impl DirectionalLinker {
    fn effective_mask(&self, ctx: &LinkContext<'_>, node: NodeId) -> DirectionMask {
        if self.rotates {
            self.mask.rotated(ctx.rotation_of(node))
        } else {
            self.mask
        }
    }
}

impl Autolinker for DirectionalLinker {
    fn candidates(&self, ctx: &LinkContext<'_>, node: NodeId, out: &mut Vec<NodeId>) {
        let Some(tile) = ctx.tile_of(node) else {
            return;
        };
        for dir in self.effective_mask(ctx, node).iter() {
            out.extend(ctx.nodes_on_tile(tile.neighbor(dir)));
        }
    }

    fn check(&self, ctx: &LinkContext<'_>, node: NodeId, other: NodeId) -> LinkVerdict {
        let (Some(here), Some(there)) = (ctx.tile_of(node), ctx.tile_of(other)) else {
            return LinkVerdict::Neutral;
        };
        let Some(dir) = here.direction_to(&there) else {
            return LinkVerdict::Neutral;
        };
        if !ctx.compatible(node, other, None) {
            return LinkVerdict::Neutral;
        }
        if !ctx.direction_mask(node).contains(dir) {
            return LinkVerdict::Rejected;
        }
        if self.effective_mask(ctx, node).contains(dir)
            && ctx.direction_mask(other).contains(dir.opposite())
        {
            LinkVerdict::Wanted(EdgeFlags::NONE)
        } else {
            LinkVerdict::Neutral
        }
    }

    fn direction_mask(&self, ctx: &LinkContext<'_>, node: NodeId) -> DirectionMask {
        self.effective_mask(ctx, node)
    }

    fn subscribes(&self, event: StructuralEvent) -> bool {
        self.rotates || event != StructuralEvent::Rotated
    }
}

// ---------------------------------------------------------------------------
// Declarative spec
// ---------------------------------------------------------------------------

/// Serializable description of a built-in policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LinkerSpec {
    TileLocal {
        #[serde(default)]
        tag: Option<String>,
    },
    Adjacent {
        #[serde(default)]
        tag: Option<String>,
    },
    Directional {
        mask: DirectionMask,
        #[serde(default = "default_rotates")]
        rotates: bool,
    },
}

fn default_rotates() -> bool {
    true
}

impl LinkerSpec {
    pub fn tile_local() -> Self {
        LinkerSpec::TileLocal { tag: None }
    }

    pub fn adjacent() -> Self {
        LinkerSpec::Adjacent { tag: None }
    }

    pub fn directional(mask: DirectionMask) -> Self {
        LinkerSpec::Directional {
            mask,
            rotates: true,
        }
    }

    /// Reason this spec cannot be built, if any.
    pub fn validate(&self) -> Result<(), &'static str> {
        match self {
            LinkerSpec::Directional { mask, .. } if mask.is_empty() => {
                Err("directional policy with an empty direction mask")
            }
            LinkerSpec::TileLocal { tag: Some(tag) } | LinkerSpec::Adjacent { tag: Some(tag) }
                if tag.is_empty() =>
            {
                Err("empty tag filter")
            }
            _ => Ok(()),
        }
    }

    pub fn build(&self) -> Box<dyn Autolinker> {
        match self {
            LinkerSpec::TileLocal { tag } => Box::new(TileLocalLinker { tag: tag.clone() }),
            LinkerSpec::Adjacent { tag } => Box::new(AdjacentLinker { tag: tag.clone() }),
            LinkerSpec::Directional { mask, rotates } => Box::new(DirectionalLinker {
                mask: *mask,
                rotates: *rotates,
            }),
        }
    }
}
