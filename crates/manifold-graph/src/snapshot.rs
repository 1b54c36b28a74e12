//! Read-only export of node placement and group membership for overlays
//! and external tooling.

use crate::engine::NodeGraph;
use crate::node::Edge;
use manifold_core::id::{EntityId, GroupId, GroupKindId, NodeId};
use manifold_spatial::{SpatialIndex, TileRef};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub id: NodeId,
    pub entity: EntityId,
    pub slot: String,
    pub kind: GroupKindId,
    pub tile: Option<TileRef>,
    pub group: Option<GroupId>,
    pub edges: Vec<Edge>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSnapshot {
    pub id: GroupId,
    pub kind: GroupKindId,
    pub volume: f64,
    pub members: Vec<NodeId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<NodeSnapshot>,
    pub groups: Vec<GroupSnapshot>,
}

impl GraphSnapshot {
    /// Capture the graph as it stands. Pending (not yet recomputed) changes
    /// are not reflected in edges or groups.
    pub fn capture(graph: &NodeGraph, spatial: &SpatialIndex) -> Self {
        let nodes = graph
            .nodes()
            .map(|(id, node)| NodeSnapshot {
                id,
                entity: node.entity(),
                slot: node.slot().to_string(),
                kind: node.kind(),
                tile: spatial.placement(node.entity()).map(|p| p.tile),
                group: node.group(),
                edges: node.edges().to_vec(),
            })
            .collect();
        let groups = graph
            .group_ids()
            .filter_map(|id| {
                Some(GroupSnapshot {
                    id,
                    kind: graph.group_kind(id)?,
                    volume: graph.group(id)?.volume(),
                    members: graph.members(id)?.iter().copied().collect(),
                })
            })
            .collect();
        Self { nodes, groups }
    }

    pub fn group_of(&self, node: NodeId) -> Option<&GroupSnapshot> {
        let gid = self.nodes.iter().find(|n| n.id == node)?.group?;
        self.groups.iter().find(|g| g.id == gid)
    }
}
