use crate::node::EdgeFlags;
use manifold_core::id::{GroupId, GroupKindId, NodeId};
use serde::{Deserialize, Serialize};

/// Topology and membership changes, reported in the order they happened.
///
/// Edge events name the edge once, from the endpoint that was being
/// re-evaluated; `flags` are from `a`'s point of view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GraphEvent {
    EdgeAdded {
        a: NodeId,
        b: NodeId,
        flags: EdgeFlags,
    },
    EdgeRemoved {
        a: NodeId,
        b: NodeId,
    },
    EdgeChanged {
        a: NodeId,
        b: NodeId,
        flags: EdgeFlags,
    },
    GroupCreated {
        group: GroupId,
        kind: GroupKindId,
    },
    /// `absorbed` was merged into `survivor` and disposed.
    GroupMerged {
        survivor: GroupId,
        absorbed: GroupId,
    },
    /// `source` kept the largest fragment; `fragments` are the new groups.
    GroupSplit {
        source: GroupId,
        fragments: Vec<GroupId>,
    },
    /// The group lost its last member.
    GroupDestroyed {
        group: GroupId,
    },
}

/// Discriminant for filtering events without matching on payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GraphEventKind {
    EdgeAdded,
    EdgeRemoved,
    EdgeChanged,
    GroupCreated,
    GroupMerged,
    GroupSplit,
    GroupDestroyed,
}

impl GraphEvent {
    pub fn kind(&self) -> GraphEventKind {
        match self {
            GraphEvent::EdgeAdded { .. } => GraphEventKind::EdgeAdded,
            GraphEvent::EdgeRemoved { .. } => GraphEventKind::EdgeRemoved,
            GraphEvent::EdgeChanged { .. } => GraphEventKind::EdgeChanged,
            GraphEvent::GroupCreated { .. } => GraphEventKind::GroupCreated,
            GraphEvent::GroupMerged { .. } => GraphEventKind::GroupMerged,
            GraphEvent::GroupSplit { .. } => GraphEventKind::GroupSplit,
            GraphEvent::GroupDestroyed { .. } => GraphEventKind::GroupDestroyed,
        }
    }
}
