//! Manifold Core -- shared identifiers and bookkeeping for the node-graph
//! subsystem.
//!
//! Every other manifold crate builds on the handles defined here:
//!
//! - [`id::EntityId`] -- an entity in the world that may own nodes.
//! - [`id::NodeId`] -- a single connection point on an entity.
//! - [`id::GroupId`] -- an aggregate over one connected component of nodes.
//! - [`id::GroupKindId`] -- the kind tag a group-kind registry resolves.
//! - [`id::GridId`] -- a grid the spatial index places entities on.
//!
//! Relationships between nodes and groups are always expressed through
//! these handles, never through owning pointers, so the graph engine stays
//! the sole authority that resolves and maintains them.

pub mod dirty;
pub mod id;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

/// Simulation time, measured in whole ticks.
pub type Ticks = u64;
