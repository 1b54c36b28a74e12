//! Manifold Graph -- incremental connected-component maintenance over a
//! graph of entity-attached nodes.
//!
//! Nodes are connection points on entities. Edges between them are derived
//! from pluggable edge policies ([`policy::Autolinker`]) rather than stored
//! as ground truth. Every connected component of a group kind is owned by
//! exactly one [`group::Group`], which holds the component's shared,
//! conserved state and is told about every membership change.
//!
//! # Design
//!
//! - Structural changes only queue nodes; [`engine::NodeGraph::recompute`]
//!   processes the batch once per tick.
//! - Edges are reconciled from both endpoints on every evaluation; nothing
//!   about a neighbour is cached.
//! - Splits flood-fill only from the endpoints of lost edges.
//! - Merges keep the larger group (lower id on ties).
//! - Group kinds are resolved through an explicit
//!   [`registry::GroupRegistry`] built at startup.
//! - Nodes and groups refer to each other by handle only; the engine is the
//!   single owner of both tables.

pub mod container;
pub mod engine;
pub mod event;
pub mod group;
pub mod node;
pub mod policy;
pub mod registry;
pub mod snapshot;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use container::NodeContainer;
pub use engine::{GraphError, NodeGraph};
pub use event::{GraphEvent, GraphEventKind};
pub use group::{Group, MemberRef};
pub use node::{Edge, EdgeFlags, Node, NodeSpec};
pub use policy::{
    AdjacentLinker, Autolinker, DirectionalLinker, LinkContext, LinkVerdict, LinkerSpec,
    TileLocalLinker,
};
pub use registry::{GroupFactory, GroupRegistry, GroupRegistryBuilder, RegistryError};
pub use snapshot::GraphSnapshot;
