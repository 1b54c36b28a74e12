//! The node graph: edge maintenance and connected-component bookkeeping.
//!
//! Structural changes never recompute anything on the spot. They queue the
//! affected nodes, and [`NodeGraph::recompute`] processes the whole batch
//! at a fixed point in the tick:
//!
//! 1. **Edges** -- every dirty node asks its policies for candidates and
//!    reconciles each candidate (and each existing edge) from both sides.
//! 2. **Splits** -- groups that lost an internal edge are flood-filled from
//!    the endpoints of the lost edges only. A group still connected costs
//!    no group-level work.
//! 3. **New nodes** -- nodes without a group flood through other ungrouped
//!    nodes and either join the largest adjacent group or found a new one.
//! 4. **Merges** -- nodes that gained an edge into a different group pull
//!    the two groups together. The larger group survives; on equal size the
//!    lower [`GroupId`] survives.

use crate::container::NodeContainer;
use crate::event::GraphEvent;
use crate::group::{Group, MemberRef};
use crate::node::{EdgeFlags, Node, NodeSpec};
use crate::policy::{Autolinker, LinkContext, LinkVerdict, LinkerSpec};
use crate::registry::{GroupRegistry, RegistryError};
use manifold_core::Ticks;
use manifold_core::dirty::DirtyQueue;
use manifold_core::id::{EntityId, GroupId, GroupKindId, NodeId};
use manifold_spatial::{SpatialIndex, StructuralEvent};
use slotmap::{SecondaryMap, SlotMap};
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("node not found: {0:?}")]
    NodeNotFound(NodeId),
    #[error("entity {entity:?} already has a node in slot {slot:?}")]
    DuplicateSlot { entity: EntityId, slot: String },
    #[error("invalid policy on slot {slot:?}: {reason}")]
    InvalidPolicy { slot: String, reason: &'static str },
    #[error("invalid node volume: {0}")]
    InvalidVolume(f64),
    #[error("a node cannot be linked to itself")]
    SelfEdge,
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

// ---------------------------------------------------------------------------
// Group storage
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct GroupSlot {
    kind: GroupKindId,
    members: BTreeSet<NodeId>,
    state: Box<dyn Group>,
}

fn member_ref(nodes: &SlotMap<NodeId, Node>, id: NodeId) -> Option<MemberRef> {
    nodes.get(id).map(|node| MemberRef {
        node: id,
        entity: node.entity,
        volume: node.volume,
    })
}

type EdgeChange = (NodeId, Option<EdgeFlags>, Option<EdgeFlags>);

// ---------------------------------------------------------------------------
// NodeGraph
// ---------------------------------------------------------------------------

/// Owns every node, edge, and group, and is the sole authority that keeps
/// groups equal to the connected components of the graph.
#[derive(Debug)]
pub struct NodeGraph {
    registry: GroupRegistry,
    nodes: SlotMap<NodeId, Node>,
    containers: SecondaryMap<EntityId, NodeContainer>,
    groups: SlotMap<GroupId, GroupSlot>,
    dirty: DirtyQueue,
    /// Nodes that have not been assigned a group yet.
    ungrouped: BTreeSet<NodeId>,
    /// Endpoints of lost intra-group edges, per group.
    split_seeds: BTreeMap<GroupId, BTreeSet<NodeId>>,
    /// Endpoints of gained edges that cross a group boundary.
    merge_seeds: BTreeSet<NodeId>,
    events: Vec<GraphEvent>,
}

impl NodeGraph {
    pub fn new(registry: GroupRegistry) -> Self {
        Self {
            registry,
            nodes: SlotMap::with_key(),
            containers: SecondaryMap::new(),
            groups: SlotMap::with_key(),
            dirty: DirtyQueue::new(),
            ungrouped: BTreeSet::new(),
            split_seeds: BTreeMap::new(),
            merge_seeds: BTreeSet::new(),
            events: Vec::new(),
        }
    }

    pub fn registry(&self) -> &GroupRegistry {
        &self.registry
    }

    // -- Node lifecycle --

    /// Attach a node to `entity` under `slot`. The node has no group and no
    /// edges until the next [`recompute`](Self::recompute).
    pub fn add_node(
        &mut self,
        entity: EntityId,
        slot: &str,
        spec: &NodeSpec,
    ) -> Result<NodeId, GraphError> {
        if !self.registry.contains(spec.kind) {
            return Err(RegistryError::UnregisteredKind(spec.kind).into());
        }
        if !spec.volume.is_finite() || spec.volume < 0.0 {
            return Err(GraphError::InvalidVolume(spec.volume));
        }
        for linker in &spec.linkers {
            linker.validate().map_err(|reason| GraphError::InvalidPolicy {
                slot: slot.to_string(),
                reason,
            })?;
        }
        if self
            .containers
            .get(entity)
            .is_some_and(|container| container.contains(slot))
        {
            return Err(GraphError::DuplicateSlot {
                entity,
                slot: slot.to_string(),
            });
        }

        let id = self.nodes.insert(Node {
            entity,
            slot: slot.to_string(),
            kind: spec.kind,
            tag: spec.tag.clone(),
            volume: spec.volume,
            need_anchored: spec.need_anchored,
            connections_enabled: true,
            linkers: spec.linkers.iter().map(LinkerSpec::build).collect(),
            edges: Vec::new(),
            group: None,
        });
        match self.containers.get_mut(entity) {
            Some(container) => container.insert(slot, id),
            None => {
                let mut container = NodeContainer::default();
                container.insert(slot, id);
                self.containers.insert(entity, container);
            }
        }
        self.ungrouped.insert(id);
        self.dirty.mark(id);
        tracing::trace!(?id, ?entity, slot, "node added");
        Ok(id)
    }

    /// Attach a custom policy to an existing node.
    pub fn add_linker(
        &mut self,
        node: NodeId,
        linker: Box<dyn Autolinker>,
    ) -> Result<(), GraphError> {
        let entry = self
            .nodes
            .get_mut(node)
            .ok_or(GraphError::NodeNotFound(node))?;
        entry.linkers.push(linker);
        self.dirty.mark(node);
        Ok(())
    }

    /// Destroy a node: drop its edges, detach it from its group, and forget
    /// any pending work for it. Returns the node's final state.
    pub fn remove_node(&mut self, id: NodeId) -> Result<Node, GraphError> {
        let neighbors: Vec<NodeId> = self
            .nodes
            .get(id)
            .ok_or(GraphError::NodeNotFound(id))?
            .edges
            .iter()
            .map(|e| e.to)
            .collect();
        for other in neighbors {
            let old = self.nodes.get(id).and_then(|n| n.edge_to(other));
            self.apply_edge(id, other, old, None);
        }

        let node = self.nodes.remove(id).ok_or(GraphError::NodeNotFound(id))?;
        self.dirty.forget(id);
        self.ungrouped.remove(&id);
        self.merge_seeds.remove(&id);
        if let Some(container) = self.containers.get_mut(node.entity) {
            container.remove(&node.slot);
            if container.is_empty() {
                self.containers.remove(node.entity);
            }
        }
        if let Some(gid) = node.group {
            let member = MemberRef {
                node: id,
                entity: node.entity,
                volume: node.volume,
            };
            self.detach_member(gid, &member);
        }
        tracing::trace!(?id, entity = ?node.entity, "node removed");
        Ok(node)
    }

    /// Destroy every node owned by `entity`. Returns how many were removed.
    pub fn remove_entity(&mut self, entity: EntityId) -> usize {
        let ids: Vec<NodeId> = self
            .containers
            .get(entity)
            .map(|container| container.nodes().collect())
            .unwrap_or_default();
        ids.into_iter()
            .filter(|id| self.remove_node(*id).is_ok())
            .count()
    }

    fn detach_member(&mut self, gid: GroupId, member: &MemberRef) {
        let Some(slot) = self.groups.get_mut(gid) else {
            return;
        };
        slot.state.remove_member(member);
        slot.members.remove(&member.node);
        if slot.members.is_empty() {
            self.groups.remove(gid);
            self.split_seeds.remove(&gid);
            self.events.push(GraphEvent::GroupDestroyed { group: gid });
            tracing::debug!(group = ?gid, "group destroyed");
        }
    }

    // -- Dirtying --

    /// Mark a node for edge re-evaluation at the next recompute. Idempotent.
    /// Returns `false` if the node does not exist or was already pending.
    pub fn queue_edge_update(&mut self, node: NodeId) -> bool {
        self.nodes.contains_key(node) && self.dirty.mark(node)
    }

    pub fn is_queued(&self, node: NodeId) -> bool {
        self.dirty.is_pending(node)
    }

    pub fn pending_updates(&self) -> usize {
        self.dirty.len()
    }

    /// Route a structural event on `entity` to the policies that care.
    ///
    /// The entity's own nodes are queued when one of their policies
    /// subscribes to `event`, or when they hold edges that the change may
    /// have invalidated; the far ends of those edges are queued as well.
    /// Nodes with policies on the entity's tile and the four tiles around it
    /// are queued too, since their proposals may now include the entity.
    /// Returns the number of nodes newly queued.
    pub fn notify(&mut self, spatial: &SpatialIndex, entity: EntityId, event: StructuralEvent) -> usize {
        let mut queued = 0;
        let own: Vec<NodeId> = self
            .containers
            .get(entity)
            .map(|container| container.nodes().collect())
            .unwrap_or_default();
        for id in own {
            let Some(node) = self.nodes.get(id) else {
                continue;
            };
            let subscribed = node.linkers.iter().any(|l| l.subscribes(event));
            let far_ends: Vec<NodeId> = node.edges.iter().map(|e| e.to).collect();
            if (subscribed || !far_ends.is_empty()) && self.dirty.mark(id) {
                queued += 1;
            }
            for other in far_ends {
                if self.dirty.mark(other) {
                    queued += 1;
                }
            }
        }

        let Some(placement) = spatial.placement(entity) else {
            return queued;
        };
        let mut tiles = vec![placement.tile];
        tiles.extend(
            manifold_spatial::Direction::all()
                .into_iter()
                .map(|dir| placement.tile.neighbor(dir)),
        );
        let around: Vec<NodeId> = {
            let ctx = LinkContext::new(spatial, &self.nodes, &self.containers);
            tiles.into_iter().flat_map(|tile| ctx.nodes_on_tile(tile)).collect()
        };
        for id in around {
            let has_linkers = self.nodes.get(id).is_some_and(|node| !node.linkers.is_empty());
            if has_linkers && self.dirty.mark(id) {
                queued += 1;
            }
        }
        queued
    }

    /// Enable or disable automatic edges on a node. A disabled node vetoes
    /// every automatic edge; manual edges are unaffected.
    pub fn set_connections_enabled(&mut self, node: NodeId, enabled: bool) -> Result<(), GraphError> {
        let entry = self
            .nodes
            .get_mut(node)
            .ok_or(GraphError::NodeNotFound(node))?;
        if entry.connections_enabled != enabled {
            entry.connections_enabled = enabled;
            self.dirty.mark(node);
        }
        Ok(())
    }

    // -- Manual edges --

    /// Add (or mark as manual) an edge between `a` and `b`. Only the
    /// `NO_MERGE` bit of `flags` is honoured. Returns `false` if an
    /// identical manual edge already existed.
    pub fn try_add_edge(&mut self, a: NodeId, b: NodeId, flags: EdgeFlags) -> Result<bool, GraphError> {
        if a == b {
            return Err(GraphError::SelfEdge);
        }
        let old = self.nodes.get(a).ok_or(GraphError::NodeNotFound(a))?.edge_to(b);
        if !self.nodes.contains_key(b) {
            return Err(GraphError::NodeNotFound(b));
        }
        let new = old.unwrap_or(EdgeFlags::NONE) | EdgeFlags::MANUAL | (flags & EdgeFlags::NO_MERGE);
        if old == Some(new) {
            return Ok(false);
        }
        self.apply_edge(a, b, old, Some(new));
        Ok(true)
    }

    /// Drop the manual part of an edge. If policies also want the edge it
    /// stays as an automatic edge. Returns `false` if there was no manual edge.
    pub fn try_remove_edge(&mut self, a: NodeId, b: NodeId) -> Result<bool, GraphError> {
        let old = self.nodes.get(a).ok_or(GraphError::NodeNotFound(a))?.edge_to(b);
        let Some(old) = old.filter(|f| f.contains(EdgeFlags::MANUAL)) else {
            return Ok(false);
        };
        if old.contains(EdgeFlags::AUTO) {
            self.apply_edge(a, b, Some(old), Some(old & !EdgeFlags::MANUAL));
            self.dirty.mark(a);
        } else {
            self.apply_edge(a, b, Some(old), None);
        }
        Ok(true)
    }

    pub fn has_edge(&self, a: NodeId, b: NodeId) -> bool {
        self.edge_flags(a, b).is_some()
    }

    /// Flags of the edge `a -- b` as seen from `a`.
    pub fn edge_flags(&self, a: NodeId, b: NodeId) -> Option<EdgeFlags> {
        self.nodes.get(a).and_then(|node| node.edge_to(b))
    }

    // -- Edge bookkeeping --

    fn apply_edge(&mut self, a: NodeId, b: NodeId, old: Option<EdgeFlags>, new: Option<EdgeFlags>) {
        if old == new || a == b {
            return;
        }
        match new {
            None => {
                if let Some(node) = self.nodes.get_mut(a) {
                    node.edges.retain(|e| e.to != b);
                }
                if let Some(node) = self.nodes.get_mut(b) {
                    node.edges.retain(|e| e.to != a);
                }
                self.events.push(GraphEvent::EdgeRemoved { a, b });
                tracing::trace!(?a, ?b, "edge removed");
            }
            Some(flags) => {
                set_half_edge(&mut self.nodes, a, b, flags);
                set_half_edge(&mut self.nodes, b, a, flags.invert());
                if old.is_none() {
                    self.events.push(GraphEvent::EdgeAdded { a, b, flags });
                    tracing::trace!(?a, ?b, ?flags, "edge added");
                } else {
                    self.events.push(GraphEvent::EdgeChanged { a, b, flags });
                }
            }
        }
        self.on_edge_changed(a, b, old, new);
    }

    fn on_edge_changed(&mut self, a: NodeId, b: NodeId, old: Option<EdgeFlags>, new: Option<EdgeFlags>) {
        let was_merging = old.is_some_and(EdgeFlags::merges);
        let is_merging = new.is_some_and(EdgeFlags::merges);
        if was_merging == is_merging {
            return;
        }
        let (Some(na), Some(nb)) = (self.nodes.get(a), self.nodes.get(b)) else {
            return;
        };
        if na.kind != nb.kind {
            return;
        }
        match (na.group, nb.group) {
            (Some(ga), Some(gb)) if was_merging && ga == gb => {
                let seeds = self.split_seeds.entry(ga).or_default();
                seeds.insert(a);
                seeds.insert(b);
            }
            (Some(ga), Some(gb)) if is_merging && ga != gb => {
                self.merge_seeds.insert(a);
            }
            // Ungrouped endpoints are picked up when new nodes are grouped.
            _ => {}
        }
    }

    fn reevaluate(&mut self, spatial: &SpatialIndex, id: NodeId) {
        let changes = {
            let ctx = LinkContext::new(spatial, &self.nodes, &self.containers);
            plan_edges(&ctx, id)
        };
        for (other, old, new) in changes {
            self.apply_edge(id, other, old, new);
        }
    }

    // -- Recompute --

    /// Process every queued node and bring groups back in line with the
    /// graph's connected components. Returns the events produced since the
    /// previous recompute, in order.
    pub fn recompute(&mut self, spatial: &SpatialIndex) -> Vec<GraphEvent> {
        let batch = self.dirty.drain();
        if !batch.is_empty() {
            tracing::debug!(nodes = batch.len(), "recomputing edges");
        }
        for id in batch {
            if !self.nodes.contains_key(id) {
                tracing::trace!(?id, "dropping dirty entry for destroyed node");
                continue;
            }
            self.reevaluate(spatial, id);
        }
        self.resolve_splits();
        self.resolve_ungrouped();
        self.resolve_merges();
        std::mem::take(&mut self.events)
    }

    /// Run every live group's per-tick update.
    pub fn update_groups(&mut self, tick: Ticks) {
        for slot in self.groups.values_mut() {
            slot.state.update(tick);
        }
    }

    /// Recompute, then update groups. The order every tick must follow.
    pub fn tick(&mut self, spatial: &SpatialIndex, tick: Ticks) -> Vec<GraphEvent> {
        let events = self.recompute(spatial);
        self.update_groups(tick);
        events
    }

    fn resolve_splits(&mut self) {
        let pending = std::mem::take(&mut self.split_seeds);
        for (gid, seeds) in pending {
            let seeds: Vec<NodeId> = seeds
                .into_iter()
                .filter(|id| self.nodes.get(*id).is_some_and(|n| n.group == Some(gid)))
                .collect();
            // Every surviving member is still reachable from some seed, so
            // one seed alone means the group is intact.
            if seeds.len() < 2 {
                continue;
            }
            if let Some(components) = self.split_components(gid, &seeds) {
                if let Err(err) = self.split_group(gid, components) {
                    tracing::warn!(group = ?gid, %err, "split abandoned");
                }
            }
        }
    }

    /// Components of `gid` after edge loss, or `None` if it is still connected.
    fn split_components(&self, gid: GroupId, seeds: &[NodeId]) -> Option<Vec<Vec<NodeId>>> {
        let watch: HashSet<NodeId> = seeds.iter().copied().collect();
        let mut visited = HashSet::new();
        let (first, reached_all) = self.flood_group(gid, seeds[0], &mut visited, &watch);
        if reached_all {
            return None;
        }

        let mut components = vec![first];
        let none = HashSet::new();
        for &seed in &seeds[1..] {
            if !visited.contains(&seed) {
                components.push(self.flood_group(gid, seed, &mut visited, &none).0);
            }
        }
        if let Some(slot) = self.groups.get(gid) {
            if visited.len() < slot.members.len() {
                tracing::warn!(group = ?gid, "members unreachable from split seeds");
                for &member in &slot.members {
                    if !visited.contains(&member) {
                        components.push(self.flood_group(gid, member, &mut visited, &none).0);
                    }
                }
            }
        }
        (components.len() > 1).then_some(components)
    }

    /// Breadth-first fill through members of `gid`. Stops early, returning
    /// `true`, once every node in a non-empty `watch` set has been reached.
    fn flood_group(
        &self,
        gid: GroupId,
        seed: NodeId,
        visited: &mut HashSet<NodeId>,
        watch: &HashSet<NodeId>,
    ) -> (Vec<NodeId>, bool) {
        let mut remaining = watch.len();
        if watch.contains(&seed) {
            remaining -= 1;
        }
        visited.insert(seed);
        let mut component = vec![seed];
        if !watch.is_empty() && remaining == 0 {
            return (component, true);
        }

        let mut queue = VecDeque::from([seed]);
        while let Some(current) = queue.pop_front() {
            let Some(node) = self.nodes.get(current) else {
                continue;
            };
            for next in node.merge_neighbors() {
                if visited.contains(&next) {
                    continue;
                }
                if self.nodes.get(next).is_none_or(|n| n.group != Some(gid)) {
                    continue;
                }
                visited.insert(next);
                component.push(next);
                queue.push_back(next);
                if watch.contains(&next) {
                    remaining -= 1;
                    if remaining == 0 {
                        return (component, true);
                    }
                }
            }
        }
        (component, false)
    }

    fn split_group(&mut self, gid: GroupId, mut components: Vec<Vec<NodeId>>) -> Result<(), RegistryError> {
        // Stable sort: equal sizes keep discovery order.
        components.sort_by(|a, b| b.len().cmp(&a.len()));
        let rest = components.split_off(1);

        let Some(kind) = self.groups.get(gid).map(|slot| slot.kind) else {
            return Ok(());
        };
        let mut fresh = Vec::with_capacity(rest.len());
        for _ in &rest {
            fresh.push(self.registry.create(kind)?);
        }

        let Some(slot) = self.groups.get_mut(gid) else {
            return Ok(());
        };
        for (component, state) in rest.iter().zip(fresh.iter_mut()) {
            let refs: Vec<MemberRef> = component
                .iter()
                .filter_map(|id| member_ref(&self.nodes, *id))
                .collect();
            for member in &refs {
                slot.state.remove_member(member);
                slot.members.remove(&member.node);
            }
            if let Some(seed) = refs.first() {
                state.initialize(seed);
            }
            state.load_members(&refs);
        }
        slot.state.after_split(&mut fresh);

        let mut fragments = Vec::with_capacity(rest.len());
        for (component, state) in rest.into_iter().zip(fresh) {
            let new_id = self.groups.insert(GroupSlot {
                kind,
                members: component.iter().copied().collect(),
                state,
            });
            for id in &component {
                if let Some(node) = self.nodes.get_mut(*id) {
                    node.group = Some(new_id);
                }
            }
            fragments.push(new_id);
        }
        tracing::debug!(group = ?gid, ?fragments, "group split");
        self.events.push(GraphEvent::GroupSplit {
            source: gid,
            fragments,
        });
        Ok(())
    }

    fn resolve_ungrouped(&mut self) {
        let pending = std::mem::take(&mut self.ungrouped);
        for seed in pending {
            if self.nodes.get(seed).is_none_or(|n| n.group.is_some()) {
                continue;
            }
            if let Err(err) = self.assign_group(seed) {
                tracing::warn!(node = ?seed, %err, "could not create group");
                self.ungrouped.insert(seed);
            }
        }
    }

    /// Flood from an ungrouped node through other ungrouped nodes of its
    /// kind. The fill joins the largest group it touches, or founds a new
    /// one; any other groups it touches are merged in.
    fn assign_group(&mut self, seed: NodeId) -> Result<(), RegistryError> {
        let Some(kind) = self.nodes.get(seed).map(|n| n.kind) else {
            return Ok(());
        };
        let mut fresh = vec![seed];
        let mut visited = HashSet::from([seed]);
        let mut queue = VecDeque::from([seed]);
        let mut touched: BTreeSet<GroupId> = BTreeSet::new();
        while let Some(current) = queue.pop_front() {
            let Some(node) = self.nodes.get(current) else {
                continue;
            };
            for next in node.merge_neighbors() {
                let Some(other) = self.nodes.get(next).filter(|n| n.kind == kind) else {
                    continue;
                };
                match other.group {
                    Some(gid) => {
                        touched.insert(gid);
                    }
                    None => {
                        if visited.insert(next) {
                            fresh.push(next);
                            queue.push_back(next);
                        }
                    }
                }
            }
        }

        let refs: Vec<MemberRef> = fresh
            .iter()
            .filter_map(|id| member_ref(&self.nodes, *id))
            .collect();
        let target = touched.iter().copied().max_by(|a, b| {
            let len = |gid: &GroupId| self.groups.get(*gid).map_or(0, |s| s.members.len());
            len(a).cmp(&len(b)).then(b.cmp(a))
        });

        let gid = match target.and_then(|gid| self.groups.get_mut(gid).map(|slot| (gid, slot))) {
            Some((gid, slot)) => {
                slot.state.load_members(&refs);
                slot.members.extend(fresh.iter().copied());
                gid
            }
            None => {
                let mut state = self.registry.create(kind)?;
                if let Some(seed_ref) = refs.first() {
                    state.initialize(seed_ref);
                }
                state.load_members(&refs);
                let gid = self.groups.insert(GroupSlot {
                    kind,
                    members: fresh.iter().copied().collect(),
                    state,
                });
                self.events.push(GraphEvent::GroupCreated { group: gid, kind });
                tracing::debug!(group = ?gid, ?kind, members = fresh.len(), "group created");
                gid
            }
        };
        for id in &fresh {
            if let Some(node) = self.nodes.get_mut(*id) {
                node.group = Some(gid);
            }
        }

        let mut survivor = gid;
        for other in touched {
            survivor = self.merge_groups(survivor, other);
        }
        Ok(())
    }

    fn resolve_merges(&mut self) {
        let pending = std::mem::take(&mut self.merge_seeds);
        for id in pending {
            let Some(node) = self.nodes.get(id) else {
                continue;
            };
            let kind = node.kind;
            let neighbors: Vec<NodeId> = node.merge_neighbors().collect();
            for other in neighbors {
                let here = self.nodes.get(id).and_then(|n| n.group);
                let there = self
                    .nodes
                    .get(other)
                    .filter(|n| n.kind == kind)
                    .and_then(|n| n.group);
                if let (Some(a), Some(b)) = (here, there) {
                    self.merge_groups(a, b);
                }
            }
        }
    }

    /// Merge two groups and return the survivor's id.
    fn merge_groups(&mut self, a: GroupId, b: GroupId) -> GroupId {
        if a == b {
            return a;
        }
        let (Some(sa), Some(sb)) = (self.groups.get(a), self.groups.get(b)) else {
            return if self.groups.contains_key(a) { a } else { b };
        };
        debug_assert_eq!(sa.kind, sb.kind, "merging groups of different kinds");
        if sa.kind != sb.kind {
            tracing::warn!(?a, ?b, "refusing to merge groups of different kinds");
            return a;
        }
        let (len_a, len_b) = (sa.members.len(), sb.members.len());
        let (keep, lose) = if len_a > len_b || (len_a == len_b && a < b) {
            (a, b)
        } else {
            (b, a)
        };

        let Some(mut absorbed) = self.groups.remove(lose) else {
            return keep;
        };
        self.split_seeds.remove(&lose);
        let refs: Vec<MemberRef> = absorbed
            .members
            .iter()
            .filter_map(|id| member_ref(&self.nodes, *id))
            .collect();
        let Some(slot) = self.groups.get_mut(keep) else {
            return keep;
        };
        slot.state.absorb(absorbed.state.as_mut());
        slot.state.load_members(&refs);
        slot.members.extend(absorbed.members.iter().copied());
        for id in &absorbed.members {
            if let Some(node) = self.nodes.get_mut(*id) {
                node.group = Some(keep);
            }
        }
        tracing::debug!(survivor = ?keep, absorbed = ?lose, "groups merged");
        self.events.push(GraphEvent::GroupMerged {
            survivor: keep,
            absorbed: lose,
        });
        keep
    }

    // -- Queries --

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn container(&self, entity: EntityId) -> Option<&NodeContainer> {
        self.containers.get(entity)
    }

    /// Resolve the node an entity exposes under `slot`.
    pub fn node_by_slot(&self, entity: EntityId, slot: &str) -> Option<NodeId> {
        self.containers.get(entity)?.get(slot)
    }

    pub fn group_id(&self, node: NodeId) -> Option<GroupId> {
        self.nodes.get(node)?.group
    }

    /// The state backing `node`: its group's, or the kind's placeholder
    /// while the node has no group. `None` only for unknown nodes.
    pub fn group_of(&self, node: NodeId) -> Option<&dyn Group> {
        let entry = self.nodes.get(node)?;
        match entry.group.and_then(|gid| self.groups.get(gid)) {
            Some(slot) => Some(slot.state.as_ref()),
            None => self.registry.placeholder(entry.kind),
        }
    }

    /// Mutable state of `node`'s group. Placeholders are never handed out
    /// mutably, so this is `None` for ungrouped nodes.
    pub fn group_of_mut(&mut self, node: NodeId) -> Option<&mut (dyn Group + 'static)> {
        let gid = self.nodes.get(node)?.group?;
        self.groups.get_mut(gid).map(|slot| slot.state.as_mut())
    }

    pub fn state_as<G: Group + 'static>(&self, node: NodeId) -> Option<&G> {
        self.group_of(node)?.downcast_ref::<G>()
    }

    pub fn state_as_mut<G: Group + 'static>(&mut self, node: NodeId) -> Option<&mut G> {
        self.group_of_mut(node)?.downcast_mut::<G>()
    }

    pub fn group(&self, gid: GroupId) -> Option<&dyn Group> {
        self.groups.get(gid).map(|slot| slot.state.as_ref())
    }

    pub fn group_mut(&mut self, gid: GroupId) -> Option<&mut (dyn Group + 'static)> {
        self.groups.get_mut(gid).map(|slot| slot.state.as_mut())
    }

    pub fn group_kind(&self, gid: GroupId) -> Option<GroupKindId> {
        self.groups.get(gid).map(|slot| slot.kind)
    }

    pub fn members(&self, gid: GroupId) -> Option<&BTreeSet<NodeId>> {
        self.groups.get(gid).map(|slot| &slot.members)
    }

    pub fn contains_group(&self, gid: GroupId) -> bool {
        self.groups.contains_key(gid)
    }

    pub fn group_ids(&self) -> impl Iterator<Item = GroupId> + '_ {
        self.groups.keys()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }
}

fn set_half_edge(nodes: &mut SlotMap<NodeId, Node>, from: NodeId, to: NodeId, flags: EdgeFlags) {
    let Some(node) = nodes.get_mut(from) else {
        return;
    };
    match node.edges.iter_mut().find(|e| e.to == to) {
        Some(edge) => edge.flags = flags,
        None => node.edges.push(crate::node::Edge { to, flags }),
    }
}

fn verdict(ctx: &LinkContext<'_>, id: NodeId, node: &Node, other: NodeId) -> LinkVerdict {
    if !node.connections_enabled {
        return LinkVerdict::Rejected;
    }
    node.linkers
        .iter()
        .fold(LinkVerdict::Neutral, |acc, linker| {
            acc.combine(linker.check(ctx, id, other))
        })
}

/// Evaluate every candidate and existing edge of `id` from both sides and
/// return the edges whose flags must change.
fn plan_edges(ctx: &LinkContext<'_>, id: NodeId) -> Vec<EdgeChange> {
    let Some(node) = ctx.node(id) else {
        return Vec::new();
    };
    let mut candidates = Vec::new();
    for linker in &node.linkers {
        linker.candidates(ctx, id, &mut candidates);
    }
    candidates.extend(node.edges.iter().map(|e| e.to));
    // Nodes whose own policies could propose `id`. Built-in policies reach
    // at most one tile, so a node without policies (or one just re-enabled)
    // still finds every neighbour that wants it.
    if let Some(tile) = ctx.tile_of(id) {
        let around = std::iter::once(tile).chain(
            manifold_spatial::Direction::all()
                .into_iter()
                .map(|dir| tile.neighbor(dir)),
        );
        for t in around {
            candidates.extend(
                ctx.nodes_on_tile(t)
                    .filter(|other| ctx.node(*other).is_some_and(|n| !n.linkers.is_empty())),
            );
        }
    }
    candidates.sort();
    candidates.dedup();

    let mut changes = Vec::new();
    for other in candidates {
        if other == id {
            continue;
        }
        let Some(other_node) = ctx.node(other) else {
            continue;
        };
        let ours = verdict(ctx, id, node, other);
        let theirs = verdict(ctx, other, other_node, id);
        let auto = match (ours, theirs) {
            (LinkVerdict::Rejected, _) | (_, LinkVerdict::Rejected) => None,
            (LinkVerdict::Neutral, LinkVerdict::Neutral) => None,
            _ => {
                let mut flags = EdgeFlags::AUTO;
                if let LinkVerdict::Wanted(extra) = ours {
                    flags |= EdgeFlags::OUT | extra;
                }
                if let LinkVerdict::Wanted(extra) = theirs {
                    flags |= EdgeFlags::IN | extra.invert();
                }
                Some(flags)
            }
        };

        let old = node.edge_to(other);
        let new = match old {
            Some(flags) if flags.contains(EdgeFlags::MANUAL) => {
                let kept = flags & !(EdgeFlags::AUTO | EdgeFlags::OUT | EdgeFlags::IN);
                Some(kept | auto.unwrap_or(EdgeFlags::NONE))
            }
            _ => auto,
        };
        if new != old {
            changes.push((other, old, new));
        }
    }
    changes
}
