//! The aggregate owned by each connected component.
//!
//! A group kind supplies a [`Group`] implementation; the engine drives its
//! lifecycle. Application code never calls these hooks directly.

use manifold_core::Ticks;
use manifold_core::id::{EntityId, NodeId};
use std::any::Any;
use std::fmt;

/// What a group learns about one of its members.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemberRef {
    pub node: NodeId,
    pub entity: EntityId,
    pub volume: f64,
}

/// Lifecycle hooks for a group kind's shared state.
///
/// Call order for a component's lifetime:
///
/// 1. `initialize` once, with the seed node, when the group is created.
/// 2. `load_members` whenever members are assigned (creation, growth, or
///    after `absorb` during a merge).
/// 3. `remove_member` before each member is detached.
/// 4. `after_split` once per resolved split, on the group that keeps its
///    identity (the largest fragment).
/// 5. `update` once per tick while the group lives.
pub trait Group: fmt::Debug {
    fn initialize(&mut self, seed: &MemberRef);

    fn load_members(&mut self, members: &[MemberRef]);

    fn remove_member(&mut self, member: &MemberRef);

    /// Take over `other`'s state during a merge. `other` is the smaller
    /// group and is disposed right after; it must be left logically empty.
    fn absorb(&mut self, other: &mut dyn Group);

    /// Partition this group's pre-split state across itself and the freshly
    /// created `fragments`, by each one's share of the total volume.
    fn after_split(&mut self, fragments: &mut [Box<dyn Group>]);

    fn update(&mut self, _tick: Ticks) {}

    /// Total volume contributed by the current members.
    fn volume(&self) -> f64;

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<'a> dyn Group + 'a {
    pub fn downcast_ref<G: Group + 'static>(&self) -> Option<&G> {
        self.as_any().downcast_ref::<G>()
    }

    pub fn downcast_mut<G: Group + 'static>(&mut self) -> Option<&mut G> {
        self.as_any_mut().downcast_mut::<G>()
    }
}
