//! The group kind for connected pipe runs.
//!
//! A [`PipeNet`] owns one [`GasMixture`] whose volume is the sum of its
//! members' volumes. Merges pour the smaller net's gas into the survivor;
//! splits hand each fragment its volume share of the pre-split gas.

use std::any::Any;
use std::sync::Arc;

use manifold_core::Ticks;
use manifold_core::id::{GroupKindId, NodeId};
use manifold_graph::{Group, GroupRegistryBuilder, MemberRef, RegistryError};

use crate::mixture::GasMixture;
use crate::reaction::{ReactionResult, ReactionSet};

#[derive(Debug, Clone)]
pub struct PipeNet {
    air: GasMixture,
    reactions: Arc<ReactionSet>,
    seed: Option<NodeId>,
    last_reaction: ReactionResult,
}

impl PipeNet {
    pub fn new(reactions: Arc<ReactionSet>) -> Self {
        Self {
            air: GasMixture::new(0.0),
            reactions,
            seed: None,
            last_reaction: ReactionResult::NoReaction,
        }
    }

    /// What ungrouped pipe nodes report: an immutable vacuum.
    pub fn vacuum() -> Self {
        Self {
            air: GasMixture::vacuum(),
            reactions: Arc::new(ReactionSet::empty()),
            seed: None,
            last_reaction: ReactionResult::NoReaction,
        }
    }

    pub fn air(&self) -> &GasMixture {
        &self.air
    }

    pub fn air_mut(&mut self) -> &mut GasMixture {
        &mut self.air
    }

    pub fn seed(&self) -> Option<NodeId> {
        self.seed
    }

    /// Result of the most recent `update`.
    pub fn last_reaction(&self) -> ReactionResult {
        self.last_reaction
    }
}

impl Group for PipeNet {
    fn initialize(&mut self, seed: &MemberRef) {
        self.seed = Some(seed.node);
    }

    fn load_members(&mut self, members: &[MemberRef]) {
        let added: f64 = members.iter().map(|m| m.volume).sum();
        let volume = self.air.volume() + added;
        self.air.set_volume(volume);
    }

    fn remove_member(&mut self, member: &MemberRef) {
        let volume = self.air.volume() - member.volume;
        self.air.set_volume(volume);
    }

    fn absorb(&mut self, other: &mut dyn Group) {
        match other.downcast_mut::<PipeNet>() {
            Some(other) => {
                let giver = std::mem::take(&mut other.air);
                self.air.merge(giver);
            }
            None => tracing::warn!(?other, "pipe net asked to absorb a foreign group"),
        }
    }

    fn after_split(&mut self, fragments: &mut [Box<dyn Group>]) {
        let total = self.air.volume() + fragments.iter().map(|g| g.volume()).sum::<f64>();
        if total <= 0.0 {
            return;
        }
        let buffer = self.air.clone();
        self.air.clear();

        let share = |volume: f64| {
            let mut parcel = buffer.clone();
            parcel.multiply(volume / total);
            parcel
        };
        let own = share(self.air.volume());
        self.air.merge(own);
        for fragment in fragments.iter_mut() {
            let parcel = share(fragment.volume());
            match fragment.downcast_mut::<PipeNet>() {
                Some(net) => net.air.merge(parcel),
                None => tracing::warn!("split fragment is not a pipe net; its share is lost"),
            }
        }
    }

    fn update(&mut self, _tick: Ticks) {
        if self.air.is_immutable() {
            return;
        }
        self.last_reaction = self.reactions.react(&mut self.air);
    }

    fn volume(&self) -> f64 {
        self.air.volume()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Register a pipe-network kind whose nets all share `reactions`.
pub fn register_pipe_kind(
    builder: &mut GroupRegistryBuilder,
    name: &str,
    reactions: Arc<ReactionSet>,
) -> Result<GroupKindId, RegistryError> {
    builder.register(
        name,
        move || Box::new(PipeNet::new(Arc::clone(&reactions))),
        Box::new(PipeNet::vacuum()),
    )
}
