//! Manifold Atmos -- gas-filled pipe networks on top of the node graph.
//!
//! Each connected run of pipe nodes is one [`PipeNet`] group holding a
//! single [`GasMixture`]. The graph engine decides membership; this crate
//! decides what happens to the gas when nets merge, split, react, or are
//! pumped into one another.
//!
//! # Design
//!
//! - Amounts per gas, temperature and volume are stored; pressure, heat
//!   capacity and thermal energy are derived.
//! - Merges weight temperature by heat capacity, so energy is conserved.
//! - Splits use buffer-and-redistribute by volume share.
//! - Ungrouped pipe nodes see an immutable vacuum.
//! - Appliances resolve their nodes by entity and slot on every run and
//!   never touch topology.
//! - [`AtmosSystem::tick`] fixes the order: recompute, group updates,
//!   appliances.

pub mod appliance;
pub mod gas;
pub mod mixture;
pub mod pipe_net;
pub mod reaction;
pub mod system;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use appliance::{Appliance, PassiveGate, PressurePump, VolumePump};
pub use gas::Gas;
pub use mixture::GasMixture;
pub use pipe_net::{PipeNet, register_pipe_kind};
pub use reaction::{GasReaction, ReactionResult, ReactionSet};
pub use system::{ApplianceId, AtmosSystem, TickReport};
