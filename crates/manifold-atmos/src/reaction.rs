//! Data-driven gas reactions, run once per tick on each pipe network.
//!
//! A reaction converts reactants into products in fixed ratios and releases
//! (or absorbs) a fixed amount of energy per unit reacted. Reactions are
//! tried in descending priority; one flagged `stop_after` ends the pass when
//! it fires.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::gas::{FIRE_MINIMUM_TEMPERATURE, FIRE_PLASMA_ENERGY_RELEASED, GAS_MIN_MOLES, Gas, TCMB};
use crate::mixture::GasMixture;

// ---------------------------------------------------------------------------
// Reaction definition
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GasReaction {
    pub name: String,
    /// Higher runs first.
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_min_temperature")]
    pub min_temperature: f64,
    #[serde(default = "default_max_temperature")]
    pub max_temperature: f64,
    /// Minimum thermal energy of the mixture, in joules.
    #[serde(default)]
    pub min_energy: f64,
    /// Moles of each reactant consumed per unit.
    pub reactants: BTreeMap<Gas, f64>,
    /// Moles of each product created per unit.
    #[serde(default)]
    pub products: BTreeMap<Gas, f64>,
    /// Joules released per unit. Negative values cool the mixture.
    #[serde(default)]
    pub energy_per_unit: f64,
    /// Share of the limiting reactant converted per tick, in `(0, 1]`.
    pub rate_fraction: f64,
    #[serde(default)]
    pub stop_after: bool,
}

fn default_min_temperature() -> f64 {
    TCMB
}

fn default_max_temperature() -> f64 {
    f64::MAX
}

impl GasReaction {
    /// Plasma burning in oxygen to carbon dioxide.
    pub fn plasma_fire() -> Self {
        Self {
            name: "plasma_fire".to_string(),
            priority: 0,
            min_temperature: FIRE_MINIMUM_TEMPERATURE,
            max_temperature: f64::MAX,
            min_energy: 0.0,
            reactants: BTreeMap::from([(Gas::Plasma, 1.0), (Gas::Oxygen, 1.0)]),
            products: BTreeMap::from([(Gas::CarbonDioxide, 1.0)]),
            energy_per_unit: FIRE_PLASMA_ENERGY_RELEASED,
            rate_fraction: 0.25,
            stop_after: false,
        }
    }

    /// Check the data for values that would make the reaction meaningless.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.reactants.is_empty() {
            return Err("reaction has no reactants");
        }
        if self.reactants.values().chain(self.products.values()).any(|r| !(*r >= 0.0)) {
            return Err("reactant and product ratios must be non-negative");
        }
        if self.reactants.values().all(|r| *r == 0.0) {
            return Err("at least one reactant ratio must be positive");
        }
        if !(self.rate_fraction > 0.0 && self.rate_fraction <= 1.0) {
            return Err("rate_fraction must lie in (0, 1]");
        }
        if self.min_temperature > self.max_temperature {
            return Err("min_temperature exceeds max_temperature");
        }
        Ok(())
    }

    /// Units this reaction would convert in `mix` this tick.
    fn units(&self, mix: &GasMixture) -> f64 {
        self.reactants
            .iter()
            .filter(|(_, ratio)| **ratio > 0.0)
            .map(|(gas, ratio)| mix.moles(*gas) / ratio)
            .fold(f64::INFINITY, f64::min)
            * self.rate_fraction
    }

    fn applies(&self, mix: &GasMixture) -> bool {
        let t = mix.temperature();
        t >= self.min_temperature
            && t <= self.max_temperature
            && mix.thermal_energy() >= self.min_energy
    }

    /// Run once against `mix`. Thermal energy after is the energy before
    /// plus `units * energy_per_unit`.
    pub fn react(&self, mix: &mut GasMixture) -> ReactionResult {
        if mix.is_immutable() || !self.applies(mix) {
            return ReactionResult::NoReaction;
        }
        let units = self.units(mix);
        if !units.is_finite() || units < GAS_MIN_MOLES {
            return ReactionResult::NoReaction;
        }

        let energy = mix.thermal_energy();
        for (gas, ratio) in &self.reactants {
            mix.adjust_moles(*gas, -units * ratio);
        }
        for (gas, ratio) in &self.products {
            mix.adjust_moles(*gas, units * ratio);
        }
        let released = units * self.energy_per_unit;
        mix.set_temperature((energy + released) / mix.heat_capacity());

        if self.stop_after {
            ReactionResult::StopReactions
        } else {
            ReactionResult::Reacting
        }
    }
}

/// Outcome of a reaction pass, ordered by severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ReactionResult {
    #[default]
    NoReaction,
    Reacting,
    StopReactions,
}

// ---------------------------------------------------------------------------
// Reaction set
// ---------------------------------------------------------------------------

/// An immutable, priority-sorted list of reactions shared by every pipe
/// network of a kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReactionSet {
    reactions: Vec<GasReaction>,
}

impl ReactionSet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Sort by descending priority. Equal priorities keep their given order.
    pub fn new(mut reactions: Vec<GasReaction>) -> Self {
        reactions.sort_by(|a, b| b.priority.cmp(&a.priority));
        Self { reactions }
    }

    /// The built-in reactions.
    pub fn standard() -> Self {
        Self::new(vec![GasReaction::plasma_fire()])
    }

    pub fn reactions(&self) -> &[GasReaction] {
        &self.reactions
    }

    pub fn len(&self) -> usize {
        self.reactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reactions.is_empty()
    }

    /// Try every reaction in priority order. Returns the strongest result.
    pub fn react(&self, mix: &mut GasMixture) -> ReactionResult {
        let mut result = ReactionResult::NoReaction;
        for reaction in &self.reactions {
            let outcome = reaction.react(mix);
            if outcome != ReactionResult::NoReaction {
                tracing::trace!(reaction = %reaction.name, ?outcome, "gas reaction");
            }
            result = result.max(outcome);
            if outcome == ReactionResult::StopReactions {
                break;
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gas::T20C;
    use manifold_core::test_utils::approx_eq;

    fn burning(temperature: f64) -> GasMixture {
        GasMixture::new(1.0)
            .with_moles(Gas::Plasma, 4.0)
            .with_moles(Gas::Oxygen, 8.0)
            .with_temperature(temperature)
    }

    fn decay(priority: i32, stop_after: bool) -> GasReaction {
        GasReaction {
            name: format!("decay_{priority}"),
            priority,
            min_temperature: TCMB,
            max_temperature: f64::MAX,
            min_energy: 0.0,
            reactants: BTreeMap::from([(Gas::Tritium, 1.0)]),
            products: BTreeMap::from([(Gas::WaterVapor, 1.0)]),
            energy_per_unit: 0.0,
            rate_fraction: 0.5,
            stop_after,
        }
    }

    #[test]
    fn plasma_fire_needs_heat() {
        let mut cold = burning(T20C);
        assert_eq!(GasReaction::plasma_fire().react(&mut cold), ReactionResult::NoReaction);
        assert_eq!(cold.moles(Gas::Plasma), 4.0);
    }

    #[test]
    fn plasma_fire_converts_and_heats() {
        let mut mix = burning(500.0);
        let before = mix.thermal_energy();
        let result = GasReaction::plasma_fire().react(&mut mix);

        assert_eq!(result, ReactionResult::Reacting);
        // Plasma is limiting: 4 * 0.25 = 1 unit.
        assert!(approx_eq(mix.moles(Gas::Plasma), 3.0, 1e-12));
        assert!(approx_eq(mix.moles(Gas::Oxygen), 7.0, 1e-12));
        assert!(approx_eq(mix.moles(Gas::CarbonDioxide), 1.0, 1e-12));
        assert!(approx_eq(
            mix.thermal_energy(),
            before + FIRE_PLASMA_ENERGY_RELEASED,
            1e-9
        ));
        assert!(mix.temperature() > 500.0);
    }

    #[test]
    fn set_runs_in_priority_order_and_stops() {
        let set = ReactionSet::new(vec![decay(1, false), decay(5, true)]);
        assert_eq!(set.reactions()[0].priority, 5);

        let mut mix = GasMixture::new(1.0).with_moles(Gas::Tritium, 8.0);
        assert_eq!(set.react(&mut mix), ReactionResult::StopReactions);
        // Only the first reaction ran.
        assert!(approx_eq(mix.moles(Gas::Tritium), 4.0, 1e-12));
    }

    #[test]
    fn set_without_stop_runs_everything() {
        let set = ReactionSet::new(vec![decay(1, false), decay(2, false)]);
        let mut mix = GasMixture::new(1.0).with_moles(Gas::Tritium, 8.0);
        assert_eq!(set.react(&mut mix), ReactionResult::Reacting);
        assert!(approx_eq(mix.moles(Gas::Tritium), 2.0, 1e-12));
        assert!(approx_eq(mix.moles(Gas::WaterVapor), 6.0, 1e-12));
    }

    #[test]
    fn immutable_mixtures_never_react() {
        let mut vacuum = GasMixture::vacuum();
        assert_eq!(ReactionSet::standard().react(&mut vacuum), ReactionResult::NoReaction);
    }

    #[test]
    fn validation_rejects_bad_data() {
        let mut r = decay(0, false);
        assert!(r.validate().is_ok());
        r.rate_fraction = 0.0;
        assert!(r.validate().is_err());
        r.rate_fraction = 0.5;
        r.reactants.clear();
        assert!(r.validate().is_err());
        let mut r = decay(0, false);
        r.min_temperature = 1000.0;
        r.max_temperature = 10.0;
        assert!(r.validate().is_err());
    }

    #[test]
    fn reaction_parses_from_ron() {
        let text = r#"(
            name: "decay",
            reactants: { Tritium: 1.0 },
            products: { WaterVapor: 1.0 },
            rate_fraction: 0.1,
        )"#;
        let r: GasReaction = ron::from_str(text).unwrap();
        assert_eq!(r.min_temperature, TCMB);
        assert_eq!(r.max_temperature, f64::MAX);
        assert!(r.validate().is_ok());
    }
}
