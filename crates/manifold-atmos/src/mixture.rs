//! The conserved state owned by a pipe network.
//!
//! A [`GasMixture`] stores amounts per gas, a temperature and a volume.
//! Pressure, heat capacity and thermal energy are derived on demand. Every
//! transfer between mixtures goes through [`GasMixture::remove_ratio`] and
//! [`GasMixture::merge`], which conserve amount and energy.

use serde::{Deserialize, Serialize};

use crate::gas::{GAS_COUNT, GAS_MIN_MOLES, Gas, MINIMUM_HEAT_CAPACITY, R, TCMB};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GasMixture {
    moles: [f64; GAS_COUNT],
    temperature: f64,
    volume: f64,
    #[serde(default)]
    immutable: bool,
}

impl Default for GasMixture {
    fn default() -> Self {
        Self {
            moles: [0.0; GAS_COUNT],
            temperature: TCMB,
            volume: 0.0,
            immutable: false,
        }
    }
}

impl GasMixture {
    pub fn new(volume: f64) -> Self {
        Self {
            volume: volume.max(0.0),
            ..Self::default()
        }
    }

    /// An empty, immutable mixture at background temperature.
    pub fn vacuum() -> Self {
        Self {
            immutable: true,
            ..Self::default()
        }
    }

    /// Builder-style helper for fixtures and data files.
    pub fn with_moles(mut self, gas: Gas, moles: f64) -> Self {
        self.set_moles(gas, moles);
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.set_temperature(temperature);
        self
    }

    pub fn mark_immutable(&mut self) {
        self.immutable = true;
    }

    pub fn is_immutable(&self) -> bool {
        self.immutable
    }

    /// Mutation guard: loud in debug builds, a silent no-op in release.
    fn writable(&self) -> bool {
        debug_assert!(!self.immutable, "mutating an immutable gas mixture");
        !self.immutable
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn moles(&self, gas: Gas) -> f64 {
        self.moles[gas.index()]
    }

    pub fn set_moles(&mut self, gas: Gas, moles: f64) {
        debug_assert!(moles.is_finite() && moles >= 0.0, "invalid amount {moles}");
        if self.writable() {
            self.moles[gas.index()] = moles.max(0.0);
        }
    }

    /// Add (or with a negative delta, take) an amount. Never goes below zero.
    pub fn adjust_moles(&mut self, gas: Gas, delta: f64) {
        debug_assert!(delta.is_finite(), "invalid amount delta {delta}");
        if self.writable() {
            let slot = &mut self.moles[gas.index()];
            *slot = (*slot + delta).max(0.0);
        }
    }

    pub fn total_moles(&self) -> f64 {
        self.moles.iter().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_moles() < GAS_MIN_MOLES
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn set_temperature(&mut self, temperature: f64) {
        if self.writable() {
            self.temperature = temperature.max(TCMB);
        }
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn set_volume(&mut self, volume: f64) {
        if self.writable() {
            self.volume = volume.max(0.0);
        }
    }

    fn raw_heat_capacity(&self) -> f64 {
        Gas::ALL
            .iter()
            .map(|gas| self.moles[gas.index()] * gas.specific_heat())
            .sum()
    }

    /// Sum of amount times specific heat, floored at
    /// [`MINIMUM_HEAT_CAPACITY`].
    pub fn heat_capacity(&self) -> f64 {
        self.raw_heat_capacity().max(MINIMUM_HEAT_CAPACITY)
    }

    pub fn thermal_energy(&self) -> f64 {
        self.temperature * self.raw_heat_capacity()
    }

    /// Ideal gas pressure. Zero for a zero-volume mixture.
    pub fn pressure(&self) -> f64 {
        if self.volume <= 0.0 {
            return 0.0;
        }
        self.total_moles() * R * self.temperature / self.volume
    }

    // -----------------------------------------------------------------------
    // Transfers
    // -----------------------------------------------------------------------

    /// Absorb everything in `giver`. Temperature becomes the heat-capacity
    /// weighted mean, so thermal energy is conserved exactly. Volume is
    /// left alone: it belongs to whoever owns the mixture.
    pub fn merge(&mut self, giver: GasMixture) {
        if !self.writable() {
            return;
        }
        let own = self.raw_heat_capacity();
        let given = giver.raw_heat_capacity();
        let combined = own + given;
        if combined > 0.0 {
            self.temperature =
                ((self.temperature * own + giver.temperature * given) / combined).max(TCMB);
        }
        for (mine, theirs) in self.moles.iter_mut().zip(giver.moles) {
            *mine += theirs;
        }
    }

    /// Take `ratio` of every gas out of this mixture and return it at the
    /// same temperature. The parcel's volume is the same share of ours.
    ///
    /// `ratio` must lie in `[0, 1]`; release builds clamp it.
    pub fn remove_ratio(&mut self, ratio: f64) -> GasMixture {
        debug_assert!(
            (0.0..=1.0).contains(&ratio),
            "removal ratio {ratio} outside [0, 1]"
        );
        if ratio.is_nan() || ratio <= 0.0 {
            return GasMixture {
                temperature: self.temperature,
                ..GasMixture::default()
            };
        }
        let ratio = ratio.min(1.0);

        let mut removed = GasMixture {
            moles: self.moles,
            temperature: self.temperature,
            volume: self.volume * ratio,
            immutable: false,
        };
        for amount in removed.moles.iter_mut() {
            *amount *= ratio;
            if *amount < GAS_MIN_MOLES || amount.is_nan() {
                *amount = 0.0;
            }
        }
        // An immutable source hands out copies without being drained.
        if !self.immutable {
            for (mine, taken) in self.moles.iter_mut().zip(removed.moles) {
                *mine -= taken;
                if *mine < GAS_MIN_MOLES || mine.is_nan() {
                    *mine = 0.0;
                }
            }
        }
        removed
    }

    /// Take up to `moles` in total, spread across gases by their share.
    pub fn remove(&mut self, moles: f64) -> GasMixture {
        let total = self.total_moles();
        if total <= 0.0 || moles <= 0.0 {
            return self.remove_ratio(0.0);
        }
        self.remove_ratio((moles / total).min(1.0))
    }

    /// Take the gas occupying `volume` of this mixture.
    pub fn remove_volume(&mut self, volume: f64) -> GasMixture {
        if self.volume <= 0.0 || volume <= 0.0 {
            return self.remove_ratio(0.0);
        }
        self.remove_ratio((volume / self.volume).min(1.0))
    }

    /// Scale every amount. Temperature is unchanged.
    pub fn multiply(&mut self, factor: f64) {
        debug_assert!(factor.is_finite() && factor >= 0.0, "invalid factor {factor}");
        if self.writable() {
            for amount in self.moles.iter_mut() {
                *amount = (*amount * factor).max(0.0);
            }
        }
    }

    /// Drop every gas. Temperature and volume are kept.
    pub fn clear(&mut self) {
        if self.writable() {
            self.moles = [0.0; GAS_COUNT];
        }
    }

    /// Add (or with a negative value, remove) thermal energy.
    pub fn add_heat(&mut self, joules: f64) {
        if self.writable() {
            let capacity = self.heat_capacity();
            self.temperature = (self.temperature + joules / capacity).max(TCMB);
        }
    }
}
