//! The fixed gas table and physical constants.

use serde::{Deserialize, Serialize};

/// Ideal gas constant, J/(mol K).
pub const R: f64 = 8.314462618;

/// Cosmic microwave background temperature. Nothing gets colder.
pub const TCMB: f64 = 2.7;

/// 20 degrees Celsius in kelvin.
pub const T20C: f64 = 293.15;

/// Floor for reported heat capacity, so temperature math on a near-empty
/// mixture never divides by zero.
pub const MINIMUM_HEAT_CAPACITY: f64 = 0.0003;

/// Amounts below this are rounded to zero after a removal.
pub const GAS_MIN_MOLES: f64 = 5e-8;

/// Number of entries in [`Gas::ALL`].
pub const GAS_COUNT: usize = 6;

/// Energy released per mole of plasma burned.
pub const FIRE_PLASMA_ENERGY_RELEASED: f64 = 3_000_000.0;

/// Plasma fires do not start below this temperature.
pub const FIRE_MINIMUM_TEMPERATURE: f64 = 373.15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Gas {
    Oxygen,
    Nitrogen,
    CarbonDioxide,
    Plasma,
    Tritium,
    WaterVapor,
}

impl Gas {
    pub const ALL: [Gas; GAS_COUNT] = [
        Gas::Oxygen,
        Gas::Nitrogen,
        Gas::CarbonDioxide,
        Gas::Plasma,
        Gas::Tritium,
        Gas::WaterVapor,
    ];

    /// Position of this gas in a mixture's amount array.
    pub fn index(self) -> usize {
        match self {
            Gas::Oxygen => 0,
            Gas::Nitrogen => 1,
            Gas::CarbonDioxide => 2,
            Gas::Plasma => 3,
            Gas::Tritium => 4,
            Gas::WaterVapor => 5,
        }
    }

    /// Molar specific heat, J/(mol K).
    pub fn specific_heat(self) -> f64 {
        match self {
            Gas::Oxygen => 20.0,
            Gas::Nitrogen => 30.0,
            Gas::CarbonDioxide => 30.0,
            Gas::Plasma => 200.0,
            Gas::Tritium => 10.0,
            Gas::WaterVapor => 40.0,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Gas::Oxygen => "oxygen",
            Gas::Nitrogen => "nitrogen",
            Gas::CarbonDioxide => "carbon dioxide",
            Gas::Plasma => "plasma",
            Gas::Tritium => "tritium",
            Gas::WaterVapor => "water vapor",
        }
    }
}
