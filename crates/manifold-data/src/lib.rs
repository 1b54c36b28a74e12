//! Data-driven content for manifold: entity prototypes and gas reactions
//! loaded from RON, TOML, or JSON files.
//!
//! Loading is a startup step. Every cross-reference (group kind names,
//! appliance slots) and every policy is checked here, so a bad data file
//! aborts initialization instead of surfacing mid-simulation.

pub mod loader;
pub mod prototype;
pub mod schema;

pub use loader::{DataLoadError, Format, load_prototypes, load_reactions};
pub use prototype::{EntityPrototype, PrototypeSet};
