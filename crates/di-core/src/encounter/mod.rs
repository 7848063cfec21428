//! Encounter plumbing
//!
//! Creature tables, the spawner that populates rooms and boss phases, and the
//! gate controller that opens and closes door regions.

mod creature;
mod gate;
mod spawner;

pub use creature::{CreatureKind, Tier};
pub use gate::GateController;
pub use spawner::EncounterSpawner;
