//! di-core: Instanced dungeon engine
//!
//! Turns admin-authored dungeon layouts into live, single-player encounters:
//! rooms that unlock in strict order behind key-gated doors, mob waves, and a
//! two-phase boss fight guarded by minion waves.
//!
//! The engine never owns the world. Everything it does to blocks, entities and
//! inventories goes through the [`host::Host`] trait, and all transitions run
//! to completion on the caller's thread. Geometry persistence is the only
//! background work and is fire-and-forget (see [`persist`]).

pub mod collab;
pub mod config;
pub mod encounter;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod host;
pub mod layout;
pub mod persist;
pub mod scheduler;
pub mod session;

mod rng;

pub use config::EngineConfig;
pub use engine::{
    AuthoringCommand, DamageVerdict, DeathVerdict, DungeonEngine, EncounterEvent, EventOutcome,
};
pub use error::EngineError;
pub use geometry::{BlockPos, Location, Region, Vec3};
pub use host::{EntityId, Host, PlayerId};
pub use layout::{DungeonId, DungeonLayout, LayoutRegistry, RoomLayout};
pub use rng::GameRng;
pub use session::{DungeonSession, SessionRegistry, Stage, Transition};
