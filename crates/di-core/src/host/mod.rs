//! Host world boundary
//!
//! The engine runs inside a host world simulation it does not own. Every side
//! effect (blocks, entities, items, messages) goes through [`Host`].

mod sim;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::encounter::{CreatureKind, Tier};
use crate::geometry::{BlockPos, Location};

pub use sim::{SimEntity, SimHost};

/// Unique identifier for an online player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(pub u64);

/// Unique identifier for a live world entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl core::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "player#{}", self.0)
    }
}

impl core::fmt::Display for EntityId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "entity#{}", self.0)
    }
}

/// Block materials the engine places or inspects
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
    EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Material {
    #[default]
    Air,
    IronBars,
    Barrier,
    Stone,
    Chest,
    Glowstone,
}

/// A stack of items
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    /// Host item type, e.g. `tripwire_hook`
    pub item: String,
    /// Custom display name, if any
    #[serde(default)]
    pub display_name: Option<String>,
    pub amount: u32,
}

impl ItemStack {
    pub fn new(item: impl Into<String>, amount: u32) -> Self {
        Self {
            item: item.into(),
            display_name: None,
            amount,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }
}

bitflags! {
    /// Markers imprinted on an entity at creation time.
    ///
    /// The host reads these to suppress ambient world behaviour for
    /// encounter mobs; the engine never toggles global state to do so.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct SpawnMarks: u32 {
        /// Belongs to a dungeon encounter
        const ENCOUNTER  = 0x0001;
        /// Must not burn in daylight
        const NO_SUNBURN = 0x0002;
        /// Spawned as a room mob
        const ROOM_MOB   = 0x0004;
        /// The boss
        const BOSS       = 0x0008;
        /// Boss minion
        const MINION     = 0x0010;
    }
}

/// Everything the host needs to create an encounter entity
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnRequest {
    pub kind: CreatureKind,
    pub tier: Tier,
    pub at: Location,
    pub max_health: f64,
    /// Visible name tag, e.g. `"Mutated Zombie ❤ 30"`
    pub name_tag: String,
    pub marks: SpawnMarks,
}

/// The host world simulation.
///
/// Calls are synchronous and must not block; they run on the host's tick
/// thread in the middle of event handling.
pub trait Host {
    /// Material at a cell; unloaded or untouched cells read as air
    fn block(&self, space: &str, pos: BlockPos) -> Material;

    fn set_block(&mut self, space: &str, pos: BlockPos, material: Material);

    fn spawn(&mut self, request: &SpawnRequest) -> EntityId;

    /// Remove an entity; unknown or already-dead ids are ignored
    fn remove_entity(&mut self, entity: EntityId);

    /// Current health, `None` if the entity no longer exists
    fn health(&self, entity: EntityId) -> Option<f64>;

    fn drop_item(&mut self, at: &Location, item: ItemStack);

    /// The stack in the player's main hand
    fn held_item(&self, player: PlayerId) -> Option<ItemStack>;

    /// Take `amount` items from the held stack; false if it holds fewer
    fn consume_held(&mut self, player: PlayerId, amount: u32) -> bool;

    fn teleport(&mut self, player: PlayerId, to: &Location);

    /// Present reward items to the player (container view)
    fn present_rewards(&mut self, player: PlayerId, items: Vec<ItemStack>);

    /// Feedback message to a player
    fn tell(&mut self, player: PlayerId, message: &str);
}
