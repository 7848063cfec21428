//! Two-corner region capture

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use super::DungeonId;
use crate::geometry::Location;

/// Which gate a captured region is written into
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
    EnumString,
)]
#[strum(serialize_all = "lowercase")]
pub enum GateKind {
    EntryDoor,
    BossDoor,
    TreasureDoor,
    /// A room's exit door; needs a room index
    Door,
}

/// Which corner a capture call records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Corner {
    Pos1,
    Pos2,
}

/// A first corner waiting for its partner
#[derive(Debug, Clone, PartialEq)]
pub struct PendingSelection {
    pub dungeon: DungeonId,
    pub kind: GateKind,
    pub room: Option<u32>,
    pub first: Location,
}

impl PendingSelection {
    /// Whether a `pos2` call targets the same gate
    pub fn targets(&self, dungeon: DungeonId, kind: GateKind, room: Option<u32>) -> bool {
        self.dungeon == dungeon && self.kind == kind && self.room == room
    }
}
