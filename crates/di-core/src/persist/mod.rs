//! Layout persistence
//!
//! Geometry lives in a row store keyed by `dungeon_id` (layout rows) and
//! `(dungeon_id, room_id)` (room rows). Unset geometry is a `None` column,
//! never an error.
//!
//! The registry never talks to a store directly. It submits [`StoreOp`]s to a
//! [`Persistence`] sink and moves on; [`BackgroundWriter`] applies them on its
//! own thread and logs failures. Every save is a full upsert, so a dropped
//! write is repaired by the next edit of the same dungeon.

mod memory;
mod writer;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::{Location, Region};

pub use memory::MemoryStore;
pub use writer::BackgroundWriter;

/// Row store errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Store backend error: {0}")]
    Backend(String),

    #[error("Store lock poisoned")]
    Poisoned,
}

/// One row of the dungeon table
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DungeonRow {
    pub dungeon_id: i32,
    #[serde(default)]
    pub spawn_point: Option<Location>,
    #[serde(default)]
    pub entry_gate: Option<Region>,
    #[serde(default)]
    pub boss_spawn_point: Option<Location>,
    #[serde(default)]
    pub boss_gate: Option<Region>,
    #[serde(default)]
    pub reward_gate: Option<Region>,
    #[serde(default)]
    pub reward_container_point: Option<Location>,
}

/// One row of the room table
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RoomRow {
    pub dungeon_id: i32,
    pub room_id: u32,
    #[serde(default)]
    pub gate: Option<Region>,
    #[serde(default)]
    pub mob_spawn_points: Vec<Location>,
}

/// A single write against the row store
#[derive(Debug, Clone, PartialEq)]
pub enum StoreOp {
    UpsertDungeon(DungeonRow),
    UpsertRoom(RoomRow),
    /// Delete the dungeon row and every room row it owns
    DeleteDungeon(i32),
    DeleteRoom { dungeon_id: i32, room_id: u32 },
}

/// Row-oriented storage backend
pub trait LayoutStore {
    fn load_dungeons(&self) -> Result<Vec<DungeonRow>, StoreError>;

    fn load_rooms(&self) -> Result<Vec<RoomRow>, StoreError>;

    fn upsert_dungeon(&mut self, row: &DungeonRow) -> Result<(), StoreError>;

    fn upsert_room(&mut self, row: &RoomRow) -> Result<(), StoreError>;

    fn delete_dungeon(&mut self, dungeon_id: i32) -> Result<(), StoreError>;

    fn delete_room(&mut self, dungeon_id: i32, room_id: u32) -> Result<(), StoreError>;

    /// Apply one queued operation
    fn apply(&mut self, op: &StoreOp) -> Result<(), StoreError> {
        match op {
            StoreOp::UpsertDungeon(row) => self.upsert_dungeon(row),
            StoreOp::UpsertRoom(row) => self.upsert_room(row),
            StoreOp::DeleteDungeon(id) => self.delete_dungeon(*id),
            StoreOp::DeleteRoom {
                dungeon_id,
                room_id,
            } => self.delete_room(*dungeon_id, *room_id),
        }
    }
}

/// Fire-and-forget sink for store writes.
///
/// `submit` must never block the caller on I/O.
pub trait Persistence {
    fn submit(&self, op: StoreOp);
}
