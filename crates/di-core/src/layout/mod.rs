//! Dungeon layouts
//!
//! A layout is the authored, persisted geometry of one dungeon: where the
//! player arrives, which regions act as doors, where mobs and the boss appear,
//! and where the reward container materializes.

mod registry;
mod selection;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::geometry::{BlockPos, Location, Region};
use crate::persist::{DungeonRow, RoomRow};

pub use registry::LayoutRegistry;
pub use selection::{Corner, GateKind, PendingSelection};

/// Stable dungeon identifier, assigned by the author at creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DungeonId(pub i32);

impl core::fmt::Display for DungeonId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One room's door and mob spawn points
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RoomLayout {
    pub room_index: u32,
    /// Exit door of this room
    pub gate: Option<Region>,
    pub mob_spawn_points: Vec<Location>,
}

impl RoomLayout {
    pub fn new(room_index: u32) -> Self {
        Self {
            room_index,
            gate: None,
            mob_spawn_points: Vec::new(),
        }
    }

    fn to_row(&self, dungeon: DungeonId) -> RoomRow {
        RoomRow {
            dungeon_id: dungeon.0,
            room_id: self.room_index,
            gate: self.gate.clone(),
            mob_spawn_points: self.mob_spawn_points.clone(),
        }
    }

    fn from_row(row: RoomRow) -> Self {
        Self {
            room_index: row.room_id,
            gate: row.gate,
            mob_spawn_points: row.mob_spawn_points,
        }
    }
}

/// What a block inside a dungeon is part of
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutFeature {
    EntryGate,
    /// Exit door of the given room
    RoomGate(u32),
    BossGate,
    RewardGate,
    RewardContainer,
}

/// Fixed geometry of one dungeon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DungeonLayout {
    pub id: DungeonId,
    pub spawn_point: Option<Location>,
    pub entry_gate: Option<Region>,
    /// Rooms keyed by index `1..=N`; room 0 is the implicit antechamber
    pub rooms: BTreeMap<u32, RoomLayout>,
    pub boss_spawn_point: Option<Location>,
    pub boss_gate: Option<Region>,
    pub reward_gate: Option<Region>,
    pub reward_container_point: Option<Location>,
    /// Claimed by a live session; never persisted
    #[serde(skip)]
    pub(crate) occupied: bool,
}

impl DungeonLayout {
    pub fn new(id: DungeonId) -> Self {
        Self {
            id,
            spawn_point: None,
            entry_gate: None,
            rooms: BTreeMap::new(),
            boss_spawn_point: None,
            boss_gate: None,
            reward_gate: None,
            reward_container_point: None,
            occupied: false,
        }
    }

    pub fn is_occupied(&self) -> bool {
        self.occupied
    }

    /// Whether the layout has everything a run needs
    pub fn is_setup_complete(&self) -> bool {
        self.spawn_point.is_some()
            && self.entry_gate.is_some()
            && !self.rooms.is_empty()
            && self.boss_spawn_point.is_some()
            && self.reward_container_point.is_some()
    }

    /// Highest room index, i.e. the room before the boss
    pub fn room_count(&self) -> u32 {
        self.rooms.keys().next_back().copied().unwrap_or(0)
    }

    /// Rooms before the last with no mob spawn points, missing indexes
    /// included. Nothing there can drop the key to move on.
    pub fn rooms_without_mobs(&self) -> Vec<u32> {
        (1..self.room_count())
            .filter(|i| self.room(*i).is_none_or(|r| r.mob_spawn_points.is_empty()))
            .collect()
    }

    pub fn room(&self, index: u32) -> Option<&RoomLayout> {
        self.rooms.get(&index)
    }

    /// Room at `index`, created empty on first reference
    pub fn room_mut(&mut self, index: u32) -> &mut RoomLayout {
        self.rooms
            .entry(index)
            .or_insert_with(|| RoomLayout::new(index))
    }

    /// Every gate region, in progression order
    pub fn gate_regions(&self) -> impl Iterator<Item = &Region> {
        self.entry_gate
            .iter()
            .chain(self.rooms.values().filter_map(|r| r.gate.as_ref()))
            .chain(self.boss_gate.iter())
            .chain(self.reward_gate.iter())
    }

    /// Classify the block a player interacted with
    pub fn feature_at(&self, space: &str, pos: BlockPos) -> Option<LayoutFeature> {
        if let Some(point) = &self.reward_container_point {
            if point.space == space && point.block() == pos {
                return Some(LayoutFeature::RewardContainer);
            }
        }
        let inside = |r: &Option<Region>| r.as_ref().is_some_and(|r| r.contains_block(space, pos));
        if inside(&self.entry_gate) {
            return Some(LayoutFeature::EntryGate);
        }
        // The boss gate wins over a room gate painted on the same cells
        if inside(&self.boss_gate) {
            return Some(LayoutFeature::BossGate);
        }
        if let Some(room) = self.rooms.values().find(|r| inside(&r.gate)) {
            return Some(LayoutFeature::RoomGate(room.room_index));
        }
        if inside(&self.reward_gate) {
            return Some(LayoutFeature::RewardGate);
        }
        None
    }

    pub fn to_row(&self) -> DungeonRow {
        DungeonRow {
            dungeon_id: self.id.0,
            spawn_point: self.spawn_point.clone(),
            entry_gate: self.entry_gate.clone(),
            boss_spawn_point: self.boss_spawn_point.clone(),
            boss_gate: self.boss_gate.clone(),
            reward_gate: self.reward_gate.clone(),
            reward_container_point: self.reward_container_point.clone(),
        }
    }

    pub fn room_rows(&self) -> Vec<RoomRow> {
        self.rooms.values().map(|r| r.to_row(self.id)).collect()
    }

    /// Rebuild a layout from its rows; unset columns stay unset
    pub fn from_rows(row: DungeonRow, rooms: impl IntoIterator<Item = RoomRow>) -> Self {
        let mut layout = Self::new(DungeonId(row.dungeon_id));
        layout.spawn_point = row.spawn_point;
        layout.entry_gate = row.entry_gate;
        layout.boss_spawn_point = row.boss_spawn_point;
        layout.boss_gate = row.boss_gate;
        layout.reward_gate = row.reward_gate;
        layout.reward_container_point = row.reward_container_point;
        for room in rooms {
            if room.dungeon_id == row.dungeon_id {
                layout.rooms.insert(room.room_id, RoomLayout::from_row(room));
            }
        }
        layout
    }
}
