//! Layout registry
//!
//! Owns every [`DungeonLayout`] by id, mediates authoring, and persists the
//! full layout after each mutation. Sessions receive an `Arc` snapshot when
//! they claim a layout; authoring edits made while a run is live replace the
//! registry's copy and never reach the running session.

use std::collections::BTreeMap;
use std::sync::Arc;

use hashbrown::HashMap;
use tracing::{debug, info, warn};

use super::{Corner, DungeonId, DungeonLayout, GateKind, PendingSelection};
use crate::error::EngineError;
use crate::geometry::{Location, Region};
use crate::host::PlayerId;
use crate::persist::{LayoutStore, Persistence, StoreError, StoreOp};

pub struct LayoutRegistry<P> {
    layouts: BTreeMap<DungeonId, Arc<DungeonLayout>>,
    selections: HashMap<PlayerId, PendingSelection>,
    persistence: P,
}

impl<P: Persistence> LayoutRegistry<P> {
    pub fn new(persistence: P) -> Self {
        Self {
            layouts: BTreeMap::new(),
            selections: HashMap::new(),
            persistence,
        }
    }

    /// Rebuild every layout from the store's rows.
    ///
    /// Replaces whatever is in memory, except that layouts claimed by a live
    /// session stay claimed. A claimed layout missing from the store is kept
    /// until it is released. Room rows without a dungeon row are skipped.
    pub fn load(&mut self, store: &dyn LayoutStore) -> Result<usize, StoreError> {
        let dungeons = store.load_dungeons()?;
        let mut rooms: HashMap<i32, Vec<_>> = HashMap::new();
        for row in store.load_rooms()? {
            rooms.entry(row.dungeon_id).or_default().push(row);
        }

        let mut claimed: BTreeMap<DungeonId, Arc<DungeonLayout>> = std::mem::take(&mut self.layouts)
            .into_iter()
            .filter(|(_, layout)| layout.is_occupied())
            .collect();
        for row in dungeons {
            let id = DungeonId(row.dungeon_id);
            let mut layout = DungeonLayout::from_rows(row, rooms.remove(&id.0).unwrap_or_default());
            layout.occupied = claimed.remove(&id).is_some();
            self.layouts.insert(id, Arc::new(layout));
        }
        for (id, layout) in claimed {
            warn!(dungeon = %id, "claimed layout missing from store; kept until released");
            self.layouts.insert(id, layout);
        }
        for (orphan, rows) in rooms {
            warn!(dungeon = orphan, rooms = rows.len(), "room rows without a dungeon; skipped");
        }
        info!(count = self.layouts.len(), "loaded dungeon layouts");
        Ok(self.layouts.len())
    }

    pub fn get(&self, id: DungeonId) -> Option<&DungeonLayout> {
        self.layouts.get(&id).map(Arc::as_ref)
    }

    pub fn len(&self) -> usize {
        self.layouts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layouts.is_empty()
    }

    /// Layouts in ascending id order
    pub fn iter(&self) -> impl Iterator<Item = &DungeonLayout> {
        self.layouts.values().map(Arc::as_ref)
    }

    pub fn persistence(&self) -> &P {
        &self.persistence
    }

    /// Give back the persistence sink, e.g. to shut a writer down
    pub fn into_persistence(self) -> P {
        self.persistence
    }

    /// Create an empty layout with its arrival point
    pub fn create(
        &mut self,
        id: DungeonId,
        spawn_point: Location,
    ) -> Result<&DungeonLayout, EngineError> {
        if self.layouts.contains_key(&id) {
            return Err(EngineError::DuplicateId(id));
        }
        let mut layout = DungeonLayout::new(id);
        layout.spawn_point = Some(spawn_point);
        self.layouts.insert(id, Arc::new(layout));
        self.persist(id);
        info!(dungeon = %id, "created dungeon");
        Ok(self.layouts[&id].as_ref())
    }

    /// Remove a layout and all its rows. Absent ids are a no-op.
    pub fn delete(&mut self, id: DungeonId) {
        if self.layouts.remove(&id).is_some() {
            info!(dungeon = %id, "deleted dungeon");
        }
        self.selections.retain(|_, s| s.dungeon != id);
        self.persistence.submit(StoreOp::DeleteDungeon(id.0));
    }

    /// Remove the `count` highest-indexed rooms, returning how many went.
    pub fn trim_rooms(&mut self, id: DungeonId, count: usize) -> Result<usize, EngineError> {
        let layout = self.edit(id)?;
        let doomed: Vec<u32> = layout.rooms.keys().rev().take(count).copied().collect();
        for room in &doomed {
            layout.rooms.remove(room);
        }
        for room in &doomed {
            self.persistence.submit(StoreOp::DeleteRoom {
                dungeon_id: id.0,
                room_id: *room,
            });
        }
        self.persist(id);
        debug!(dungeon = %id, removed = doomed.len(), "trimmed rooms");
        Ok(doomed.len())
    }

    /// First free, fully set-up layout in id order
    pub fn find_unoccupied(&self) -> Option<&DungeonLayout> {
        self.iter()
            .find(|l| !l.is_occupied() && l.is_setup_complete())
    }

    pub fn set_spawn_point(&mut self, id: DungeonId, point: Location) -> Result<(), EngineError> {
        self.edit(id)?.spawn_point = Some(point);
        self.persist(id);
        Ok(())
    }

    pub fn set_boss_spawn_point(
        &mut self,
        id: DungeonId,
        point: Location,
    ) -> Result<(), EngineError> {
        self.edit(id)?.boss_spawn_point = Some(point);
        self.persist(id);
        Ok(())
    }

    pub fn set_reward_container_point(
        &mut self,
        id: DungeonId,
        point: Location,
    ) -> Result<(), EngineError> {
        self.edit(id)?.reward_container_point = Some(point);
        self.persist(id);
        Ok(())
    }

    /// Append a mob spawn point, creating the room if needed
    pub fn add_mob_spawn_point(
        &mut self,
        id: DungeonId,
        room: u32,
        point: Location,
    ) -> Result<usize, EngineError> {
        let layout = self.edit(id)?;
        let points = &mut layout.room_mut(room).mob_spawn_points;
        points.push(point);
        let total = points.len();
        self.persist(id);
        Ok(total)
    }

    pub fn clear_mob_spawn_points(&mut self, id: DungeonId, room: u32) -> Result<(), EngineError> {
        self.edit(id)?.room_mut(room).mob_spawn_points.clear();
        self.persist(id);
        Ok(())
    }

    /// Record one corner of a gate region.
    ///
    /// `Pos1` stores a pending selection, replacing any older one for this
    /// player. `Pos2` completes it and writes the region into the gate named
    /// by `kind`; returns the finished region, or `None` after `Pos1`.
    pub fn capture_region_point(
        &mut self,
        player: PlayerId,
        id: DungeonId,
        room: Option<u32>,
        kind: GateKind,
        corner: Corner,
        point: Location,
    ) -> Result<Option<Region>, EngineError> {
        if !self.layouts.contains_key(&id) {
            return Err(EngineError::UnknownDungeon(id));
        }
        let room = match kind {
            GateKind::Door => Some(room.ok_or(EngineError::MissingRoomIndex)?),
            _ => None,
        };

        match corner {
            Corner::Pos1 => {
                self.selections.insert(
                    player,
                    PendingSelection {
                        dungeon: id,
                        kind,
                        room,
                        first: point,
                    },
                );
                Ok(None)
            }
            Corner::Pos2 => {
                let pending = match self.selections.get(&player) {
                    Some(p) if p.targets(id, kind, room) => p,
                    _ => return Err(EngineError::NoPendingSelection),
                };
                let region = match Region::from_corners(&pending.first, &point) {
                    Ok(region) => region,
                    Err(e) => {
                        self.selections.remove(&player);
                        return Err(e);
                    }
                };
                self.selections.remove(&player);

                let layout = self.edit(id)?;
                let slot = match (kind, room) {
                    (GateKind::EntryDoor, _) => &mut layout.entry_gate,
                    (GateKind::BossDoor, _) => &mut layout.boss_gate,
                    (GateKind::TreasureDoor, _) => &mut layout.reward_gate,
                    (GateKind::Door, Some(index)) => &mut layout.room_mut(index).gate,
                    (GateKind::Door, None) => return Err(EngineError::MissingRoomIndex),
                };
                *slot = Some(region.clone());
                self.persist(id);
                info!(dungeon = %id, %kind, ?room, "gate region set");
                Ok(Some(region))
            }
        }
    }

    pub fn pending_selection(&self, player: PlayerId) -> Option<&PendingSelection> {
        self.selections.get(&player)
    }

    /// Drop a player's half-finished selection (e.g. on disconnect)
    pub fn forget_selection(&mut self, player: PlayerId) {
        self.selections.remove(&player);
    }

    /// Hand a layout to a new session and mark it occupied
    pub fn claim(&mut self, id: DungeonId) -> Result<Arc<DungeonLayout>, EngineError> {
        let layout = self
            .layouts
            .get(&id)
            .ok_or(EngineError::UnknownDungeon(id))?;
        if layout.is_occupied() {
            return Err(EngineError::LayoutOccupied(id));
        }
        if !layout.is_setup_complete() {
            return Err(EngineError::LayoutIncomplete(id));
        }
        let layout = self.edit(id)?;
        layout.occupied = true;
        let snapshot = Arc::new(layout.clone());
        Ok(snapshot)
    }

    /// Clear the occupied flag after a session ends
    pub fn release(&mut self, id: DungeonId) {
        if let Some(layout) = self.layouts.get_mut(&id) {
            if layout.is_occupied() {
                Arc::make_mut(layout).occupied = false;
            }
        }
    }

    fn edit(&mut self, id: DungeonId) -> Result<&mut DungeonLayout, EngineError> {
        self.layouts
            .get_mut(&id)
            .map(Arc::make_mut)
            .ok_or(EngineError::UnknownDungeon(id))
    }

    /// Queue a full upsert of the layout and every room row
    fn persist(&self, id: DungeonId) {
        let Some(layout) = self.layouts.get(&id) else {
            return;
        };
        self.persistence
            .submit(StoreOp::UpsertDungeon(layout.to_row()));
        for row in layout.room_rows() {
            self.persistence.submit(StoreOp::UpsertRoom(row));
        }
    }
}
