//! Shared in-memory row store

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::warn;

use super::{DungeonRow, LayoutStore, Persistence, RoomRow, StoreError, StoreOp};

#[derive(Debug, Default)]
struct Tables {
    dungeons: BTreeMap<i32, DungeonRow>,
    rooms: BTreeMap<(i32, u32), RoomRow>,
}

/// Row store held in memory.
///
/// Clones share the same tables, so a test can keep one handle for
/// inspection while the registry writes through another. As a
/// [`Persistence`] sink it applies writes immediately.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables.lock().map_err(|_| StoreError::Poisoned)
    }

    pub fn dungeon(&self, id: i32) -> Option<DungeonRow> {
        self.lock().ok()?.dungeons.get(&id).cloned()
    }

    pub fn room(&self, dungeon_id: i32, room_id: u32) -> Option<RoomRow> {
        self.lock().ok()?.rooms.get(&(dungeon_id, room_id)).cloned()
    }

    pub fn room_count(&self, dungeon_id: i32) -> usize {
        self.lock()
            .map(|t| t.rooms.keys().filter(|(d, _)| *d == dungeon_id).count())
            .unwrap_or(0)
    }
}

impl LayoutStore for MemoryStore {
    fn load_dungeons(&self) -> Result<Vec<DungeonRow>, StoreError> {
        Ok(self.lock()?.dungeons.values().cloned().collect())
    }

    fn load_rooms(&self) -> Result<Vec<RoomRow>, StoreError> {
        Ok(self.lock()?.rooms.values().cloned().collect())
    }

    fn upsert_dungeon(&mut self, row: &DungeonRow) -> Result<(), StoreError> {
        self.lock()?.dungeons.insert(row.dungeon_id, row.clone());
        Ok(())
    }

    fn upsert_room(&mut self, row: &RoomRow) -> Result<(), StoreError> {
        self.lock()?
            .rooms
            .insert((row.dungeon_id, row.room_id), row.clone());
        Ok(())
    }

    fn delete_dungeon(&mut self, dungeon_id: i32) -> Result<(), StoreError> {
        let mut tables = self.lock()?;
        tables.dungeons.remove(&dungeon_id);
        tables.rooms.retain(|(d, _), _| *d != dungeon_id);
        Ok(())
    }

    fn delete_room(&mut self, dungeon_id: i32, room_id: u32) -> Result<(), StoreError> {
        self.lock()?.rooms.remove(&(dungeon_id, room_id));
        Ok(())
    }
}

impl Persistence for MemoryStore {
    fn submit(&self, op: StoreOp) {
        let mut store = self.clone();
        if let Err(e) = store.apply(&op) {
            warn!(error = %e, "layout write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delete_dungeon_cascades_rooms() {
        let mut store = MemoryStore::new();
        store
            .upsert_dungeon(&DungeonRow {
                dungeon_id: 1,
                ..Default::default()
            })
            .unwrap();
        for room_id in 1..=3 {
            store
                .upsert_room(&RoomRow {
                    dungeon_id: 1,
                    room_id,
                    ..Default::default()
                })
                .unwrap();
        }
        store
            .upsert_room(&RoomRow {
                dungeon_id: 2,
                room_id: 1,
                ..Default::default()
            })
            .unwrap();

        store.delete_dungeon(1).unwrap();
        assert!(store.dungeon(1).is_none());
        assert_eq!(store.room_count(1), 0);
        assert_eq!(store.room_count(2), 1);
    }

    #[test]
    fn test_upsert_replaces_row() {
        let store = MemoryStore::new();
        store.submit(StoreOp::UpsertRoom(RoomRow {
            dungeon_id: 1,
            room_id: 1,
            ..Default::default()
        }));
        let mut row = store.room(1, 1).unwrap();
        row.mob_spawn_points.push(crate::geometry::Location::new(
            "world",
            crate::geometry::Vec3::default(),
        ));
        store.submit(StoreOp::UpsertRoom(row));
        assert_eq!(store.room(1, 1).unwrap().mob_spawn_points.len(), 1);
        assert_eq!(store.room_count(1), 1);
    }
}
