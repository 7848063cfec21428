//! Background store writer
//!
//! Owns a store on a dedicated thread and drains an unbounded queue of
//! [`StoreOp`]s. Submitting never waits; failures are logged and dropped.

use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use super::{LayoutStore, Persistence, StoreOp};

pub struct BackgroundWriter {
    tx: Option<Sender<StoreOp>>,
    handle: Option<JoinHandle<usize>>,
}

impl BackgroundWriter {
    /// Move `store` onto a writer thread
    pub fn spawn<S>(mut store: S) -> std::io::Result<Self>
    where
        S: LayoutStore + Send + 'static,
    {
        let (tx, rx) = mpsc::channel::<StoreOp>();
        let handle = thread::Builder::new()
            .name("layout-writer".to_string())
            .spawn(move || {
                let mut failures = 0;
                for op in rx {
                    if let Err(e) = store.apply(&op) {
                        failures += 1;
                        warn!(error = %e, ?op, "layout write failed");
                    }
                }
                failures
            })?;
        Ok(Self {
            tx: Some(tx),
            handle: Some(handle),
        })
    }

    /// Close the queue and wait for pending writes to land.
    ///
    /// Returns how many writes failed over the writer's lifetime.
    pub fn shutdown(mut self) -> usize {
        self.finish()
    }

    fn finish(&mut self) -> usize {
        self.tx.take();
        match self.handle.take().map(JoinHandle::join) {
            Some(Ok(failures)) => failures,
            Some(Err(_)) => {
                warn!("layout writer thread panicked");
                0
            }
            None => 0,
        }
    }
}

impl Persistence for BackgroundWriter {
    fn submit(&self, op: StoreOp) {
        let Some(tx) = &self.tx else {
            return;
        };
        if tx.send(op).is_err() {
            warn!("layout writer is gone; write dropped");
        } else {
            debug!("queued layout write");
        }
    }
}

impl Drop for BackgroundWriter {
    fn drop(&mut self) {
        self.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::{DungeonRow, MemoryStore, RoomRow, StoreError};

    #[test]
    fn test_writes_land_after_shutdown() {
        let store = MemoryStore::new();
        let writer = BackgroundWriter::spawn(store.clone()).unwrap();
        writer.submit(StoreOp::UpsertDungeon(DungeonRow {
            dungeon_id: 4,
            ..Default::default()
        }));
        writer.submit(StoreOp::UpsertRoom(RoomRow {
            dungeon_id: 4,
            room_id: 1,
            ..Default::default()
        }));
        assert_eq!(writer.shutdown(), 0);
        assert!(store.dungeon(4).is_some());
        assert!(store.room(4, 1).is_some());
    }

    struct FailingStore;

    impl LayoutStore for FailingStore {
        fn load_dungeons(&self) -> Result<Vec<DungeonRow>, StoreError> {
            Ok(Vec::new())
        }
        fn load_rooms(&self) -> Result<Vec<RoomRow>, StoreError> {
            Ok(Vec::new())
        }
        fn upsert_dungeon(&mut self, _: &DungeonRow) -> Result<(), StoreError> {
            Err(StoreError::Backend("disk full".into()))
        }
        fn upsert_room(&mut self, _: &RoomRow) -> Result<(), StoreError> {
            Ok(())
        }
        fn delete_dungeon(&mut self, _: i32) -> Result<(), StoreError> {
            Ok(())
        }
        fn delete_room(&mut self, _: i32, _: u32) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[test]
    fn test_failures_are_counted_not_raised() {
        let writer = BackgroundWriter::spawn(FailingStore).unwrap();
        writer.submit(StoreOp::UpsertDungeon(DungeonRow::default()));
        writer.submit(StoreOp::DeleteDungeon(1));
        writer.submit(StoreOp::UpsertDungeon(DungeonRow::default()));
        assert_eq!(writer.shutdown(), 2);
    }
}
