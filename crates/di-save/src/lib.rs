//! di-save: JSON row store for dungeon layouts
//!
//! Keeps the dungeon and room tables in one versioned JSON document. Every
//! write rewrites the whole file, so the store on disk always matches the
//! last applied operation.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use di_core::persist::{DungeonRow, LayoutStore, RoomRow, StoreError};

/// Current store file format version
pub const STORE_VERSION: u32 = 1;

/// Store file errors
#[derive(Debug, Error)]
pub enum SaveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Incompatible store version: expected {expected}, found {found}")]
    IncompatibleVersion { expected: u32, found: u32 },

    #[error("Invalid store file header")]
    InvalidHeader,
}

impl From<SaveError> for StoreError {
    fn from(e: SaveError) -> Self {
        StoreError::Backend(e.to_string())
    }
}

/// Store file header for versioning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreHeader {
    pub magic: String,
    pub version: u32,
}

impl StoreHeader {
    const MAGIC: &'static str = "DNGN";

    pub fn new() -> Self {
        Self {
            magic: Self::MAGIC.to_string(),
            version: STORE_VERSION,
        }
    }

    pub fn validate(&self) -> Result<(), SaveError> {
        if self.magic != Self::MAGIC {
            return Err(SaveError::InvalidHeader);
        }
        if self.version != STORE_VERSION {
            return Err(SaveError::IncompatibleVersion {
                expected: STORE_VERSION,
                found: self.version,
            });
        }
        Ok(())
    }
}

impl Default for StoreHeader {
    fn default() -> Self {
        Self::new()
    }
}

/// On-disk document
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct StoreFile {
    pub header: StoreHeader,
    #[serde(default)]
    pub dungeons: Vec<DungeonRow>,
    #[serde(default)]
    pub rooms: Vec<RoomRow>,
}

/// Layout rows backed by a JSON file
#[derive(Debug)]
pub struct JsonStore {
    path: PathBuf,
    dungeons: BTreeMap<i32, DungeonRow>,
    rooms: BTreeMap<(i32, u32), RoomRow>,
}

impl JsonStore {
    /// Open a store, starting empty if the file does not exist yet
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SaveError> {
        let path = path.as_ref().to_path_buf();
        let mut store = Self {
            path,
            dungeons: BTreeMap::new(),
            rooms: BTreeMap::new(),
        };
        if !store.path.exists() {
            return Ok(store);
        }

        let reader = BufReader::new(File::open(&store.path)?);
        let file: StoreFile = serde_json::from_reader(reader)?;
        file.header.validate()?;
        store.dungeons = file
            .dungeons
            .into_iter()
            .map(|row| (row.dungeon_id, row))
            .collect();
        store.rooms = file
            .rooms
            .into_iter()
            .map(|row| ((row.dungeon_id, row.room_id), row))
            .collect();
        debug!(path = %store.path.display(), dungeons = store.dungeons.len(), "opened layout store");
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the whole document, replacing the file only once it is complete
    pub fn flush(&self) -> Result<(), SaveError> {
        let file = StoreFile {
            header: StoreHeader::new(),
            dungeons: self.dungeons.values().cloned().collect(),
            rooms: self.rooms.values().cloned().collect(),
        };
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        let writer = BufWriter::new(File::create(&tmp)?);
        serde_json::to_writer_pretty(writer, &file)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl LayoutStore for JsonStore {
    fn load_dungeons(&self) -> Result<Vec<DungeonRow>, StoreError> {
        Ok(self.dungeons.values().cloned().collect())
    }

    fn load_rooms(&self) -> Result<Vec<RoomRow>, StoreError> {
        Ok(self.rooms.values().cloned().collect())
    }

    fn upsert_dungeon(&mut self, row: &DungeonRow) -> Result<(), StoreError> {
        self.dungeons.insert(row.dungeon_id, row.clone());
        Ok(self.flush()?)
    }

    fn upsert_room(&mut self, row: &RoomRow) -> Result<(), StoreError> {
        self.rooms
            .insert((row.dungeon_id, row.room_id), row.clone());
        Ok(self.flush()?)
    }

    fn delete_dungeon(&mut self, dungeon_id: i32) -> Result<(), StoreError> {
        self.dungeons.remove(&dungeon_id);
        self.rooms.retain(|(d, _), _| *d != dungeon_id);
        Ok(self.flush()?)
    }

    fn delete_room(&mut self, dungeon_id: i32, room_id: u32) -> Result<(), StoreError> {
        self.rooms.remove(&(dungeon_id, room_id));
        Ok(self.flush()?)
    }
}

/// Check if a store file exists
pub fn store_exists(path: impl AsRef<Path>) -> bool {
    path.as_ref().exists()
}

/// Default location of the layout store
pub fn default_store_path() -> PathBuf {
    let mut path = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("dungeon-instances");
    path.push("layouts.json");
    path
}
