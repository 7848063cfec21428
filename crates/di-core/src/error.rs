//! Engine error taxonomy
//!
//! Every variant is a rejected, feedback-only condition: the registry or
//! session keeps its prior state and the actor is told why.

use thiserror::Error;

use crate::layout::DungeonId;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Dungeon {0} already exists")]
    DuplicateId(DungeonId),

    #[error("Dungeon {0} does not exist")]
    UnknownDungeon(DungeonId),

    #[error("Dungeon {0} is not fully set up")]
    LayoutIncomplete(DungeonId),

    #[error("Dungeon {0} is already occupied")]
    LayoutOccupied(DungeonId),

    #[error("No dungeon is available right now")]
    NoFreeDungeon,

    #[error("Both corners must be in the same world ({first} vs {second})")]
    CrossSpaceSelection { first: String, second: String },

    #[error("No pending selection for this gate; mark pos1 first")]
    NoPendingSelection,

    #[error("Door gates need a room number")]
    MissingRoomIndex,

    #[error("Unknown gate kind '{0}' (expected entrydoor, bossdoor, treasuredoor or door)")]
    UnknownGateKind(String),

    #[error("{0}")]
    InvalidTransition(&'static str),

    #[error("This door is locked. Clear the room to find its key.")]
    NoKey,

    #[error("Hold the dungeon key to unlock this door.")]
    KeyNotHeld,

    #[error("You are already in a dungeon")]
    AlreadyInDungeon,

    #[error("You are not in a dungeon")]
    NotInDungeon,

    #[error("Usage: {0}")]
    Usage(&'static str),
}
