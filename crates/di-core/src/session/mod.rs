//! Live dungeon runs
//!
//! A [`DungeonSession`] is one player's run through one claimed layout. The
//! [`SessionRegistry`] finds sessions by player and, through a reverse index,
//! by any entity a session owns.

mod registry;
mod state;

use serde::{Deserialize, Serialize};

use crate::collab::{AuditSink, RewardRoller};
use crate::config::KeyItem;
use crate::encounter::{EncounterSpawner, GateController};
use crate::host::{EntityId, Host, Material};
use crate::rng::GameRng;

pub use registry::SessionRegistry;
pub use state::DungeonSession;

/// Where a run stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    /// Before the entry gate (room 0)
    Antechamber,
    /// Inside room `1..=N`
    Room(u32),
    /// Past the boss gate
    BossRoom,
    /// Boss dead; waiting for the reward claim
    Cleared,
}

impl Stage {
    /// Numeric room view: 0 for the antechamber, `k` for room `k`, `None`
    /// once past the rooms
    pub const fn current_room(&self) -> Option<u32> {
        match self {
            Stage::Antechamber => Some(0),
            Stage::Room(k) => Some(*k),
            Stage::BossRoom | Stage::Cleared => None,
        }
    }
}

/// Which health trigger spawned a minion wave
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BossPhase {
    One,
    Two,
}

/// What a session call did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Not relevant to this run
    Ignored,
    EnteredRoom(u32),
    MobSlain { remaining: usize },
    KeyDropped,
    BossSpawned,
    EnteredBossRoom,
    /// Hit on an invulnerable boss; the host must not apply it
    DamageCancelled,
    MinionWave { phase: BossPhase, size: usize },
    MinionSlain { remaining: usize },
    BossVulnerable,
    BossDefeated,
    RewardClaimed,
    /// Run torn down by stop, disconnect or timeout
    SessionEnded,
}

/// Ownership change recorded for the registry's reverse index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityChange {
    Claimed(EntityId),
    Released(EntityId),
}

/// Everything a session transition may touch besides its own state
pub struct SessionCtx<'a> {
    pub host: &'a mut dyn Host,
    pub rng: &'a mut GameRng,
    pub spawner: &'a EncounterSpawner,
    pub gates: &'a GateController,
    pub key: &'a KeyItem,
    /// Block that stands for the reward container
    pub reward_container: Material,
    pub rewards: &'a mut dyn RewardRoller,
    pub audit: &'a dyn AuditSink,
}
