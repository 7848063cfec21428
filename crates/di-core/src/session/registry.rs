//! Session lookup by player and by owned entity

use hashbrown::HashMap;

use super::{DungeonSession, EntityChange};
use crate::error::EngineError;
use crate::host::{EntityId, PlayerId};

/// All live runs, at most one per player
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<PlayerId, DungeonSession>,
    owners: HashMap<EntityId, PlayerId>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, player: PlayerId) -> bool {
        self.sessions.contains_key(&player)
    }

    pub fn get(&self, player: PlayerId) -> Option<&DungeonSession> {
        self.sessions.get(&player)
    }

    pub fn get_mut(&mut self, player: PlayerId) -> Option<&mut DungeonSession> {
        self.sessions.get_mut(&player)
    }

    /// Register a freshly begun session and index what it spawned
    pub fn insert(&mut self, session: DungeonSession) -> Result<(), EngineError> {
        let player = session.player();
        if self.sessions.contains_key(&player) {
            return Err(EngineError::AlreadyInDungeon);
        }
        self.sessions.insert(player, session);
        self.sync(player);
        Ok(())
    }

    /// Player whose run owns the entity
    pub fn owner_of(&self, entity: EntityId) -> Option<PlayerId> {
        self.owners.get(&entity).copied()
    }

    /// Fold a session's recorded ownership changes into the reverse index.
    ///
    /// Call after every operation that may spawn or lose entities.
    pub fn sync(&mut self, player: PlayerId) {
        let Some(session) = self.sessions.get_mut(&player) else {
            return;
        };
        for change in session.drain_entity_changes() {
            match change {
                EntityChange::Claimed(id) => {
                    self.owners.insert(id, player);
                }
                EntityChange::Released(id) => {
                    self.owners.remove(&id);
                }
            }
        }
    }

    /// Take a session out, dropping every index entry that points at it
    pub fn remove(&mut self, player: PlayerId) -> Option<DungeonSession> {
        self.sync(player);
        let session = self.sessions.remove(&player)?;
        self.owners.retain(|_, owner| *owner != player);
        Some(session)
    }

    pub fn players(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.sessions.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Number of entities currently indexed
    pub fn owned_entity_count(&self) -> usize {
        self.owners.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::collab::{FixedRewards, RecordingAudit};
    use crate::config::{BossTuning, GateMaterials, KeyItem, MinionTuning, RoomMobTuning};
    use crate::encounter::{EncounterSpawner, GateController};
    use crate::geometry::{BlockPos, Location, Region, Vec3};
    use crate::host::{Material, SimHost};
    use crate::layout::{DungeonId, DungeonLayout};
    use crate::rng::GameRng;
    use crate::session::{SessionCtx, Transition};

    const HERO: PlayerId = PlayerId(1);

    fn at(x: f64) -> Location {
        Location::new("world", Vec3::new(x, 64.0, 0.5))
    }

    fn layout(id: i32) -> Arc<DungeonLayout> {
        let mut layout = DungeonLayout::new(DungeonId(id));
        layout.spawn_point = Some(at(0.5));
        layout.entry_gate = Some(Region::new(
            "world",
            Vec3::new(5.0, 64.0, 0.0),
            Vec3::new(5.0, 65.0, 1.0),
        ));
        layout.room_mut(1).mob_spawn_points = vec![at(7.5), at(8.5)];
        layout.boss_spawn_point = Some(at(30.5));
        layout.reward_container_point = Some(at(45.5));
        Arc::new(layout)
    }

    /// Begin a run for HERO and walk it through the entry door
    fn entered(host: &mut SimHost) -> (DungeonSession, Vec<EntityId>) {
        let mut rng = GameRng::new(5);
        let spawner = EncounterSpawner::new(
            RoomMobTuning::default(),
            BossTuning::default(),
            MinionTuning::default(),
        );
        let gates = GateController::new(GateMaterials::default());
        let key = KeyItem::default();
        let mut rewards = FixedRewards::default();
        let audit = RecordingAudit::new();
        let mut ctx = SessionCtx {
            host,
            rng: &mut rng,
            spawner: &spawner,
            gates: &gates,
            key: &key,
            reward_container: Material::Chest,
            rewards: &mut rewards,
            audit: &audit,
        };
        let mut session = DungeonSession::begin(HERO, layout(1), &mut ctx);
        let entered = session.interact(&mut ctx, "world", BlockPos::new(5, 64, 0));
        assert_eq!(entered, Ok(Transition::EnteredRoom(1)));
        let mobs = session.active_mobs().collect();
        (session, mobs)
    }

    #[test]
    fn test_insert_indexes_spawned_entities() {
        let mut host = SimHost::new();
        let (session, mobs) = entered(&mut host);
        let mut registry = SessionRegistry::new();
        registry.insert(session).unwrap();

        assert!(registry.contains(HERO));
        assert_eq!(registry.owned_entity_count(), 2);
        for mob in &mobs {
            assert_eq!(registry.owner_of(*mob), Some(HERO));
        }
        assert_eq!(registry.owner_of(EntityId(999)), None);

        let (again, _) = entered(&mut host);
        assert_eq!(registry.insert(again), Err(EngineError::AlreadyInDungeon));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_drops_index_entries() {
        let mut host = SimHost::new();
        let (session, mobs) = entered(&mut host);
        let mut registry = SessionRegistry::new();
        registry.insert(session).unwrap();

        let removed = registry.remove(HERO).map(|s| s.player());
        assert_eq!(removed, Some(HERO));
        assert!(registry.is_empty());
        assert_eq!(registry.owned_entity_count(), 0);
        assert_eq!(registry.owner_of(mobs[0]), None);
        assert!(registry.remove(HERO).is_none());
    }
}
