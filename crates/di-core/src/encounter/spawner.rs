//! Encounter spawning
//!
//! Creates room mobs, the boss and its minions through the host, imprinting
//! each entity with [`SpawnMarks`] at creation. The spawner holds only
//! tuning; it keeps no record of what it spawned.

use tracing::debug;

use super::creature::{CreatureKind, FULL_POOL, Tier, WEAK_POOL};
use crate::config::{BossTuning, MinionTuning, RoomMobTuning};
use crate::geometry::Location;
use crate::host::{EntityId, Host, SpawnMarks, SpawnRequest};
use crate::rng::GameRng;

/// Stateless mob factory
#[derive(Debug, Clone)]
pub struct EncounterSpawner {
    room_mobs: RoomMobTuning,
    boss: BossTuning,
    minion: MinionTuning,
}

/// Name tag shown above an encounter mob
fn name_tag(label: &str, health: f64) -> String {
    format!("{} ❤ {:.0}", label, health)
}

impl EncounterSpawner {
    pub fn new(room_mobs: RoomMobTuning, boss: BossTuning, minion: MinionTuning) -> Self {
        Self {
            room_mobs,
            boss,
            minion,
        }
    }

    pub fn boss_tuning(&self) -> &BossTuning {
        &self.boss
    }

    /// Pick a base kind for a room.
    ///
    /// Early rooms draw from the weak pool most of the time; later rooms draw
    /// uniformly from the full pool.
    pub fn roll_kind(&self, rng: &mut GameRng, room_index: u32) -> CreatureKind {
        let pool = if room_index <= self.room_mobs.early_room_cutoff
            && rng.percent(self.room_mobs.weak_bias_percent)
        {
            WEAK_POOL
        } else {
            FULL_POOL
        };
        rng.choose(pool).copied().unwrap_or(CreatureKind::Zombie)
    }

    /// Roll the mutation tier for a kind
    pub fn roll_tier(&self, rng: &mut GameRng, kind: CreatureKind) -> Tier {
        rng.choose_weighted(kind.tier_weights())
            .unwrap_or(Tier::Normal)
    }

    /// Build the spawn request for a room mob without touching the world
    pub fn room_mob_request(
        &self,
        rng: &mut GameRng,
        point: &Location,
        room_index: u32,
    ) -> SpawnRequest {
        let kind = self.roll_kind(rng, room_index);
        let tier = self.roll_tier(rng, kind);
        let max_health = kind.base_health() * tier.health_multiplier();
        let mut marks = SpawnMarks::ENCOUNTER | SpawnMarks::ROOM_MOB;
        if kind.burns_in_daylight() {
            marks |= SpawnMarks::NO_SUNBURN;
        }
        SpawnRequest {
            kind,
            tier,
            at: point.clone(),
            max_health,
            name_tag: name_tag(&format!("{} {}", tier, kind), max_health),
            marks,
        }
    }

    /// Spawn one room mob at a spawn point
    pub fn spawn_room_mob(
        &self,
        host: &mut dyn Host,
        rng: &mut GameRng,
        point: &Location,
        room_index: u32,
    ) -> EntityId {
        let request = self.room_mob_request(rng, point, room_index);
        let id = host.spawn(&request);
        debug!(entity = %id, room = room_index, tag = %request.name_tag, "spawned room mob");
        id
    }

    /// Spawn the boss at its configured stats
    pub fn spawn_boss(&self, host: &mut dyn Host, point: &Location) -> EntityId {
        let request = SpawnRequest {
            kind: self.boss.kind,
            tier: Tier::Boss,
            at: point.clone(),
            max_health: self.boss.max_health,
            name_tag: name_tag(&self.boss.name, self.boss.max_health),
            marks: SpawnMarks::ENCOUNTER | SpawnMarks::NO_SUNBURN | SpawnMarks::BOSS,
        };
        let id = host.spawn(&request);
        debug!(entity = %id, "spawned boss");
        id
    }

    /// Spawn one minion at a point
    pub fn spawn_minion(&self, host: &mut dyn Host, point: &Location) -> EntityId {
        let request = SpawnRequest {
            kind: self.minion.kind,
            tier: Tier::Minion,
            at: point.clone(),
            max_health: self.minion.max_health,
            name_tag: name_tag(&self.minion.name, self.minion.max_health),
            marks: SpawnMarks::ENCOUNTER | SpawnMarks::NO_SUNBURN | SpawnMarks::MINION,
        };
        host.spawn(&request)
    }

    /// Spawn `count` minions evenly spaced on a ring around `center`
    pub fn spawn_minion_wave(
        &self,
        host: &mut dyn Host,
        center: &Location,
        count: usize,
    ) -> Vec<EntityId> {
        let radius = self.minion.ring_radius;
        (0..count)
            .map(|i| {
                let angle = core::f64::consts::TAU * i as f64 / count as f64;
                let point = center.offset(radius * angle.cos(), 0.0, radius * angle.sin());
                self.spawn_minion(host, &point)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Vec3;
    use crate::host::SimHost;

    fn spawner() -> EncounterSpawner {
        EncounterSpawner::new(
            RoomMobTuning::default(),
            BossTuning::default(),
            MinionTuning::default(),
        )
    }

    fn point() -> Location {
        Location::new("world", Vec3::new(0.5, 64.0, 0.5))
    }

    #[test]
    fn test_early_rooms_favour_weak_pool() {
        let spawner = spawner();
        let mut rng = GameRng::new(42);
        let weak = (0..1000)
            .filter(|_| WEAK_POOL.contains(&spawner.roll_kind(&mut rng, 1)))
            .count();
        // 85% forced weak plus the weak share of uniform full-pool draws
        assert!(weak > 850, "only {} weak draws", weak);
    }

    #[test]
    fn test_late_rooms_draw_full_pool() {
        let spawner = spawner();
        let mut rng = GameRng::new(42);
        let strong = (0..1000)
            .filter(|_| !WEAK_POOL.contains(&spawner.roll_kind(&mut rng, 5)))
            .count();
        // Uniform over seven kinds, four of which are outside the weak pool
        assert!(strong > 450 && strong < 700, "{} strong draws", strong);
    }

    #[test]
    fn test_tier_respects_kind_buckets() {
        let spawner = spawner();
        let mut rng = GameRng::new(3);
        for _ in 0..500 {
            let tier = spawner.roll_tier(&mut rng, CreatureKind::Vindicator);
            assert!(matches!(tier, Tier::Normal | Tier::Mutated));
        }
    }

    #[test]
    fn test_room_mob_is_marked_and_tagged() {
        let spawner = spawner();
        let mut rng = GameRng::new(9);
        let mut host = SimHost::new();
        let id = spawner.spawn_room_mob(&mut host, &mut rng, &point(), 1);
        let entity = host.entity(id).unwrap();
        let req = &entity.request;
        assert!(req.marks.contains(SpawnMarks::ENCOUNTER | SpawnMarks::ROOM_MOB));
        assert_eq!(req.max_health, req.kind.base_health() * req.tier.health_multiplier());
        assert!(req.name_tag.contains(&req.tier.to_string()));
        assert!(req.name_tag.contains(&format!("❤ {:.0}", req.max_health)));
    }

    #[test]
    fn test_boss_and_minions_fixed_stats() {
        let spawner = spawner();
        let mut host = SimHost::new();
        let boss = spawner.spawn_boss(&mut host, &point());
        assert_eq!(host.health(boss), Some(300.0));
        assert!(host.entity(boss).unwrap().request.marks.contains(SpawnMarks::BOSS));

        let wave = spawner.spawn_minion_wave(&mut host, &point(), 5);
        assert_eq!(wave.len(), 5);
        for id in &wave {
            let e = host.entity(*id).unwrap();
            assert_eq!(e.request.tier, Tier::Minion);
            assert_eq!(e.health, 20.0);
            let d = ((e.location.pos.x - 0.5).powi(2) + (e.location.pos.z - 0.5).powi(2)).sqrt();
            assert!((d - 3.0).abs() < 1e-9);
        }
    }
}
