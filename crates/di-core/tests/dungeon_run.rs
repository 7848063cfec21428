//! End-to-end dungeon runs
//!
//! Authors a two-room dungeon through admin commands, then plays it against
//! the simulated host the way a server would: interactions, damage events
//! that are only applied when not cancelled, and deaths.

use di_core::collab::{FixedRewards, RecordingAudit};
use di_core::engine::{DamageVerdict, DeathVerdict};
use di_core::host::{ItemStack, Material, SimHost};
use di_core::persist::MemoryStore;
use di_core::{
    AuthoringCommand, BlockPos, DungeonEngine, DungeonId, EngineConfig, EngineError,
    EncounterEvent, EntityId, EventOutcome, GameRng, Host, Location, PlayerId, Stage, Transition,
    Vec3,
};
use proptest::prelude::*;

const ADMIN: PlayerId = PlayerId(100);
const HERO: PlayerId = PlayerId(1);
const DUNGEON: DungeonId = DungeonId(3);

// ============================================================================
// Helpers
// ============================================================================

struct World {
    engine: DungeonEngine<MemoryStore>,
    host: SimHost,
    store: MemoryStore,
    audit: RecordingAudit,
}

fn at(x: f64, y: f64, z: f64) -> Location {
    Location::new("world", Vec3::new(x, y, z))
}

fn cell(x: i32) -> BlockPos {
    BlockPos::new(x, 64, 0)
}

const CONTAINER: BlockPos = BlockPos::new(45, 64, 0);

impl World {
    fn new() -> Self {
        let store = MemoryStore::new();
        let audit = RecordingAudit::new();
        let engine = DungeonEngine::new(
            EngineConfig::default(),
            store.clone(),
            Box::new(FixedRewards::new(vec![
                ItemStack::new("diamond", 3),
                ItemStack::new("golden_apple", 1),
            ])),
            Box::new(audit.clone()),
            GameRng::new(2024),
        );
        Self {
            engine,
            host: SimHost::new(),
            store,
            audit,
        }
    }

    fn admin(&mut self, args: &[&str], standing: Location) {
        let command = AuthoringCommand::parse(args, &standing).unwrap();
        self.engine.apply(&mut self.host, ADMIN, command).unwrap();
    }

    /// Mark a one-block-wide door spanning y 64..=65, z 0..=1 at `x`
    fn door(&mut self, args: &[&str], x: f64) {
        let mut first = args.to_vec();
        first.push("pos1");
        self.admin(&first, at(x, 64.0, 0.0));
        let mut second = args.to_vec();
        second.push("pos2");
        self.admin(&second, at(x + 0.9, 65.0, 1.0));
    }

    /// Dungeon 3: entry door at x=5, room 1 (two mobs, exit door at x=10),
    /// room 2 (two mobs), boss door at x=20, boss at x=30, treasure door at
    /// x=40, container at x=45.
    fn author(&mut self) {
        self.admin(&["create", "3"], at(0.5, 64.0, 0.5));
        self.door(&["setgate", "3", "entrydoor"], 5.0);
        self.door(&["setgate", "3", "door", "1"], 10.0);
        self.admin(&["addmobspawn", "3", "1"], at(7.5, 64.0, 0.5));
        self.admin(&["addmobspawn", "3", "1"], at(8.5, 64.0, 0.5));
        self.admin(&["addmobspawn", "3", "2"], at(12.5, 64.0, 0.5));
        self.admin(&["addmobspawn", "3", "2"], at(13.5, 64.0, 0.5));
        self.admin(&["setbossspawn", "3"], at(30.5, 64.0, 0.5));
        self.door(&["setgate", "3", "bossdoor"], 20.0);
        self.door(&["setgate", "3", "treasuredoor"], 40.0);
        self.admin(&["setreward", "3"], at(45.5, 64.0, 0.5));
        // Let the spawn-point markers expire
        self.engine.tick(&mut self.host, 200);
    }

    fn interact(&mut self, pos: BlockPos) -> EventOutcome {
        self.engine.handle(
            &mut self.host,
            EncounterEvent::BlockInteract {
                player: HERO,
                space: "world".to_string(),
                pos,
            },
        )
    }

    /// Route a hit through the engine and apply it unless cancelled
    fn hit(&mut self, entity: EntityId, amount: f64) -> EventOutcome {
        let outcome = self
            .engine
            .handle(&mut self.host, EncounterEvent::EntityDamaged { entity, amount });
        if outcome.damage_verdict() == DamageVerdict::Allow {
            self.host.apply_damage(entity, amount);
        }
        outcome
    }

    fn slay(&mut self, entity: EntityId) -> EventOutcome {
        let at = self.host.kill(entity).unwrap();
        let outcome = self
            .engine
            .handle(&mut self.host, EncounterEvent::EntityDied { entity, at });
        assert_eq!(outcome.death_verdict(), DeathVerdict::ClearDrops);
        outcome
    }

    fn stage(&self) -> Stage {
        self.engine.session(HERO).unwrap().stage()
    }

    fn room_mobs(&self) -> Vec<EntityId> {
        self.engine.session(HERO).unwrap().active_mobs().collect()
    }

    fn minions(&self) -> Vec<EntityId> {
        self.engine.session(HERO).unwrap().minions().collect()
    }

    fn boss(&self) -> EntityId {
        self.engine.session(HERO).unwrap().boss().unwrap()
    }

    fn clear_room(&mut self) -> EventOutcome {
        let mut last = EventOutcome::Ignored;
        for mob in self.room_mobs() {
            last = self.slay(mob);
        }
        last
    }

    fn clear_minions(&mut self) -> EventOutcome {
        let mut last = EventOutcome::Ignored;
        for minion in self.minions() {
            last = self.slay(minion);
        }
        last
    }

    /// Start, clear both rooms and step through the boss door
    fn reach_boss_room(&mut self) -> EntityId {
        self.engine.start(&mut self.host, HERO, DUNGEON).unwrap();
        self.interact(cell(5));
        self.clear_room();
        self.host.pick_up_all(HERO);
        self.interact(cell(10));
        self.clear_room();
        self.interact(cell(20));
        self.boss()
    }

    fn all_doors_closed(&self) -> bool {
        [5, 10, 20, 40].iter().all(|x| {
            (64..=65).all(|y| {
                (0..=1).all(|z| self.host.block("world", BlockPos::new(*x, y, z)) == Material::IronBars)
            })
        })
    }
}

// ============================================================================
// Authoring
// ============================================================================

#[test]
fn test_authored_layout_is_complete_and_persisted() {
    let mut world = World::new();
    world.author();

    let layout = world.engine.layouts().get(DUNGEON).unwrap();
    assert!(layout.is_setup_complete());
    assert_eq!(layout.room_count(), 2);
    assert_eq!(layout.room(1).unwrap().mob_spawn_points.len(), 2);
    assert!(layout.room(2).unwrap().gate.is_none());

    let row = world.store.dungeon(3).unwrap();
    assert_eq!(row.boss_gate, layout.boss_gate);
    assert_eq!(world.store.room_count(3), 2);
    assert_eq!(world.host.solid_blocks(), 0);
}

#[test]
fn test_layouts_reload_from_store() {
    let mut world = World::new();
    world.author();

    let mut fresh = DungeonEngine::new(
        EngineConfig::default(),
        MemoryStore::new(),
        Box::new(FixedRewards::default()),
        Box::new(RecordingAudit::new()),
        GameRng::new(1),
    );
    assert_eq!(fresh.load(&world.store), Ok(1));
    assert_eq!(fresh.layouts().get(DUNGEON), world.engine.layouts().get(DUNGEON));
}

#[test]
fn test_trim_rooms_drops_trailing_rooms() {
    let mut world = World::new();
    world.author();
    world.admin(&["trimrooms", "3", "1"], at(0.0, 64.0, 0.0));

    let layout = world.engine.layouts().get(DUNGEON).unwrap();
    assert_eq!(layout.room_count(), 1);
    assert_eq!(world.store.room_count(3), 1);
    assert!(world.store.room(3, 2).is_none());
}

// ============================================================================
// Full run
// ============================================================================

#[test]
fn test_full_run_scenario() {
    let mut world = World::new();
    world.author();
    world.engine.start(&mut world.host, HERO, DUNGEON).unwrap();
    assert!(world.engine.layouts().get(DUNGEON).unwrap().is_occupied());
    assert!(world.all_doors_closed());

    // Entry door: room 1 with two mobs
    assert_eq!(
        world.interact(cell(5)),
        EventOutcome::Applied(Transition::EnteredRoom(1))
    );
    assert_eq!(world.stage(), Stage::Room(1));
    assert_eq!(world.room_mobs().len(), 2);
    for mob in world.room_mobs() {
        assert_eq!(world.engine.sessions().owner_of(mob), Some(HERO));
    }

    // Killing both drops the key
    assert_eq!(
        world.clear_room(),
        EventOutcome::Applied(Transition::KeyDropped)
    );
    assert!(world.engine.session(HERO).unwrap().has_key());

    // Not holding it: rejected, still room 1, player told why
    let outcome = world.interact(cell(10));
    assert_eq!(outcome, EventOutcome::Rejected(EngineError::KeyNotHeld));
    assert_eq!(world.stage(), Stage::Room(1));
    assert_eq!(
        world.host.messages_for(HERO).last().copied(),
        Some("Hold the dungeon key to unlock this door.")
    );

    // Holding it: consumed, room 2, door open
    world.host.pick_up_all(HERO);
    assert_eq!(
        world.interact(cell(10)),
        EventOutcome::Applied(Transition::EnteredRoom(2))
    );
    assert!(world.host.held_item(HERO).is_none());
    assert_eq!(world.host.block("world", cell(10)), Material::Air);
    assert!(!world.engine.session(HERO).unwrap().has_key());

    // Room 2 spawns the boss instead of a key
    assert_eq!(
        world.clear_room(),
        EventOutcome::Applied(Transition::BossSpawned)
    );
    assert!(world.host.dropped().is_empty());
    assert_eq!(
        world.interact(cell(20)),
        EventOutcome::Applied(Transition::EnteredBossRoom)
    );
    let boss = world.boss();
    assert_eq!(world.host.health(boss), Some(300.0));

    // Phase one at 200: five minions and invulnerability
    let outcome = world.hit(boss, 100.0);
    assert!(matches!(
        outcome.transition(),
        Some(Transition::MinionWave { size: 5, .. })
    ));
    assert!(world.engine.session(HERO).unwrap().is_boss_invulnerable());
    assert_eq!(world.minions().len(), 5);

    let outcome = world.hit(boss, 40.0);
    assert_eq!(outcome.damage_verdict(), DamageVerdict::Cancel);
    assert_eq!(world.host.health(boss), Some(200.0));

    assert_eq!(
        world.clear_minions(),
        EventOutcome::Applied(Transition::BossVulnerable)
    );
    assert!(!world.engine.session(HERO).unwrap().is_boss_invulnerable());

    // Phase two at 100: seven more
    let outcome = world.hit(boss, 100.0);
    assert!(matches!(
        outcome.transition(),
        Some(Transition::MinionWave { size: 7, .. })
    ));
    world.clear_minions();
    world.hit(boss, 60.0);
    assert_eq!(world.host.health(boss), Some(40.0));

    // Boss dies: treasure door opens, container appears
    assert_eq!(
        world.slay(boss),
        EventOutcome::Applied(Transition::BossDefeated)
    );
    assert_eq!(world.stage(), Stage::Cleared);
    assert_eq!(world.host.block("world", cell(40)), Material::Air);
    assert_eq!(world.host.block("world", CONTAINER), Material::Chest);

    // Claiming ends the run
    assert_eq!(
        world.interact(CONTAINER),
        EventOutcome::Applied(Transition::RewardClaimed)
    );
    assert_eq!(world.host.rewards(HERO).map(|r| r.len()), Some(2));
    assert!(world.engine.session(HERO).is_none());
    assert!(!world.engine.layouts().get(DUNGEON).unwrap().is_occupied());
    assert_eq!(world.host.entity_count(), 0);
    assert_eq!(world.host.block("world", CONTAINER), Material::Air);
    assert!(world.all_doors_closed());
    assert_eq!(world.engine.sessions().owned_entity_count(), 0);
    assert_eq!(world.engine.scheduler().pending_count(), 0);

    let audit = world.audit.lines();
    assert!(audit.iter().any(|l| l.contains("Boss spawned")));
    assert!(audit.iter().any(|l| l.contains("claimed 2 reward")));
}

// ============================================================================
// Properties
// ============================================================================

#[test]
fn test_unlock_without_key_never_consumes() {
    let mut world = World::new();
    world.author();
    world.engine.start(&mut world.host, HERO, DUNGEON).unwrap();
    world.interact(cell(5));
    world.host.set_held(HERO, Some(ItemStack::new("tripwire_hook", 2).named("Dungeon Key")));

    for _ in 0..3 {
        assert_eq!(
            world.interact(cell(10)),
            EventOutcome::Rejected(EngineError::NoKey)
        );
    }
    assert_eq!(world.stage(), Stage::Room(1));
    assert_eq!(world.host.block("world", cell(10)), Material::IronBars);
    assert_eq!(world.host.held_item(HERO).map(|s| s.amount), Some(2));
}

#[test]
fn test_each_phase_fires_once() {
    let mut world = World::new();
    world.author();
    let boss = world.reach_boss_room();

    world.hit(boss, 110.0);
    world.clear_minions();
    // 180, 170, 160: below phase one again, above phase two
    for _ in 0..3 {
        assert_eq!(world.hit(boss, 10.0), EventOutcome::Ignored);
    }
    assert_eq!(world.minions().len(), 0);

    world.hit(boss, 80.0);
    assert_eq!(world.minions().len(), 7);
    world.clear_minions();
    for _ in 0..5 {
        world.hit(boss, 10.0);
    }
    assert_eq!(world.minions().len(), 0);
    assert_eq!(
        world.engine.session(HERO).unwrap().phases_fired(),
        (true, true)
    );
}

#[test]
fn test_boss_behind_closed_gate() {
    let mut world = World::new();
    world.author();
    world.engine.start(&mut world.host, HERO, DUNGEON).unwrap();
    world.interact(cell(5));
    world.clear_room();
    world.host.pick_up_all(HERO);
    world.interact(cell(10));
    world.clear_room();
    let boss = world.boss();
    assert_eq!(world.stage(), Stage::Room(2));

    // Hits through the bars never land and never summon minions
    let outcome = world.hit(boss, 100.0);
    assert_eq!(outcome.damage_verdict(), DamageVerdict::Cancel);
    assert_eq!(world.host.health(boss), Some(300.0));
    assert!(world.minions().is_empty());

    // A death the engine could not stop still leaves the way to the reward open
    assert_eq!(
        world.slay(boss),
        EventOutcome::Applied(Transition::BossDefeated)
    );
    assert_eq!(world.host.block("world", cell(20)), Material::Air);
    assert_eq!(world.host.block("world", cell(40)), Material::Air);
    assert_eq!(
        world.interact(CONTAINER),
        EventOutcome::Applied(Transition::RewardClaimed)
    );
    assert!(world.engine.session(HERO).is_none());
}

#[test]
fn test_stop_mid_fight_cleans_everything() {
    let mut world = World::new();
    world.author();
    let boss = world.reach_boss_room();
    world.hit(boss, 100.0);
    assert_eq!(world.host.entity_count(), 6);

    world.engine.stop(&mut world.host, HERO).unwrap();
    assert_eq!(world.host.entity_count(), 0);
    assert!(world.all_doors_closed());
    assert!(!world.engine.layouts().get(DUNGEON).unwrap().is_occupied());
    assert_eq!(
        world.engine.stop(&mut world.host, HERO),
        Err(EngineError::NotInDungeon)
    );

    // A late death event for a removed mob is not ours any more
    let outcome = world.engine.handle(
        &mut world.host,
        EncounterEvent::EntityDied {
            entity: boss,
            at: at(30.5, 64.0, 0.5),
        },
    );
    assert_eq!(outcome, EventOutcome::Ignored);
}

#[test]
fn test_find_unoccupied_skips_busy_and_incomplete() {
    let mut world = World::new();
    world.author();
    world.admin(&["create", "1"], at(0.0, 64.0, 0.0));

    assert_eq!(
        world.engine.layouts().find_unoccupied().map(|l| l.id),
        Some(DUNGEON)
    );
    world.engine.start_any(&mut world.host, HERO).unwrap();
    assert!(world.engine.layouts().find_unoccupied().is_none());
    assert_eq!(
        world.engine.start_any(&mut world.host, PlayerId(2)),
        Err(EngineError::NoFreeDungeon)
    );
}

fn rank(stage: Stage) -> u32 {
    match stage {
        Stage::Antechamber => 0,
        Stage::Room(k) => k,
        Stage::BossRoom => 3,
        Stage::Cleared => 4,
    }
}

proptest! {
    #[test]
    fn prop_progression_is_monotonic(actions in prop::collection::vec(0u8..7, 1..80)) {
        let mut world = World::new();
        world.author();
        world.engine.start(&mut world.host, HERO, DUNGEON).unwrap();

        for action in actions {
            let Some(session) = world.engine.session(HERO) else { break };
            let before = session.stage();
            let outcome = match action {
                0 => world.interact(cell(5)),
                1 => world.interact(cell(10)),
                2 => world.interact(cell(20)),
                3 => match world.room_mobs().first() {
                    Some(mob) => world.slay(*mob),
                    None => EventOutcome::Ignored,
                },
                4 => {
                    world.host.pick_up_all(HERO);
                    EventOutcome::Ignored
                }
                5 => {
                    world.host.set_held(HERO, Some(ItemStack::new("stick", 1)));
                    EventOutcome::Ignored
                }
                _ => match world.engine.session(HERO).and_then(|s| s.boss()) {
                    // A killing blow only lands if the engine lets it through
                    Some(boss) => match world.hit(boss, 1_000.0).damage_verdict() {
                        DamageVerdict::Allow => world.slay(boss),
                        DamageVerdict::Cancel => EventOutcome::Ignored,
                    },
                    None => EventOutcome::Ignored,
                },
            };
            let after = world.stage();
            if outcome.transition() == Some(Transition::BossDefeated) {
                prop_assert_eq!(before, Stage::BossRoom);
            }
            prop_assert!(rank(after) >= rank(before));
            prop_assert!(rank(after) - rank(before) <= 1);
            if rank(after) != rank(before) {
                prop_assert!(matches!(
                    outcome.transition(),
                    Some(Transition::EnteredRoom(_) | Transition::EnteredBossRoom | Transition::BossDefeated)
                ));
            }
        }
    }
}
