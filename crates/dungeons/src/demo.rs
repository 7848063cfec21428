//! Scripted encounter on the simulated host
//!
//! Authors a two-room dungeon, then plays it start to finish, printing every
//! transition the engine reports.

use tracing::{debug, info};

use di_core::collab::{FixedRewards, TracingAudit};
use di_core::host::{ItemStack, SimHost};
use di_core::persist::MemoryStore;
use di_core::{
    AuthoringCommand, BlockPos, DamageVerdict, DungeonEngine, DungeonId, EncounterEvent,
    EngineConfig, EntityId, EventOutcome, GameRng, Location, PlayerId, Vec3,
};

use crate::CliError;

const ADMIN: PlayerId = PlayerId(0);
const HERO: PlayerId = PlayerId(1);
const DEMO_ID: DungeonId = DungeonId(1);

/// Authoring script: where the admin stands and what they type
const LAYOUT: &[(f64, &[&str])] = &[
    (0.5, &["create", "1"]),
    (5.0, &["setgate", "1", "entrydoor", "pos1"]),
    (5.9, &["setgate", "1", "entrydoor", "pos2"]),
    (7.5, &["addmobspawn", "1", "1"]),
    (8.5, &["addmobspawn", "1", "1"]),
    (10.0, &["setgate", "1", "door", "1", "pos1"]),
    (10.9, &["setgate", "1", "door", "1", "pos2"]),
    (12.5, &["addmobspawn", "1", "2"]),
    (13.5, &["addmobspawn", "1", "2"]),
    (14.5, &["addmobspawn", "1", "2"]),
    (20.0, &["setgate", "1", "bossdoor", "pos1"]),
    (20.9, &["setgate", "1", "bossdoor", "pos2"]),
    (30.5, &["setbossspawn", "1"]),
    (40.0, &["setgate", "1", "treasuredoor", "pos1"]),
    (40.9, &["setgate", "1", "treasuredoor", "pos2"]),
    (45.5, &["setreward", "1"]),
];

/// Damage per player swing at the boss
const SWING: f64 = 35.0;

struct Demo {
    engine: DungeonEngine<MemoryStore>,
    host: SimHost,
}

impl Demo {
    fn report(&self, what: &str, outcome: &EventOutcome) {
        match outcome {
            EventOutcome::Applied(t) => println!("  {:<24} {:?}", what, t),
            EventOutcome::Rejected(e) => println!("  {:<24} rejected: {}", what, e),
            EventOutcome::Ignored => debug!(what, "ignored"),
        }
    }

    fn interact(&mut self, what: &str, x: i32) -> EventOutcome {
        let outcome = self.engine.handle(
            &mut self.host,
            EncounterEvent::BlockInteract {
                player: HERO,
                space: "world".to_string(),
                pos: BlockPos::new(x, 64, 0),
            },
        );
        self.report(what, &outcome);
        outcome
    }

    fn slay(&mut self, entity: EntityId) {
        let Some(at) = self.host.kill(entity) else {
            return;
        };
        let outcome = self
            .engine
            .handle(&mut self.host, EncounterEvent::EntityDied { entity, at });
        self.report(&format!("{} dies", entity), &outcome);
    }

    fn clear_room(&mut self) {
        let mobs: Vec<EntityId> = self
            .engine
            .session(HERO)
            .map(|s| s.active_mobs().collect())
            .unwrap_or_default();
        for mob in mobs {
            if let Some(entity) = self.host.entity(mob) {
                println!("  fighting {}", entity.request.name_tag);
            }
            self.slay(mob);
        }
    }

    fn clear_minions(&mut self) {
        let minions: Vec<EntityId> = self
            .engine
            .session(HERO)
            .map(|s| s.minions().collect())
            .unwrap_or_default();
        for minion in minions {
            self.slay(minion);
        }
    }

    /// Swing at the boss until it falls, clearing minion waves as they come
    fn fight_boss(&mut self) {
        let Some(boss) = self.engine.session(HERO).and_then(|s| s.boss()) else {
            return;
        };
        for _ in 0..100 {
            let outcome = self.engine.handle(
                &mut self.host,
                EncounterEvent::EntityDamaged {
                    entity: boss,
                    amount: SWING,
                },
            );
            self.report("swing at boss", &outcome);
            if outcome.damage_verdict() == DamageVerdict::Allow {
                let left = self.host.apply_damage(boss, SWING).unwrap_or(0.0);
                println!("  boss health              {:.0}", left);
                if left <= 0.0 {
                    self.slay(boss);
                    return;
                }
            }
            self.clear_minions();
        }
    }
}

pub fn run(config: EngineConfig, seed: Option<u64>) -> Result<(), CliError> {
    let rng = seed.map(GameRng::new).unwrap_or_else(GameRng::from_entropy);
    info!(seed = rng.seed(), "demo run");

    let rewards = FixedRewards::new(vec![
        ItemStack::new("diamond", 3),
        ItemStack::new("enchanted_golden_apple", 1),
    ]);
    let mut demo = Demo {
        engine: DungeonEngine::new(
            config,
            MemoryStore::new(),
            Box::new(rewards),
            Box::new(TracingAudit),
            rng,
        ),
        host: SimHost::new(),
    };

    println!("Authoring dungeon {}", DEMO_ID);
    for (x, words) in LAYOUT {
        let y = if words.last() == Some(&"pos2") { 65.0 } else { 64.0 };
        let z = if words.last() == Some(&"pos2") { 1.0 } else { 0.5 };
        let standing = Location::new("world", Vec3::new(*x, y, z));
        let command = AuthoringCommand::parse(words, &standing)?;
        let message = demo.engine.apply(&mut demo.host, ADMIN, command)?;
        println!("  {}", message);
    }
    let marker_ticks = demo.engine.config().marker_ticks;
    demo.engine.tick(&mut demo.host, marker_ticks);

    println!("Running dungeon {}", DEMO_ID);
    demo.engine.start(&mut demo.host, HERO, DEMO_ID)?;
    demo.interact("open entry door", 5);
    demo.clear_room();

    demo.interact("try door empty-handed", 10);
    demo.host.pick_up_all(HERO);
    demo.interact("unlock room 1 door", 10);
    demo.clear_room();

    demo.interact("open boss door", 20);
    demo.fight_boss();
    demo.interact("open reward chest", 45);

    match demo.host.rewards(HERO) {
        Some(items) => {
            for item in items {
                println!("  reward: {} x{}", item.item, item.amount);
            }
        }
        None => println!("  no rewards"),
    }
    info!(
        entities = demo.host.entity_count(),
        occupied = demo
            .engine
            .layouts()
            .get(DEMO_ID)
            .is_some_and(|l| l.is_occupied()),
        "demo finished"
    );
    Ok(())
}
