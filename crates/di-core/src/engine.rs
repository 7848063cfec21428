//! Engine facade
//!
//! [`DungeonEngine`] is the one object a host talks to. It routes encounter
//! events to the owning session, runs authoring commands against the layout
//! registry, and fires delayed actions from [`DungeonEngine::tick`].

use tracing::{debug, info, warn};

use crate::collab::{AuditSink, RewardRoller};
use crate::config::{EngineConfig, KeyItem};
use crate::encounter::{EncounterSpawner, GateController};
use crate::error::EngineError;
use crate::geometry::{BlockPos, Location};
use crate::host::{EntityId, Host, Material, PlayerId};
use crate::layout::{Corner, DungeonId, GateKind, LayoutRegistry};
use crate::persist::{LayoutStore, Persistence, StoreError};
use crate::rng::GameRng;
use crate::scheduler::{ScheduledAction, Scheduler};
use crate::session::{DungeonSession, SessionCtx, SessionRegistry, Transition};

// ============================================================================
// Events
// ============================================================================

/// A gameplay event forwarded by the host
#[derive(Debug, Clone, PartialEq)]
pub enum EncounterEvent {
    /// Player used a block
    BlockInteract {
        player: PlayerId,
        space: String,
        pos: BlockPos,
    },
    /// Entity is about to take damage; sent before the host applies it
    EntityDamaged { entity: EntityId, amount: f64 },
    /// Entity died at a location
    EntityDied { entity: EntityId, at: Location },
    /// Player left the server
    Disconnect { player: PlayerId },
}

/// Whether the host should apply a pending hit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DamageVerdict {
    Allow,
    Cancel,
}

/// What the host should do with a dead entity's loot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeathVerdict {
    KeepDrops,
    ClearDrops,
}

/// Result of handling one event
#[derive(Debug, Clone, PartialEq)]
pub enum EventOutcome {
    /// No session cares about this event
    Ignored,
    /// A session consumed the event
    Applied(Transition),
    /// The event was refused; the player has been told why
    Rejected(EngineError),
}

impl EventOutcome {
    pub fn transition(&self) -> Option<Transition> {
        match self {
            EventOutcome::Applied(t) => Some(*t),
            _ => None,
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, EventOutcome::Rejected(_))
    }

    /// Verdict for an [`EncounterEvent::EntityDamaged`]
    pub fn damage_verdict(&self) -> DamageVerdict {
        match self {
            EventOutcome::Applied(Transition::DamageCancelled) => DamageVerdict::Cancel,
            _ => DamageVerdict::Allow,
        }
    }

    /// Verdict for an [`EncounterEvent::EntityDied`]: encounter mobs drop
    /// nothing
    pub fn death_verdict(&self) -> DeathVerdict {
        match self {
            EventOutcome::Applied(_) => DeathVerdict::ClearDrops,
            _ => DeathVerdict::KeepDrops,
        }
    }
}

// ============================================================================
// Authoring commands
// ============================================================================

/// An admin action, positioned at the issuing player's location
#[derive(Debug, Clone, PartialEq)]
pub enum AuthoringCommand {
    Create {
        id: DungeonId,
        spawn: Location,
    },
    Delete {
        id: DungeonId,
    },
    TrimRooms {
        id: DungeonId,
        count: usize,
    },
    SetGate {
        id: DungeonId,
        kind: GateKind,
        room: Option<u32>,
        corner: Corner,
        at: Location,
    },
    SetSpawn {
        id: DungeonId,
        at: Location,
    },
    SetBossSpawn {
        id: DungeonId,
        at: Location,
    },
    SetRewardContainer {
        id: DungeonId,
        at: Location,
    },
    AddMobSpawn {
        id: DungeonId,
        room: u32,
        at: Location,
    },
    ClearMobSpawns {
        id: DungeonId,
        room: u32,
    },
    /// Start a specific dungeon, or any free one
    Start {
        id: Option<DungeonId>,
    },
    Stop,
}

fn parse_id(arg: Option<&&str>, usage: &'static str) -> Result<DungeonId, EngineError> {
    arg.and_then(|s| s.parse().ok())
        .map(DungeonId)
        .ok_or(EngineError::Usage(usage))
}

fn parse_num<T: std::str::FromStr>(arg: Option<&&str>, usage: &'static str) -> Result<T, EngineError> {
    arg.and_then(|s| s.parse().ok())
        .ok_or(EngineError::Usage(usage))
}

impl AuthoringCommand {
    /// Parse command words, e.g. `["setgate", "3", "door", "1", "pos1"]`.
    ///
    /// `at` is where the issuing player stands; commands that record a
    /// point or corner use it.
    pub fn parse(args: &[&str], at: &Location) -> Result<Self, EngineError> {
        const SETGATE: &str = "setgate <id> <entrydoor|bossdoor|treasuredoor|door> [room] <pos1|pos2>";

        let Some((name, rest)) = args.split_first() else {
            return Err(EngineError::Usage("<create|delete|trimrooms|setgate|setspawn|setbossspawn|setreward|addmobspawn|clearmobspawns|start|stop> ..."));
        };
        let at = at.clone();
        let cmd = match name.to_ascii_lowercase().as_str() {
            "create" => AuthoringCommand::Create {
                id: parse_id(rest.first(), "create <id>")?,
                spawn: at,
            },
            "delete" => AuthoringCommand::Delete {
                id: parse_id(rest.first(), "delete <id>")?,
            },
            "trimrooms" => AuthoringCommand::TrimRooms {
                id: parse_id(rest.first(), "trimrooms <id> <count>")?,
                count: parse_num(rest.get(1), "trimrooms <id> <count>")?,
            },
            "setgate" => {
                let id = parse_id(rest.first(), SETGATE)?;
                let kind_arg = rest.get(1).ok_or(EngineError::Usage(SETGATE))?;
                let kind: GateKind = kind_arg
                    .to_ascii_lowercase()
                    .parse()
                    .map_err(|_| EngineError::UnknownGateKind(kind_arg.to_string()))?;
                let (room, corner_arg) = match kind {
                    GateKind::Door => (Some(parse_num::<u32>(rest.get(2), SETGATE)?), rest.get(3)),
                    _ => (None, rest.get(2)),
                };
                let corner = corner_arg
                    .and_then(|s| s.to_ascii_lowercase().parse::<Corner>().ok())
                    .ok_or(EngineError::Usage(SETGATE))?;
                AuthoringCommand::SetGate {
                    id,
                    kind,
                    room,
                    corner,
                    at,
                }
            }
            "setspawn" => AuthoringCommand::SetSpawn {
                id: parse_id(rest.first(), "setspawn <id>")?,
                at,
            },
            "setbossspawn" => AuthoringCommand::SetBossSpawn {
                id: parse_id(rest.first(), "setbossspawn <id>")?,
                at,
            },
            "setreward" => AuthoringCommand::SetRewardContainer {
                id: parse_id(rest.first(), "setreward <id>")?,
                at,
            },
            "addmobspawn" => AuthoringCommand::AddMobSpawn {
                id: parse_id(rest.first(), "addmobspawn <id> <room>")?,
                room: parse_num(rest.get(1), "addmobspawn <id> <room>")?,
                at,
            },
            "clearmobspawns" => AuthoringCommand::ClearMobSpawns {
                id: parse_id(rest.first(), "clearmobspawns <id> <room>")?,
                room: parse_num(rest.get(1), "clearmobspawns <id> <room>")?,
            },
            "start" => AuthoringCommand::Start {
                id: match rest.first() {
                    Some(_) => Some(parse_id(rest.first(), "start [id]")?),
                    None => None,
                },
            },
            "stop" => AuthoringCommand::Stop,
            _ => return Err(EngineError::Usage("unknown dungeon command")),
        };
        Ok(cmd)
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Collaborators a session transition borrows
struct EncounterKit {
    rng: GameRng,
    spawner: EncounterSpawner,
    gates: GateController,
    key: KeyItem,
    reward_container: Material,
    rewards: Box<dyn RewardRoller>,
    audit: Box<dyn AuditSink>,
}

impl EncounterKit {
    fn ctx<'a>(&'a mut self, host: &'a mut dyn Host) -> SessionCtx<'a> {
        SessionCtx {
            host,
            rng: &mut self.rng,
            spawner: &self.spawner,
            gates: &self.gates,
            key: &self.key,
            reward_container: self.reward_container,
            rewards: &mut *self.rewards,
            audit: &*self.audit,
        }
    }
}

pub struct DungeonEngine<P> {
    config: EngineConfig,
    layouts: LayoutRegistry<P>,
    sessions: SessionRegistry,
    scheduler: Scheduler,
    kit: EncounterKit,
    /// Last tick seen by [`DungeonEngine::tick`]
    now: u64,
}

impl<P: Persistence> DungeonEngine<P> {
    pub fn new(
        config: EngineConfig,
        persistence: P,
        rewards: Box<dyn RewardRoller>,
        audit: Box<dyn AuditSink>,
        rng: GameRng,
    ) -> Self {
        let kit = EncounterKit {
            rng,
            spawner: EncounterSpawner::new(
                config.room_mobs,
                config.boss.clone(),
                config.minion.clone(),
            ),
            gates: GateController::new(config.gates),
            key: config.key_item.clone(),
            reward_container: config.reward_container,
            rewards,
            audit,
        };
        Self {
            config,
            layouts: LayoutRegistry::new(persistence),
            sessions: SessionRegistry::new(),
            scheduler: Scheduler::new(),
            kit,
            now: 0,
        }
    }

    /// Replace all layouts with the store's contents
    pub fn load(&mut self, store: &dyn LayoutStore) -> Result<usize, StoreError> {
        self.layouts.load(store)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn layouts(&self) -> &LayoutRegistry<P> {
        &self.layouts
    }

    pub fn layouts_mut(&mut self) -> &mut LayoutRegistry<P> {
        &mut self.layouts
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn session(&self, player: PlayerId) -> Option<&DungeonSession> {
        self.sessions.get(player)
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn now(&self) -> u64 {
        self.now
    }

    /// Tear the engine down, returning its persistence sink.
    ///
    /// Live sessions are dropped without cleanup; stop them first.
    pub fn into_persistence(self) -> P {
        self.layouts.into_persistence()
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Claim a layout and begin a run in it
    pub fn start(
        &mut self,
        host: &mut dyn Host,
        player: PlayerId,
        id: DungeonId,
    ) -> Result<DungeonId, EngineError> {
        if self.sessions.contains(player) {
            return Err(EngineError::AlreadyInDungeon);
        }
        let layout = self.layouts.claim(id)?;
        let mobless = layout.rooms_without_mobs();
        if !mobless.is_empty() {
            warn!(dungeon = %id, rooms = ?mobless, "rooms without mobs will never drop a key");
        }
        let session = DungeonSession::begin(player, layout, &mut self.kit.ctx(host));
        if let Err(e) = self.sessions.insert(session) {
            self.layouts.release(id);
            return Err(e);
        }
        info!(%player, dungeon = %id, "session started");
        Ok(id)
    }

    /// Begin a run in the first free dungeon
    pub fn start_any(
        &mut self,
        host: &mut dyn Host,
        player: PlayerId,
    ) -> Result<DungeonId, EngineError> {
        if self.sessions.contains(player) {
            return Err(EngineError::AlreadyInDungeon);
        }
        let id = self
            .layouts
            .find_unoccupied()
            .map(|l| l.id)
            .ok_or(EngineError::NoFreeDungeon)?;
        self.start(host, player, id)
    }

    /// End a player's run
    pub fn stop(&mut self, host: &mut dyn Host, player: PlayerId) -> Result<(), EngineError> {
        if self.end_session(host, player) {
            Ok(())
        } else {
            Err(EngineError::NotInDungeon)
        }
    }

    fn end_session(&mut self, host: &mut dyn Host, player: PlayerId) -> bool {
        let Some(session) = self.sessions.get_mut(player) else {
            return false;
        };
        session.cleanup(&mut self.kit.ctx(host));
        let id = session.layout_id();
        self.sessions.remove(player);
        self.layouts.release(id);
        self.scheduler.cancel_session(player);
        info!(%player, dungeon = %id, "session ended");
        true
    }

    // ------------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------------

    pub fn handle(&mut self, host: &mut dyn Host, event: EncounterEvent) -> EventOutcome {
        match event {
            EncounterEvent::BlockInteract { player, space, pos } => {
                let Some(session) = self.sessions.get_mut(player) else {
                    return EventOutcome::Ignored;
                };
                let result = session.interact(&mut self.kit.ctx(host), &space, pos);
                self.sessions.sync(player);
                match result {
                    Ok(Transition::Ignored) => EventOutcome::Ignored,
                    Ok(transition) => {
                        self.after_transition(host, player, transition);
                        EventOutcome::Applied(transition)
                    }
                    Err(e) => {
                        debug!(%player, error = %e, "interaction rejected");
                        host.tell(player, &e.to_string());
                        EventOutcome::Rejected(e)
                    }
                }
            }
            EncounterEvent::EntityDamaged { entity, amount } => {
                let Some(player) = self.sessions.owner_of(entity) else {
                    return EventOutcome::Ignored;
                };
                let Some(session) = self.sessions.get_mut(player) else {
                    return EventOutcome::Ignored;
                };
                let transition = session.on_boss_damaged(&mut self.kit.ctx(host), entity, amount);
                self.sessions.sync(player);
                match transition {
                    Transition::Ignored => EventOutcome::Ignored,
                    t => EventOutcome::Applied(t),
                }
            }
            EncounterEvent::EntityDied { entity, at } => {
                let Some(player) = self.sessions.owner_of(entity) else {
                    return EventOutcome::Ignored;
                };
                let Some(session) = self.sessions.get_mut(player) else {
                    return EventOutcome::Ignored;
                };
                let transition = session.on_entity_died(&mut self.kit.ctx(host), entity, &at);
                self.sessions.sync(player);
                self.after_transition(host, player, transition);
                // Owned deaths are always applied so the host clears drops
                EventOutcome::Applied(transition)
            }
            EncounterEvent::Disconnect { player } => {
                self.layouts.forget_selection(player);
                if self.end_session(host, player) {
                    EventOutcome::Applied(Transition::SessionEnded)
                } else {
                    EventOutcome::Ignored
                }
            }
        }
    }

    fn after_transition(&mut self, host: &mut dyn Host, player: PlayerId, transition: Transition) {
        match transition {
            Transition::BossDefeated => {
                self.scheduler.schedule_after(
                    self.now,
                    self.config.completion_timeout_ticks,
                    ScheduledAction::CompletionTimeout(player),
                );
            }
            Transition::RewardClaimed => {
                self.end_session(host, player);
            }
            _ => {}
        }
    }

    /// Advance the clock and run every action that has come due
    pub fn tick(&mut self, host: &mut dyn Host, now: u64) {
        self.now = self.now.max(now);
        for action in self.scheduler.tick(self.now) {
            match action {
                ScheduledAction::CompletionTimeout(player) => {
                    if self.end_session(host, player) {
                        host.tell(player, "Your dungeon run has expired.");
                        warn!(%player, "reward unclaimed; run timed out");
                    }
                }
                ScheduledAction::RemoveMarker { space, pos } => {
                    if host.block(&space, pos) == self.config.spawn_marker {
                        host.set_block(&space, pos, Material::Air);
                    }
                }
            }
        }
    }

    // ------------------------------------------------------------------------
    // Authoring
    // ------------------------------------------------------------------------

    /// Run an admin command for `player`, telling them the result
    pub fn apply(
        &mut self,
        host: &mut dyn Host,
        player: PlayerId,
        command: AuthoringCommand,
    ) -> Result<String, EngineError> {
        let result = self.run_command(host, player, command);
        match &result {
            Ok(message) => host.tell(player, message),
            Err(e) => host.tell(player, &e.to_string()),
        }
        result
    }

    fn run_command(
        &mut self,
        host: &mut dyn Host,
        player: PlayerId,
        command: AuthoringCommand,
    ) -> Result<String, EngineError> {
        match command {
            AuthoringCommand::Create { id, spawn } => {
                self.layouts.create(id, spawn)?;
                Ok(format!("Created dungeon {}.", id))
            }
            AuthoringCommand::Delete { id } => {
                self.layouts.delete(id);
                Ok(format!("Deleted dungeon {}.", id))
            }
            AuthoringCommand::TrimRooms { id, count } => {
                let removed = self.layouts.trim_rooms(id, count)?;
                Ok(format!("Removed {} room(s) from dungeon {}.", removed, id))
            }
            AuthoringCommand::SetGate {
                id,
                kind,
                room,
                corner,
                at,
            } => match self
                .layouts
                .capture_region_point(player, id, room, kind, corner, at)?
            {
                None => Ok(format!("First corner of {} recorded; now mark pos2.", kind)),
                Some(region) => Ok(format!(
                    "Set {} of dungeon {} ({} blocks).",
                    kind,
                    id,
                    region.volume()
                )),
            },
            AuthoringCommand::SetSpawn { id, at } => {
                self.layouts.set_spawn_point(id, at)?;
                Ok(format!("Set spawn point of dungeon {}.", id))
            }
            AuthoringCommand::SetBossSpawn { id, at } => {
                self.layouts.set_boss_spawn_point(id, at)?;
                Ok(format!("Set boss spawn point of dungeon {}.", id))
            }
            AuthoringCommand::SetRewardContainer { id, at } => {
                self.layouts.set_reward_container_point(id, at)?;
                Ok(format!("Set reward container of dungeon {}.", id))
            }
            AuthoringCommand::AddMobSpawn { id, room, at } => {
                let total = self.layouts.add_mob_spawn_point(id, room, at.clone())?;
                self.show_marker(host, &at);
                Ok(format!(
                    "Room {} of dungeon {} now has {} spawn point(s).{}",
                    room,
                    id,
                    total,
                    self.mobless_rooms_note(id)
                ))
            }
            AuthoringCommand::ClearMobSpawns { id, room } => {
                self.layouts.clear_mob_spawn_points(id, room)?;
                Ok(format!(
                    "Cleared spawn points of room {} in dungeon {}.{}",
                    room,
                    id,
                    self.mobless_rooms_note(id)
                ))
            }
            AuthoringCommand::Start { id } => {
                let id = match id {
                    Some(id) => self.start(host, player, id)?,
                    None => self.start_any(host, player)?,
                };
                Ok(format!("Entered dungeon {}.", id))
            }
            AuthoringCommand::Stop => {
                self.stop(host, player)?;
                Ok("You left the dungeon.".to_string())
            }
        }
    }

    /// Warning suffix naming rooms that can never drop a key
    fn mobless_rooms_note(&self, id: DungeonId) -> String {
        let rooms = self
            .layouts
            .get(id)
            .map(|l| l.rooms_without_mobs())
            .unwrap_or_default();
        if rooms.is_empty() {
            return String::new();
        }
        let list: Vec<String> = rooms.iter().map(u32::to_string).collect();
        format!(" Warning: room(s) {} have no mobs, so no key drops there.", list.join(", "))
    }

    /// Flash a marker block where a spawn point was added
    fn show_marker(&mut self, host: &mut dyn Host, at: &Location) {
        let pos = at.block();
        if host.block(&at.space, pos) != Material::Air {
            return;
        }
        host.set_block(&at.space, pos, self.config.spawn_marker);
        self.scheduler.schedule_after(
            self.now,
            self.config.marker_ticks,
            ScheduledAction::RemoveMarker {
                space: at.space.clone(),
                pos,
            },
        );
    }
}
