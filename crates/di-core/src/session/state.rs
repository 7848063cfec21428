//! Per-player run state machine
//!
//! ```text
//! Antechamber --entry gate--> Room(1) --key--> Room(2) ... Room(N)
//!   Room(N) cleared: boss spawns; boss gate opens --> BossRoom
//!   boss dies --> Cleared --reward claim--> cleanup
//! ```
//!
//! Progression is strictly monotonic: the only way into `Room(k + 1)` is a
//! key unlock of room `k`'s exit door. `cleanup` is reachable from any stage.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{BossPhase, EntityChange, SessionCtx, Stage, Transition};
use crate::error::EngineError;
use crate::geometry::{BlockPos, Location};
use crate::host::{EntityId, Material, PlayerId};
use crate::layout::{DungeonId, DungeonLayout, LayoutFeature};

#[derive(Debug)]
pub struct DungeonSession {
    player: PlayerId,
    layout: Arc<DungeonLayout>,
    stage: Stage,
    has_key: bool,
    active_mobs: HashSet<EntityId>,
    boss: Option<EntityId>,
    minions: HashSet<EntityId>,
    boss_phase_one_done: bool,
    boss_phase_two_done: bool,
    boss_invulnerable: bool,
    boss_dead: bool,
    reward_claimed: bool,
    cleaned_up: bool,
    changes: Vec<EntityChange>,
}

impl DungeonSession {
    /// Start a run: every gate closed, no container, player at the spawn.
    pub fn begin(player: PlayerId, layout: Arc<DungeonLayout>, ctx: &mut SessionCtx<'_>) -> Self {
        let session = Self {
            player,
            layout,
            stage: Stage::Antechamber,
            has_key: false,
            active_mobs: HashSet::new(),
            boss: None,
            minions: HashSet::new(),
            boss_phase_one_done: false,
            boss_phase_two_done: false,
            boss_invulnerable: false,
            boss_dead: false,
            reward_claimed: false,
            cleaned_up: false,
            changes: Vec::new(),
        };
        session.close_all_gates(ctx);
        session.remove_container(ctx);
        if let Some(spawn) = &session.layout.spawn_point {
            ctx.host.teleport(player, spawn);
        }
        ctx.audit.record(&format!(
            "{} started dungeon {}",
            player, session.layout.id
        ));
        session
    }

    pub fn player(&self) -> PlayerId {
        self.player
    }

    pub fn layout(&self) -> &DungeonLayout {
        &self.layout
    }

    pub fn layout_id(&self) -> DungeonId {
        self.layout.id
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn current_room(&self) -> Option<u32> {
        self.stage.current_room()
    }

    pub fn has_key(&self) -> bool {
        self.has_key
    }

    pub fn active_mobs(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.active_mobs.iter().copied()
    }

    pub fn active_mob_count(&self) -> usize {
        self.active_mobs.len()
    }

    pub fn boss(&self) -> Option<EntityId> {
        self.boss
    }

    pub fn minions(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.minions.iter().copied()
    }

    pub fn minion_count(&self) -> usize {
        self.minions.len()
    }

    pub fn is_boss_invulnerable(&self) -> bool {
        self.boss_invulnerable
    }

    pub fn is_boss_dead(&self) -> bool {
        self.boss_dead
    }

    pub fn phases_fired(&self) -> (bool, bool) {
        (self.boss_phase_one_done, self.boss_phase_two_done)
    }

    pub fn is_cleaned_up(&self) -> bool {
        self.cleaned_up
    }

    /// Whether this run spawned the entity and it is still alive
    pub fn owns(&self, entity: EntityId) -> bool {
        self.active_mobs.contains(&entity)
            || self.minions.contains(&entity)
            || self.boss == Some(entity)
    }

    /// Take the ownership changes recorded since the last call
    pub fn drain_entity_changes(&mut self) -> Vec<EntityChange> {
        std::mem::take(&mut self.changes)
    }

    // ========================================================================
    // Block interaction
    // ========================================================================

    /// Route a block interaction to the gate or container it hit.
    ///
    /// Gate interactions only count on cells that are currently closed.
    pub fn interact(
        &mut self,
        ctx: &mut SessionCtx<'_>,
        space: &str,
        pos: BlockPos,
    ) -> Result<Transition, EngineError> {
        if self.cleaned_up {
            return Ok(Transition::Ignored);
        }
        let Some(feature) = self.layout.feature_at(space, pos) else {
            return Ok(Transition::Ignored);
        };
        if feature != LayoutFeature::RewardContainer
            && !ctx.gates.is_closed_at(&*ctx.host, space, pos)
        {
            return Ok(Transition::Ignored);
        }

        match feature {
            LayoutFeature::EntryGate => self.open_entry(ctx),
            LayoutFeature::RoomGate(room) => self.unlock_room_gate(ctx, room),
            LayoutFeature::BossGate => self.open_boss_gate(ctx),
            LayoutFeature::RewardGate => Err(EngineError::InvalidTransition(
                "The treasure door opens when the boss falls.",
            )),
            LayoutFeature::RewardContainer => self.claim_reward(ctx),
        }
    }

    fn open_entry(&mut self, ctx: &mut SessionCtx<'_>) -> Result<Transition, EngineError> {
        if self.stage != Stage::Antechamber {
            return Err(EngineError::InvalidTransition("The entrance is already open."));
        }
        let layout = Arc::clone(&self.layout);
        if let Some(gate) = &layout.entry_gate {
            ctx.gates.open(ctx.host, gate);
        }
        Ok(self.enter_room(ctx, 1))
    }

    fn unlock_room_gate(
        &mut self,
        ctx: &mut SessionCtx<'_>,
        room: u32,
    ) -> Result<Transition, EngineError> {
        if self.stage != Stage::Room(room) {
            return Err(EngineError::InvalidTransition(
                "That door does not lead on from here.",
            ));
        }
        if room >= self.layout.room_count() {
            return Err(EngineError::InvalidTransition(
                "The way on is through the boss gate.",
            ));
        }
        if !self.has_key {
            return Err(EngineError::NoKey);
        }
        let holding_key = ctx
            .host
            .held_item(self.player)
            .is_some_and(|stack| ctx.key.matches(&stack));
        if !holding_key || !ctx.host.consume_held(self.player, 1) {
            return Err(EngineError::KeyNotHeld);
        }

        self.has_key = false;
        let layout = Arc::clone(&self.layout);
        if let Some(gate) = layout.room(room).and_then(|r| r.gate.as_ref()) {
            ctx.gates.open(ctx.host, gate);
        }
        Ok(self.enter_room(ctx, room + 1))
    }

    fn open_boss_gate(&mut self, ctx: &mut SessionCtx<'_>) -> Result<Transition, EngineError> {
        let last = self.layout.room_count();
        match self.stage {
            Stage::Room(room) if room == last && self.boss.is_some() => {}
            Stage::Room(room) if room == last => {
                return Err(EngineError::InvalidTransition(
                    "Clear this room before facing the boss.",
                ));
            }
            _ => {
                return Err(EngineError::InvalidTransition(
                    "The boss gate cannot be opened from here.",
                ));
            }
        }

        let layout = Arc::clone(&self.layout);
        if let Some(gate) = &layout.boss_gate {
            ctx.gates.open(ctx.host, gate);
        }
        self.stage = Stage::BossRoom;
        ctx.audit
            .record(&format!("{} entered the boss room of dungeon {}", self.player, layout.id));
        Ok(Transition::EnteredBossRoom)
    }

    fn claim_reward(&mut self, ctx: &mut SessionCtx<'_>) -> Result<Transition, EngineError> {
        if !self.boss_dead {
            return Err(EngineError::InvalidTransition(
                "The reward is sealed until the boss falls.",
            ));
        }
        if self.reward_claimed {
            return Ok(Transition::Ignored);
        }
        self.reward_claimed = true;
        let items = ctx.rewards.roll(self.player);
        ctx.audit.record(&format!(
            "{} claimed {} reward stack(s) from dungeon {}",
            self.player,
            items.len(),
            self.layout.id
        ));
        ctx.host.present_rewards(self.player, items);
        Ok(Transition::RewardClaimed)
    }

    // ========================================================================
    // Rooms
    // ========================================================================

    fn enter_room(&mut self, ctx: &mut SessionCtx<'_>, room: u32) -> Transition {
        self.stage = Stage::Room(room);
        let layout = Arc::clone(&self.layout);
        let points = layout
            .room(room)
            .map(|r| r.mob_spawn_points.as_slice())
            .unwrap_or_default();

        for point in points {
            let id = ctx.spawner.spawn_room_mob(ctx.host, ctx.rng, point, room);
            self.active_mobs.insert(id);
            self.changes.push(EntityChange::Claimed(id));
        }
        info!(player = %self.player, dungeon = %layout.id, room, mobs = points.len(), "entered room");
        ctx.audit.record(&format!(
            "{} entered room {} of dungeon {} ({} mobs)",
            self.player,
            room,
            layout.id,
            points.len()
        ));

        if self.active_mobs.is_empty() {
            if room == layout.room_count() {
                // Nothing guards the last room; the boss comes straight away
                if self.boss.is_none() && !self.boss_dead {
                    self.spawn_boss(ctx);
                }
            } else {
                // Keys only come from slain mobs
                warn!(player = %self.player, dungeon = %layout.id, room, "room has no mobs; no key will drop");
            }
        }
        Transition::EnteredRoom(room)
    }

    fn on_room_cleared(&mut self, ctx: &mut SessionCtx<'_>, at: &Location) -> Transition {
        let Stage::Room(room) = self.stage else {
            return Transition::Ignored;
        };
        if room < self.layout.room_count() {
            ctx.host.drop_item(at, ctx.key.stack());
            self.has_key = true;
            debug!(player = %self.player, room, "room cleared; key dropped");
            ctx.audit.record(&format!(
                "Key dropped for {} in room {} of dungeon {}",
                self.player, room, self.layout.id
            ));
            Transition::KeyDropped
        } else if self.boss.is_none() && !self.boss_dead {
            self.spawn_boss(ctx)
        } else {
            Transition::Ignored
        }
    }

    // ========================================================================
    // Boss
    // ========================================================================

    fn spawn_boss(&mut self, ctx: &mut SessionCtx<'_>) -> Transition {
        let Some(point) = self.layout.boss_spawn_point.clone() else {
            warn!(dungeon = %self.layout.id, "no boss spawn point; boss skipped");
            return Transition::Ignored;
        };
        let id = ctx.spawner.spawn_boss(ctx.host, &point);
        self.boss = Some(id);
        self.changes.push(EntityChange::Claimed(id));
        info!(player = %self.player, dungeon = %self.layout.id, "boss spawned");
        ctx.audit.record(&format!(
            "Boss spawned for {} in dungeon {}",
            self.player, self.layout.id
        ));
        Transition::BossSpawned
    }

    /// Decide whether a hit on the boss lands, firing phase waves.
    ///
    /// The boss cannot be hurt until the player is through the boss gate.
    /// Thresholds are checked against the health the boss would have after
    /// the hit. A killing blow never starts a wave.
    pub fn on_boss_damaged(
        &mut self,
        ctx: &mut SessionCtx<'_>,
        entity: EntityId,
        amount: f64,
    ) -> Transition {
        if self.cleaned_up || self.boss_dead || self.boss != Some(entity) {
            return Transition::Ignored;
        }
        if self.stage != Stage::BossRoom || self.boss_invulnerable {
            return Transition::DamageCancelled;
        }
        let Some(health) = ctx.host.health(entity) else {
            return Transition::Ignored;
        };
        let after = health - amount;
        if after <= 0.0 {
            return Transition::Ignored;
        }

        let tuning = ctx.spawner.boss_tuning();
        let phase = if !self.boss_phase_one_done && after <= tuning.phase_one_threshold {
            Some((BossPhase::One, tuning.phase_one_wave))
        } else if !self.boss_phase_two_done && after <= tuning.phase_two_threshold {
            Some((BossPhase::Two, tuning.phase_two_wave))
        } else {
            None
        };

        match phase {
            Some((phase, size)) => self.start_minion_wave(ctx, phase, size),
            None => Transition::Ignored,
        }
    }

    fn start_minion_wave(
        &mut self,
        ctx: &mut SessionCtx<'_>,
        phase: BossPhase,
        size: usize,
    ) -> Transition {
        match phase {
            BossPhase::One => self.boss_phase_one_done = true,
            BossPhase::Two => self.boss_phase_two_done = true,
        }
        let center = self
            .layout
            .boss_spawn_point
            .clone()
            .or_else(|| self.layout.spawn_point.clone())
            .unwrap_or_else(|| Location::new("world", Default::default()));

        let wave = ctx.spawner.spawn_minion_wave(ctx.host, &center, size);
        for id in &wave {
            self.minions.insert(*id);
            self.changes.push(EntityChange::Claimed(*id));
        }
        if !self.minions.is_empty() {
            self.boss_invulnerable = true;
        }
        info!(player = %self.player, ?phase, size = wave.len(), "minion wave");
        ctx.audit.record(&format!(
            "Boss of dungeon {} summoned {} minions ({:?} phase)",
            self.layout.id,
            wave.len(),
            phase
        ));
        Transition::MinionWave {
            phase,
            size: wave.len(),
        }
    }

    fn on_boss_died(&mut self, ctx: &mut SessionCtx<'_>, entity: EntityId) -> Transition {
        self.boss = None;
        self.changes.push(EntityChange::Released(entity));
        self.boss_dead = true;
        self.boss_invulnerable = false;

        let layout = Arc::clone(&self.layout);
        if self.stage != Stage::BossRoom {
            // Died without the gate ever opening; open it so the reward is reachable
            warn!(player = %self.player, dungeon = %layout.id, stage = ?self.stage, "boss died outside the boss room");
            if let Some(gate) = &layout.boss_gate {
                ctx.gates.open(ctx.host, gate);
            }
        }
        self.stage = Stage::Cleared;
        if let Some(gate) = &layout.reward_gate {
            ctx.gates.open(ctx.host, gate);
        }
        if let Some(point) = &layout.reward_container_point {
            ctx.host
                .set_block(&point.space, point.block(), ctx.reward_container);
        }
        info!(player = %self.player, dungeon = %layout.id, "boss defeated");
        ctx.audit.record(&format!(
            "{} defeated the boss of dungeon {}",
            self.player, layout.id
        ));
        Transition::BossDefeated
    }

    // ========================================================================
    // Deaths
    // ========================================================================

    /// Account for the death of an entity this run may own
    pub fn on_entity_died(
        &mut self,
        ctx: &mut SessionCtx<'_>,
        entity: EntityId,
        at: &Location,
    ) -> Transition {
        if self.cleaned_up {
            return Transition::Ignored;
        }
        if self.active_mobs.remove(&entity) {
            self.changes.push(EntityChange::Released(entity));
            if self.active_mobs.is_empty() {
                return self.on_room_cleared(ctx, at);
            }
            return Transition::MobSlain {
                remaining: self.active_mobs.len(),
            };
        }
        if self.minions.remove(&entity) {
            self.changes.push(EntityChange::Released(entity));
            if self.minions.is_empty() && self.boss_invulnerable {
                self.boss_invulnerable = false;
                ctx.audit.record(&format!(
                    "Boss of dungeon {} is vulnerable again",
                    self.layout.id
                ));
                return Transition::BossVulnerable;
            }
            return Transition::MinionSlain {
                remaining: self.minions.len(),
            };
        }
        if self.boss == Some(entity) {
            return self.on_boss_died(ctx, entity);
        }
        Transition::Ignored
    }

    // ========================================================================
    // Cleanup
    // ========================================================================

    /// Tear the run down. Safe to call more than once.
    pub fn cleanup(&mut self, ctx: &mut SessionCtx<'_>) {
        let owned: Vec<EntityId> = self
            .active_mobs
            .drain()
            .chain(self.minions.drain())
            .chain(self.boss.take())
            .collect();
        for id in owned {
            ctx.host.remove_entity(id);
            self.changes.push(EntityChange::Released(id));
        }
        self.has_key = false;
        self.boss_invulnerable = false;
        self.close_all_gates(ctx);
        self.remove_container(ctx);

        if !self.cleaned_up {
            self.cleaned_up = true;
            info!(player = %self.player, dungeon = %self.layout.id, stage = ?self.stage, "run ended");
            ctx.audit.record(&format!(
                "{} left dungeon {}",
                self.player, self.layout.id
            ));
        }
    }

    fn close_all_gates(&self, ctx: &mut SessionCtx<'_>) {
        for region in self.layout.gate_regions() {
            ctx.gates.close(ctx.host, region);
        }
    }

    fn remove_container(&self, ctx: &mut SessionCtx<'_>) {
        if let Some(point) = &self.layout.reward_container_point {
            if ctx.host.block(&point.space, point.block()) == ctx.reward_container {
                ctx.host.set_block(&point.space, point.block(), Material::Air);
            }
        }
    }
}
