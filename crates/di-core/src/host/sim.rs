//! In-memory host world
//!
//! A complete [`Host`] backed by hash maps. The demo binary runs encounters
//! against it, and the test suites drive it like a real server would.

use hashbrown::HashMap;

use super::{EntityId, Host, ItemStack, Material, PlayerId, SpawnRequest};
use crate::geometry::{BlockPos, Location};

/// A live entity in the simulated world
#[derive(Debug, Clone)]
pub struct SimEntity {
    pub request: SpawnRequest,
    pub health: f64,
    pub location: Location,
}

/// Simulated world state
#[derive(Debug, Default)]
pub struct SimHost {
    blocks: HashMap<(String, BlockPos), Material>,
    entities: HashMap<EntityId, SimEntity>,
    next_entity: u64,
    dropped: Vec<(Location, ItemStack)>,
    held: HashMap<PlayerId, ItemStack>,
    positions: HashMap<PlayerId, Location>,
    rewards: HashMap<PlayerId, Vec<ItemStack>>,
    messages: Vec<(PlayerId, String)>,
}

impl SimHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entity(&self, id: EntityId) -> Option<&SimEntity> {
        self.entities.get(&id)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn entities(&self) -> impl Iterator<Item = (EntityId, &SimEntity)> {
        self.entities.iter().map(|(id, e)| (*id, e))
    }

    /// Reduce an entity's health, returning what is left.
    ///
    /// Callers route the hit through the engine first and only apply it when
    /// the engine did not cancel it.
    pub fn apply_damage(&mut self, id: EntityId, amount: f64) -> Option<f64> {
        let entity = self.entities.get_mut(&id)?;
        entity.health = (entity.health - amount).max(0.0);
        Some(entity.health)
    }

    /// Remove an entity as if it died, returning where it fell
    pub fn kill(&mut self, id: EntityId) -> Option<Location> {
        self.entities.remove(&id).map(|e| e.location)
    }

    pub fn set_held(&mut self, player: PlayerId, item: Option<ItemStack>) {
        match item {
            Some(stack) => {
                self.held.insert(player, stack);
            }
            None => {
                self.held.remove(&player);
            }
        }
    }

    /// Move every dropped stack into the player's hand (merged by type)
    pub fn pick_up_all(&mut self, player: PlayerId) {
        for (_, stack) in self.dropped.drain(..) {
            match self.held.get_mut(&player) {
                Some(held)
                    if held.item == stack.item && held.display_name == stack.display_name =>
                {
                    held.amount += stack.amount;
                }
                _ => {
                    self.held.insert(player, stack);
                }
            }
        }
    }

    pub fn dropped(&self) -> &[(Location, ItemStack)] {
        &self.dropped
    }

    pub fn position(&self, player: PlayerId) -> Option<&Location> {
        self.positions.get(&player)
    }

    pub fn rewards(&self, player: PlayerId) -> Option<&[ItemStack]> {
        self.rewards.get(&player).map(Vec::as_slice)
    }

    pub fn messages_for(&self, player: PlayerId) -> Vec<&str> {
        self.messages
            .iter()
            .filter(|(p, _)| *p == player)
            .map(|(_, m)| m.as_str())
            .collect()
    }

    /// Number of non-air cells written so far
    pub fn solid_blocks(&self) -> usize {
        self.blocks.values().filter(|m| **m != Material::Air).count()
    }
}

impl Host for SimHost {
    fn block(&self, space: &str, pos: BlockPos) -> Material {
        self.blocks
            .get(&(space.to_string(), pos))
            .copied()
            .unwrap_or_default()
    }

    fn set_block(&mut self, space: &str, pos: BlockPos, material: Material) {
        if material == Material::Air {
            self.blocks.remove(&(space.to_string(), pos));
        } else {
            self.blocks.insert((space.to_string(), pos), material);
        }
    }

    fn spawn(&mut self, request: &SpawnRequest) -> EntityId {
        self.next_entity += 1;
        let id = EntityId(self.next_entity);
        self.entities.insert(
            id,
            SimEntity {
                request: request.clone(),
                health: request.max_health,
                location: request.at.clone(),
            },
        );
        id
    }

    fn remove_entity(&mut self, entity: EntityId) {
        self.entities.remove(&entity);
    }

    fn health(&self, entity: EntityId) -> Option<f64> {
        self.entities.get(&entity).map(|e| e.health)
    }

    fn drop_item(&mut self, at: &Location, item: ItemStack) {
        self.dropped.push((at.clone(), item));
    }

    fn held_item(&self, player: PlayerId) -> Option<ItemStack> {
        self.held.get(&player).cloned()
    }

    fn consume_held(&mut self, player: PlayerId, amount: u32) -> bool {
        let Some(stack) = self.held.get_mut(&player) else {
            return false;
        };
        if stack.amount < amount {
            return false;
        }
        stack.amount -= amount;
        if stack.amount == 0 {
            self.held.remove(&player);
        }
        true
    }

    fn teleport(&mut self, player: PlayerId, to: &Location) {
        self.positions.insert(player, to.clone());
    }

    fn present_rewards(&mut self, player: PlayerId, items: Vec<ItemStack>) {
        self.rewards.entry(player).or_default().extend(items);
    }

    fn tell(&mut self, player: PlayerId, message: &str) {
        self.messages.push((player, message.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encounter::{CreatureKind, Tier};
    use crate::geometry::Vec3;
    use crate::host::SpawnMarks;

    fn request() -> SpawnRequest {
        SpawnRequest {
            kind: CreatureKind::Zombie,
            tier: Tier::Normal,
            at: Location::new("world", Vec3::new(1.0, 64.0, 1.0)),
            max_health: 20.0,
            name_tag: "Normal Zombie ❤ 20".to_string(),
            marks: SpawnMarks::ENCOUNTER,
        }
    }

    #[test]
    fn test_blocks_default_to_air() {
        let mut host = SimHost::new();
        let pos = BlockPos::new(1, 2, 3);
        assert_eq!(host.block("world", pos), Material::Air);
        host.set_block("world", pos, Material::IronBars);
        assert_eq!(host.block("world", pos), Material::IronBars);
        assert_eq!(host.block("other", pos), Material::Air);
        host.set_block("world", pos, Material::Air);
        assert_eq!(host.solid_blocks(), 0);
    }

    #[test]
    fn test_spawn_damage_kill() {
        let mut host = SimHost::new();
        let id = host.spawn(&request());
        assert_eq!(host.health(id), Some(20.0));
        assert_eq!(host.apply_damage(id, 25.0), Some(0.0));
        assert!(host.kill(id).is_some());
        assert_eq!(host.health(id), None);
    }

    #[test]
    fn test_consume_held_removes_empty_stack() {
        let mut host = SimHost::new();
        let p = PlayerId(1);
        host.set_held(p, Some(ItemStack::new("tripwire_hook", 1)));
        assert!(!host.consume_held(p, 2));
        assert!(host.consume_held(p, 1));
        assert!(host.held_item(p).is_none());
        assert!(!host.consume_held(p, 1));
    }

    #[test]
    fn test_pick_up_merges_stacks() {
        let mut host = SimHost::new();
        let p = PlayerId(1);
        let at = Location::new("world", Vec3::default());
        host.drop_item(&at, ItemStack::new("tripwire_hook", 1));
        host.drop_item(&at, ItemStack::new("tripwire_hook", 1));
        host.pick_up_all(p);
        assert_eq!(host.held_item(p).map(|s| s.amount), Some(2));
        assert!(host.dropped().is_empty());
    }
}
