//! Engine configuration
//!
//! Loaded from a JSON document; every field has a default so a partial file
//! only overrides what it names.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::encounter::CreatureKind;
use crate::host::{ItemStack, Material};

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not read config '{path}': {reason}")]
    Io { path: String, reason: String },

    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

/// Materials used for gate cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateMaterials {
    /// Passable state
    pub open: Material,
    /// Blocking state
    pub closed: Material,
}

impl Default for GateMaterials {
    fn default() -> Self {
        Self {
            open: Material::Air,
            closed: Material::IronBars,
        }
    }
}

/// The item that unlocks room doors
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyItem {
    pub item: String,
    pub display_name: String,
}

impl Default for KeyItem {
    fn default() -> Self {
        Self {
            item: "tripwire_hook".to_string(),
            display_name: "Dungeon Key".to_string(),
        }
    }
}

impl KeyItem {
    /// A single key, as dropped by the last mob of a room
    pub fn stack(&self) -> ItemStack {
        ItemStack::new(self.item.clone(), 1).named(self.display_name.clone())
    }

    /// Whether a held stack is this key
    pub fn matches(&self, stack: &ItemStack) -> bool {
        stack.amount > 0
            && stack.item == self.item
            && stack.display_name.as_deref() == Some(self.display_name.as_str())
    }
}

/// Room mob selection
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomMobTuning {
    /// Rooms up to and including this index favour the weak pool
    pub early_room_cutoff: u32,
    /// Chance (percent) an early-room spawn draws from the weak pool
    pub weak_bias_percent: u32,
}

impl Default for RoomMobTuning {
    fn default() -> Self {
        Self {
            early_room_cutoff: 2,
            weak_bias_percent: 85,
        }
    }
}

/// Boss stats and phase triggers.
///
/// Thresholds are absolute health values, not fractions of `max_health`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BossTuning {
    pub kind: CreatureKind,
    pub name: String,
    pub max_health: f64,
    pub phase_one_threshold: f64,
    pub phase_two_threshold: f64,
    pub phase_one_wave: usize,
    pub phase_two_wave: usize,
}

impl Default for BossTuning {
    fn default() -> Self {
        Self {
            kind: CreatureKind::WitherSkeleton,
            name: "Dungeon Warden".to_string(),
            max_health: 300.0,
            phase_one_threshold: 200.0,
            phase_two_threshold: 100.0,
            phase_one_wave: 5,
            phase_two_wave: 7,
        }
    }
}

/// Boss minion stats
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MinionTuning {
    pub kind: CreatureKind,
    pub name: String,
    pub max_health: f64,
    /// Distance from the boss spawn point at which a wave is placed
    pub ring_radius: f64,
}

impl Default for MinionTuning {
    fn default() -> Self {
        Self {
            kind: CreatureKind::Zombie,
            name: "Warden's Thrall".to_string(),
            max_health: 20.0,
            ring_radius: 3.0,
        }
    }
}

/// Top-level engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub gates: GateMaterials,
    pub key_item: KeyItem,
    /// Block placed at the reward container point after the boss dies
    pub reward_container: Material,
    /// Temporary block shown where a mob spawn point was added
    pub spawn_marker: Material,
    pub room_mobs: RoomMobTuning,
    pub boss: BossTuning,
    pub minion: MinionTuning,
    /// Ticks after the boss dies before an unclaimed run is shut down
    pub completion_timeout_ticks: u64,
    /// Ticks a spawn-point marker stays visible
    pub marker_ticks: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            gates: GateMaterials::default(),
            key_item: KeyItem::default(),
            reward_container: Material::Chest,
            spawn_marker: Material::Glowstone,
            room_mobs: RoomMobTuning::default(),
            boss: BossTuning::default(),
            minion: MinionTuning::default(),
            // Five minutes at 20 ticks per second
            completion_timeout_ticks: 6_000,
            marker_ticks: 100,
        }
    }
}

impl EngineConfig {
    /// Load and validate a JSON config file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::parse(&contents)
    }

    /// Parse and validate a JSON config document
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let boss = &self.boss;
        if boss.max_health <= 0.0 {
            return Err(ConfigError::Invalid("boss.max_health must be positive".into()));
        }
        if boss.phase_one_threshold >= boss.max_health {
            return Err(ConfigError::Invalid(
                "boss.phase_one_threshold must be below boss.max_health".into(),
            ));
        }
        if boss.phase_two_threshold >= boss.phase_one_threshold {
            return Err(ConfigError::Invalid(
                "boss.phase_two_threshold must be below boss.phase_one_threshold".into(),
            ));
        }
        if self.gates.open == self.gates.closed {
            return Err(ConfigError::Invalid(
                "gates.open and gates.closed must differ".into(),
            ));
        }
        if self.room_mobs.weak_bias_percent > 100 {
            return Err(ConfigError::Invalid(
                "room_mobs.weak_bias_percent must be at most 100".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config = EngineConfig::parse(r#"{"boss":{"max_health":500.0},"marker_ticks":40}"#)
            .unwrap();
        assert_eq!(config.boss.max_health, 500.0);
        assert_eq!(config.boss.phase_one_threshold, 200.0);
        assert_eq!(config.boss.phase_one_wave, 5);
        assert_eq!(config.marker_ticks, 40);
        assert_eq!(config.gates.closed, Material::IronBars);
    }

    #[test]
    fn test_material_names_parse() {
        let config = EngineConfig::parse(r#"{"gates":{"closed":"barrier"}}"#).unwrap();
        assert_eq!(config.gates.closed, Material::Barrier);
    }

    #[test]
    fn test_thresholds_must_descend() {
        let err = EngineConfig::parse(
            r#"{"boss":{"phase_one_threshold":100.0,"phase_two_threshold":150.0}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_gate_materials_must_differ() {
        let err = EngineConfig::parse(r#"{"gates":{"open":"stone","closed":"stone"}}"#)
            .unwrap_err();
        assert!(err.to_string().contains("gates.open"));
    }

    #[test]
    fn test_key_item_matching() {
        let key = KeyItem::default();
        assert!(key.matches(&key.stack()));
        assert!(!key.matches(&ItemStack::new("tripwire_hook", 1)));
        assert!(!key.matches(&ItemStack::new("stick", 1).named("Dungeon Key")));
    }
}
