//! Creature kinds and mutation tiers

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Base creature kinds the spawner can place
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
    EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "title_case")]
pub enum CreatureKind {
    Zombie,
    Skeleton,
    Spider,
    Husk,
    Stray,
    CaveSpider,
    Vindicator,
    WitherSkeleton,
}

/// Kinds early rooms favour
pub const WEAK_POOL: &[CreatureKind] = &[
    CreatureKind::Zombie,
    CreatureKind::Skeleton,
    CreatureKind::Spider,
];

/// Every kind a room may draw from
pub const FULL_POOL: &[CreatureKind] = &[
    CreatureKind::Zombie,
    CreatureKind::Skeleton,
    CreatureKind::Spider,
    CreatureKind::Husk,
    CreatureKind::Stray,
    CreatureKind::CaveSpider,
    CreatureKind::Vindicator,
];

impl CreatureKind {
    /// Vanilla health before tier scaling
    pub const fn base_health(&self) -> f64 {
        match self {
            CreatureKind::Zombie | CreatureKind::Husk => 20.0,
            CreatureKind::Skeleton | CreatureKind::Stray => 20.0,
            CreatureKind::Spider => 16.0,
            CreatureKind::CaveSpider => 12.0,
            CreatureKind::Vindicator => 24.0,
            CreatureKind::WitherSkeleton => 20.0,
        }
    }

    /// Whether the host would set this kind on fire in daylight
    pub const fn burns_in_daylight(&self) -> bool {
        matches!(
            self,
            CreatureKind::Zombie
                | CreatureKind::Skeleton
                | CreatureKind::Stray
                | CreatureKind::WitherSkeleton
        )
    }

    /// Weighted tier buckets for this kind.
    ///
    /// Undead mutate more readily than arthropods; illagers never reach the
    /// top tier.
    pub const fn tier_weights(&self) -> &'static [(Tier, u32)] {
        match self {
            CreatureKind::Zombie | CreatureKind::Husk => &[
                (Tier::Normal, 55),
                (Tier::Mutated, 25),
                (Tier::Feral, 15),
                (Tier::Abomination, 5),
            ],
            CreatureKind::Skeleton | CreatureKind::Stray | CreatureKind::WitherSkeleton => &[
                (Tier::Normal, 60),
                (Tier::Mutated, 25),
                (Tier::Feral, 12),
                (Tier::Abomination, 3),
            ],
            CreatureKind::Spider | CreatureKind::CaveSpider => &[
                (Tier::Normal, 70),
                (Tier::Mutated, 20),
                (Tier::Feral, 10),
            ],
            CreatureKind::Vindicator => &[(Tier::Normal, 75), (Tier::Mutated, 25)],
        }
    }
}

/// Mutation tier rolled on top of the base kind
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
)]
pub enum Tier {
    #[default]
    Normal,
    Mutated,
    Feral,
    Abomination,
    /// Fixed tier for bosses
    Boss,
    /// Fixed tier for boss minions
    Minion,
}

impl Tier {
    /// Health multiplier applied to the base kind
    pub const fn health_multiplier(&self) -> f64 {
        match self {
            Tier::Normal | Tier::Minion => 1.0,
            Tier::Mutated => 1.5,
            Tier::Feral => 2.0,
            Tier::Abomination => 3.0,
            Tier::Boss => 1.0,
        }
    }
}
