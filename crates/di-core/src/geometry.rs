//! Coordinates, block cells and axis-aligned regions
//!
//! A [`Region`] covers whole block cells: its bounds are floored to the cells
//! containing its two corners, and containment tests are done on those cells.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// A point in continuous world coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Component-wise minimum
    pub fn min(self, other: Vec3) -> Vec3 {
        Vec3::new(self.x.min(other.x), self.y.min(other.y), self.z.min(other.z))
    }

    /// Component-wise maximum
    pub fn max(self, other: Vec3) -> Vec3 {
        Vec3::new(self.x.max(other.x), self.y.max(other.y), self.z.max(other.z))
    }

    /// The block cell containing this point
    pub fn block(self) -> BlockPos {
        BlockPos::new(
            self.x.floor() as i32,
            self.y.floor() as i32,
            self.z.floor() as i32,
        )
    }

    pub fn offset(self, dx: f64, dy: f64, dz: f64) -> Vec3 {
        Vec3::new(self.x + dx, self.y + dy, self.z + dz)
    }
}

/// A discrete block cell
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }
}

/// A position with facing inside a named coordinate space (world)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub space: String,
    pub pos: Vec3,
    #[serde(default)]
    pub yaw: f32,
    #[serde(default)]
    pub pitch: f32,
}

impl Location {
    pub fn new(space: impl Into<String>, pos: Vec3) -> Self {
        Self {
            space: space.into(),
            pos,
            yaw: 0.0,
            pitch: 0.0,
        }
    }

    pub fn with_facing(mut self, yaw: f32, pitch: f32) -> Self {
        self.yaw = yaw;
        self.pitch = pitch;
        self
    }

    pub fn block(&self) -> BlockPos {
        self.pos.block()
    }

    /// Same space and facing, shifted position
    pub fn offset(&self, dx: f64, dy: f64, dz: f64) -> Location {
        Location {
            space: self.space.clone(),
            pos: self.pos.offset(dx, dy, dz),
            yaw: self.yaw,
            pitch: self.pitch,
        }
    }
}

/// Serialized shape of a region; normalized on the way in.
#[derive(Deserialize)]
struct RawRegion {
    space: String,
    min: Vec3,
    max: Vec3,
}

impl From<RawRegion> for Region {
    fn from(raw: RawRegion) -> Self {
        Region::new(raw.space, raw.min, raw.max)
    }
}

/// An axis-aligned volume in one coordinate space.
///
/// `min <= max` component-wise always holds. Regions are immutable; changing
/// a gate means replacing its region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawRegion")]
pub struct Region {
    space: String,
    min: Vec3,
    max: Vec3,
}

impl Region {
    /// Build a region from any two opposite corners.
    pub fn new(space: impl Into<String>, a: Vec3, b: Vec3) -> Self {
        Self {
            space: space.into(),
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Build a region from two captured corner locations.
    pub fn from_corners(first: &Location, second: &Location) -> Result<Self, EngineError> {
        if first.space != second.space {
            return Err(EngineError::CrossSpaceSelection {
                first: first.space.clone(),
                second: second.space.clone(),
            });
        }
        Ok(Self::new(first.space.clone(), first.pos, second.pos))
    }

    pub fn space(&self) -> &str {
        &self.space
    }

    pub fn min(&self) -> Vec3 {
        self.min
    }

    pub fn max(&self) -> Vec3 {
        self.max
    }

    /// Floored lower cell
    pub fn block_min(&self) -> BlockPos {
        self.min.block()
    }

    /// Floored upper cell
    pub fn block_max(&self) -> BlockPos {
        self.max.block()
    }

    /// Whether the cell is one of the region's cells
    pub fn contains_block(&self, space: &str, block: BlockPos) -> bool {
        if space != self.space {
            return false;
        }
        let lo = self.block_min();
        let hi = self.block_max();
        (lo.x..=hi.x).contains(&block.x)
            && (lo.y..=hi.y).contains(&block.y)
            && (lo.z..=hi.z).contains(&block.z)
    }

    /// Whether a continuous point lies in one of the region's cells
    pub fn contains(&self, space: &str, point: Vec3) -> bool {
        self.contains_block(space, point.block())
    }

    /// Every cell in the floored bounds, x-major then y then z
    pub fn blocks(&self) -> impl Iterator<Item = BlockPos> + '_ {
        let lo = self.block_min();
        let hi = self.block_max();
        (lo.x..=hi.x).flat_map(move |x| {
            (lo.y..=hi.y).flat_map(move |y| (lo.z..=hi.z).map(move |z| BlockPos::new(x, y, z)))
        })
    }

    /// Number of cells covered
    pub fn volume(&self) -> u64 {
        let lo = self.block_min();
        let hi = self.block_max();
        let span = |a: i32, b: i32| (b as i64 - a as i64 + 1) as u64;
        span(lo.x, hi.x) * span(lo.y, hi.y) * span(lo.z, hi.z)
    }
}
