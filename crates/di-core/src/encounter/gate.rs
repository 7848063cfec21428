//! Gate open/close
//!
//! The only code that writes per-cell world state for doors. Gate state is
//! never cached: opening or closing always walks the region's cells again.

use crate::config::GateMaterials;
use crate::geometry::{BlockPos, Region};
use crate::host::{Host, Material};

#[derive(Debug, Clone, Copy)]
pub struct GateController {
    materials: GateMaterials,
}

impl GateController {
    pub fn new(materials: GateMaterials) -> Self {
        Self { materials }
    }

    pub fn closed_material(&self) -> Material {
        self.materials.closed
    }

    /// Set every cell of the region to the passable material
    pub fn open(&self, host: &mut dyn Host, region: &Region) {
        self.fill(host, region, self.materials.open);
    }

    /// Set every cell of the region to the blocking material
    pub fn close(&self, host: &mut dyn Host, region: &Region) {
        self.fill(host, region, self.materials.closed);
    }

    /// Whether a cell currently holds the blocking material
    pub fn is_closed_at(&self, host: &dyn Host, space: &str, pos: BlockPos) -> bool {
        host.block(space, pos) == self.materials.closed
    }

    fn fill(&self, host: &mut dyn Host, region: &Region, material: Material) {
        for pos in region.blocks() {
            if host.block(region.space(), pos) != material {
                host.set_block(region.space(), pos, material);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Vec3;
    use crate::host::SimHost;

    fn door() -> Region {
        Region::new("world", Vec3::new(0.0, 64.0, 0.0), Vec3::new(2.0, 66.0, 0.0))
    }

    #[test]
    fn test_close_then_open() {
        let gates = GateController::new(GateMaterials::default());
        let mut host = SimHost::new();
        let region = door();

        gates.close(&mut host, &region);
        assert!(region.blocks().all(|b| gates.is_closed_at(&host, "world", b)));
        assert_eq!(host.solid_blocks(), 9);

        gates.open(&mut host, &region);
        assert!(region.blocks().all(|b| host.block("world", b) == Material::Air));
    }

    #[test]
    fn test_close_is_idempotent() {
        let gates = GateController::new(GateMaterials::default());
        let mut host = SimHost::new();
        let region = door();
        gates.close(&mut host, &region);
        gates.close(&mut host, &region);
        assert_eq!(host.solid_blocks(), 9);
    }
}
