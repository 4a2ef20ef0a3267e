use glam::Vec3;

use crate::combat::{CombatTuning, Material, StructureKind};
use crate::stage::Transform;

#[derive(Debug, Clone, Copy, Default)]
pub struct BuildState {
    pub mode: Option<StructureKind>,
    pub material: Material,
}

impl BuildState {
    pub fn active(&self) -> bool {
        self.mode.is_some()
    }

    pub fn cycle_material(&mut self) {
        self.material = self.material.next();
    }
}

/// Where a structure (and its preview) lands relative to the builder: a
/// kind-specific distance along the body's facing, nudged along the camera
/// aim so the piece tracks the view. Walls sit sideways across the facing.
pub fn placement_transform(
    kind: StructureKind,
    body: Transform,
    aim_dir: Vec3,
    tuning: &CombatTuning,
) -> Transform {
    let position =
        body.position + body.forward() * tuning.forward_offset(kind) + aim_dir * tuning.aim_offset;
    let yaw = match kind {
        StructureKind::Wall => body.yaw + 90.0,
        StructureKind::Ramp | StructureKind::Floor => body.yaw,
    };

    Transform {
        position,
        yaw,
        pitch: 0.0,
    }
}
