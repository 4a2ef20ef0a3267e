use serde::{Deserialize, Serialize};

use super::gate::LockKind;
use super::slot::{Slot, StructureKind};

/// Gameplay numbers in one place. Durations are in seconds, distances in
/// world units, angles in degrees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombatTuning {
    pub max_health: f32,
    pub heal_amount: f32,
    pub bandages_per_pack: u16,

    pub rifle_magazine: u16,
    pub shotgun_magazine: u16,

    pub swing_duration: f32,
    pub rifle_fire_duration: f32,
    pub shotgun_fire_duration: f32,
    pub rifle_reload_duration: f32,
    pub shotgun_reload_duration: f32,
    pub heal_duration: f32,

    pub structure_cost: u32,
    pub wall_offset: f32,
    pub ramp_offset: f32,
    pub floor_offset: f32,
    pub aim_offset: f32,

    pub aim_interp_speed: f32,
    pub max_aim_pitch: f32,

    pub aimed_move_multiplier: f32,
    pub run_move_multiplier: f32,
    pub walk_move_multiplier: f32,
    pub aimed_fov: f32,
    pub hip_fov: f32,

    pub hazard_pulse_secs: f32,
}

impl Default for CombatTuning {
    fn default() -> Self {
        Self {
            max_health: 100.0,
            heal_amount: 15.0,
            bandages_per_pack: 3,

            rifle_magazine: 30,
            shotgun_magazine: 5,

            swing_duration: 0.403,
            rifle_fire_duration: 0.233,
            shotgun_fire_duration: 1.3,
            rifle_reload_duration: 2.167,
            shotgun_reload_duration: 4.3,
            heal_duration: 3.321,

            structure_cost: 10,
            wall_offset: 200.0,
            ramp_offset: 100.0,
            floor_offset: 120.0,
            aim_offset: 3.0,

            aim_interp_speed: 15.0,
            max_aim_pitch: 90.0,

            aimed_move_multiplier: 0.2,
            run_move_multiplier: 0.9,
            walk_move_multiplier: 0.45,
            aimed_fov: 45.0,
            hip_fov: 90.0,

            hazard_pulse_secs: 1.0,
        }
    }
}

impl CombatTuning {
    pub fn magazine_size(&self, slot: Slot) -> u16 {
        match slot {
            Slot::Rifle => self.rifle_magazine,
            Slot::Shotgun => self.shotgun_magazine,
            Slot::Pickaxe => 0,
        }
    }

    pub fn lock_duration(&self, kind: LockKind) -> f32 {
        match kind {
            LockKind::SwingPickaxe => self.swing_duration,
            LockKind::FireRifle => self.rifle_fire_duration,
            LockKind::FireShotgun => self.shotgun_fire_duration,
            LockKind::ReloadRifle => self.rifle_reload_duration,
            LockKind::ReloadShotgun => self.shotgun_reload_duration,
            LockKind::Heal => self.heal_duration,
        }
    }

    pub fn forward_offset(&self, kind: StructureKind) -> f32 {
        match kind {
            StructureKind::Wall => self.wall_offset,
            StructureKind::Ramp => self.ramp_offset,
            StructureKind::Floor => self.floor_offset,
        }
    }
}
