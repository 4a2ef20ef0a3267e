use glam::Vec3;

use crate::build::BuildState;
use crate::net::CombatSnapshot;
use crate::{EntityId, PlayerId};

use super::gate::{ActionGate, LockKind};
use super::inventory::Inventory;
use super::slot::{ItemKind, Material, Slot};
use super::tuning::CombatTuning;

fn wrap_degrees(angle: f32) -> f32 {
    let mut a = angle % 360.0;
    if a >= 180.0 {
        a -= 360.0;
    } else if a < -180.0 {
        a += 360.0;
    }
    a
}

/// Server-side smoothing of the replicated view angles: each tick the
/// current angles move toward the client's latest target, so remote
/// observers see a damped aim instead of raw input steps.
#[derive(Debug, Clone, Copy, Default)]
pub struct AimTrack {
    pub pitch: f32,
    pub yaw: f32,
    target_pitch: f32,
    target_yaw: f32,
}

impl AimTrack {
    pub fn set_target(&mut self, yaw: f32, pitch: f32, max_pitch: f32) {
        self.target_yaw = wrap_degrees(yaw);
        self.target_pitch = pitch.clamp(-max_pitch, max_pitch);
    }

    /// Moves toward the target, returns whether anything visibly changed.
    pub fn advance(&mut self, interp_speed: f32, dt: f32, max_pitch: f32) -> bool {
        let t = (interp_speed * dt).clamp(0.0, 1.0);

        let new_pitch =
            (self.pitch + (self.target_pitch - self.pitch) * t).clamp(-max_pitch, max_pitch);
        let new_yaw = wrap_degrees(self.yaw + wrap_degrees(self.target_yaw - self.yaw) * t);

        let moved = (new_pitch - self.pitch).abs() > 1e-3
            || wrap_degrees(new_yaw - self.yaw).abs() > 1e-3;
        self.pitch = new_pitch;
        self.yaw = new_yaw;
        moved
    }
}

/// One player's authoritative combat record. Only the arena mutates it.
#[derive(Debug)]
pub struct CombatState {
    pub id: PlayerId,
    pub health: f32,
    pub selected: ItemKind,
    pub inventory: Inventory,
    pub aimed_in: bool,
    pub gate: ActionGate,
    pub build: BuildState,
    pub held_weapon: Option<EntityId>,
    pub held_healing: Option<EntityId>,
    pub preview: Option<EntityId>,
    pub in_hazard: bool,
    pub aim: AimTrack,
    pub dirty: bool,
}

impl CombatState {
    pub fn new(id: PlayerId, tuning: &CombatTuning) -> Self {
        Self {
            id,
            health: tuning.max_health,
            selected: ItemKind::Pickaxe,
            inventory: Inventory::new(),
            aimed_in: false,
            gate: ActionGate::new(),
            build: BuildState::default(),
            held_weapon: None,
            held_healing: None,
            preview: None,
            in_hazard: false,
            aim: AimTrack::default(),
            dirty: true,
        }
    }

    pub fn in_build_mode(&self) -> bool {
        self.build.active()
    }

    pub fn is_healing(&self) -> bool {
        self.gate.held() == Some(LockKind::Heal)
    }

    /// Movement scale for the locomotion layer. Healing roots the player;
    /// aiming slows them regardless of gait.
    pub fn move_multiplier(&self, tuning: &CombatTuning, running: bool) -> f32 {
        if self.is_healing() {
            0.0
        } else if self.aimed_in {
            tuning.aimed_move_multiplier
        } else if running {
            tuning.run_move_multiplier
        } else {
            tuning.walk_move_multiplier
        }
    }

    pub fn field_of_view(&self, tuning: &CombatTuning) -> f32 {
        if self.aimed_in {
            tuning.aimed_fov
        } else {
            tuning.hip_fov
        }
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn snapshot(&self, position: Vec3) -> CombatSnapshot {
        let mut snap = CombatSnapshot::new(self.id);
        snap.health = self.health;
        snap.equipped = self.selected.wire_slot();
        snap.owned_slots = self.inventory.owned().bits();
        snap.clips = [
            self.inventory.clip(Slot::Rifle),
            self.inventory.clip(Slot::Shotgun),
        ];
        snap.reserves = [
            self.inventory.reserve(Slot::Rifle),
            self.inventory.reserve(Slot::Shotgun),
        ];
        snap.materials = [
            self.inventory.material(Material::Wood),
            self.inventory.material(Material::Stone),
            self.inventory.material(Material::Steel),
        ];
        snap.bandages = self.inventory.bandages();
        snap.build_mode = self.build.mode.map_or(-1, |kind| kind as i8);
        snap.build_material = self.build.material as u8;
        snap.lock = self.gate.held().map_or(-1, |kind| kind as i8);
        snap.set_flag(CombatSnapshot::FLAG_AIMED, self.aimed_in);
        snap.set_flag(CombatSnapshot::FLAG_IN_HAZARD, self.in_hazard);
        snap.encode_view(self.aim.yaw, self.aim.pitch);
        snap.position = position.into();
        snap
    }
}
