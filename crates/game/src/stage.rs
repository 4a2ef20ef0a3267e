use glam::Vec3;

use crate::combat::{Material, Slot, StructureKind};
use crate::event::AnimCue;
use crate::{EntityId, PlayerId};

/// Position plus view angles in degrees, Y-up. Yaw 0 faces +Z.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub yaw: f32,
    pub pitch: f32,
}

impl Transform {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        yaw: 0.0,
        pitch: 0.0,
    };

    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            yaw: 0.0,
            pitch: 0.0,
        }
    }

    /// Ground-plane facing direction (pitch ignored).
    pub fn forward(&self) -> Vec3 {
        let (sin_yaw, cos_yaw) = self.yaw.to_radians().sin_cos();
        Vec3::new(sin_yaw, 0.0, cos_yaw)
    }

    /// Full view direction including pitch.
    pub fn aim_direction(&self) -> Vec3 {
        let (sin_yaw, cos_yaw) = self.yaw.to_radians().sin_cos();
        let (sin_pitch, cos_pitch) = self.pitch.to_radians().sin_cos();
        Vec3::new(sin_yaw * cos_pitch, sin_pitch, cos_yaw * cos_pitch)
    }

    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.yaw.is_finite() && self.pitch.is_finite()
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Socket {
    RightHand,
    LeftHand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityClass {
    Weapon(Slot),
    BandagePack,
    AmmoBox { slot: Slot, rounds: u16 },
    Projectile(Slot),
    Structure { kind: StructureKind, material: Material },
    Preview { kind: StructureKind, material: Material },
}

#[derive(Debug, thiserror::Error)]
pub enum SpawnError {
    #[error("entity capacity reached")]
    CapacityExhausted,
    #[error("non-finite spawn transform")]
    InvalidTransform,
}

/// Capability boundary to the scene. The combat core decides what happens;
/// the stage owns entities, transforms, and presentation side effects.
pub trait Stage {
    fn spawn(&mut self, class: EntityClass, at: Transform) -> Result<EntityId, SpawnError>;

    /// Destroying an unknown entity is a no-op.
    fn destroy(&mut self, entity: EntityId);

    fn attach(&mut self, entity: EntityId, player: PlayerId, socket: Socket);

    fn play_animation(&mut self, player: PlayerId, cue: AnimCue);

    fn overlapping_players(&self, entity: EntityId) -> Vec<PlayerId>;

    fn body_transform(&self, player: PlayerId) -> Option<Transform>;

    fn camera_transform(&self, player: PlayerId) -> Option<Transform>;

    fn socket_transform(&self, player: PlayerId, socket: Socket) -> Option<Transform>;

    /// Health lost per one-second storm pulse while outside the safe zone.
    fn hazard_damage_per_pulse(&self) -> f32;
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_tracks_yaw() {
        let mut t = Transform::IDENTITY;
        assert!((t.forward() - Vec3::Z).length() < 1e-6);

        t.yaw = 90.0;
        assert!((t.forward() - Vec3::X).length() < 1e-5);
    }

    #[test]
    fn aim_direction_tilts_with_pitch() {
        let t = Transform {
            position: Vec3::ZERO,
            yaw: 0.0,
            pitch: 90.0,
        };
        assert!((t.aim_direction() - Vec3::Y).length() < 1e-5);
    }
}
