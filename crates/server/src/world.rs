use std::collections::{HashMap, HashSet};

use glam::Vec3;

use rampart::{
    AnimCue, Contact, EntityClass, EntityId, PlayerId, Slot, Socket, SpawnError, Stage, Transform,
};

use crate::config::HazardConfig;

/// How close a body must be to touch a loose pickup.
const PICKUP_RADIUS: f32 = 120.0;
/// Player proximity that blocks a structure placement. Must stay below the
/// smallest preview offset (ramp, 100 units) or builders would block their
/// own ramps.
const STRUCTURE_CLEARANCE: f32 = 90.0;
const EYE_HEIGHT: f32 = 160.0;
const HAND_HEIGHT: f32 = 140.0;
const HAND_FORWARD: f32 = 40.0;
const HAND_LATERAL: f32 = 30.0;
/// Projectiles are presentation-only server-side; despawn after this.
const PROJECTILE_TTL_SECS: f32 = 1.5;
const SPAWN_RING: f32 = 1200.0;
/// Squared distance under which a pose update counts as standing still.
const MOVE_EPSILON: f32 = 1e-4;

#[derive(Debug)]
struct SceneEntity {
    class: EntityClass,
    at: Transform,
    attached: Option<(PlayerId, Socket)>,
    ttl: Option<f32>,
}

/// One overlap transition the scene saw this tick. Entity contacts are
/// resolved through [`World::pickup_contact`] at dispatch time so the
/// payload reflects any mutation earlier edges caused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlapEdge {
    Hazard,
    Entity(EntityId),
}

/// The server's scene: entity table, player bodies, and the shrinking safe
/// zone. Implements [`Stage`] so the combat core can act on it without
/// knowing any of this layout.
pub struct World {
    entities: HashMap<EntityId, SceneEntity>,
    next_entity_id: EntityId,
    capacity: usize,
    bodies: HashMap<PlayerId, Transform>,
    hazard: HazardConfig,
    hazard_radius: f32,
    /// Last containment verdict per body, for edge detection.
    in_hazard: HashMap<PlayerId, bool>,
    /// Pickup entities each body touched last scan.
    touching: HashMap<PlayerId, HashSet<EntityId>>,
    cues: Vec<(PlayerId, AnimCue)>,
}

impl World {
    pub fn new(capacity: usize, hazard: HazardConfig) -> Self {
        Self {
            entities: HashMap::new(),
            next_entity_id: 1,
            capacity,
            bodies: HashMap::new(),
            hazard_radius: hazard.initial_radius,
            hazard,
            in_hazard: HashMap::new(),
            touching: HashMap::new(),
            cues: Vec::new(),
        }
    }

    /// Loose gear scattered at match start: firearms on an outer ring with
    /// an ammo box beside each, bandages on an inner ring.
    pub fn seed_pickups(&mut self) {
        const GEAR_RING: f32 = 800.0;
        const MEDS_RING: f32 = 400.0;

        for i in 0..8u32 {
            let angle = (i as f32) * 45.0;
            let (sin, cos) = angle.to_radians().sin_cos();
            let spot = Vec3::new(sin, 0.0, cos) * GEAR_RING;

            let (slot, rounds) = if i % 2 == 0 {
                (Slot::Rifle, 30)
            } else {
                (Slot::Shotgun, 10)
            };
            self.seed(EntityClass::Weapon(slot), Transform::at(spot));
            self.seed(
                EntityClass::AmmoBox { slot, rounds },
                Transform::at(spot + Vec3::new(cos, 0.0, -sin) * 150.0),
            );
        }

        for i in 0..4u32 {
            let angle = (i as f32) * 90.0 + 45.0;
            let (sin, cos) = angle.to_radians().sin_cos();
            self.seed(
                EntityClass::BandagePack,
                Transform::at(Vec3::new(sin, 0.0, cos) * MEDS_RING),
            );
        }
    }

    fn seed(&mut self, class: EntityClass, at: Transform) {
        if let Err(err) = self.spawn(class, at) {
            log::warn!("pickup seeding failed: {err}");
        }
    }

    /// Places a new body on the spawn ring, facing the arena center.
    pub fn spawn_body(&mut self, player: PlayerId) -> Transform {
        let angle = (player as f32) * 137.5;
        let (sin, cos) = angle.to_radians().sin_cos();
        let at = Transform {
            position: Vec3::new(sin, 0.0, cos) * SPAWN_RING,
            yaw: angle + 180.0,
            pitch: 0.0,
        };
        self.bodies.insert(player, at);
        at
    }

    pub fn remove_body(&mut self, player: PlayerId) {
        self.bodies.remove(&player);
        self.in_hazard.remove(&player);
        self.touching.remove(&player);
    }

    /// Trusted client pose. Returns true when the body actually moved.
    pub fn set_body_pose(&mut self, player: PlayerId, position: Vec3, yaw: f32, pitch: f32) -> bool {
        if !position.is_finite() || !yaw.is_finite() || !pitch.is_finite() {
            return false;
        }
        let Some(body) = self.bodies.get_mut(&player) else {
            return false;
        };

        let moved = body.position.distance_squared(position) > MOVE_EPSILON;
        body.position = position;
        body.yaw = yaw;
        body.pitch = pitch;
        moved
    }

    /// One scene step: shrink the safe zone, expire projectiles, and report
    /// every containment and pickup-touch transition since the last scan.
    pub fn advance(&mut self, dt: f32) -> Vec<(PlayerId, OverlapEdge, bool)> {
        self.hazard_radius =
            (self.hazard_radius - self.hazard.shrink_rate * dt).max(self.hazard.min_radius);

        let expired: Vec<EntityId> = self
            .entities
            .iter_mut()
            .filter_map(|(&id, entity)| {
                let ttl = entity.ttl.as_mut()?;
                *ttl -= dt;
                (*ttl <= 0.0).then_some(id)
            })
            .collect();
        for id in expired {
            self.entities.remove(&id);
        }

        let mut edges = Vec::new();
        let players: Vec<PlayerId> = self.bodies.keys().copied().collect();
        for player in players {
            self.scan_containment(player, &mut edges);
            self.scan_pickups(player, &mut edges);
        }
        edges
    }

    fn scan_containment(&mut self, player: PlayerId, edges: &mut Vec<(PlayerId, OverlapEdge, bool)>) {
        let Some(body) = self.bodies.get(&player) else {
            return;
        };

        let offset = body.position;
        let dist_sq = offset.x * offset.x + offset.z * offset.z;
        let outside = dist_sq > self.hazard_radius * self.hazard_radius;

        let prev = self.in_hazard.insert(player, outside);
        if prev.unwrap_or(false) != outside {
            edges.push((player, OverlapEdge::Hazard, outside));
        }
    }

    fn scan_pickups(&mut self, player: PlayerId, edges: &mut Vec<(PlayerId, OverlapEdge, bool)>) {
        let Some(body) = self.bodies.get(&player).copied() else {
            return;
        };

        let mut current = HashSet::new();
        for (&id, entity) in &self.entities {
            if !matches!(
                entity.class,
                EntityClass::Weapon(_) | EntityClass::BandagePack | EntityClass::AmmoBox { .. }
            ) {
                continue;
            }
            let Some(at) = self.entity_position(entity) else {
                continue;
            };
            if at.distance_squared(body.position) <= PICKUP_RADIUS * PICKUP_RADIUS {
                current.insert(id);
            }
        }

        let previous = self.touching.remove(&player).unwrap_or_default();
        for &id in current.difference(&previous) {
            edges.push((player, OverlapEdge::Entity(id), true));
        }
        for &id in previous.difference(&current) {
            edges.push((player, OverlapEdge::Entity(id), false));
        }
        self.touching.insert(player, current);
    }

    /// Live view of a pickup entity as a combat contact. None once the
    /// entity is gone or was never a pickup.
    pub fn pickup_contact(&self, id: EntityId) -> Option<Contact> {
        let entity = self.entities.get(&id)?;
        match entity.class {
            EntityClass::Weapon(slot) => Some(Contact::Weapon {
                entity: id,
                slot,
                held: entity.attached.is_some(),
            }),
            EntityClass::BandagePack => Some(Contact::BandagePack { entity: id }),
            EntityClass::AmmoBox { slot, rounds } => Some(Contact::AmmoBox {
                entity: id,
                slot,
                rounds,
            }),
            _ => None,
        }
    }

    pub fn drain_cues(&mut self) -> Vec<(PlayerId, AnimCue)> {
        std::mem::take(&mut self.cues)
    }

    pub fn hazard_radius(&self) -> f32 {
        self.hazard_radius
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Where an entity effectively sits: loose ones at their own transform,
    /// attached ones at their holder's socket.
    fn entity_position(&self, entity: &SceneEntity) -> Option<Vec3> {
        match entity.attached {
            Some((player, socket)) => self.socket_transform(player, socket).map(|t| t.position),
            None => Some(entity.at.position),
        }
    }
}

impl Stage for World {
    fn spawn(&mut self, class: EntityClass, at: Transform) -> Result<EntityId, SpawnError> {
        if !at.is_finite() {
            return Err(SpawnError::InvalidTransform);
        }
        if self.entities.len() >= self.capacity {
            return Err(SpawnError::CapacityExhausted);
        }

        let id = self.next_entity_id;
        self.next_entity_id += 1;
        self.entities.insert(
            id,
            SceneEntity {
                class,
                at,
                attached: None,
                ttl: matches!(class, EntityClass::Projectile(_)).then_some(PROJECTILE_TTL_SECS),
            },
        );
        Ok(id)
    }

    fn destroy(&mut self, entity: EntityId) {
        self.entities.remove(&entity);
    }

    fn attach(&mut self, entity: EntityId, player: PlayerId, socket: Socket) {
        if let Some(e) = self.entities.get_mut(&entity) {
            e.attached = Some((player, socket));
        }
    }

    fn play_animation(&mut self, player: PlayerId, cue: AnimCue) {
        self.cues.push((player, cue));
    }

    fn overlapping_players(&self, entity: EntityId) -> Vec<PlayerId> {
        let Some(e) = self.entities.get(&entity) else {
            return Vec::new();
        };
        let Some(at) = self.entity_position(e) else {
            return Vec::new();
        };

        self.bodies
            .iter()
            .filter(|(_, body)| {
                body.position.distance_squared(at) < STRUCTURE_CLEARANCE * STRUCTURE_CLEARANCE
            })
            .map(|(&player, _)| player)
            .collect()
    }

    fn body_transform(&self, player: PlayerId) -> Option<Transform> {
        self.bodies.get(&player).copied()
    }

    fn camera_transform(&self, player: PlayerId) -> Option<Transform> {
        let body = self.bodies.get(&player)?;
        Some(Transform {
            position: body.position + Vec3::Y * EYE_HEIGHT,
            ..*body
        })
    }

    fn socket_transform(&self, player: PlayerId, socket: Socket) -> Option<Transform> {
        let body = self.bodies.get(&player)?;
        let side = match socket {
            Socket::RightHand => 1.0,
            Socket::LeftHand => -1.0,
        };
        let (sin_yaw, cos_yaw) = body.yaw.to_radians().sin_cos();
        let right = Vec3::new(cos_yaw, 0.0, -sin_yaw);

        Some(Transform {
            position: body.position
                + Vec3::Y * HAND_HEIGHT
                + body.forward() * HAND_FORWARD
                + right * (side * HAND_LATERAL),
            ..*body
        })
    }

    fn hazard_damage_per_pulse(&self) -> f32 {
        self.hazard.damage_per_pulse
    }
}
