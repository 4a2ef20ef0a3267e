mod actions;
mod hazard;
mod overlap;

pub use overlap::Contact;

use std::collections::HashMap;

use glam::Vec3;

use crate::combat::{CombatState, CombatTuning, LockKind, Slot};
use crate::event::MatchEvent;
use crate::net::CombatSnapshot;
use crate::stage::{EntityClass, Socket, Stage, Transform};
use crate::timer::{TimerEvent, TimerQueue};
use crate::PlayerId;

/// The authoritative-state service. Owns every player's combat record and
/// is the only writer; the scene, the wire, and observers all sit on the
/// other side of the `Stage` trait and the snapshot/event drains.
pub struct Arena {
    tuning: CombatTuning,
    players: HashMap<PlayerId, CombatState>,
    timers: TimerQueue,
    outbox: Vec<MatchEvent>,
    removed: Vec<PlayerId>,
}

impl Default for Arena {
    fn default() -> Self {
        Self::new(CombatTuning::default())
    }
}

impl Arena {
    pub fn new(tuning: CombatTuning) -> Self {
        Self {
            tuning,
            players: HashMap::new(),
            timers: TimerQueue::new(),
            outbox: Vec::new(),
            removed: Vec::new(),
        }
    }

    pub fn tuning(&self) -> &CombatTuning {
        &self.tuning
    }

    pub fn player(&self, player: PlayerId) -> Option<&CombatState> {
        self.players.get(&player)
    }

    pub fn players(&self) -> impl Iterator<Item = &CombatState> {
        self.players.values()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn contains(&self, player: PlayerId) -> bool {
        self.players.contains_key(&player)
    }

    /// Brings a player into the arena: full health, pickaxe granted and in
    /// hand, first hazard pulse scheduled. Admission survives a failed
    /// pickaxe spawn; the player just starts empty-handed.
    pub fn admit(&mut self, stage: &mut dyn Stage, now_ms: u64, player: PlayerId) -> bool {
        if self.players.contains_key(&player) {
            return false;
        }

        let mut state = CombatState::new(player, &self.tuning);
        state.inventory.register_weapon(Slot::Pickaxe, &self.tuning);

        let body = stage.body_transform(player).unwrap_or(Transform::IDENTITY);
        match stage.spawn(EntityClass::Weapon(Slot::Pickaxe), body) {
            Ok(entity) => {
                stage.attach(entity, player, Socket::RightHand);
                state.held_weapon = Some(entity);
            }
            Err(err) => log::warn!("player {player}: pickaxe spawn failed: {err}"),
        }

        self.players.insert(player, state);
        self.timers.schedule_after(
            now_ms,
            self.tuning.hazard_pulse_secs,
            TimerEvent::HazardPulse { player },
        );
        self.outbox.push(MatchEvent::PlayerJoined { player });
        log::info!("player {player} entered the arena");
        true
    }

    /// Voluntary exit (disconnect, timeout). Tears down held entities and
    /// emits PlayerLeft; pending timers for this player become no-ops.
    pub fn remove(&mut self, stage: &mut dyn Stage, player: PlayerId) -> bool {
        let Some(state) = self.players.remove(&player) else {
            return false;
        };

        destroy_held(stage, state);
        self.removed.push(player);
        self.outbox.push(MatchEvent::PlayerLeft { player });
        log::info!("player {player} left the arena");
        true
    }

    /// New aim target from the owner's pose. Non-finite input is dropped.
    pub fn set_view_target(&mut self, player: PlayerId, yaw: f32, pitch: f32) {
        if !yaw.is_finite() || !pitch.is_finite() {
            return;
        }
        if let Some(state) = self.players.get_mut(&player) {
            state.aim.set_target(yaw, pitch, self.tuning.max_aim_pitch);
        }
    }

    /// The scene moved this player's body; observers need a fresh snapshot
    /// even though no combat field changed.
    pub fn note_body_moved(&mut self, player: PlayerId) {
        if let Some(state) = self.players.get_mut(&player) {
            state.mark_dirty();
        }
    }

    /// One authoritative step: fire due timers, advance aim interpolation,
    /// re-cut build previews.
    pub fn tick(&mut self, stage: &mut dyn Stage, now_ms: u64, dt: f32) {
        while let Some(event) = self.timers.pop_due(now_ms) {
            self.dispatch_timer(stage, now_ms, event);
        }

        let interp_speed = self.tuning.aim_interp_speed;
        let max_pitch = self.tuning.max_aim_pitch;
        for state in self.players.values_mut() {
            if state.aim.advance(interp_speed, dt, max_pitch) {
                state.dirty = true;
            }
        }

        let builders: Vec<PlayerId> = self
            .players
            .values()
            .filter(|s| s.in_build_mode())
            .map(|s| s.id)
            .collect();
        for player in builders {
            self.refresh_preview(stage, player);
        }
    }

    fn dispatch_timer(&mut self, stage: &mut dyn Stage, now_ms: u64, event: TimerEvent) {
        match event {
            TimerEvent::LockRelease { player, token } => {
                // Existence guard first, token match second: a release for a
                // gone player or a superseded lock must do nothing.
                let Some(state) = self.players.get_mut(&player) else {
                    return;
                };
                let Some(kind) = state.gate.release(token) else {
                    return;
                };
                if kind == LockKind::Heal {
                    state.health =
                        (state.health + self.tuning.heal_amount).min(self.tuning.max_health);
                    log::debug!("player {player} healed to {:.0}", state.health);
                }
                state.mark_dirty();
            }
            TimerEvent::HazardPulse { player } => self.hazard_pulse(stage, now_ms, player),
        }
    }

    fn refresh_preview(&mut self, stage: &mut dyn Stage, player: PlayerId) {
        let Some(state) = self.players.get_mut(&player) else {
            return;
        };
        let Some(kind) = state.build.mode else {
            return;
        };
        let material = state.build.material;

        if let Some(old) = state.preview.take() {
            stage.destroy(old);
        }

        let (Some(body), Some(camera)) = (
            stage.body_transform(player),
            stage.camera_transform(player),
        ) else {
            return;
        };
        let at =
            crate::build::placement_transform(kind, body, camera.aim_direction(), &self.tuning);

        match stage.spawn(EntityClass::Preview { kind, material }, at) {
            Ok(entity) => state.preview = Some(entity),
            // Missed previews retry next tick.
            Err(err) => log::trace!("player {player}: preview spawn failed: {err}"),
        }
    }

    /// Snapshots for replication. With `only_dirty`, untouched players are
    /// skipped; either way the dirty bits of the cut players are cleared
    /// and the pending removal list is drained into the result.
    pub fn cut_snapshots(
        &mut self,
        stage: &dyn Stage,
        only_dirty: bool,
    ) -> (Vec<CombatSnapshot>, Vec<PlayerId>) {
        let mut states = Vec::new();
        for state in self.players.values_mut() {
            if only_dirty && !state.dirty {
                continue;
            }
            let position = stage
                .body_transform(state.id)
                .map_or(Vec3::ZERO, |t| t.position);
            states.push(state.snapshot(position));
            state.dirty = false;
        }

        (states, std::mem::take(&mut self.removed))
    }

    pub fn drain_events(&mut self) -> Vec<MatchEvent> {
        std::mem::take(&mut self.outbox)
    }

    pub fn pending_timer_count(&self) -> usize {
        self.timers.len()
    }
}

fn destroy_held(stage: &mut dyn Stage, mut state: CombatState) {
    for entity in [
        state.held_weapon.take(),
        state.held_healing.take(),
        state.preview.take(),
    ]
    .into_iter()
    .flatten()
    {
        stage.destroy(entity);
    }
}
