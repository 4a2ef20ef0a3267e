use super::Arena;
use crate::PlayerId;
use crate::combat::{CombatState, ItemKind, LockKind, Material, StructureKind};
use crate::event::{AnimCue, MatchEvent};
use crate::net::ActionRequest;
use crate::stage::{EntityClass, Socket, Stage, Transform};
use crate::timer::TimerEvent;

fn held_entity_class(item: ItemKind) -> EntityClass {
    match item.slot() {
        Some(slot) => EntityClass::Weapon(slot),
        None => EntityClass::BandagePack,
    }
}

fn held_socket(item: ItemKind) -> Socket {
    if item == ItemKind::Bandage {
        Socket::LeftHand
    } else {
        Socket::RightHand
    }
}

impl Arena {
    /// Validate-then-apply for one inbound request. Rejections are silent
    /// no-ops; the return value only reports whether the request took.
    pub fn handle(
        &mut self,
        stage: &mut dyn Stage,
        now_ms: u64,
        player: PlayerId,
        request: ActionRequest,
    ) -> bool {
        if !self.validate(player, &request) {
            log::trace!("player {player}: rejected {request:?}");
            return false;
        }
        self.apply(stage, now_ms, player, request);
        true
    }

    /// Pure admission check. Reads state, mutates nothing.
    pub fn validate(&self, player: PlayerId, request: &ActionRequest) -> bool {
        let Some(state) = self.players.get(&player) else {
            return false;
        };

        match *request {
            ActionRequest::SwitchWeapon { target } => Self::validate_switch(state, target),
            ActionRequest::Fire => self.validate_fire(state),
            ActionRequest::Reload => self.validate_reload(state),
            ActionRequest::UseBandage => Self::validate_use_bandage(state),
            ActionRequest::ToggleBuildMode { .. } => Self::validate_toggle_build(state),
            ActionRequest::CycleBuildMaterial => state.in_build_mode(),
            ActionRequest::PlaceStructure => self.validate_place(state),
            ActionRequest::ToggleAim { .. } => Self::validate_toggle_aim(state),
        }
    }

    /// Commits a request assumed valid. Callers outside tests should go
    /// through [`Arena::handle`].
    pub fn apply(
        &mut self,
        stage: &mut dyn Stage,
        now_ms: u64,
        player: PlayerId,
        request: ActionRequest,
    ) {
        match request {
            ActionRequest::SwitchWeapon { target } => self.apply_switch(stage, player, target),
            ActionRequest::Fire => self.apply_fire(stage, now_ms, player),
            ActionRequest::Reload => self.apply_reload(stage, now_ms, player),
            ActionRequest::UseBandage => self.apply_use_bandage(stage, now_ms, player),
            ActionRequest::ToggleBuildMode { kind } => self.apply_toggle_build(stage, player, kind),
            ActionRequest::CycleBuildMaterial => self.apply_cycle_material(player),
            ActionRequest::PlaceStructure => self.apply_place(stage, player),
            ActionRequest::ToggleAim { aimed } => self.apply_toggle_aim(player, aimed),
        }
    }

    /// Server-side grant, used to seed starting materials on admission.
    pub fn grant_materials(&mut self, player: PlayerId, material: Material, amount: u32) {
        if let Some(state) = self.players.get_mut(&player) {
            state.inventory.add_material(material, amount);
            state.mark_dirty();
        }
    }

    fn validate_switch(state: &CombatState, target: ItemKind) -> bool {
        // Re-selecting the current item is only meaningful as a build-mode
        // exit.
        if state.selected == target && !state.in_build_mode() {
            return false;
        }
        if state.aimed_in || !state.gate.is_free() {
            return false;
        }
        match target.slot() {
            Some(slot) if slot.is_firearm() => state.inventory.owns(slot),
            _ => true,
        }
    }

    fn validate_fire(&self, state: &CombatState) -> bool {
        if state.in_build_mode() {
            return false;
        }
        let Some(slot) = state.selected.slot() else {
            return false;
        };
        if !state.gate.is_free() {
            return false;
        }
        if slot.is_firearm() && state.inventory.clip(slot) == 0 {
            // Dry fire turns into a reload attempt.
            return self.validate_reload(state);
        }
        true
    }

    fn validate_reload(&self, state: &CombatState) -> bool {
        if state.in_build_mode() || !state.gate.is_free() {
            return false;
        }
        let Some(slot) = state.selected.slot() else {
            return false;
        };
        if !slot.is_firearm() {
            return false;
        }
        state.inventory.reserve(slot) > 0
            && state.inventory.clip(slot) < self.tuning.magazine_size(slot)
    }

    fn validate_use_bandage(state: &CombatState) -> bool {
        !state.in_build_mode()
            && state.selected == ItemKind::Bandage
            && state.gate.is_free()
            && state.inventory.bandages() > 0
    }

    fn validate_toggle_build(state: &CombatState) -> bool {
        if state.gate.held().is_some_and(LockKind::blocks_build_entry) {
            return false;
        }
        !state.aimed_in
    }

    fn validate_place(&self, state: &CombatState) -> bool {
        state.in_build_mode()
            && state.inventory.material(state.build.material) >= self.tuning.structure_cost
    }

    fn validate_toggle_aim(state: &CombatState) -> bool {
        !state.in_build_mode() && state.selected.is_firearm()
    }

    /// Spawns the entity for `target`, then swaps it into the hand. Spawn
    /// failure aborts before any state changes. Also serves as the
    /// build-mode exit path, so it clears the preview and mode.
    fn equip(&mut self, stage: &mut dyn Stage, player: PlayerId, target: ItemKind) -> bool {
        let at = stage.body_transform(player).unwrap_or(Transform::IDENTITY);
        let entity = match stage.spawn(held_entity_class(target), at) {
            Ok(entity) => entity,
            Err(err) => {
                log::warn!("player {player}: equip spawn failed: {err}");
                return false;
            }
        };

        let Some(state) = self.players.get_mut(&player) else {
            stage.destroy(entity);
            return false;
        };
        if let Some(preview) = state.preview.take() {
            stage.destroy(preview);
        }
        state.build.mode = None;
        if let Some(held) = state.held_weapon.take() {
            stage.destroy(held);
        }
        if let Some(held) = state.held_healing.take() {
            stage.destroy(held);
        }

        stage.attach(entity, player, held_socket(target));
        if target == ItemKind::Bandage {
            state.held_healing = Some(entity);
        } else {
            state.held_weapon = Some(entity);
        }
        state.selected = target;
        state.aimed_in = false;
        state.mark_dirty();
        true
    }

    fn apply_switch(&mut self, stage: &mut dyn Stage, player: PlayerId, target: ItemKind) {
        if self.equip(stage, player, target) {
            log::debug!("player {player} switched to {target:?}");
        }
    }

    fn apply_fire(&mut self, stage: &mut dyn Stage, now_ms: u64, player: PlayerId) {
        let Some(state) = self.players.get(&player) else {
            return;
        };
        let Some(slot) = state.selected.slot() else {
            return;
        };

        if slot.is_firearm() {
            if state.inventory.clip(slot) == 0 {
                self.apply_reload(stage, now_ms, player);
                return;
            }

            // Muzzle at the hand socket, direction from the interpolated aim
            // so fast turns trail the camera.
            let Some(muzzle) = stage.socket_transform(player, Socket::RightHand) else {
                return;
            };
            let aim = state.aim;
            let at = Transform {
                position: muzzle.position,
                yaw: aim.yaw,
                pitch: aim.pitch,
            };
            if let Err(err) = stage.spawn(EntityClass::Projectile(slot), at) {
                log::warn!("player {player}: projectile spawn failed: {err}");
                return;
            }
        }

        let Some(state) = self.players.get_mut(&player) else {
            return;
        };
        if slot.is_firearm() && !state.inventory.consume_round(slot) {
            return;
        }

        let kind = LockKind::fire_for(slot);
        let Some(token) = state.gate.acquire(kind) else {
            return;
        };
        let cue = AnimCue::fire(slot, state.aimed_in);
        state.mark_dirty();

        self.timers.schedule_after(
            now_ms,
            self.tuning.lock_duration(kind),
            TimerEvent::LockRelease { player, token },
        );
        stage.play_animation(player, cue);
        log::debug!("player {player} fired {slot:?}");
    }

    fn apply_reload(&mut self, stage: &mut dyn Stage, now_ms: u64, player: PlayerId) {
        let Some(state) = self.players.get_mut(&player) else {
            return;
        };
        let Some(slot) = state.selected.slot() else {
            return;
        };

        let moved = state.inventory.refill_clip(slot, &self.tuning);
        if moved == 0 {
            return;
        }
        let Some(kind) = LockKind::reload_for(slot) else {
            return;
        };
        let Some(token) = state.gate.acquire(kind) else {
            return;
        };
        let aimed = state.aimed_in;
        state.mark_dirty();

        self.timers.schedule_after(
            now_ms,
            self.tuning.lock_duration(kind),
            TimerEvent::LockRelease { player, token },
        );
        if let Some(cue) = AnimCue::reload(slot, aimed) {
            stage.play_animation(player, cue);
        }
        log::debug!("player {player} reloaded {slot:?} (+{moved})");
    }

    fn apply_use_bandage(&mut self, stage: &mut dyn Stage, now_ms: u64, player: PlayerId) {
        let Some(state) = self.players.get_mut(&player) else {
            return;
        };
        if !state.inventory.use_bandage() {
            return;
        }
        let Some(token) = state.gate.acquire(LockKind::Heal) else {
            return;
        };
        state.mark_dirty();

        // Health lands when the release fires, not here.
        self.timers.schedule_after(
            now_ms,
            self.tuning.lock_duration(LockKind::Heal),
            TimerEvent::LockRelease { player, token },
        );
        stage.play_animation(player, AnimCue::BandageUse);
        log::debug!("player {player} started bandaging");
    }

    fn apply_toggle_build(&mut self, stage: &mut dyn Stage, player: PlayerId, kind: StructureKind) {
        let Some(state) = self.players.get_mut(&player) else {
            return;
        };
        let mode = state.build.mode;
        let selected = state.selected;

        match mode {
            Some(current) if current == kind => {
                // Same key again leaves build mode; failure to re-equip
                // keeps the player in it.
                if self.equip(stage, player, selected) {
                    log::debug!("player {player} left build mode");
                }
            }
            Some(_) => {
                state.build.mode = Some(kind);
                state.mark_dirty();
            }
            None => {
                if let Some(held) = state.held_weapon.take() {
                    stage.destroy(held);
                }
                if let Some(held) = state.held_healing.take() {
                    stage.destroy(held);
                }
                state.aimed_in = false;
                state.build.mode = Some(kind);
                state.mark_dirty();
                log::debug!("player {player} entered build mode: {kind:?}");
            }
        }
    }

    fn apply_cycle_material(&mut self, player: PlayerId) {
        if let Some(state) = self.players.get_mut(&player) {
            state.build.cycle_material();
            state.mark_dirty();
        }
    }

    fn apply_place(&mut self, stage: &mut dyn Stage, player: PlayerId) {
        let Some(state) = self.players.get(&player) else {
            return;
        };
        let Some(kind) = state.build.mode else {
            return;
        };
        let material = state.build.material;

        let (Some(body), Some(camera)) = (
            stage.body_transform(player),
            stage.camera_transform(player),
        ) else {
            return;
        };
        let at = crate::build::placement_transform(kind, body, camera.aim_direction(), &self.tuning);

        let entity = match stage.spawn(EntityClass::Structure { kind, material }, at) {
            Ok(entity) => entity,
            Err(err) => {
                log::warn!("player {player}: structure spawn failed: {err}");
                return;
            }
        };

        // Overlap with any body voids the placement and refunds nothing
        // because nothing was charged yet.
        if !stage.overlapping_players(entity).is_empty() {
            stage.destroy(entity);
            log::debug!("player {player}: placement blocked");
            return;
        }

        let Some(state) = self.players.get_mut(&player) else {
            stage.destroy(entity);
            return;
        };
        if !state.inventory.spend_material(material, self.tuning.structure_cost) {
            stage.destroy(entity);
            return;
        }
        state.mark_dirty();

        self.outbox.push(MatchEvent::StructurePlaced {
            player,
            kind,
            material,
        });
        log::debug!("player {player} placed {kind:?} ({material:?})");
    }

    fn apply_toggle_aim(&mut self, player: PlayerId, aimed: bool) {
        if let Some(state) = self.players.get_mut(&player) {
            state.aimed_in = aimed;
            state.mark_dirty();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Contact;
    use crate::combat::Slot;
    use crate::stage::testing::ScriptedStage;

    fn arena_with_player(stage: &mut ScriptedStage) -> Arena {
        let mut arena = Arena::default();
        arena.admit(stage, 0, 1);
        arena
    }

    fn give_rifle(arena: &mut Arena, stage: &mut ScriptedStage) {
        let rifle = stage
            .spawn(EntityClass::Weapon(Slot::Rifle), Transform::IDENTITY)
            .unwrap();
        arena.handle_overlap(
            stage,
            1,
            Contact::Weapon {
                entity: rifle,
                slot: Slot::Rifle,
                held: false,
            },
            true,
        );
        assert_eq!(arena.player(1).unwrap().selected, ItemKind::Rifle);
    }

    #[test]
    fn switch_to_unowned_firearm_is_rejected() {
        let mut stage = ScriptedStage::new();
        let mut arena = arena_with_player(&mut stage);

        assert!(!arena.handle(
            &mut stage,
            0,
            1,
            ActionRequest::SwitchWeapon {
                target: ItemKind::Rifle,
            },
        ));
        assert_eq!(arena.player(1).unwrap().selected, ItemKind::Pickaxe);
    }

    #[test]
    fn switch_swaps_the_held_entity() {
        let mut stage = ScriptedStage::new();
        let mut arena = arena_with_player(&mut stage);
        let pickaxe = arena.player(1).unwrap().held_weapon.unwrap();

        assert!(arena.handle(
            &mut stage,
            0,
            1,
            ActionRequest::SwitchWeapon {
                target: ItemKind::Bandage,
            },
        ));

        let state = arena.player(1).unwrap();
        assert_eq!(state.selected, ItemKind::Bandage);
        assert!(state.held_weapon.is_none());
        let pack = state.held_healing.unwrap();
        assert_eq!(stage.attachments[&pack], (1, Socket::LeftHand));
        assert!(stage.class_of(pickaxe).is_none());
    }

    #[test]
    fn switch_is_rejected_mid_lock_and_while_aimed() {
        let mut stage = ScriptedStage::new();
        let mut arena = arena_with_player(&mut stage);
        give_rifle(&mut arena, &mut stage);

        assert!(arena.handle(&mut stage, 0, 1, ActionRequest::Fire));
        assert!(!arena.handle(
            &mut stage,
            0,
            1,
            ActionRequest::SwitchWeapon {
                target: ItemKind::Pickaxe,
            },
        ));

        arena.tick(&mut stage, 1_000, 1.0 / 60.0);
        assert!(arena.handle(&mut stage, 1_000, 1, ActionRequest::ToggleAim { aimed: true }));
        assert!(!arena.handle(
            &mut stage,
            1_000,
            1,
            ActionRequest::SwitchWeapon {
                target: ItemKind::Pickaxe,
            },
        ));
        assert_eq!(arena.player(1).unwrap().selected, ItemKind::Rifle);
    }

    #[test]
    fn fire_spends_a_round_and_locks() {
        let mut stage = ScriptedStage::new();
        let mut arena = arena_with_player(&mut stage);
        give_rifle(&mut arena, &mut stage);

        assert!(arena.handle(&mut stage, 0, 1, ActionRequest::Fire));

        let state = arena.player(1).unwrap();
        assert_eq!(state.inventory.clip(Slot::Rifle), 29);
        assert_eq!(state.gate.held(), Some(LockKind::FireRifle));
        assert_eq!(
            stage.count_matching(|c| matches!(c, EntityClass::Projectile(Slot::Rifle))),
            1
        );
        assert!(stage.cues.contains(&(1, AnimCue::RifleHipFire)));

        // Locked out until the release.
        assert!(!arena.handle(&mut stage, 10, 1, ActionRequest::Fire));
        arena.tick(&mut stage, 300, 1.0 / 60.0);
        assert!(arena.handle(&mut stage, 300, 1, ActionRequest::Fire));
    }

    #[test]
    fn pickaxe_swing_spawns_no_projectile() {
        let mut stage = ScriptedStage::new();
        let mut arena = arena_with_player(&mut stage);

        assert!(arena.handle(&mut stage, 0, 1, ActionRequest::Fire));

        let state = arena.player(1).unwrap();
        assert_eq!(state.gate.held(), Some(LockKind::SwingPickaxe));
        assert_eq!(
            stage.count_matching(|c| matches!(c, EntityClass::Projectile(_))),
            0
        );
        assert!(stage.cues.contains(&(1, AnimCue::PickaxeSwing)));
    }

    #[test]
    fn dry_fire_turns_into_a_reload() {
        let mut stage = ScriptedStage::new();
        let mut arena = arena_with_player(&mut stage);
        give_rifle(&mut arena, &mut stage);

        {
            let state = arena.players.get_mut(&1).unwrap();
            while state.inventory.consume_round(Slot::Rifle) {}
            state.inventory.add_ammo(Slot::Rifle, 10);
        }

        assert!(arena.handle(&mut stage, 0, 1, ActionRequest::Fire));

        let state = arena.player(1).unwrap();
        assert_eq!(state.gate.held(), Some(LockKind::ReloadRifle));
        assert_eq!(state.inventory.clip(Slot::Rifle), 10);
        assert_eq!(state.inventory.reserve(Slot::Rifle), 0);
        assert_eq!(
            stage.count_matching(|c| matches!(c, EntityClass::Projectile(_))),
            0
        );
    }

    #[test]
    fn dry_fire_without_reserve_is_rejected() {
        let mut stage = ScriptedStage::new();
        let mut arena = arena_with_player(&mut stage);
        give_rifle(&mut arena, &mut stage);

        {
            let state = arena.players.get_mut(&1).unwrap();
            while state.inventory.consume_round(Slot::Rifle) {}
        }

        assert!(!arena.handle(&mut stage, 0, 1, ActionRequest::Fire));
        assert!(arena.player(1).unwrap().gate.is_free());
    }

    #[test]
    fn reload_tops_up_and_locks() {
        let mut stage = ScriptedStage::new();
        let mut arena = arena_with_player(&mut stage);
        give_rifle(&mut arena, &mut stage);

        // Full clip, nothing to do.
        assert!(!arena.handle(&mut stage, 0, 1, ActionRequest::Reload));

        arena.handle(&mut stage, 0, 1, ActionRequest::Fire);
        arena.tick(&mut stage, 500, 1.0 / 60.0);

        // No reserve yet.
        assert!(!arena.handle(&mut stage, 500, 1, ActionRequest::Reload));

        arena.players.get_mut(&1).unwrap().inventory.add_ammo(Slot::Rifle, 50);
        assert!(arena.handle(&mut stage, 500, 1, ActionRequest::Reload));

        let state = arena.player(1).unwrap();
        assert_eq!(state.inventory.clip(Slot::Rifle), 30);
        assert_eq!(state.inventory.reserve(Slot::Rifle), 49);
        assert_eq!(state.gate.held(), Some(LockKind::ReloadRifle));
        assert!(stage.cues.contains(&(1, AnimCue::RifleHipReload)));
    }

    #[test]
    fn heal_lands_at_release_not_at_use() {
        let mut stage = ScriptedStage::new();
        let mut arena = arena_with_player(&mut stage);
        arena.handle(
            &mut stage,
            0,
            1,
            ActionRequest::SwitchWeapon {
                target: ItemKind::Bandage,
            },
        );

        // Empty hand of bandages cannot heal.
        assert!(!arena.handle(&mut stage, 0, 1, ActionRequest::UseBandage));

        {
            let state = arena.players.get_mut(&1).unwrap();
            state.inventory.add_bandages(2);
            state.health = 50.0;
        }
        assert!(arena.handle(&mut stage, 0, 1, ActionRequest::UseBandage));

        let state = arena.player(1).unwrap();
        assert_eq!(state.inventory.bandages(), 1);
        assert_eq!(state.health, 50.0);
        assert_eq!(state.gate.held(), Some(LockKind::Heal));

        arena.tick(&mut stage, 3_400, 1.0 / 60.0);
        let state = arena.player(1).unwrap();
        assert_eq!(state.health, 65.0);
        assert!(state.gate.is_free());
    }

    #[test]
    fn heal_clamps_to_max_health() {
        let mut stage = ScriptedStage::new();
        let mut arena = arena_with_player(&mut stage);
        arena.handle(
            &mut stage,
            0,
            1,
            ActionRequest::SwitchWeapon {
                target: ItemKind::Bandage,
            },
        );
        {
            let state = arena.players.get_mut(&1).unwrap();
            state.inventory.add_bandages(1);
            state.health = 95.0;
        }

        arena.handle(&mut stage, 0, 1, ActionRequest::UseBandage);
        arena.tick(&mut stage, 3_400, 1.0 / 60.0);
        assert_eq!(arena.player(1).unwrap().health, 100.0);
    }

    #[test]
    fn build_toggle_enters_switches_and_exits() {
        let mut stage = ScriptedStage::new();
        let mut arena = arena_with_player(&mut stage);
        let pickaxe = arena.player(1).unwrap().held_weapon.unwrap();

        assert!(arena.handle(
            &mut stage,
            0,
            1,
            ActionRequest::ToggleBuildMode {
                kind: StructureKind::Wall,
            },
        ));
        let state = arena.player(1).unwrap();
        assert_eq!(state.build.mode, Some(StructureKind::Wall));
        assert!(state.held_weapon.is_none());
        assert!(stage.class_of(pickaxe).is_none());

        // Different kind switches in place.
        assert!(arena.handle(
            &mut stage,
            0,
            1,
            ActionRequest::ToggleBuildMode {
                kind: StructureKind::Ramp,
            },
        ));
        assert_eq!(arena.player(1).unwrap().build.mode, Some(StructureKind::Ramp));

        // Same kind exits and re-equips the selected item.
        assert!(arena.handle(
            &mut stage,
            0,
            1,
            ActionRequest::ToggleBuildMode {
                kind: StructureKind::Ramp,
            },
        ));
        let state = arena.player(1).unwrap();
        assert_eq!(state.build.mode, None);
        assert_eq!(state.selected, ItemKind::Pickaxe);
        assert!(state.held_weapon.is_some());
    }

    #[test]
    fn build_entry_blocked_while_healing_but_not_mid_swing() {
        let mut stage = ScriptedStage::new();
        let mut arena = arena_with_player(&mut stage);
        arena.handle(
            &mut stage,
            0,
            1,
            ActionRequest::SwitchWeapon {
                target: ItemKind::Bandage,
            },
        );
        arena.players.get_mut(&1).unwrap().inventory.add_bandages(1);
        arena.handle(&mut stage, 0, 1, ActionRequest::UseBandage);

        assert!(!arena.handle(
            &mut stage,
            0,
            1,
            ActionRequest::ToggleBuildMode {
                kind: StructureKind::Wall,
            },
        ));

        arena.tick(&mut stage, 3_400, 1.0 / 60.0);
        arena.handle(
            &mut stage,
            3_400,
            1,
            ActionRequest::SwitchWeapon {
                target: ItemKind::Pickaxe,
            },
        );
        arena.handle(&mut stage, 3_400, 1, ActionRequest::Fire);
        assert!(arena.handle(
            &mut stage,
            3_400,
            1,
            ActionRequest::ToggleBuildMode {
                kind: StructureKind::Wall,
            },
        ));
    }

    #[test]
    fn preview_is_recut_each_tick_and_cleared_on_exit() {
        let mut stage = ScriptedStage::new();
        let mut arena = arena_with_player(&mut stage);
        arena.handle(
            &mut stage,
            0,
            1,
            ActionRequest::ToggleBuildMode {
                kind: StructureKind::Floor,
            },
        );

        arena.tick(&mut stage, 16, 1.0 / 60.0);
        let first = arena.player(1).unwrap().preview.unwrap();
        assert!(matches!(
            stage.class_of(first),
            Some(EntityClass::Preview {
                kind: StructureKind::Floor,
                ..
            })
        ));

        arena.tick(&mut stage, 33, 1.0 / 60.0);
        let second = arena.player(1).unwrap().preview.unwrap();
        assert_ne!(first, second);
        assert!(stage.class_of(first).is_none());

        arena.handle(
            &mut stage,
            50,
            1,
            ActionRequest::ToggleBuildMode {
                kind: StructureKind::Floor,
            },
        );
        assert!(arena.player(1).unwrap().preview.is_none());
        assert!(stage.class_of(second).is_none());
    }

    #[test]
    fn place_spends_exactly_the_cost() {
        let mut stage = ScriptedStage::new();
        let mut arena = arena_with_player(&mut stage);
        arena.grant_materials(1, Material::Wood, 10);
        arena.handle(
            &mut stage,
            0,
            1,
            ActionRequest::ToggleBuildMode {
                kind: StructureKind::Wall,
            },
        );

        assert!(arena.handle(&mut stage, 0, 1, ActionRequest::PlaceStructure));

        let state = arena.player(1).unwrap();
        assert_eq!(state.inventory.material(Material::Wood), 0);
        assert_eq!(
            stage.count_matching(|c| matches!(
                c,
                EntityClass::Structure {
                    kind: StructureKind::Wall,
                    material: Material::Wood,
                }
            )),
            1
        );
        assert!(matches!(
            arena.drain_events().as_slice(),
            [.., MatchEvent::StructurePlaced { player: 1, .. }]
        ));

        // Broke now.
        assert!(!arena.handle(&mut stage, 0, 1, ActionRequest::PlaceStructure));
    }

    #[test]
    fn blocked_placement_charges_nothing() {
        let mut stage = ScriptedStage::new();
        let mut arena = arena_with_player(&mut stage);
        arena.grant_materials(1, Material::Wood, 10);
        arena.handle(
            &mut stage,
            0,
            1,
            ActionRequest::ToggleBuildMode {
                kind: StructureKind::Wall,
            },
        );

        stage.structure_overlaps = vec![2];
        assert!(arena.handle(&mut stage, 0, 1, ActionRequest::PlaceStructure));

        let state = arena.player(1).unwrap();
        assert_eq!(state.inventory.material(Material::Wood), 10);
        assert_eq!(
            stage.count_matching(|c| matches!(c, EntityClass::Structure { .. })),
            0
        );
    }

    #[test]
    fn material_cycle_requires_build_mode() {
        let mut stage = ScriptedStage::new();
        let mut arena = arena_with_player(&mut stage);

        assert!(!arena.handle(&mut stage, 0, 1, ActionRequest::CycleBuildMaterial));

        arena.handle(
            &mut stage,
            0,
            1,
            ActionRequest::ToggleBuildMode {
                kind: StructureKind::Ramp,
            },
        );
        assert!(arena.handle(&mut stage, 0, 1, ActionRequest::CycleBuildMaterial));
        assert_eq!(arena.player(1).unwrap().build.material, Material::Stone);
    }

    #[test]
    fn aim_toggle_needs_a_firearm_in_hand() {
        let mut stage = ScriptedStage::new();
        let mut arena = arena_with_player(&mut stage);

        assert!(!arena.handle(&mut stage, 0, 1, ActionRequest::ToggleAim { aimed: true }));

        give_rifle(&mut arena, &mut stage);
        assert!(arena.handle(&mut stage, 0, 1, ActionRequest::ToggleAim { aimed: true }));
        assert!(arena.player(1).unwrap().aimed_in);

        // Entering build mode is impossible while aimed; dropping aim first.
        assert!(!arena.handle(
            &mut stage,
            0,
            1,
            ActionRequest::ToggleBuildMode {
                kind: StructureKind::Wall,
            },
        ));
        assert!(arena.handle(&mut stage, 0, 1, ActionRequest::ToggleAim { aimed: false }));
        assert!(arena.handle(
            &mut stage,
            0,
            1,
            ActionRequest::ToggleBuildMode {
                kind: StructureKind::Wall,
            },
        ));
    }

    #[test]
    fn failed_equip_spawn_changes_nothing() {
        let mut stage = ScriptedStage::new();
        let mut arena = arena_with_player(&mut stage);
        let pickaxe = arena.player(1).unwrap().held_weapon.unwrap();

        stage.spawn_budget = Some(0);
        assert!(arena.handle(
            &mut stage,
            0,
            1,
            ActionRequest::SwitchWeapon {
                target: ItemKind::Bandage,
            },
        ));

        let state = arena.player(1).unwrap();
        assert_eq!(state.selected, ItemKind::Pickaxe);
        assert_eq!(state.held_weapon, Some(pickaxe));
        assert!(stage.class_of(pickaxe).is_some());
    }

    #[test]
    fn failed_projectile_spawn_keeps_the_round() {
        let mut stage = ScriptedStage::new();
        let mut arena = arena_with_player(&mut stage);
        give_rifle(&mut arena, &mut stage);

        stage.spawn_budget = Some(0);
        assert!(arena.handle(&mut stage, 0, 1, ActionRequest::Fire));

        let state = arena.player(1).unwrap();
        assert_eq!(state.inventory.clip(Slot::Rifle), 30);
        assert!(state.gate.is_free());
    }
}
