use super::Arena;
use crate::combat::{ItemKind, Slot};
use crate::event::MatchEvent;
use crate::stage::{Socket, Stage};
use crate::{EntityId, PlayerId};

/// What a player's body just started (or stopped) touching, as classified
/// by the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Contact {
    Weapon {
        entity: EntityId,
        slot: Slot,
        /// True when the actor is in someone's hand rather than loose.
        held: bool,
    },
    BandagePack {
        entity: EntityId,
    },
    AmmoBox {
        entity: EntityId,
        slot: Slot,
        rounds: u16,
    },
    Hazard,
}

impl Arena {
    /// Overlap edge from the scene. Pickups act on begin edges only; the
    /// hazard follows both edges.
    pub fn handle_overlap(
        &mut self,
        stage: &mut dyn Stage,
        player: PlayerId,
        contact: Contact,
        began: bool,
    ) {
        match contact {
            Contact::Hazard => self.set_in_hazard(player, began),
            _ if !began => {}
            Contact::Weapon { entity, slot, held } => {
                self.claim_weapon(stage, player, entity, slot, held);
            }
            Contact::BandagePack { entity } => self.claim_bandages(stage, player, entity),
            Contact::AmmoBox {
                entity,
                slot,
                rounds,
            } => self.claim_ammo(stage, player, entity, slot, rounds),
        }
    }

    fn set_in_hazard(&mut self, player: PlayerId, inside: bool) {
        let Some(state) = self.players.get_mut(&player) else {
            return;
        };
        if state.in_hazard != inside {
            state.in_hazard = inside;
            state.mark_dirty();
            log::debug!(
                "player {player} {} the hazard",
                if inside { "entered" } else { "escaped" }
            );
        }
    }

    fn claim_weapon(
        &mut self,
        stage: &mut dyn Stage,
        player: PlayerId,
        entity: EntityId,
        slot: Slot,
        held: bool,
    ) {
        // Loose rifles and shotguns only; the starter pickaxe never drops.
        if held || slot == Slot::Pickaxe {
            return;
        }
        let Some(state) = self.players.get_mut(&player) else {
            return;
        };
        if state.in_build_mode() || !state.gate.is_free() {
            return;
        }
        if !state.inventory.register_weapon(slot, &self.tuning) {
            // Slot already owned; the actor stays for someone else.
            return;
        }

        if let Some(old) = state.held_weapon.take() {
            stage.destroy(old);
        }
        if let Some(old) = state.held_healing.take() {
            stage.destroy(old);
        }
        stage.attach(entity, player, Socket::RightHand);
        state.held_weapon = Some(entity);
        state.selected = slot.into();
        state.aimed_in = false;
        state.mark_dirty();

        self.outbox.push(MatchEvent::WeaponPickedUp { player, slot });
        log::debug!("player {player} picked up {slot:?}");
    }

    fn claim_bandages(&mut self, stage: &mut dyn Stage, player: PlayerId, entity: EntityId) {
        let Some(state) = self.players.get_mut(&player) else {
            return;
        };
        if state.in_build_mode() || !state.gate.is_free() {
            return;
        }

        let count = self.tuning.bandages_per_pack;
        state.inventory.add_bandages(count);
        if let Some(old) = state.held_weapon.take() {
            stage.destroy(old);
        }
        if let Some(old) = state.held_healing.take() {
            stage.destroy(old);
        }
        stage.attach(entity, player, Socket::LeftHand);
        state.held_healing = Some(entity);
        state.selected = ItemKind::Bandage;
        state.aimed_in = false;
        state.mark_dirty();

        self.outbox.push(MatchEvent::BandagesPickedUp { player, count });
        log::debug!("player {player} picked up bandages");
    }

    fn claim_ammo(
        &mut self,
        stage: &mut dyn Stage,
        player: PlayerId,
        entity: EntityId,
        slot: Slot,
        rounds: u16,
    ) {
        let Some(state) = self.players.get_mut(&player) else {
            return;
        };
        state.inventory.add_ammo(slot, rounds);
        stage.destroy(entity);
        state.mark_dirty();

        self.outbox.push(MatchEvent::AmmoPickedUp {
            player,
            slot,
            rounds,
        });
        log::debug!("player {player} picked up {rounds} rounds for {slot:?}");
    }
}
