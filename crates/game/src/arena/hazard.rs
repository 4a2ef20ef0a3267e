use super::Arena;
use crate::PlayerId;
use crate::event::MatchEvent;
use crate::stage::Stage;
use crate::timer::TimerEvent;

impl Arena {
    /// One hazard pulse for one player. Reschedules itself while the player
    /// is alive; a pulse that finds no player ends the chain.
    pub(super) fn hazard_pulse(&mut self, stage: &mut dyn Stage, now_ms: u64, player: PlayerId) {
        let eliminated = {
            let Some(state) = self.players.get_mut(&player) else {
                return;
            };
            if state.in_hazard {
                let damage = stage.hazard_damage_per_pulse();
                state.health = (state.health - damage).max(0.0);
                state.mark_dirty();
                log::debug!(
                    "player {player} took {damage:.1} hazard damage, {:.0} left",
                    state.health
                );
                state.health <= 0.0
            } else {
                false
            }
        };

        if eliminated {
            self.eliminate(stage, player);
            return;
        }
        self.timers.schedule_after(
            now_ms,
            self.tuning.hazard_pulse_secs,
            TimerEvent::HazardPulse { player },
        );
    }

    /// Terminal removal, no respawn. The map removal doubles as the
    /// exactly-once guard for anything still queued against this player.
    fn eliminate(&mut self, stage: &mut dyn Stage, player: PlayerId) {
        let Some(state) = self.players.remove(&player) else {
            return;
        };
        super::destroy_held(stage, state);
        self.removed.push(player);
        self.outbox.push(MatchEvent::PlayerEliminated { player });
        log::info!("player {player} eliminated by the hazard");
    }
}
