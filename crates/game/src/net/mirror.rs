use std::collections::HashMap;

use super::protocol::{CombatSnapshot, StateUpdate, sequence_greater_than};
use crate::PlayerId;

#[derive(Debug, Clone)]
struct MirrorEntry {
    tick: u32,
    snapshot: CombatSnapshot,
}

/// Read-only copy of the replicated player set, as an observer sees it.
/// The server is the sole writer; this just folds in `StateUpdate`s,
/// keeping the newest record per player and dropping stale ticks.
#[derive(Debug, Default)]
pub struct ObserverMirror {
    players: HashMap<PlayerId, MirrorEntry>,
}

impl ObserverMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one update in. Returns how many player records changed.
    pub fn apply(&mut self, update: &StateUpdate) -> usize {
        if update.full {
            // A full cut names every live player; anyone else is gone.
            self.players
                .retain(|id, _| update.states.iter().any(|s| s.player == *id));
        }
        for player in &update.removed {
            self.players.remove(player);
        }

        let mut applied = 0;
        for snapshot in &update.states {
            if let Some(entry) = self.players.get(&snapshot.player) {
                if sequence_greater_than(entry.tick, update.tick) {
                    continue;
                }
            }
            self.players.insert(
                snapshot.player,
                MirrorEntry {
                    tick: update.tick,
                    snapshot: snapshot.clone(),
                },
            );
            applied += 1;
        }
        applied
    }

    pub fn player(&self, player: PlayerId) -> Option<&CombatSnapshot> {
        self.players.get(&player).map(|e| &e.snapshot)
    }

    pub fn players(&self) -> impl Iterator<Item = &CombatSnapshot> {
        self.players.values().map(|e| &e.snapshot)
    }

    pub fn tick_of(&self, player: PlayerId) -> Option<u32> {
        self.players.get(&player).map(|e| e.tick)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn clear(&mut self) {
        self.players.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(tick: u32, states: Vec<CombatSnapshot>) -> StateUpdate {
        StateUpdate {
            tick,
            server_time_ms: u64::from(tick) * 16,
            full: false,
            states,
            removed: Vec::new(),
        }
    }

    #[test]
    fn stale_ticks_are_dropped() {
        let mut mirror = ObserverMirror::new();

        let mut newer = CombatSnapshot::new(1);
        newer.health = 80.0;
        mirror.apply(&update(10, vec![newer]));

        let mut older = CombatSnapshot::new(1);
        older.health = 100.0;
        assert_eq!(mirror.apply(&update(9, vec![older])), 0);

        assert_eq!(mirror.player(1).unwrap().health, 80.0);
        assert_eq!(mirror.tick_of(1), Some(10));
    }

    #[test]
    fn same_tick_resend_overwrites() {
        let mut mirror = ObserverMirror::new();

        let mut first = CombatSnapshot::new(1);
        first.health = 50.0;
        mirror.apply(&update(5, vec![first]));

        let mut resend = CombatSnapshot::new(1);
        resend.health = 45.0;
        assert_eq!(mirror.apply(&update(5, vec![resend])), 1);
        assert_eq!(mirror.player(1).unwrap().health, 45.0);
    }

    #[test]
    fn removed_players_leave_the_mirror() {
        let mut mirror = ObserverMirror::new();
        mirror.apply(&update(1, vec![CombatSnapshot::new(1), CombatSnapshot::new(2)]));
        assert_eq!(mirror.len(), 2);

        let mut removal = update(2, Vec::new());
        removal.removed = vec![1];
        mirror.apply(&removal);

        assert!(mirror.player(1).is_none());
        assert!(mirror.player(2).is_some());
    }

    #[test]
    fn full_update_replaces_the_set() {
        let mut mirror = ObserverMirror::new();
        mirror.apply(&update(1, vec![CombatSnapshot::new(1), CombatSnapshot::new(2)]));

        let mut full = update(2, vec![CombatSnapshot::new(2), CombatSnapshot::new(3)]);
        full.full = true;
        mirror.apply(&full);

        assert!(mirror.player(1).is_none());
        assert!(mirror.player(2).is_some());
        assert!(mirror.player(3).is_some());
        assert_eq!(mirror.len(), 2);
    }

    #[test]
    fn tick_wrap_still_counts_as_newer() {
        let mut mirror = ObserverMirror::new();
        mirror.apply(&update(u32::MAX, vec![CombatSnapshot::new(1)]));

        let mut wrapped = CombatSnapshot::new(1);
        wrapped.health = 10.0;
        assert_eq!(mirror.apply(&update(0, vec![wrapped])), 1);
        assert_eq!(mirror.player(1).unwrap().health, 10.0);
    }
}
