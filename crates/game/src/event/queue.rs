use std::collections::VecDeque;

use super::types::{MatchEvent, ReliabilityMode, StampedEvent};

#[derive(Debug, Clone)]
pub struct PendingEvent {
    pub tick: u32,
    pub timestamp_ms: u64,
    pub event: MatchEvent,
    pub sequence: u32,
    pub acked: bool,
}

impl PendingEvent {
    pub fn is_expired(&self, current_time_ms: u64) -> bool {
        match self.event.reliability() {
            ReliabilityMode::UnreliableExpiring { ttl_ms } => {
                current_time_ms.saturating_sub(self.timestamp_ms) > ttl_ms
            }
            ReliabilityMode::Unreliable => true,
            ReliabilityMode::Reliable => false,
        }
    }

    pub fn stamped(&self) -> StampedEvent {
        StampedEvent {
            sequence: self.sequence,
            event: self.event.clone(),
        }
    }
}

/// Outbound match-event buffer. Reliable events stay until acked;
/// expiring ones until their TTL; plain unreliables survive exactly one
/// send pass (cleanup treats them as already expired).
pub struct EventQueue {
    pending: VecDeque<PendingEvent>,
    next_sequence: u32,
    max_pending: usize,
}

impl EventQueue {
    pub fn new(max_pending: usize) -> Self {
        Self {
            pending: VecDeque::with_capacity(max_pending),
            // Sequence 0 is the nothing-acked sentinel on fresh connections,
            // so the first real event starts at 1.
            next_sequence: 1,
            max_pending,
        }
    }

    pub fn push(&mut self, tick: u32, timestamp_ms: u64, event: MatchEvent) -> u32 {
        let sequence = self.next_sequence;
        self.next_sequence = self.next_sequence.wrapping_add(1);

        if self.pending.len() >= self.max_pending {
            self.evict_oldest_unreliable();
        }

        self.pending.push_back(PendingEvent {
            tick,
            timestamp_ms,
            event,
            sequence,
            acked: false,
        });

        sequence
    }

    pub fn ack_up_to(&mut self, sequence: u32) {
        for event in &mut self.pending {
            if sequence_lte(event.sequence, sequence) {
                event.acked = true;
            }
        }
    }

    pub fn cleanup(&mut self, current_time_ms: u64) {
        self.pending.retain(|e| {
            if e.acked {
                return false;
            }
            !e.is_expired(current_time_ms)
        });
    }

    pub fn pending_for_send(&self) -> impl Iterator<Item = &PendingEvent> {
        self.pending.iter().filter(|e| !e.acked)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    fn evict_oldest_unreliable(&mut self) {
        if let Some(idx) = self
            .pending
            .iter()
            .position(|e| !e.event.reliability().is_reliable())
        {
            self.pending.remove(idx);
        }
    }
}

fn sequence_lte(a: u32, b: u32) -> bool {
    let diff = b.wrapping_sub(a);
    diff < u32::MAX / 2
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat::Slot;
    use crate::event::AnimCue;

    #[test]
    fn expiring_event_outlives_its_ttl_only() {
        let event = PendingEvent {
            tick: 0,
            timestamp_ms: 1000,
            event: MatchEvent::WeaponPickedUp {
                player: 1,
                slot: Slot::Rifle,
            },
            sequence: 0,
            acked: false,
        };

        assert!(!event.is_expired(5000));
        assert!(event.is_expired(15000));
    }

    #[test]
    fn reliable_never_expires() {
        let event = PendingEvent {
            tick: 0,
            timestamp_ms: 0,
            event: MatchEvent::PlayerEliminated { player: 1 },
            sequence: 0,
            acked: false,
        };

        assert!(!event.is_expired(1_000_000));
    }

    #[test]
    fn sequences_start_past_the_ack_sentinel() {
        let mut queue = EventQueue::new(64);
        let first = queue.push(0, 0, MatchEvent::PlayerJoined { player: 1 });
        assert_eq!(first, 1);

        // Acking the sentinel must not touch anything.
        queue.ack_up_to(0);
        queue.cleanup(0);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn ack_then_cleanup_drops_acked() {
        let mut queue = EventQueue::new(64);

        let first = queue.push(
            0,
            0,
            MatchEvent::WeaponPickedUp {
                player: 1,
                slot: Slot::Shotgun,
            },
        );
        queue.push(0, 0, MatchEvent::PlayerEliminated { player: 2 });
        assert_eq!(queue.len(), 2);

        queue.ack_up_to(first);
        queue.cleanup(0);

        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pending_for_send().count(), 1);
    }

    #[test]
    fn unreliable_survives_one_pass() {
        let mut queue = EventQueue::new(64);
        queue.push(
            0,
            0,
            MatchEvent::Animation {
                player: 1,
                cue: AnimCue::PickaxeSwing,
            },
        );

        assert_eq!(queue.pending_for_send().count(), 1);
        queue.cleanup(0);
        assert!(queue.is_empty());
    }

    #[test]
    fn full_queue_evicts_unreliable_before_reliable() {
        let mut queue = EventQueue::new(2);

        queue.push(0, 0, MatchEvent::PlayerEliminated { player: 1 });
        queue.push(
            0,
            0,
            MatchEvent::Animation {
                player: 1,
                cue: AnimCue::RifleHipFire,
            },
        );
        queue.push(0, 0, MatchEvent::PlayerJoined { player: 2 });

        assert_eq!(queue.len(), 2);
        assert!(
            queue
                .pending_for_send()
                .all(|e| e.event.reliability().is_reliable())
        );
    }
}
