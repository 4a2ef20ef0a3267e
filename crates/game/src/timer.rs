use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use crate::PlayerId;
use crate::combat::LockToken;

/// Deferred work on the server clock. Payloads are ids and tokens, never
/// references, so a timer firing after its owner is gone stays safe: the
/// dispatcher looks the player up and drops the event if nothing is there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    LockRelease { player: PlayerId, token: LockToken },
    HazardPulse { player: PlayerId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Scheduled {
    due_ms: u64,
    seq: u64,
    event: TimerEvent,
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.due_ms, self.seq).cmp(&(other.due_ms, other.seq))
    }
}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Min-heap of one-shots keyed on server-clock milliseconds. Repetition is
/// the caller's concern: the hazard pulse reschedules itself only while its
/// player still exists, which is how it stops.
#[derive(Debug, Default)]
pub struct TimerQueue {
    heap: BinaryHeap<Reverse<Scheduled>>,
    next_seq: u64,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule_at(&mut self, due_ms: u64, event: TimerEvent) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(Scheduled { due_ms, seq, event }));
    }

    pub fn schedule_after(&mut self, now_ms: u64, delay_secs: f32, event: TimerEvent) {
        let delay_ms = (delay_secs.max(0.0) * 1000.0).round() as u64;
        self.schedule_at(now_ms + delay_ms, event);
    }

    /// Pops the next event whose deadline has passed, oldest first; equal
    /// deadlines fire in schedule order.
    pub fn pop_due(&mut self, now_ms: u64) -> Option<TimerEvent> {
        if self.heap.peek().is_some_and(|Reverse(s)| s.due_ms <= now_ms) {
            self.heap.pop().map(|Reverse(s)| s.event)
        } else {
            None
        }
    }

    pub fn next_due_ms(&self) -> Option<u64> {
        self.heap.peek().map(|Reverse(s)| s.due_ms)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
