// ABOUTME: Deadline queue driving particle group expiry.
// ABOUTME: Entries carry the owner's generation so stale timers can be told apart.

use std::collections::BTreeMap;
use std::time::Instant;

/// Handle to a scheduled deadline, used to cancel it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId {
    deadline: Instant,
    seq: u64,
}

#[derive(Debug)]
pub struct Scheduler<K> {
    queue: BTreeMap<TimerId, (K, u64)>,
    next_seq: u64,
}

impl<K> Default for Scheduler<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> Scheduler<K> {
    pub fn new() -> Self {
        Self {
            queue: BTreeMap::new(),
            next_seq: 0,
        }
    }

    /// Fire `key` at `deadline`. Equal deadlines fire in scheduling order.
    pub fn schedule(&mut self, deadline: Instant, key: K, generation: u64) -> TimerId {
        let id = TimerId {
            deadline,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.queue.insert(id, (key, generation));
        id
    }

    /// Returns false if the timer already fired or was cancelled
    pub fn cancel(&mut self, id: TimerId) -> bool {
        self.queue.remove(&id).is_some()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.queue.keys().next().map(|id| id.deadline)
    }

    /// Remove and return the earliest timer due at `now`
    pub fn pop_due(&mut self, now: Instant) -> Option<(K, u64)> {
        let first = *self.queue.keys().next()?;
        if first.deadline > now {
            return None;
        }
        self.queue.remove(&first)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
