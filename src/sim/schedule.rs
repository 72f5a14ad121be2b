//! Deferred one-shot spawns
//!
//! Entries fire in non-decreasing due time; equal due times fire in the
//! order they were scheduled. Nothing can be cancelled once queued.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::state::EntityId;

#[derive(Debug, Clone, Copy)]
struct Entry {
    due: f64,
    seq: u64,
    spawner: EntityId,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    // Reversed so the max-heap yields the earliest entry first
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .total_cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Time-ordered queue of pending spawner activations
#[derive(Debug, Default)]
pub struct DeferredQueue {
    heap: BinaryHeap<Entry>,
    next_seq: u64,
}

impl DeferredQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a spawn from `spawner` at scene time `due` (seconds)
    pub fn schedule(&mut self, due: f64, spawner: EntityId) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Entry { due, seq, spawner });
    }

    /// Remove and return every entry due at or before `now`, in firing order
    pub fn pop_due(&mut self, now: f64) -> Vec<EntityId> {
        let mut fired = Vec::new();
        while self.heap.peek().is_some_and(|e| e.due <= now) {
            if let Some(entry) = self.heap.pop() {
                fired.push(entry.spawner);
            }
        }
        fired
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_in_due_order() {
        let mut q = DeferredQueue::new();
        q.schedule(0.5, 1);
        q.schedule(0.1, 2);
        q.schedule(0.3, 3);
        assert!(q.pop_due(0.05).is_empty());
        assert_eq!(q.pop_due(1.0), vec![2, 3, 1]);
        assert!(q.is_empty());
    }

    #[test]
    fn test_ties_fire_in_schedule_order() {
        let mut q = DeferredQueue::new();
        for id in [7, 3, 9, 1] {
            q.schedule(0.2, id);
        }
        assert_eq!(q.pop_due(0.2), vec![7, 3, 9, 1]);
    }

    #[test]
    fn test_partial_drain() {
        let mut q = DeferredQueue::new();
        q.schedule(1.0, 1);
        q.schedule(2.0, 2);
        assert_eq!(q.pop_due(1.5), vec![1]);
        assert_eq!(q.len(), 1);
        assert_eq!(q.pop_due(2.0), vec![2]);
    }
}
