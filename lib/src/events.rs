//! Deferred one-shot events.
//!
//! A min-heap of `(fire_at, payload)` entries, drained cooperatively at
//! the start of each step. Entries with equal fire times come out in the
//! order they were scheduled.

use std::{cmp::Reverse, collections::BinaryHeap};

use ordered_float::OrderedFloat;

#[derive(Debug)]
struct Entry<P> {
    fire_at: OrderedFloat<f64>,
    seq: u64,
    payload: P,
}

impl<P> PartialEq for Entry<P> {
    fn eq(&self, other: &Self) -> bool {
        (self.fire_at, self.seq) == (other.fire_at, other.seq)
    }
}

impl<P> Eq for Entry<P> {}

impl<P> PartialOrd for Entry<P> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<P> Ord for Entry<P> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.fire_at, self.seq).cmp(&(other.fire_at, other.seq))
    }
}

#[derive(Debug)]
pub struct EventQueue<P> {
    heap: BinaryHeap<Reverse<Entry<P>>>,
    next_seq: u64,
}

impl<P> Default for EventQueue<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> EventQueue<P> {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Schedule `payload` at absolute simulation time `fire_at` (seconds).
    pub fn schedule_at(&mut self, fire_at: f64, payload: P) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(Entry {
            fire_at: OrderedFloat(fire_at),
            seq,
            payload,
        }));
    }

    /// Schedule `payload` `delay` seconds after `now`.
    pub fn schedule_in(&mut self, now: f64, delay: f64, payload: P) {
        self.schedule_at(now + delay, payload);
    }

    pub fn peek_time(&self) -> Option<f64> {
        self.heap.peek().map(|Reverse(e)| e.fire_at.0)
    }

    /// Remove and return every payload due at or before `now`, earliest first.
    pub fn drain_due(&mut self, now: f64) -> Vec<P> {
        let mut due = Vec::new();
        while self.peek_time().is_some_and(|t| t <= now) {
            if let Some(Reverse(entry)) = self.heap.pop() {
                due.push(entry.payload);
            }
        }
        due
    }
}
