//! Per-service selection queue.
//!
//! A drainable min-heap over a snapshot of the service's endpoints. Ordering
//! is `(priority, discovery index)`, so equal priorities drain in the order
//! discovery reported them and a fixed endpoint set always yields the same
//! sequence. With every priority at zero this degenerates to round-robin.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use crate::scheduler::endpoint::Endpoint;

#[derive(Debug)]
struct QueueEntry {
    priority: u16,
    index: usize,
    endpoint: Endpoint,
}

impl QueueEntry {
    fn key(&self) -> (u16, usize) {
        (self.priority, self.index)
    }
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

/// Priority-ordered working set consumed one endpoint per selection.
#[derive(Debug, Default)]
pub struct SelectionQueue {
    heap: BinaryHeap<Reverse<QueueEntry>>,
}

impl SelectionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the contents with a fresh copy of `endpoints`.
    pub fn refill(&mut self, endpoints: &[Endpoint]) {
        self.heap = endpoints
            .iter()
            .enumerate()
            .map(|(index, endpoint)| {
                Reverse(QueueEntry {
                    priority: endpoint.priority,
                    index,
                    endpoint: endpoint.clone(),
                })
            })
            .collect();
    }

    /// Take the lowest-priority-value endpoint.
    pub fn pop(&mut self) -> Option<Endpoint> {
        self.heap.pop().map(|Reverse(entry)| entry.endpoint)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
