//! In-memory simulation queue.
//!
//! This is the reference implementation of `Scheduler`.
//! It uses a binary min-heap keyed by (due time, insertion order).
//!
//! ## Limitations
//!
//! - **No netlist**: popping an event does not resolve anything downstream.
//!   The caller decides what a dequeued node means.
//! - **No de-duplication**: adding the same node twice yields two events.
//!   Elements that re-enqueue unchanged outputs are observable as such.
//! - **Saturating time**: a due time past `u64::MAX` is clamped to it.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::model::{ElementId, NodeId, Signal, ValueNode};
use super::Scheduler;

/// One enqueued node, with the value it carried when it was added.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueuedEvent {
    pub node: NodeId,
    pub owner: ElementId,
    pub value: Signal,
    pub due: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Key {
    due: u64,
    seq: u64,
}

/// Delay-ordered event queue.
#[derive(Debug, Default)]
pub struct SimulationQueue {
    heap: BinaryHeap<Reverse<(Key, Entry)>>,
    now: u64,
    next_seq: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Entry {
    node: NodeId,
    owner: ElementId,
    value: Option<u32>,
}

impl SimulationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current simulated time: the due time of the last popped event.
    pub fn now(&self) -> u64 {
        self.now
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Next event in (due time, insertion) order. Advances `now`.
    pub fn pop(&mut self) -> Option<QueuedEvent> {
        let Reverse((key, entry)) = self.heap.pop()?;
        self.now = self.now.max(key.due);
        Some(QueuedEvent {
            node: entry.node,
            owner: entry.owner,
            value: entry.value.into(),
            due: key.due,
        })
    }

    /// Pop everything, in order.
    pub fn drain(&mut self) -> Vec<QueuedEvent> {
        std::iter::from_fn(|| self.pop()).collect()
    }

    /// Number of pending events for `node`.
    pub fn events_for(&self, node: NodeId) -> usize {
        self.heap.iter().filter(|Reverse((_, e))| e.node == node).count()
    }
}

impl Scheduler for SimulationQueue {
    fn add(&mut self, node: &ValueNode, delay: u64) {
        let key = Key { due: self.now.saturating_add(delay), seq: self.next_seq };
        self.next_seq += 1;
        let entry = Entry { node: node.id(), owner: node.owner(), value: node.value().as_u32() };
        tracing::trace!(node = %entry.node, owner = %entry.owner, due = key.due, "enqueue");
        self.heap.push(Reverse((key, entry)));
    }
}
