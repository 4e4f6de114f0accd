use crate::{
    types::{NodeId, Priority},
    utils::SplitOffHalf,
};
use core::cmp::{Ordering, Reverse};
use std::{
    collections::{BinaryHeap, VecDeque},
    sync::Arc,
};

/// Holds the ids of nodes whose predecessors have all completed.
///
/// A queue is owned by exactly one worker at a time. Work moves between
/// workers only by splitting a queue with [`pop_half`](Self::pop_half) and
/// handing the split-off part over.
pub trait ReadyQueue: Send + Sized + 'static {
    /// Add a ready node.
    fn push(&mut self, id: NodeId);

    /// Take the node that should run next.
    fn pop(&mut self) -> Option<NodeId>;

    /// Remove the less urgent half (`len / 2` elements) into a new queue of
    /// the same kind, keeping the more urgent half here.
    fn pop_half(&mut self) -> Self;

    /// A new empty queue of the same kind.
    fn empty_like(&self) -> Self;

    /// Number of queued nodes.
    fn len(&self) -> usize;

    /// Whether no node is queued.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Ready queue served in insertion order.
///
/// Splitting hands off the most recently pushed nodes: the owner keeps
/// working on what it already knows comes next.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FifoReadyQueue {
    queue: VecDeque<NodeId>,
}

impl FifoReadyQueue {
    /// Queue holding `ready` in the given order.
    pub fn new(ready: impl IntoIterator<Item = NodeId>) -> Self {
        Self {
            queue: ready.into_iter().collect(),
        }
    }
}

impl ReadyQueue for FifoReadyQueue {
    fn push(&mut self, id: NodeId) {
        self.queue.push_back(id);
    }

    fn pop(&mut self) -> Option<NodeId> {
        self.queue.pop_front()
    }

    fn pop_half(&mut self) -> Self {
        Self {
            queue: self.queue.split_off_half(),
        }
    }

    fn empty_like(&self) -> Self {
        Self::default()
    }

    fn len(&self) -> usize {
        self.queue.len()
    }
}

/// Heap entry ordered by priority, then by insertion order (older first).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Entry {
    priority: Priority,
    sequence: Reverse<u64>,
    id: NodeId,
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.priority, self.sequence).cmp(&(other.priority, other.sequence))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Ready queue served highest priority first; equal priorities are served in
/// insertion order.
///
/// Splitting hands off the lowest-priority half.
#[derive(Debug, Clone)]
pub struct PriorityReadyQueue {
    priorities: Arc<[Priority]>,
    heap: BinaryHeap<Entry>,
    next_sequence: u64,
}

impl PriorityReadyQueue {
    /// Queue over nodes whose priorities are `priorities[id]`, holding
    /// `ready`.
    ///
    /// # Panics
    /// If an id pushed now or later is out of range of `priorities`.
    pub fn new(priorities: Arc<[Priority]>, ready: impl IntoIterator<Item = NodeId>) -> Self {
        let mut queue = Self {
            priorities,
            heap: BinaryHeap::new(),
            next_sequence: 0,
        };
        for id in ready {
            queue.push(id);
        }
        queue
    }
}

impl ReadyQueue for PriorityReadyQueue {
    fn push(&mut self, id: NodeId) {
        let entry = Entry {
            priority: self.priorities[id],
            sequence: Reverse(self.next_sequence),
            id,
        };
        self.next_sequence += 1;
        self.heap.push(entry);
    }

    fn pop(&mut self) -> Option<NodeId> {
        self.heap.pop().map(|entry| entry.id)
    }

    fn pop_half(&mut self) -> Self {
        // Descending: most urgent first, so the back half is the least urgent.
        let mut entries = core::mem::take(&mut self.heap).into_sorted_vec();
        entries.reverse();
        let split = entries.split_off_half();
        self.heap = BinaryHeap::from(entries);
        Self {
            priorities: Arc::clone(&self.priorities),
            heap: BinaryHeap::from(split),
            // Keeps tie-breaking consistent between both halves.
            next_sequence: self.next_sequence,
        }
    }

    fn empty_like(&self) -> Self {
        Self::new(Arc::clone(&self.priorities), [])
    }

    fn len(&self) -> usize {
        self.heap.len()
    }
}
