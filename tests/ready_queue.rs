use std::sync::Arc;
use thunk_executor::{FifoReadyQueue, NodeId, PriorityReadyQueue, ReadyQueue};

fn drain(mut queue: impl ReadyQueue) -> Vec<NodeId> {
    let mut popped = Vec::new();
    while let Some(id) = queue.pop() {
        popped.push(id);
    }
    assert!(queue.is_empty());
    popped
}

#[test]
fn fifo_pops_in_push_order() {
    let mut queue = FifoReadyQueue::default();
    assert!(queue.is_empty());
    for id in [3, 1, 2] {
        queue.push(id);
    }
    assert_eq!(queue.len(), 3);
    assert_eq!(drain(queue), [3, 1, 2]);
}

#[test]
fn fifo_pop_half_hands_off_newest() {
    let mut queue = FifoReadyQueue::new([1, 2, 3, 4, 5]);
    assert_eq!(queue.pop(), Some(1));
    assert_eq!(queue.len(), 4);

    let split = queue.pop_half();
    assert_eq!(split.len(), 2);
    assert_eq!(queue.len(), 2);
    assert!(!split.is_empty() && !queue.is_empty());
    assert_eq!(drain(split), [4, 5]);
    assert_eq!(drain(queue), [2, 3]);
}

#[test]
fn fifo_pop_half_of_tiny_queues() {
    let mut one = FifoReadyQueue::new([9]);
    let split = one.pop_half();
    assert!(split.is_empty());
    assert_eq!(one.len(), 1);

    let mut empty = FifoReadyQueue::default();
    assert!(empty.pop_half().is_empty());
    assert_eq!(empty.pop(), None);
}

#[test]
fn priority_pops_most_urgent_first() {
    // priority(A = 0) = 2, priority(B = 1) = 1, priority(C = 2) = 3
    let priorities: Arc<[usize]> = Arc::from([2, 1, 3]);
    let queue = PriorityReadyQueue::new(priorities, [0, 1, 2]);
    assert_eq!(queue.len(), 3);
    assert_eq!(drain(queue), [2, 0, 1]);
}

#[test]
fn priority_ties_keep_push_order() {
    let priorities: Arc<[usize]> = Arc::from([1, 1, 1, 5]);
    let mut queue = PriorityReadyQueue::new(priorities, [2, 0]);
    queue.push(1);
    queue.push(3);
    assert_eq!(drain(queue), [3, 2, 0, 1]);
}

#[test]
fn priority_pop_half_hands_off_least_urgent() {
    let priorities: Arc<[usize]> = Arc::from([0, 1, 2, 3, 4, 5]);
    let mut queue = PriorityReadyQueue::new(priorities, [0, 3, 5, 1, 4, 2]);

    let split = queue.pop_half();
    assert_eq!(split.len(), 3);
    assert_eq!(queue.len(), 3);
    assert_eq!(drain(split), [2, 1, 0]);

    // The kept half still accepts pushes, ordered with what remains.
    queue.push(1);
    assert_eq!(drain(queue), [5, 4, 3, 1]);
}

#[test]
fn priority_pop_half_keeps_tie_order_in_both_halves() {
    let priorities: Arc<[usize]> = Arc::from([7; 4]);
    let mut queue = PriorityReadyQueue::new(priorities, [0, 1, 2, 3]);
    let split = queue.pop_half();
    assert_eq!(drain(queue), [0, 1]);
    assert_eq!(drain(split), [2, 3]);
}

#[test]
fn empty_like_shares_policy() {
    let priorities: Arc<[usize]> = Arc::from([0, 9]);
    let queue = PriorityReadyQueue::new(priorities, [0]);
    let mut fresh = queue.empty_like();
    assert!(fresh.is_empty());
    fresh.push(0);
    fresh.push(1);
    assert_eq!(drain(fresh), [1, 0]);
}
