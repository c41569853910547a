//! Module that contains the priority queue of outstanding requests each process keeps.
//!
//! Messages are ranked by `(time, origin)`; the sequence number only separates
//! entries a single process created with the same key.

use crate::{
    clock::Timestamp,
    message::{Message, ProcessId},
};
use std::{
    cmp::{Ordering, Reverse},
    collections::BinaryHeap,
};

#[derive(Debug, Clone)]
struct Ranked(Message);

fn rank(message: &Message) -> (Timestamp, ProcessId, u64) {
    (message.time, message.origin, message.seq)
}

/// Function that compares two messages by the total order every process agrees on.
pub fn rank_order(a: &Message, b: &Message) -> Ordering {
    rank(a).cmp(&rank(b))
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        rank_order(&self.0, &other.0) == Ordering::Equal
    }
}

impl Eq for Ranked {}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        rank_order(&self.0, &other.0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct EventQueue {
    heap: BinaryHeap<Reverse<Ranked>>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn push(&mut self, message: Message) {
        self.heap.push(Reverse(Ranked(message)));
    }

    /// Function that removes and returns the lowest-ranked message.
    pub fn pop_min(&mut self) -> Option<Message> {
        self.heap.pop().map(|Reverse(Ranked(message))| message)
    }

    pub fn peek_min(&self) -> Option<&Message> {
        self.heap.peek().map(|Reverse(Ranked(message))| message)
    }

    /// Function that drops every message matching `predicate` and returns how many were dropped.
    pub fn remove_where<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(&Message) -> bool,
    {
        let before = self.heap.len();
        self.heap
            .retain(|Reverse(Ranked(message))| !predicate(message));
        before - self.heap.len()
    }

    pub fn contains(&self, origin: ProcessId, time: Timestamp) -> bool {
        self.iter()
            .any(|message| message.origin == origin && message.time == time)
    }

    /// Iterates in heap order, not rank order.
    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.heap.iter().map(|Reverse(Ranked(message))| message)
    }

    /// Function that returns the messages from lowest to highest rank.
    pub fn ordered(&self) -> Vec<&Message> {
        let mut messages: Vec<&Message> = self.iter().collect();
        messages.sort_by(|a, b| rank_order(a, b));
        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Kind, Sequencer};

    fn request(origin: u32, time: u64) -> Message {
        Sequencer::new().stamp(ProcessId(origin), time, Kind::Request)
    }

    #[test]
    fn pops_by_time_then_origin() {
        let mut queue = EventQueue::new();
        queue.push(request(2, 5));
        queue.push(request(0, 7));
        queue.push(request(1, 5));
        queue.push(request(0, 3));

        let order: Vec<(u32, u64)> = std::iter::from_fn(|| queue.pop_min())
            .map(|m| (m.origin.0, m.time))
            .collect();
        assert_eq!(order, vec![(0, 3), (1, 5), (2, 5), (0, 7)]);
    }

    #[test]
    fn sequence_breaks_ties_within_one_process() {
        let mut sequencer = Sequencer::new();
        let first = sequencer.stamp(ProcessId(0), 4, Kind::Request);
        let second = sequencer.stamp(ProcessId(0), 4, Kind::Request);

        let mut queue = EventQueue::new();
        queue.push(second.clone());
        queue.push(first.clone());

        assert_eq!(queue.pop_min(), Some(first));
        assert_eq!(queue.pop_min(), Some(second));
    }

    #[test]
    fn remove_where_keeps_heap_order() {
        let mut queue = EventQueue::new();
        for (origin, time) in [(0, 9), (1, 2), (2, 4), (3, 1)] {
            queue.push(request(origin, time));
        }

        assert_eq!(queue.remove_where(|m| m.origin == ProcessId(3)), 1);
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.peek_min().map(|m| m.key().time), Some(2));
        assert!(!queue.contains(ProcessId(3), 1));
    }

    #[test]
    fn removing_an_absent_key_is_a_no_op() {
        let mut queue = EventQueue::new();
        queue.push(request(1, 4));
        queue.push(request(2, 6));

        let removed = queue.remove_where(|m| m.origin == ProcessId(1) && m.time == 5);
        assert_eq!(removed, 0);
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.peek_min(), Some(&request(1, 4)));
    }

    #[test]
    fn ordered_is_independent_of_insertion_order() {
        let requests = [request(2, 3), request(0, 3), request(1, 1), request(0, 8)];

        let mut forward = EventQueue::new();
        let mut backward = EventQueue::new();
        for message in requests.iter() {
            forward.push(message.clone());
        }
        for message in requests.iter().rev() {
            backward.push(message.clone());
        }

        assert_eq!(forward.ordered(), backward.ordered());
    }
}
