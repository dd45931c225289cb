//! Min-priority queue with updatable priorities.
//!
//! Backed by a binary heap. Updating an item pushes a fresh heap entry and
//! leaves the old one to be skipped on dequeue. Items with equal priority
//! come out in the order they were first enqueued.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::hash::Hash;

struct Entry<T, P> {
    priority: P,
    seq: u64,
    item: T,
}

impl<T, P: Ord> PartialEq for Entry<T, P> {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl<T, P: Ord> Eq for Entry<T, P> {}

impl<T, P: Ord> PartialOrd for Entry<T, P> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T, P: Ord> Ord for Entry<T, P> {
    // reversed: BinaryHeap is a max-heap
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

pub struct PriorityQueue<T, P> {
    heap: BinaryHeap<Entry<T, P>>,
    /// item → (live priority, first-enqueue sequence)
    live: HashMap<T, (P, u64)>,
    next_seq: u64,
}

impl<T, P> Default for PriorityQueue<T, P>
where
    T: Eq + Hash + Clone,
    P: Ord + Copy,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, P> PriorityQueue<T, P>
where
    T: Eq + Hash + Clone,
    P: Ord + Copy,
{
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            live: HashMap::new(),
            next_seq: 0,
        }
    }

    /// Add `item`. An item already queued just takes the new priority.
    pub fn enqueue(&mut self, item: T, priority: P) {
        if self.update_priority(&item, priority) {
            return;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.live.insert(item.clone(), (priority, seq));
        self.heap.push(Entry { priority, seq, item });
    }

    /// Remove and return the item with the lowest priority.
    pub fn dequeue_min(&mut self) -> Option<(T, P)> {
        while let Some(entry) = self.heap.pop() {
            let current = self.live.get(&entry.item).copied();
            if current == Some((entry.priority, entry.seq)) {
                self.live.remove(&entry.item);
                return Some((entry.item, entry.priority));
            }
        }
        None
    }

    /// Change the priority of a queued item. False if it is not queued.
    pub fn update_priority(&mut self, item: &T, priority: P) -> bool {
        let Some(slot) = self.live.get_mut(item) else {
            return false;
        };
        if slot.0 == priority {
            return true;
        }
        slot.0 = priority;
        let seq = slot.1;
        self.heap.push(Entry {
            priority,
            seq,
            item: item.clone(),
        });
        true
    }

    pub fn priority(&self, item: &T) -> Option<P> {
        self.live.get(item).map(|(p, _)| *p)
    }

    pub fn contains(&self, item: &T) -> bool {
        self.live.contains_key(item)
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
        self.live.clear();
        self.next_seq = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dequeues_in_priority_order() {
        let mut q = PriorityQueue::new();
        q.enqueue("c", 3);
        q.enqueue("a", 1);
        q.enqueue("b", 2);
        assert_eq!(q.dequeue_min(), Some(("a", 1)));
        assert_eq!(q.dequeue_min(), Some(("b", 2)));
        assert_eq!(q.dequeue_min(), Some(("c", 3)));
        assert_eq!(q.dequeue_min(), None);
    }

    #[test]
    fn test_ties_follow_insertion_order() {
        let mut q = PriorityQueue::new();
        for item in ["first", "second", "third"] {
            q.enqueue(item, 5);
        }
        assert_eq!(q.dequeue_min().map(|(i, _)| i), Some("first"));
        assert_eq!(q.dequeue_min().map(|(i, _)| i), Some("second"));
        assert_eq!(q.dequeue_min().map(|(i, _)| i), Some("third"));
    }

    #[test]
    fn test_update_priority() {
        let mut q = PriorityQueue::new();
        q.enqueue('x', 10);
        q.enqueue('y', 5);
        assert!(q.update_priority(&'x', 1));
        assert_eq!(q.len(), 2);
        assert_eq!(q.dequeue_min(), Some(('x', 1)));
        assert_eq!(q.dequeue_min(), Some(('y', 5)));
        // the stale entry for 'x' must not resurface
        assert_eq!(q.dequeue_min(), None);
        assert!(!q.update_priority(&'z', 1));
    }

    #[test]
    fn test_raise_priority_keeps_single_entry() {
        let mut q = PriorityQueue::new();
        q.enqueue(1, 1);
        q.enqueue(2, 2);
        q.enqueue(1, 9);
        assert_eq!(q.priority(&1), Some(9));
        assert_eq!(q.dequeue_min(), Some((2, 2)));
        assert_eq!(q.dequeue_min(), Some((1, 9)));
        assert!(q.is_empty());
    }

    #[test]
    fn test_clear() {
        let mut q = PriorityQueue::new();
        q.enqueue(1u8, 1u32);
        q.clear();
        assert!(q.is_empty());
        assert!(!q.contains(&1));
        assert_eq!(q.dequeue_min(), None);
    }
}
