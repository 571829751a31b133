//! Min-heap priority queue: lower priority number dequeues first, ties broken
//! by earlier insertion time.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::OnceLock;
use std::time::Instant;

use parking_lot::{Condvar, Mutex};

use crate::recycler::{DefaultRecycler, Recycler};

fn epoch() -> Instant {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    *EPOCH.get_or_init(Instant::now)
}

/// A monotonic millisecond timestamp, relative to an arbitrary process-local
/// epoch. Only ever compared to other values from this function.
pub fn monotonic_ms() -> u64 {
    epoch().elapsed().as_millis() as u64
}

/// A value paired with a priority and the monotonic timestamp it was
/// enqueued at. Lower `priority` dequeues first; ties are broken by the
/// earlier `timestamp`.
#[derive(Debug, Clone)]
pub struct PriorityItem<T> {
    pub value: T,
    pub priority: i64,
    pub timestamp: u64,
}

impl<T> PriorityItem<T> {
    /// Wraps `value` with `priority`, stamping it with the current
    /// monotonic time.
    pub fn new(value: T, priority: i64) -> Self {
        Self {
            value,
            priority,
            timestamp: monotonic_ms(),
        }
    }
}

impl<T> PartialEq for PriorityItem<T> {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.timestamp == other.timestamp
    }
}
impl<T> Eq for PriorityItem<T> {}

impl<T> PartialOrd for PriorityItem<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for PriorityItem<T> {
    // `BinaryHeap` is a max-heap, so invert both comparisons: a lower
    // priority number (or, on a tie, an earlier timestamp) must compare as
    // "greater" to end up on top.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.timestamp.cmp(&self.timestamp))
    }
}

struct Inner<T> {
    heap: BinaryHeap<PriorityItem<T>>,
    capacity: Option<usize>,
}

/// A bounded min-heap over [`PriorityItem`], with recycler-driven capacity
/// shrink on pop.
pub struct PriorityQueue<T> {
    inner: Mutex<Inner<T>>,
    not_empty: Condvar,
    recycler: Box<dyn Recycler>,
}

impl<T> PriorityQueue<T> {
    /// Creates an unbounded queue with the default recycler.
    pub fn new() -> Self {
        Self::with_recycler(None, Box::new(DefaultRecycler))
    }

    /// Creates a queue capped at `capacity` items, using the default
    /// recycler.
    pub fn bounded(capacity: usize) -> Self {
        Self::with_recycler(Some(capacity), Box::new(DefaultRecycler))
    }

    /// Creates a queue with an explicit capacity and recycler.
    pub fn with_recycler(capacity: Option<usize>, recycler: Box<dyn Recycler>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                heap: BinaryHeap::new(),
                capacity,
            }),
            not_empty: Condvar::new(),
            recycler,
        }
    }

    /// Number of items currently queued.
    pub fn len(&self) -> usize {
        self.inner.lock().heap.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pushes `item`. Returns `false` without inserting if the queue is at
    /// capacity.
    pub fn push(&self, item: PriorityItem<T>) -> bool {
        let mut guard = self.inner.lock();
        if let Some(cap) = guard.capacity {
            if guard.heap.len() >= cap {
                return false;
            }
        }
        guard.heap.push(item);
        self.not_empty.notify_one();
        true
    }

    /// Pops the highest-priority item, or `None` if empty.
    pub fn pop(&self) -> Option<T> {
        let mut guard = self.inner.lock();
        let item = guard.heap.pop();
        self.maybe_shrink(&mut guard);
        item.map(|i| i.value)
    }

    /// Returns a clone of the highest-priority value without removing it.
    pub fn peek(&self) -> Option<T>
    where
        T: Clone,
    {
        self.inner.lock().heap.peek().map(|i| i.value.clone())
    }

    /// Blocks until an item is available, then pops it.
    pub fn wait_pop(&self) -> T {
        let mut guard = self.inner.lock();
        loop {
            if let Some(item) = guard.heap.pop() {
                self.maybe_shrink(&mut guard);
                return item.value;
            }
            self.not_empty.wait(&mut guard);
        }
    }

    /// Removes and returns the first queued value for which `pred` returns
    /// `true`, scanning in no particular priority order.
    pub fn search_fn(&self, pred: impl Fn(&T) -> bool) -> Option<T> {
        let mut guard = self.inner.lock();
        let items: Vec<_> = guard.heap.drain().collect();
        let mut found = None;
        let mut rebuilt = BinaryHeap::with_capacity(items.len());
        for item in items {
            if found.is_none() && pred(&item.value) {
                found = Some(item.value);
            } else {
                rebuilt.push(item);
            }
        }
        guard.heap = rebuilt;
        self.maybe_shrink(&mut guard);
        found
    }

    /// Drops every queued item.
    pub fn clear(&self) {
        let mut guard = self.inner.lock();
        guard.heap.clear();
        self.maybe_shrink(&mut guard);
    }

    fn maybe_shrink(&self, guard: &mut Inner<T>) {
        let len = guard.heap.len();
        let cap = guard.heap.capacity();
        if self.recycler.should_shrink(len, cap) {
            let tight = BinaryHeap::from(guard.heap.drain().collect::<Vec<_>>());
            guard.heap = tight;
            guard.heap.shrink_to_fit();
        }
    }
}

impl<T> Default for PriorityQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn pops_lowest_priority_first_ties_by_insertion_order() {
        let q = PriorityQueue::new();
        q.push(PriorityItem::new('A', 10));
        thread::sleep(Duration::from_millis(2));
        q.push(PriorityItem::new('B', 1));
        thread::sleep(Duration::from_millis(2));
        q.push(PriorityItem::new('C', 1));

        assert_eq!(q.pop(), Some('B'));
        assert_eq!(q.pop(), Some('C'));
        assert_eq!(q.pop(), Some('A'));
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn bounded_push_rejects_when_full() {
        let q = PriorityQueue::bounded(1);
        assert!(q.push(PriorityItem::new(1, 0)));
        assert!(!q.push(PriorityItem::new(2, 0)));
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn search_fn_removes_matching_item_only() {
        let q = PriorityQueue::new();
        q.push(PriorityItem::new(1, 0));
        q.push(PriorityItem::new(2, 0));
        q.push(PriorityItem::new(3, 0));

        let found = q.search_fn(|v| *v == 2);
        assert_eq!(found, Some(2));
        assert_eq!(q.len(), 2);
        assert!(q.search_fn(|v| *v == 2).is_none());
    }

    #[test]
    fn wait_pop_wakes_on_push() {
        let q = std::sync::Arc::new(PriorityQueue::new());
        let q2 = q.clone();
        let handle = thread::spawn(move || q2.wait_pop());
        thread::sleep(Duration::from_millis(20));
        q.push(PriorityItem::new(42, 0));
        assert_eq!(handle.join().unwrap(), 42);
    }
}
