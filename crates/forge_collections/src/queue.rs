//! A bounded FIFO queue with batch pop and a blocking `wait_pop`, used
//! wherever a component needs plain ordered buffering rather than priority
//! ordering.

use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

use crate::recycler::{DefaultRecycler, Recycler};

struct Inner<T> {
    items: VecDeque<T>,
    capacity: Option<usize>,
}

/// Bounded (or unbounded) FIFO queue with recycler-driven shrink.
pub struct Queue<T> {
    inner: Mutex<Inner<T>>,
    not_empty: Condvar,
    recycler: Box<dyn Recycler>,
}

impl<T> Queue<T> {
    /// Creates an unbounded queue with the default recycler.
    pub fn new() -> Self {
        Self::with_recycler(None, Box::new(DefaultRecycler))
    }

    /// Creates a queue capped at `capacity` items.
    pub fn bounded(capacity: usize) -> Self {
        Self::with_recycler(Some(capacity), Box::new(DefaultRecycler))
    }

    /// Creates a queue with an explicit capacity and recycler.
    pub fn with_recycler(capacity: Option<usize>, recycler: Box<dyn Recycler>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                items: VecDeque::new(),
                capacity,
            }),
            not_empty: Condvar::new(),
            recycler,
        }
    }

    /// Current length.
    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pushes to the back. Returns `false` without inserting if at capacity.
    pub fn push(&self, value: T) -> bool {
        let mut guard = self.inner.lock();
        if let Some(cap) = guard.capacity {
            if guard.items.len() >= cap {
                return false;
            }
        }
        guard.items.push_back(value);
        self.not_empty.notify_one();
        true
    }

    /// Pops from the front, or `None` if empty.
    pub fn pop(&self) -> Option<T> {
        let mut guard = self.inner.lock();
        let value = guard.items.pop_front();
        self.shrink_or_release(&mut guard);
        value
    }

    /// Pops up to `n` items in FIFO order. Returns fewer if the queue drains
    /// first.
    pub fn pop_batch(&self, n: usize) -> Vec<T> {
        let mut guard = self.inner.lock();
        let drained: Vec<T> = guard.items.drain(..n.min(guard.items.len())).collect();
        self.shrink_or_release(&mut guard);
        drained
    }

    /// Blocks until an item is available, then pops it.
    pub fn wait_pop(&self) -> T {
        let mut guard = self.inner.lock();
        loop {
            if let Some(value) = guard.items.pop_front() {
                self.shrink_or_release(&mut guard);
                return value;
            }
            self.not_empty.wait(&mut guard);
        }
    }

    /// Drops every queued item.
    pub fn clear(&self) {
        let mut guard = self.inner.lock();
        guard.items.clear();
        self.shrink_or_release(&mut guard);
    }

    fn shrink_or_release(&self, guard: &mut Inner<T>) {
        if guard.items.is_empty() {
            // Release the backing slice entirely when drained, rather than
            // holding onto a capacity that may never be needed again.
            guard.items = VecDeque::new();
            return;
        }
        let len = guard.items.len();
        let cap = guard.items.capacity();
        if self.recycler.should_shrink(len, cap) {
            guard.items.shrink_to_fit();
        }
    }
}

impl<T> Default for Queue<T> {
    fn default() -> Self {
        Self::new()
    }
}
