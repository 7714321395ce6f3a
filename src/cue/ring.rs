use std::collections::VecDeque;

/// Slots allocated up front; larger rings grow on demand.
const PREALLOCATED_SLOTS: usize = 64;

/// Fixed-capacity FIFO ring. Pushing into a full ring evicts the oldest entry.
#[derive(Debug, Clone)]
pub struct CueRing<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> CueRing<T> {
    /// Capacity is clamped to at least one slot.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity.min(PREALLOCATED_SLOTS)),
            capacity,
        }
    }

    /// Appends `item`, returning the evicted entry if the ring was full.
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = if self.items.len() == self.capacity {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(item);
        evicted
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> {
        self.items.iter()
    }

    pub fn latest(&self) -> Option<&T> {
        self.items.back()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl<T: Clone> CueRing<T> {
    /// Copies the contents out, most recent last.
    pub fn snapshot(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}
