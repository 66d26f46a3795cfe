//! Bounded store of the K heaviest coefficients seen by a bucket.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::mem::size_of;

#[derive(Clone, Debug)]
pub struct Weighted<T> {
    pub weight: f64,
    pub item: T,
}

impl<T> PartialEq for Weighted<T> {
    fn eq(&self, other: &Self) -> bool {
        self.weight.total_cmp(&other.weight) == Ordering::Equal
    }
}

impl<T> Eq for Weighted<T> {}

impl<T> PartialOrd for Weighted<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Weighted<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.weight.total_cmp(&other.weight)
    }
}

/// Min-heap keyed on weight with a hard capacity.
///
/// The backing heap is allocated once with `capacity` slots and never grows:
/// once full, a new item only gets in by replacing the current minimum, and
/// only when its weight is strictly larger.
#[derive(Clone, Debug)]
pub struct TopK<T> {
    capacity: usize,
    heap: BinaryHeap<Reverse<Weighted<T>>>,
}

impl<T> TopK<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            heap: BinaryHeap::with_capacity(capacity),
        }
    }

    /// Bytes reserved by a store of the given capacity.
    pub fn footprint(capacity: usize) -> usize {
        capacity * size_of::<Reverse<Weighted<T>>>()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn min_weight(&self) -> Option<f64> {
        self.heap.peek().map(|Reverse(w)| w.weight)
    }

    /// Offers an item; returns whether it was retained.
    pub fn offer(&mut self, item: T, weight: f64) -> bool {
        if self.capacity == 0 {
            return false;
        }
        if self.heap.len() < self.capacity {
            self.heap.push(Reverse(Weighted { weight, item }));
            return true;
        }
        if let Some(mut min) = self.heap.peek_mut() {
            if weight > min.0.weight {
                *min = Reverse(Weighted { weight, item });
                return true;
            }
        }
        false
    }

    pub fn iter(&self) -> impl Iterator<Item = &Weighted<T>> {
        self.heap.iter().map(|Reverse(w)| w)
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }
}
