use std::num::NonZeroUsize;

/// Fixed-capacity FIFO over a preallocated slot arena.
///
/// `head` indexes the oldest element and `len` counts occupied slots, so
/// the newest element sits at `(head + len - 1) % capacity`. Slots are
/// allocated once at construction.
#[derive(Debug)]
pub struct RingBuffer<T> {
    slots: Box<[Option<T>]>,
    head: usize,
    len: usize,
}

impl<T> RingBuffer<T> {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            slots: (0..capacity.get()).map(|_| None).collect(),
            head: 0,
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    /// Appends `item`, evicting and returning the oldest element when full.
    pub fn push_back(&mut self, item: T) -> Option<T> {
        let evicted = if self.is_full() { self.pop_front() } else { None };

        let tail = (self.head + self.len) % self.capacity();
        self.slots[tail] = Some(item);
        self.len += 1;
        evicted
    }

    pub fn pop_front(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }

        let item = self.slots[self.head].take();
        self.head = (self.head + 1) % self.capacity();
        self.len -= 1;
        item
    }

    /// Iterates from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        (0..self.len).filter_map(move |offset| {
            self.slots[(self.head + offset) % self.capacity()].as_ref()
        })
    }
}
