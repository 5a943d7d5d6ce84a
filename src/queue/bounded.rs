//! Thread-safe bounded queue with oldest-drop admission.
//!
//! Concurrency notes:
//! - A single `std::sync::Mutex` guards the ring. It is held only for one
//!   push or one pop and never across an `.await`, so a producer calling
//!   `put` is never blocked by a slow send during `drain`.
//! - At most one `drain` runs at a time. A second caller gets
//!   `DrainOutcome::AlreadyDraining` immediately.
//! - A drain pops an item before handing it to the sink. If the sink fails
//!   that item is gone: it is not pushed back. This avoids retry spins and
//!   reordering at the cost of one message per interrupted drain.

use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::warn;

use crate::queue::ring::RingBuffer;

/// Result of one drain pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainOutcome<E> {
    /// The queue was emptied.
    Completed { drained: usize },
    /// The sink failed on the item after the first `drained` ones; that item
    /// was dropped and the rest stay queued.
    Halted { drained: usize, error: E },
    /// Another drain was already running; nothing was popped.
    AlreadyDraining,
}

impl<E> DrainOutcome<E> {
    pub fn drained(&self) -> usize {
        match self {
            Self::Completed { drained } | Self::Halted { drained, .. } => *drained,
            Self::AlreadyDraining => 0,
        }
    }
}

#[derive(Debug)]
pub struct BoundedDropOldestQueue<T> {
    ring: Mutex<RingBuffer<T>>,
    draining: AtomicBool,
    evicted: AtomicU64,
}

impl<T> BoundedDropOldestQueue<T> {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            ring: Mutex::new(RingBuffer::new(capacity)),
            draining: AtomicBool::new(false),
            evicted: AtomicU64::new(0),
        }
    }

    fn ring(&self) -> MutexGuard<'_, RingBuffer<T>> {
        // Every ring operation leaves it consistent, so a poisoned lock is still usable.
        self.ring.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Inserts `item`, evicting the oldest entry if the queue is full.
    ///
    /// Never rejects new data, so this always returns `true` with the
    /// ring-backed storage.
    pub fn put(&self, item: T) -> bool {
        let (evicted, len, capacity) = {
            let mut ring = self.ring();
            let evicted = ring.push_back(item);
            (evicted, ring.len(), ring.capacity())
        };

        if evicted.is_some() {
            let total = self.evicted.fetch_add(1, Ordering::Relaxed) + 1;
            warn!(
                len,
                capacity,
                evicted_total = total,
                "Queue full, dropped oldest to admit new item"
            );
        }
        true
    }

    /// Pops items oldest-first into `sink` until the queue is empty or the
    /// sink fails.
    pub async fn drain<F, Fut, E>(&self, mut sink: F) -> DrainOutcome<E>
    where
        F: FnMut(T) -> Fut,
        Fut: Future<Output = Result<(), E>>,
    {
        if self.draining.swap(true, Ordering::SeqCst) {
            return DrainOutcome::AlreadyDraining;
        }
        let _guard = DrainGuard(&self.draining);

        let mut drained = 0;
        loop {
            let next = self.ring().pop_front();
            let Some(item) = next else {
                return DrainOutcome::Completed { drained };
            };

            if let Err(error) = sink(item).await {
                return DrainOutcome::Halted { drained, error };
            }
            drained += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.ring().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.ring().capacity()
    }

    /// Total number of items dropped by oldest-drop admission.
    pub fn evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }

    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::SeqCst)
    }
}

impl<T: Clone> BoundedDropOldestQueue<T> {
    /// Copies the queued items, oldest first.
    pub fn snapshot(&self) -> Vec<T> {
        self.ring().iter().cloned().collect()
    }
}

/// Clears the single-drainer flag even if the drain future is dropped mid-way.
struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
