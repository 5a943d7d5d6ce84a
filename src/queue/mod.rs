//! The `queue` module holds the offline buffer used while the broker is
//! unreachable.
//!
//! - `ring`: fixed-slot ring buffer that evicts its oldest entry when full.
//! - `bounded`: the thread-safe `BoundedDropOldestQueue` wrapping the ring,
//!   with a single-drainer flush operation.
//!
//! The queue is memory-resident only. Whatever it holds is lost when the
//! process exits.

pub mod bounded;
pub mod ring;

pub use bounded::{BoundedDropOldestQueue, DrainOutcome};
pub use ring::RingBuffer;
