//! The `publisher` module is the delivery core.
//!
//! - `sample`: the geolocation sample and its fixed six-key JSON payload
//! - `topic`: topic template rendering
//! - `engine`: `Publisher`, which resolves the session topic for each
//!   sample, tries a live send and falls back to the offline queue
//! - `drainer`: `Drainer`, the single consumer of link events, which
//!   flushes the queue whenever the link reconnects
//!
//! Queued messages keep the topic they were built with, so a session
//! rotation never rewrites what is already buffered.

pub mod drainer;
pub mod engine;
pub mod sample;
pub mod topic;

pub use drainer::Drainer;
pub use engine::{Delivery, Publisher, QueuedMessage};
pub use sample::{GeoPayload, Sample};
pub use topic::TopicTemplate;

#[cfg(test)]
mod tests;
