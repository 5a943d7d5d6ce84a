//! # geopub
//!
//! `geopub` publishes a stream of geolocation samples to an MQTT broker,
//! one JSON message per sample, on a per-device, per-session topic with
//! at-least-once delivery. While the broker is unreachable samples are
//! buffered in a bounded in-memory queue and flushed in order on reconnect.
//!
//! ## Core Modules
//!
//! - `publisher`: the delivery core; live send with fallback to the queue,
//!   and the drainer that flushes it on reconnect.
//! - `queue`: the bounded, oldest-drop offline queue.
//! - `session`: the session identity and its time-based rotation.
//! - `link`: the broker connection abstraction and its MQTT implementation.
//! - `config`: settings from files and environment, validated into a `PublisherConfig`.
//! - `sensor`: sample sources (currently a synthetic track).
//! - `utils`: error type and logging setup.

pub mod config;
pub mod link;
pub mod publisher;
pub mod queue;
pub mod sensor;
pub mod session;
pub mod utils;

#[cfg(test)]
mod tests;
