//! Sample sources feeding the publisher.
//!
//! Only a synthetic walking track ships today; a real GNSS source would
//! implement `Iterator<Item = Sample>` the same way.

use std::time::Duration;

use tokio::time::{Interval, MissedTickBehavior};

pub mod synthetic;

pub use synthetic::SyntheticSensor;

/// Producer pacing: one tick per `period`.
///
/// A tick missed while a send blocked the loop is not made up with a burst;
/// the schedule restarts from the late tick.
pub fn sample_ticker(period: Duration) -> Interval {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}
