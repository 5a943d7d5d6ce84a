//! The `link` module abstracts the broker connection the publisher talks to.
//!
//! A link does two things:
//! - performs one publish attempt per `send`, without retrying internally
//! - reports connectivity transitions as `LinkEvent`s on a channel that is
//!   handed out when the link is created
//!
//! `mqtt::MqttLink` is the production implementation on top of `rumqttc`.
//! `mock::MockLink` is a scripted in-memory link for tests.

use std::fmt;
use std::future::Future;

use thiserror::Error;

pub mod mock;
pub mod mqtt;

pub use mock::MockLink;
pub use mqtt::MqttLink;


/// Transient failures of a single publish attempt.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LinkError {
    #[error("not connected to broker")]
    NotConnected,

    #[error("publish failed: {0}")]
    Publish(String),

    #[error("link closed")]
    Closed,
}

/// Connectivity transitions posted by a link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    Connected,
    Disconnected { reason: String },
}

/// MQTT delivery guarantee requested for each publish.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum QosLevel {
    AtMostOnce,
    #[default]
    AtLeastOnce,
    ExactlyOnce,
}

impl QosLevel {
    pub fn from_level(level: u8) -> Option<Self> {
        match level {
            0 => Some(Self::AtMostOnce),
            1 => Some(Self::AtLeastOnce),
            2 => Some(Self::ExactlyOnce),
            _ => None,
        }
    }

    pub fn level(self) -> u8 {
        match self {
            Self::AtMostOnce => 0,
            Self::AtLeastOnce => 1,
            Self::ExactlyOnce => 2,
        }
    }
}

impl fmt::Display for QosLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QoS {}", self.level())
    }
}

/// Broker connection as seen by the publisher.
pub trait DeliveryLink: Send + Sync + 'static {
    fn is_connected(&self) -> bool;

    /// Makes one publish attempt.
    ///
    /// Resolves once the transport has accepted the message for delivery,
    /// not once the broker has acknowledged it. Fails with
    /// [`LinkError::NotConnected`] without touching the transport when the
    /// link is down.
    fn send(
        &self,
        topic: &str,
        payload: Vec<u8>,
    ) -> impl Future<Output = Result<(), LinkError>> + Send;
}
