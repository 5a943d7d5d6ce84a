//! Publisher engine
//!
//! Per-sample lifecycle: `Received -> AttemptedLive -> Delivered | Queued`.
//!
//! - the session is ticked before the topic is resolved, so a rotation
//!   applies from the next sample onward
//! - any link failure, including "not connected", sends the message to the
//!   offline queue; `publish_point` itself never fails
//! - while the queue holds older messages or a drain is running, new samples
//!   are queued behind them instead of sent live, so the wire order always
//!   matches the sampling order; the producer flushes that backlog itself
//!   whenever the link is up
//! - the queue is shared with the `Drainer` running on another task

use std::num::NonZeroUsize;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, warn};

use crate::config::PublisherConfig;
use crate::link::{DeliveryLink, LinkError};
use crate::publisher::drainer::Drainer;
use crate::publisher::sample::Sample;
use crate::publisher::topic::TopicTemplate;
use crate::queue::BoundedDropOldestQueue;
use crate::session::SessionManager;

/// A message waiting for the link to come back, with the topic it was
/// built for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// What happened to a published sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The link accepted the message.
    Delivered,
    /// The message went through the offline queue, either because the live
    /// send failed or because older messages were still waiting.
    Queued,
    /// The sample could not be encoded and was discarded.
    Dropped,
}

pub struct Publisher<L: DeliveryLink> {
    session: SessionManager,
    template: TopicTemplate,
    queue: Arc<BoundedDropOldestQueue<QueuedMessage>>,
    link: Arc<L>,
}

impl<L: DeliveryLink> Publisher<L> {
    pub fn new(config: &PublisherConfig, link: Arc<L>) -> Self {
        let session = SessionManager::starting_at(
            config.client_id.clone(),
            config.session_ttl,
            config.fixed_session_id.clone(),
            Utc::now(),
        );
        Self::from_parts(
            session,
            config.topic_template.clone(),
            config.queue_capacity,
            link,
        )
    }

    pub fn from_parts(
        session: SessionManager,
        template: TopicTemplate,
        queue_capacity: NonZeroUsize,
        link: Arc<L>,
    ) -> Self {
        Self {
            session,
            template,
            queue: Arc::new(BoundedDropOldestQueue::new(queue_capacity)),
            link,
        }
    }

    /// Topic for the current session.
    pub fn topic(&self) -> String {
        self.template
            .render(self.session.client_id(), self.session.current_id())
    }

    pub async fn publish_point(&mut self, sample: Sample) -> Delivery {
        self.publish_point_at(sample, Utc::now()).await
    }

    /// Same as [`Publisher::publish_point`] with an explicit clock reading
    /// for session rotation.
    pub async fn publish_point_at(&mut self, sample: Sample, now: DateTime<Utc>) -> Delivery {
        self.session.tick(now);
        let topic = self.topic();

        let payload = match sample.encode() {
            Ok(payload) => payload,
            Err(e) => {
                error!(error = %e, "Dropping sample that could not be encoded");
                return Delivery::Dropped;
            }
        };

        // Older samples go out first: a live send may only overtake an empty queue.
        if !self.queue.is_empty() || self.queue.is_draining() {
            debug!(topic = %topic, queued = self.queue.len(), "Backlog pending, queueing sample");
            self.queue.put(QueuedMessage { topic, payload });
            self.flush_backlog().await;
            return Delivery::Queued;
        }

        match self.link.send(&topic, payload.clone()).await {
            Ok(()) => {
                debug!(topic = %topic, bytes = payload.len(), "Delivered sample");
                Delivery::Delivered
            }
            Err(e) => {
                warn!(error = %e, topic = %topic, "Offline queueing; will resend on reconnect");
                self.queue.put(QueuedMessage { topic, payload });
                // The link may have come up while this send was in flight, after the
                // drainer already found the queue empty.
                if e == LinkError::NotConnected {
                    self.flush_backlog().await;
                }
                Delivery::Queued
            }
        }
    }

    /// Drains the queue from the producer side if the link is up.
    async fn flush_backlog(&self) {
        if self.link.is_connected() {
            self.drainer().drain().await;
        }
    }

    /// A drainer sharing this publisher's queue and link.
    pub fn drainer(&self) -> Drainer<L> {
        Drainer::new(self.queue.clone(), self.link.clone())
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn queue(&self) -> &Arc<BoundedDropOldestQueue<QueuedMessage>> {
        &self.queue
    }

    pub fn link(&self) -> &Arc<L> {
        &self.link
    }
}
