use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::link::{DeliveryLink, LinkError, LinkEvent};
use crate::publisher::engine::QueuedMessage;
use crate::queue::{BoundedDropOldestQueue, DrainOutcome};

/// Reacts to link events: every `Connected` flushes the offline queue.
///
/// `run` consumes events one at a time, so drains triggered by it never
/// overlap. The queue's single-drainer flag covers direct `drain` calls.
pub struct Drainer<L: DeliveryLink> {
    queue: Arc<BoundedDropOldestQueue<QueuedMessage>>,
    link: Arc<L>,
}

impl<L: DeliveryLink> Drainer<L> {
    pub fn new(queue: Arc<BoundedDropOldestQueue<QueuedMessage>>, link: Arc<L>) -> Self {
        Self { queue, link }
    }

    /// Re-sends queued messages in enqueue order, each on the topic it was
    /// queued with. Stops at the first failed send; that message is lost
    /// and the rest wait for the next reconnect.
    ///
    /// A message admitted just as a pass finishes is picked up by another
    /// pass while the link stays up.
    pub async fn drain(&self) -> DrainOutcome<LinkError> {
        let mut total = 0;
        loop {
            let outcome = self.drain_once().await;
            total += outcome.drained();
            match outcome {
                DrainOutcome::Completed { .. }
                    if self.link.is_connected() && !self.queue.is_empty() =>
                {
                    debug!(queued = self.queue.len(), "Queue refilled during drain, draining again");
                }
                DrainOutcome::Completed { .. } => {
                    return DrainOutcome::Completed { drained: total };
                }
                DrainOutcome::Halted { error, .. } => {
                    return DrainOutcome::Halted {
                        drained: total,
                        error,
                    };
                }
                DrainOutcome::AlreadyDraining if total == 0 => {
                    return DrainOutcome::AlreadyDraining;
                }
                // another drainer took over after our last pass
                DrainOutcome::AlreadyDraining => {
                    return DrainOutcome::Completed { drained: total };
                }
            }
        }
    }

    async fn drain_once(&self) -> DrainOutcome<LinkError> {
        let link = &self.link;
        let outcome = self
            .queue
            .drain(|msg: QueuedMessage| async move { link.send(&msg.topic, msg.payload).await })
            .await;

        match &outcome {
            DrainOutcome::Completed { drained: 0 } => {}
            DrainOutcome::Completed { drained } => {
                info!(drained, "Drained queued messages");
            }
            DrainOutcome::Halted { drained, error } => {
                error!(
                    drained,
                    remaining = self.queue.len(),
                    error = %error,
                    "Failed while draining queue; failed message dropped"
                );
            }
            DrainOutcome::AlreadyDraining => debug!("Drain already in progress"),
        }
        outcome
    }

    /// Handles one event. Returns the drain outcome for `Connected`.
    pub async fn handle(&self, event: LinkEvent) -> Option<DrainOutcome<LinkError>> {
        match event {
            LinkEvent::Connected => Some(self.drain().await),
            LinkEvent::Disconnected { reason } => {
                warn!(%reason, queued = self.queue.len(), "Link down; buffering samples");
                None
            }
        }
    }

    /// Consumes events until the link drops its sender.
    pub async fn run(self, mut events: mpsc::UnboundedReceiver<LinkEvent>) {
        while let Some(event) = events.recv().await {
            self.handle(event).await;
        }
        debug!("Link event channel closed, drainer stopping");
    }
}
