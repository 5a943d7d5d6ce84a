//! Scripted in-memory link for tests and local dry runs.
//!
//! `connect`/`disconnect` flip the connected flag and post the matching
//! `LinkEvent`, like the MQTT driver does. Sends made while connected consume
//! outcomes from a script; once the script is exhausted every send succeeds.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;

use crate::link::{DeliveryLink, LinkError, LinkEvent};

/// A message accepted by [`MockLink::send`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl SentMessage {
    pub fn json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::from_slice(&self.payload)
    }
}

#[derive(Debug)]
pub struct MockLink {
    connected: AtomicBool,
    events: mpsc::UnboundedSender<LinkEvent>,
    script: Mutex<VecDeque<Result<(), LinkError>>>,
    sent: Mutex<Vec<SentMessage>>,
    attempts: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockLink {
    /// Creates a disconnected link and the receiver for its events.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<LinkEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let link = Self {
            connected: AtomicBool::new(false),
            events,
            script: Mutex::new(VecDeque::new()),
            sent: Mutex::new(Vec::new()),
            attempts: AtomicUsize::new(0),
        };
        (link, rx)
    }

    pub fn connect(&self) {
        self.connected.store(true, Ordering::SeqCst);
        let _ = self.events.send(LinkEvent::Connected);
    }

    pub fn disconnect(&self, reason: &str) {
        self.connected.store(false, Ordering::SeqCst);
        let _ = self.events.send(LinkEvent::Disconnected {
            reason: reason.to_string(),
        });
    }

    /// Queues outcomes for the next connected sends, in order.
    pub fn script<I>(&self, outcomes: I)
    where
        I: IntoIterator<Item = Result<(), LinkError>>,
    {
        lock(&self.script).extend(outcomes);
    }

    /// Makes the `n`-th upcoming connected send (1-based) fail.
    pub fn fail_nth(&self, n: usize, error: LinkError) {
        let mut outcomes: Vec<_> = (1..n).map(|_| Ok(())).collect();
        outcomes.push(Err(error));
        self.script(outcomes);
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        lock(&self.sent).clone()
    }

    /// Number of `send` calls, successful or not.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl DeliveryLink for MockLink {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn send(&self, topic: &str, payload: Vec<u8>) -> Result<(), LinkError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        if !self.is_connected() {
            return Err(LinkError::NotConnected);
        }

        let scripted = lock(&self.script).pop_front();
        if let Some(Err(error)) = scripted {
            return Err(error);
        }

        lock(&self.sent).push(SentMessage {
            topic: topic.to_string(),
            payload,
        });
        Ok(())
    }
}
