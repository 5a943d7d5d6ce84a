//! MQTT link
//!
//! Wraps a `rumqttc` client/event-loop pair:
//! - `MqttLink::start` builds the client from the validated configuration
//!   and spawns a driver task that polls the event loop
//! - the driver owns the connected flag: it is set on a successful CONNACK
//!   and cleared on any connection error, and each transition is posted as
//!   a `LinkEvent`
//! - after an error the driver sleeps with exponential backoff (1 s doubling
//!   up to 60 s) before polling again, which makes `rumqttc` reconnect
//!
//! Publishes use the configured QoS with the retain flag cleared. A publish
//! completes once the request is queued in the client's request channel.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use rumqttc::{
    AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::config::PublisherConfig;
use crate::link::{DeliveryLink, LinkError, LinkEvent, QosLevel};

/// Capacity of the channel between `AsyncClient` and the event loop.
const REQUEST_CHANNEL_CAPACITY: usize = 64;

/// How long `close` waits for the driver to flush DISCONNECT.
const CLOSE_GRACE: Duration = Duration::from_millis(250);

pub struct MqttLink {
    client: AsyncClient,
    qos: QoS,
    connected: Arc<AtomicBool>,
    driver: JoinHandle<()>,
}

impl MqttLink {
    /// Creates the client and starts the connection driver.
    ///
    /// Must be called inside a tokio runtime. Connection happens in the
    /// background; watch the returned receiver for `LinkEvent::Connected`.
    pub fn start(config: &PublisherConfig) -> (Self, mpsc::UnboundedReceiver<LinkEvent>) {
        let (client, eventloop) = AsyncClient::new(mqtt_options(config), REQUEST_CHANNEL_CAPACITY);
        let connected = Arc::new(AtomicBool::new(false));
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        info!(
            host = %config.broker.host,
            port = config.broker.port,
            qos = %config.qos,
            "Starting MQTT link"
        );

        let driver = tokio::spawn(drive(
            eventloop,
            connected.clone(),
            events_tx,
            Backoff::default(),
        ));

        let link = Self {
            client,
            qos: to_mqtt_qos(config.qos),
            connected,
            driver,
        };
        (link, events_rx)
    }

    /// Sends DISCONNECT and stops the driver. Queued messages are not flushed.
    ///
    /// Fails with [`LinkError::Closed`] when the event loop is already gone.
    pub async fn close(self) -> Result<(), LinkError> {
        self.connected.store(false, Ordering::SeqCst);

        // the request channel only rejects once the event loop has been dropped
        let result = self.client.disconnect().await.map_err(|e| {
            debug!(error = %e, "DISCONNECT not accepted");
            LinkError::Closed
        });

        let mut driver = self.driver;
        if tokio::time::timeout(CLOSE_GRACE, &mut driver).await.is_err() {
            debug!("MQTT driver did not stop in time, aborting");
            driver.abort();
        }
        result
    }
}

impl DeliveryLink for MqttLink {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn send(&self, topic: &str, payload: Vec<u8>) -> Result<(), LinkError> {
        if !self.is_connected() {
            return Err(LinkError::NotConnected);
        }

        self.client
            .publish(topic, self.qos, false, payload)
            .await
            .map_err(|e| LinkError::Publish(e.to_string()))?;

        debug!(topic, "Published");
        Ok(())
    }
}

pub(crate) fn mqtt_options(config: &PublisherConfig) -> MqttOptions {
    let mut options = MqttOptions::new(
        format!("geopub-{}", config.client_id),
        config.broker.host.clone(),
        config.broker.port,
    );
    options.set_keep_alive(config.keepalive);
    options.set_clean_session(true);
    options.set_inflight(config.max_inflight);

    if let Some(credentials) = &config.credentials {
        options.set_credentials(
            credentials.username.clone(),
            credentials.password.clone().unwrap_or_default(),
        );
    }
    options
}

fn to_mqtt_qos(qos: QosLevel) -> QoS {
    match qos {
        QosLevel::AtMostOnce => QoS::AtMostOnce,
        QosLevel::AtLeastOnce => QoS::AtLeastOnce,
        QosLevel::ExactlyOnce => QoS::ExactlyOnce,
    }
}

async fn drive(
    mut eventloop: EventLoop,
    connected: Arc<AtomicBool>,
    events: mpsc::UnboundedSender<LinkEvent>,
    mut backoff: Backoff,
) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                if ack.code == ConnectReturnCode::Success {
                    connected.store(true, Ordering::SeqCst);
                    backoff.reset();
                    info!(session_present = ack.session_present, "Connected to MQTT broker");
                    let _ = events.send(LinkEvent::Connected);
                } else {
                    error!(code = ?ack.code, "MQTT connect refused");
                }
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                connected.store(false, Ordering::SeqCst);
                info!("Disconnected from MQTT broker");
                let _ = events.send(LinkEvent::Disconnected {
                    reason: "client closed".to_string(),
                });
                return;
            }
            Ok(event) => trace!(?event, "MQTT event"),
            Err(e) => {
                if connected.swap(false, Ordering::SeqCst) {
                    warn!(error = %e, "Lost connection to MQTT broker");
                    let _ = events.send(LinkEvent::Disconnected {
                        reason: e.to_string(),
                    });
                } else {
                    error!(error = %e, "MQTT connection attempt failed");
                }

                let delay = backoff.next_delay();
                debug!(?delay, "Waiting before reconnect");
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Exponential reconnect delay.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            current: initial,
        }
    }

    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(60))
    }
}
