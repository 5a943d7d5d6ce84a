use serde::Deserialize;
use uuid::Uuid;

use crate::publisher::topic::DEFAULT_TOPIC_TEMPLATE;

/// Top-level configuration settings for the application.
///
/// Raw values as read from files and the environment. They are checked and
/// converted into a `PublisherConfig` before anything connects.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Settings {
    pub broker: BrokerSettings,
    pub session: SessionSettings,
    pub publisher: PublisherSettings,
}

/// Configuration settings for the MQTT broker connection.
///
/// `host` may also carry a port or a `tcp://`/`mqtt://` URL.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct BrokerSettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub keepalive_secs: u64,
    pub qos: u8,
    pub max_inflight: u16,
}

/// Configuration settings for the session identity.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SessionSettings {
    pub client_id: String,
    pub ttl_hours: u64,
    pub session_id: Option<String>,
}

/// Configuration settings for the publishing loop and offline queue.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct PublisherSettings {
    pub topic_template: String,
    pub publish_interval_secs: f64,
    pub max_queue: usize,
}

/// Partial configuration settings loaded from files or environment.
///
/// Allows partial specification of settings. Missing values can be filled using defaults.
#[derive(Debug, Deserialize, Default)]
pub struct PartialSettings {
    pub broker: Option<PartialBrokerSettings>,
    pub session: Option<PartialSessionSettings>,
    pub publisher: Option<PartialPublisherSettings>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialBrokerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub keepalive_secs: Option<u64>,
    pub qos: Option<u8>,
    pub max_inflight: Option<u16>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialSessionSettings {
    pub client_id: Option<String>,
    pub ttl_hours: Option<u64>,
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialPublisherSettings {
    pub topic_template: Option<String>,
    pub publish_interval_secs: Option<f64>,
    pub max_queue: Option<usize>,
}

/// Provides default values for `Settings`.
///
/// The client id is random per process unless configured.
impl Default for Settings {
    fn default() -> Self {
        Self {
            broker: BrokerSettings {
                host: "localhost".to_string(),
                port: 1883,
                username: None,
                password: None,
                keepalive_secs: 60,
                qos: 1,
                max_inflight: 100,
            },
            session: SessionSettings {
                client_id: default_client_id(),
                ttl_hours: 26,
                session_id: None,
            },
            publisher: PublisherSettings {
                topic_template: DEFAULT_TOPIC_TEMPLATE.to_string(),
                publish_interval_secs: 1.0,
                max_queue: 10_000,
            },
        }
    }
}

fn default_client_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("cli-{}", &hex[..12])
}
