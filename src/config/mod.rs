//! Configuration loading.
//!
//! Sources, lowest priority first:
//! 1. built-in defaults (`Settings::default()`)
//! 2. an optional settings file, `config/default.{toml,yaml,json}` unless
//!    another path is given
//! 3. prefixed environment variables, `GEOPUB_<SECTION>__<KEY>`
//!    (for example `GEOPUB_BROKER__PORT=8883`)
//! 4. the flat variable names used by existing device deployments
//!    (`MQTT_BROKER`, `UOS_MAX_QUEUE`, ...), see `FLAT_ENV`
//!
//! Values that fail to parse surface as `Error::Config`; semantic checks
//! happen when converting into `PublisherConfig`.

mod settings;
mod validated;

use config::builder::{ConfigBuilder, DefaultState};
use config::{Config, Environment, File};

use crate::utils::Result;
use settings::PartialSettings;

pub use settings::{BrokerSettings, PublisherSettings, SessionSettings, Settings};
pub use validated::{BrokerAddress, Credentials, PublisherConfig};

pub const DEFAULT_CONFIG_PATH: &str = "config/default";

/// Flat environment variable names and the settings key each one overrides.
pub const FLAT_ENV: &[(&str, &str)] = &[
    ("MQTT_BROKER", "broker.host"),
    ("MQTT_PORT", "broker.port"),
    ("MQTT_USERNAME", "broker.username"),
    ("MQTT_PASSWORD", "broker.password"),
    ("MQTT_KEEPALIVE", "broker.keepalive_secs"),
    ("MQTT_QOS", "broker.qos"),
    ("UOS_CLIENT_ID", "session.client_id"),
    ("UOS_SESSION_TTL_HOURS", "session.ttl_hours"),
    ("UOS_SESSION_ID", "session.session_id"),
    ("UOS_TOPIC_TEMPLATE", "publisher.topic_template"),
    ("UOS_PUBLISH_INTERVAL", "publisher.publish_interval_secs"),
    ("UOS_MAX_QUEUE", "publisher.max_queue"),
];

/// Loads the configuration from the default file and environment variables.
pub fn load_config() -> Result<Settings> {
    load_config_from(DEFAULT_CONFIG_PATH)
}

/// Loads the configuration from `path` (extension optional) and the
/// environment, merged over the defaults.
pub fn load_config_from(path: &str) -> Result<Settings> {
    let builder = Config::builder()
        .add_source(File::with_name(path).required(false))
        .add_source(
            Environment::with_prefix("GEOPUB")
                .prefix_separator("_")
                .separator("__"),
        );

    let config = apply_flat_env(builder)?.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    Ok(merge(partial, Settings::default()))
}

fn apply_flat_env(
    mut builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>> {
    for (var, key) in FLAT_ENV {
        if let Ok(value) = std::env::var(var) {
            if !value.is_empty() {
                builder = builder.set_override(*key, value)?;
            }
        }
    }
    Ok(builder)
}

fn merge(partial: PartialSettings, default: Settings) -> Settings {
    let broker = partial.broker.unwrap_or_default();
    let session = partial.session.unwrap_or_default();
    let publisher = partial.publisher.unwrap_or_default();

    Settings {
        broker: BrokerSettings {
            host: broker.host.unwrap_or(default.broker.host),
            port: broker.port.unwrap_or(default.broker.port),
            username: broker.username.or(default.broker.username),
            password: broker.password.or(default.broker.password),
            keepalive_secs: broker
                .keepalive_secs
                .unwrap_or(default.broker.keepalive_secs),
            qos: broker.qos.unwrap_or(default.broker.qos),
            max_inflight: broker.max_inflight.unwrap_or(default.broker.max_inflight),
        },
        session: SessionSettings {
            client_id: session.client_id.unwrap_or(default.session.client_id),
            ttl_hours: session.ttl_hours.unwrap_or(default.session.ttl_hours),
            session_id: session.session_id.or(default.session.session_id),
        },
        publisher: PublisherSettings {
            topic_template: publisher
                .topic_template
                .unwrap_or(default.publisher.topic_template),
            publish_interval_secs: publisher
                .publish_interval_secs
                .unwrap_or(default.publisher.publish_interval_secs),
            max_queue: publisher.max_queue.unwrap_or(default.publisher.max_queue),
        },
    }
}
