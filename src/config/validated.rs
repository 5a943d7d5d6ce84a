use std::fmt;
use std::num::NonZeroUsize;
use std::time::Duration;

use chrono::TimeDelta;

use crate::config::Settings;
use crate::link::QosLevel;
use crate::publisher::topic::TopicTemplate;
use crate::utils::{Error, Result};

/// Validated configuration handed to the link and the publisher.
#[derive(Debug, Clone, PartialEq)]
pub struct PublisherConfig {
    pub broker: BrokerAddress,
    pub credentials: Option<Credentials>,
    pub keepalive: Duration,
    pub qos: QosLevel,
    pub max_inflight: u16,
    pub client_id: String,
    pub session_ttl: TimeDelta,
    pub fixed_session_id: Option<String>,
    pub topic_template: TopicTemplate,
    pub queue_capacity: NonZeroUsize,
    pub publish_interval: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerAddress {
    pub host: String,
    pub port: u16,
}

impl BrokerAddress {
    /// Parses `host`, `host:port`, `[v6]:port` or `tcp://host:port`.
    /// `default_port` applies when the address carries none.
    pub fn parse(raw: &str, default_port: u16) -> Result<Self> {
        let raw = raw.trim();
        let rest = match raw.split_once("://") {
            Some((scheme, rest)) => {
                if !matches!(scheme.to_ascii_lowercase().as_str(), "tcp" | "mqtt") {
                    return Err(Error::invalid(
                        "broker.host",
                        format!("unsupported scheme `{scheme}`"),
                    ));
                }
                rest.trim_end_matches('/')
            }
            None => raw,
        };

        if rest.is_empty() {
            return Err(Error::invalid("broker.host", "must not be empty"));
        }
        if rest.contains('/') || rest.chars().any(char::is_whitespace) {
            return Err(Error::invalid(
                "broker.host",
                format!("malformed broker address `{raw}`"),
            ));
        }

        let (host, port) = if let Some(bracketed) = rest.strip_prefix('[') {
            let (host, after) = bracketed.split_once(']').ok_or_else(|| {
                Error::invalid("broker.host", format!("unterminated IPv6 literal in `{raw}`"))
            })?;
            match after {
                "" => (host, None),
                _ => match after.strip_prefix(':') {
                    Some(port) => (host, Some(port)),
                    None => {
                        return Err(Error::invalid(
                            "broker.host",
                            format!("malformed broker address `{raw}`"),
                        ));
                    }
                },
            }
        } else if rest.matches(':').count() == 1 {
            let (host, port) = rest.split_once(':').unwrap_or((rest, ""));
            (host, Some(port))
        } else {
            // bare IPv6 literal or plain host
            (rest, None)
        };

        if host.is_empty() {
            return Err(Error::invalid(
                "broker.host",
                format!("missing host in `{raw}`"),
            ));
        }

        let port = match port {
            Some(port) => parse_port(port)?,
            None => default_port,
        };
        if port == 0 {
            return Err(Error::invalid("broker.port", "must not be 0"));
        }

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }
}

fn parse_port(raw: &str) -> Result<u16> {
    raw.parse::<u16>()
        .map_err(|_| Error::invalid("broker.port", format!("`{raw}` is not a valid port")))
}

impl fmt::Display for BrokerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl TryFrom<&Settings> for PublisherConfig {
    type Error = Error;

    fn try_from(settings: &Settings) -> Result<Self> {
        let broker = BrokerAddress::parse(&settings.broker.host, settings.broker.port)?;

        let credentials = settings
            .broker
            .username
            .as_ref()
            .filter(|u| !u.is_empty())
            .map(|username| Credentials {
                username: username.clone(),
                password: settings.broker.password.clone(),
            });

        // 0 disables keepalive; the client refuses very short intervals
        let keepalive_secs = settings.broker.keepalive_secs;
        if (1..5).contains(&keepalive_secs) || keepalive_secs > u64::from(u16::MAX) {
            return Err(Error::invalid(
                "broker.keepalive_secs",
                format!("must be 0 or between 5 and {}", u16::MAX),
            ));
        }

        let qos = QosLevel::from_level(settings.broker.qos).ok_or_else(|| {
            Error::invalid(
                "broker.qos",
                format!("`{}` is not 0, 1 or 2", settings.broker.qos),
            )
        })?;

        if settings.broker.max_inflight == 0 {
            return Err(Error::invalid("broker.max_inflight", "must be greater than zero"));
        }

        let client_id = settings.session.client_id.trim().to_string();
        if client_id.is_empty() {
            return Err(Error::invalid("session.client_id", "must not be empty"));
        }
        if client_id.contains(['/', '+', '#']) {
            return Err(Error::invalid(
                "session.client_id",
                "must not contain `/`, `+` or `#`",
            ));
        }

        let session_ttl = i64::try_from(settings.session.ttl_hours)
            .ok()
            .and_then(TimeDelta::try_hours)
            .ok_or_else(|| Error::invalid("session.ttl_hours", "out of range"))?;

        let fixed_session_id = settings
            .session
            .session_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string);

        let topic_template = TopicTemplate::new(&settings.publisher.topic_template)?;

        let queue_capacity = NonZeroUsize::new(settings.publisher.max_queue)
            .ok_or_else(|| Error::invalid("publisher.max_queue", "must be greater than zero"))?;

        let interval = settings.publisher.publish_interval_secs;
        if !interval.is_finite() || interval <= 0.0 {
            return Err(Error::invalid(
                "publisher.publish_interval_secs",
                format!("`{interval}` is not a positive number of seconds"),
            ));
        }
        let publish_interval = Duration::try_from_secs_f64(interval).map_err(|e| {
            Error::invalid("publisher.publish_interval_secs", e.to_string())
        })?;

        Ok(Self {
            broker,
            credentials,
            keepalive: Duration::from_secs(keepalive_secs),
            qos,
            max_inflight: settings.broker.max_inflight,
            client_id,
            session_ttl,
            fixed_session_id,
            topic_template,
            queue_capacity,
            publish_interval,
        })
    }
}

impl fmt::Display for PublisherConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "broker            = {}", self.broker)?;
        match &self.credentials {
            Some(c) => writeln!(
                f,
                "credentials       = {} / {}",
                c.username,
                if c.password.is_some() { "********" } else { "<none>" }
            )?,
            None => writeln!(f, "credentials       = <none>")?,
        }
        writeln!(f, "keepalive         = {}s", self.keepalive.as_secs())?;
        writeln!(f, "qos               = {}", self.qos.level())?;
        writeln!(f, "max_inflight      = {}", self.max_inflight)?;
        writeln!(f, "client_id         = {}", self.client_id)?;
        writeln!(f, "session_ttl       = {}h", self.session_ttl.num_hours())?;
        writeln!(
            f,
            "session_id        = {}",
            self.fixed_session_id.as_deref().unwrap_or("<generated>")
        )?;
        writeln!(f, "topic_template    = {}", self.topic_template)?;
        writeln!(f, "queue_capacity    = {}", self.queue_capacity)?;
        write!(
            f,
            "publish_interval  = {}s",
            self.publish_interval.as_secs_f64()
        )
    }
}
