use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::utils::{Error, Result};

/// One geolocation reading from the sensor source.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub lat: f64,
    pub lon: f64,
    pub elevation: Option<f64>,
    pub speed: Option<f64>,
    pub activity: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Sample {
    /// A sample at `lat`/`lon` stamped with the current time.
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            lat,
            lon,
            elevation: None,
            speed: None,
            activity: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_elevation(mut self, elevation: f64) -> Self {
        self.elevation = Some(elevation);
        self
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = Some(speed);
        self
    }

    pub fn with_activity(mut self, activity: impl Into<String>) -> Self {
        self.activity = Some(activity.into());
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Wire view of the sample.
    ///
    /// Non-finite elevation/speed and an empty activity are coerced to
    /// null. Absent fields stay present as null so the schema is fixed.
    pub fn to_payload(&self) -> GeoPayload<'_> {
        GeoPayload {
            lat: self.lat,
            lon: self.lon,
            elevation: self.elevation.filter(|v| v.is_finite()),
            speed: self.speed.filter(|v| v.is_finite()),
            activity: self.activity.as_deref().filter(|a| !a.is_empty()),
            timestamp: self.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        }
    }

    /// Compact JSON bytes for the wire.
    ///
    /// `lat` and `lon` are mandatory numbers; a non-finite coordinate is
    /// rejected rather than sent as null.
    pub fn encode(&self) -> Result<Vec<u8>> {
        if !self.lat.is_finite() || !self.lon.is_finite() {
            return Err(Error::InvalidSample(format!(
                "non-finite position lat={} lon={}",
                self.lat, self.lon
            )));
        }
        Ok(serde_json::to_vec(&self.to_payload())?)
    }
}

/// The only keys allowed on the wire. Nothing that identifies a person.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeoPayload<'a> {
    pub lat: f64,
    pub lon: f64,
    pub elevation: Option<f64>,
    pub speed: Option<f64>,
    pub activity: Option<&'a str>,
    pub timestamp: String,
}
