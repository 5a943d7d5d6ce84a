use crate::publisher::Sample;

/// Per-sample drift applied to latitude and longitude.
const LAT_STEP: f64 = 0.00005;
const LON_STEP: f64 = 0.00007;

/// Deterministic walking track, stamped with the wall clock.
#[derive(Debug, Clone)]
pub struct SyntheticSensor {
    lat: f64,
    lon: f64,
    elevation: f64,
    speed: f64,
    activity: String,
}

impl SyntheticSensor {
    pub fn starting_at(lat: f64, lon: f64) -> Self {
        Self {
            lat,
            lon,
            ..Self::default()
        }
    }
}

impl Default for SyntheticSensor {
    fn default() -> Self {
        // Stockholm
        Self {
            lat: 59.3293,
            lon: 18.0686,
            elevation: 10.0,
            speed: 1.2,
            activity: "walking".to_string(),
        }
    }
}

impl Iterator for SyntheticSensor {
    type Item = Sample;

    fn next(&mut self) -> Option<Sample> {
        let sample = Sample::new(self.lat, self.lon)
            .with_elevation(self.elevation)
            .with_speed(self.speed)
            .with_activity(self.activity.clone());

        self.lat += LAT_STEP;
        self.lon += LON_STEP;
        Some(sample)
    }
}
