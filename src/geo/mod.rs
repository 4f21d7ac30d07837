//! Solar day/night state for a coordinate.
//!
//! The scheduler only ever asks one question of this module: "at this place and
//! this instant, is it day, and when are the local day's sunrise and sunset?"
//! The answer is a [`SolarState`], computed fresh on every call by a
//! [`SolarOracle`].
//!
//! "Local day" means the calendar day at the coordinate by mean solar time
//! (longitude / 15° from UTC), never the zone the daemon displays times in.
//! A coordinate far from that zone still gets its own sunrise and sunset.
//!
//! - [`solar`]: the production oracle backed by the `sunrise` crate, with a
//!   polar day/night check that yields absent boundaries.

pub mod solar;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::common::constants::EARTH_RADIUS_METERS;

pub use solar::SunriseOracle;


/// Geographic position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Great-circle distance to `other` (haversine).
    pub fn distance_meters(&self, other: &Coordinate) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let d_lat = lat2 - lat1;
        let d_lon = (other.longitude - self.longitude).to_radians();

        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_METERS * a.sqrt().min(1.0).asin()
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ns = if self.latitude >= 0.0 { "N" } else { "S" };
        let ew = if self.longitude >= 0.0 { "E" } else { "W" };
        write!(
            f,
            "{:.4}°{}, {:.4}°{}",
            self.latitude.abs(),
            ns,
            self.longitude.abs(),
            ew
        )
    }
}

/// Mean solar time runs four minutes ahead of UTC per degree east.
const SECONDS_PER_DEGREE: f64 = 240.0;

fn mean_solar_offset(longitude: f64) -> Duration {
    Duration::seconds((longitude * SECONDS_PER_DEGREE).round() as i64)
}

/// Calendar date at `coordinate` by mean solar time.
pub fn solar_date(coordinate: Coordinate, time: DateTime<Utc>) -> NaiveDate {
    (time + mean_solar_offset(coordinate.longitude)).date_naive()
}

/// Mean solar noon of `date` at `coordinate`.
pub fn solar_noon(coordinate: Coordinate, date: NaiveDate) -> Option<DateTime<Utc>> {
    let noon = date.and_hms_opt(12, 0, 0)?.and_utc();
    Some(noon - mean_solar_offset(coordinate.longitude))
}

/// Day/night state at one place and instant.
///
/// `sunrise` and `sunset` belong to the solar day at `coordinate` containing `as_of`.
/// Both are `None` during polar day or polar night.
#[derive(Debug, Clone, PartialEq)]
pub struct SolarState {
    pub coordinate: Coordinate,
    pub as_of: DateTime<Utc>,
    pub is_daytime: bool,
    pub sunrise: Option<DateTime<Utc>>,
    pub sunset: Option<DateTime<Utc>>,
}

/// Why a solar state could not be produced.
#[derive(Debug, Clone, PartialEq)]
pub enum OracleError {
    /// Latitude or longitude out of range or not finite.
    InvalidCoordinate { latitude: f64, longitude: f64 },
    /// The solar calculation gave no usable answer for this date.
    Unresolvable { date: NaiveDate },
}

impl fmt::Display for OracleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OracleError::InvalidCoordinate {
                latitude,
                longitude,
            } => write!(f, "invalid coordinate ({latitude}, {longitude})"),
            OracleError::Unresolvable { date } => {
                write!(f, "no usable sunrise/sunset for {date}")
            }
        }
    }
}

impl std::error::Error for OracleError {}

/// Source of solar day/night state. Must be pure: same inputs, same answer.
#[cfg_attr(test, mockall::automock)]
pub trait SolarOracle: Send {
    fn solar_state(
        &self,
        coordinate: Coordinate,
        time: DateTime<Utc>,
    ) -> Result<SolarState, OracleError>;
}
