//! Sunrise/sunset calculation backed by the `sunrise` crate.
//!
//! The crate itself has no notion of polar day or polar night, so before asking
//! it for event times we check whether the sun crosses the horizon at all on
//! the requested date. The check uses the standard hour-angle formula with an
//! approximate solar declination; when the sun never rises or never sets the
//! state carries no boundaries and `is_daytime` reflects which of the two it is.
//!
//! The day asked about is the coordinate's own (see [`super::solar_date`]), so
//! the oracle needs no time zone.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use sunrise::{Coordinates, SolarDay, SolarEvent};

use super::{Coordinate, OracleError, SolarOracle, SolarState, solar_date};

/// Sun's altitude at sunrise/sunset: refraction plus the solar disc radius.
const HORIZON_ALTITUDE_DEGREES: f64 = -0.833;

const AXIAL_TILT_DEGREES: f64 = 23.44;

/// Whether the sun stays above or below the horizon all day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PolarCondition {
    Day,
    Night,
}

/// Classify `date` at `latitude` as polar day, polar night, or neither.
pub(crate) fn polar_condition(latitude: f64, date: NaiveDate) -> Option<PolarCondition> {
    let day_of_year = date.ordinal() as f64;
    let declination = -AXIAL_TILT_DEGREES.to_radians()
        * ((2.0 * std::f64::consts::PI / 365.0) * (day_of_year + 10.0)).cos();
    let lat = latitude.to_radians();

    let cos_ha = (HORIZON_ALTITUDE_DEGREES.to_radians().sin() - lat.sin() * declination.sin())
        / (lat.cos() * declination.cos());

    if cos_ha < -1.0 {
        Some(PolarCondition::Day)
    } else if cos_ha > 1.0 {
        Some(PolarCondition::Night)
    } else {
        None
    }
}

/// Event times far away from the requested date mean the calculation degenerated.
fn is_plausible(date: NaiveDate, sunrise: DateTime<Utc>, sunset: DateTime<Utc>) -> bool {
    let Some(midnight) = date.and_hms_opt(0, 0, 0) else {
        return false;
    };
    let midnight = midnight.and_utc();
    let earliest = midnight - Duration::days(1);
    let latest = midnight + Duration::days(2);

    sunrise < sunset
        && (earliest..latest).contains(&sunrise)
        && (earliest..latest).contains(&sunset)
}

/// Oracle answering for the solar day of the queried instant at the coordinate.
#[derive(Debug, Clone, Copy, Default)]
pub struct SunriseOracle;

impl SunriseOracle {
    pub fn new() -> Self {
        Self
    }
}

impl SolarOracle for SunriseOracle {
    fn solar_state(
        &self,
        coordinate: Coordinate,
        time: DateTime<Utc>,
    ) -> Result<SolarState, OracleError> {
        let invalid = || OracleError::InvalidCoordinate {
            latitude: coordinate.latitude,
            longitude: coordinate.longitude,
        };

        if !coordinate.is_valid() {
            return Err(invalid());
        }

        let date = solar_date(coordinate, time);

        if let Some(condition) = polar_condition(coordinate.latitude, date) {
            return Ok(SolarState {
                coordinate,
                as_of: time,
                is_daytime: condition == PolarCondition::Day,
                sunrise: None,
                sunset: None,
            });
        }

        let coords = Coordinates::new(coordinate.latitude, coordinate.longitude).ok_or_else(invalid)?;
        let solar_day = SolarDay::new(coords, date);
        let sunrise = solar_day.event_time(SolarEvent::Sunrise);
        let sunset = solar_day.event_time(SolarEvent::Sunset);

        if !is_plausible(date, sunrise, sunset) {
            return Err(OracleError::Unresolvable { date });
        }

        Ok(SolarState {
            coordinate,
            as_of: time,
            is_daytime: sunrise <= time && time < sunset,
            sunrise: Some(sunrise),
            sunset: Some(sunset),
        })
    }
}
