//! Shared fakes for the integration tests.
//!
//! `mockall` mocks only exist inside the library's own unit tests, so the
//! scenarios here use small scripted implementations of the capability traits.

#![allow(dead_code)]

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use chrono_tz::America::Los_Angeles;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use sunsetter::appearance::{AppearanceActuator, AppearanceMode, AutomationError};
use sunsetter::core::scheduler::Scheduler;
use sunsetter::geo::{Coordinate, OracleError, SolarOracle, SolarState};
use sunsetter::state::display::DisplayRecorder;

pub const SF: Coordinate = Coordinate {
    latitude: 37.7749,
    longitude: -122.4194,
};

/// Wall-clock time in San Francisco.
pub fn sf(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
    Los_Angeles
        .with_ymd_and_hms(y, m, d, h, min, s)
        .single()
        .unwrap()
        .with_timezone(&Utc)
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Oracle answering from a fixed table of San Francisco days.
#[derive(Clone, Default)]
pub struct ScriptedOracle {
    days: HashMap<NaiveDate, (Option<DateTime<Utc>>, Option<DateTime<Utc>>, bool)>,
    failing: Arc<Mutex<HashSet<NaiveDate>>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedOracle {
    /// Solstice 2023: sunrise 05:48/05:47, sunset 20:35.
    pub fn solstice() -> Self {
        Self::default()
            .with_day(
                date(2023, 6, 21),
                sf(2023, 6, 21, 5, 48, 0),
                sf(2023, 6, 21, 20, 35, 0),
            )
            .with_day(
                date(2023, 6, 22),
                sf(2023, 6, 22, 5, 47, 0),
                sf(2023, 6, 22, 20, 35, 0),
            )
    }

    pub fn with_day(mut self, day: NaiveDate, sunrise: DateTime<Utc>, sunset: DateTime<Utc>) -> Self {
        self.days.insert(day, (Some(sunrise), Some(sunset), false));
        self
    }

    /// A day without boundaries.
    pub fn with_polar_day(mut self, day: NaiveDate, is_daytime: bool) -> Self {
        self.days.insert(day, (None, None, is_daytime));
        self
    }

    pub fn fail_on(&self, day: NaiveDate) {
        self.failing.lock().unwrap().insert(day);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SolarOracle for ScriptedOracle {
    fn solar_state(
        &self,
        coordinate: Coordinate,
        time: DateTime<Utc>,
    ) -> Result<SolarState, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let day = time.with_timezone(&Los_Angeles).date_naive();

        if self.failing.lock().unwrap().contains(&day) {
            return Err(OracleError::Unresolvable { date: day });
        }

        let Some(&(sunrise, sunset, polar_daytime)) = self.days.get(&day) else {
            return Err(OracleError::Unresolvable { date: day });
        };

        let is_daytime = match (sunrise, sunset) {
            (Some(rise), Some(set)) => rise <= time && time < set,
            _ => polar_daytime,
        };

        Ok(SolarState {
            coordinate,
            as_of: time,
            is_daytime,
            sunrise,
            sunset,
        })
    }
}

/// Actuator with a scripted outcome; clones share the log and the outcome.
#[derive(Clone, Default)]
pub struct ScriptedActuator {
    applied: Arc<Mutex<Vec<AppearanceMode>>>,
    outcome: Arc<Mutex<Option<AutomationError>>>,
}

impl ScriptedActuator {
    pub fn fail_with(&self, error: AutomationError) {
        *self.outcome.lock().unwrap() = Some(error);
    }

    pub fn succeed(&self) {
        *self.outcome.lock().unwrap() = None;
    }

    pub fn applied(&self) -> Vec<AppearanceMode> {
        self.applied.lock().unwrap().clone()
    }
}

impl AppearanceActuator for ScriptedActuator {
    fn apply(&mut self, mode: AppearanceMode) -> Result<(), AutomationError> {
        self.applied.lock().unwrap().push(mode);
        match self.outcome.lock().unwrap().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

pub struct Harness {
    pub scheduler: Scheduler<chrono_tz::Tz>,
    pub oracle: ScriptedOracle,
    pub actuator: ScriptedActuator,
    pub display: DisplayRecorder,
}

pub fn harness(oracle: ScriptedOracle) -> Harness {
    sunsetter::logger::Log::set_enabled(false);

    let actuator = ScriptedActuator::default();
    let display = DisplayRecorder::new();
    let scheduler = Scheduler::new(
        Box::new(oracle.clone()),
        Box::new(actuator.clone()),
        Box::new(display.clone()),
        Los_Angeles,
    );

    Harness {
        scheduler,
        oracle,
        actuator,
        display,
    }
}
