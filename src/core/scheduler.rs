//! Solar-event scheduler and appearance state machine.
//!
//! The scheduler owns at most one [`PendingWakeUp`]. Each call to
//! [`Scheduler::recompute_for_time`] asks the oracle for the current solar
//! state, applies the matching appearance, works out the next sunrise/sunset
//! boundary and re-arms the wake-up for it. Arming always goes through
//! `disarm_then_arm`, so a stale wake-up can never survive a recompute.
//!
//! Failure handling, per cycle:
//! - oracle fails for the reference day: nothing changes, not even the wake-up
//! - actuator fails: a status text explains it, scheduling carries on
//! - oracle fails for tomorrow: a short retry wake-up is armed instead
//! - boundary closer than the minimum lead time: nothing is armed

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::fmt;

use crate::appearance::{AppearanceActuator, AppearanceMode, AutomationError};
use crate::common::constants::*;
use crate::geo::{self, Coordinate, OracleError, SolarOracle, SolarState};
use crate::state::display::{DisplaySink, Icon};

/// The single scheduled re-evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingWakeUp {
    pub fire_at: DateTime<Utc>,
    pub tolerance: Duration,
    /// Coordinate the wake-up was armed for; firing recomputes with it.
    pub coordinate: Coordinate,
}

impl PendingWakeUp {
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        now >= self.fire_at
    }

    /// Fired later than its tolerance allows (missed during suspend or a clock jump).
    pub fn is_late(&self, now: DateTime<Utc>) -> bool {
        now > self.fire_at + self.tolerance
    }
}

/// Which solar boundary comes next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryLabel {
    Rise,
    Set,
}

impl BoundaryLabel {
    fn suffix(&self) -> &'static str {
        match self {
            BoundaryLabel::Rise => "rise",
            BoundaryLabel::Set => "set",
        }
    }
}

/// Time the next wake-up is aimed at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NextBoundary {
    Solar {
        at: DateTime<Utc>,
        label: BoundaryLabel,
    },
    /// Tomorrow's sunrise could not be resolved; try again shortly.
    Retry { at: DateTime<Utc> },
}

impl NextBoundary {
    pub fn at(&self) -> DateTime<Utc> {
        match self {
            NextBoundary::Solar { at, .. } | NextBoundary::Retry { at } => *at,
        }
    }
}

/// What one recompute cycle did.
#[derive(Debug, Clone, PartialEq)]
pub enum RecomputeReport {
    /// The oracle failed for the reference time; nothing was touched.
    Aborted(OracleError),
    Completed {
        mode: AppearanceMode,
        actuator_error: Option<AutomationError>,
        /// `None` when the day has no sunrise or sunset.
        next: Option<NextBoundary>,
        armed: bool,
    },
}

pub struct Scheduler<Z: TimeZone> {
    oracle: Box<dyn SolarOracle>,
    actuator: Box<dyn AppearanceActuator>,
    display: Box<dyn DisplaySink>,
    zone: Z,
    wake_tolerance: Duration,
    pending: Option<PendingWakeUp>,
    displayed_mode: Option<AppearanceMode>,
    debug_enabled: bool,
}

impl<Z> Scheduler<Z>
where
    Z: TimeZone,
    Z::Offset: fmt::Display,
{
    pub fn new(
        oracle: Box<dyn SolarOracle>,
        actuator: Box<dyn AppearanceActuator>,
        display: Box<dyn DisplaySink>,
        zone: Z,
    ) -> Self {
        Self {
            oracle,
            actuator,
            display,
            zone,
            wake_tolerance: Duration::seconds(DEFAULT_WAKE_TOLERANCE_SECS as i64),
            pending: None,
            displayed_mode: None,
            debug_enabled: false,
        }
    }

    pub fn with_wake_tolerance(mut self, tolerance: Duration) -> Self {
        self.wake_tolerance = tolerance;
        self
    }

    pub fn with_debug(mut self, debug_enabled: bool) -> Self {
        self.debug_enabled = debug_enabled;
        self
    }

    pub fn pending_wake_up(&self) -> Option<&PendingWakeUp> {
        self.pending.as_ref()
    }

    /// Mode of the last successful `apply`.
    pub fn displayed_mode(&self) -> Option<AppearanceMode> {
        self.displayed_mode
    }

    pub fn zone(&self) -> &Z {
        &self.zone
    }

    pub fn wake_tolerance(&self) -> Duration {
        self.wake_tolerance
    }

    /// Show a status text that doesn't come from a recompute.
    pub fn show_status(&mut self, text: &str) {
        self.display.set_status_text(text);
    }

    /// Take the pending wake-up if it is due at `now`.
    pub fn take_due_wake_up(&mut self, now: DateTime<Utc>) -> Option<PendingWakeUp> {
        if self.pending.is_some_and(|wake| wake.is_due(now)) {
            self.pending.take()
        } else {
            None
        }
    }

    /// Bring the appearance in line with the sun at `reference` and schedule
    /// the next re-evaluation.
    pub fn recompute_for_time(
        &mut self,
        coordinate: Coordinate,
        reference: DateTime<Utc>,
    ) -> RecomputeReport {
        let state = match self.oracle.solar_state(coordinate, reference) {
            Ok(state) => state,
            Err(e) => {
                log_pipe!();
                log_warning!("Solar calculation failed for {coordinate}: {e}");
                log_indented!("Keeping the current appearance and schedule");
                return RecomputeReport::Aborted(e);
            }
        };

        if self.debug_enabled {
            self.log_state(&state);
        }

        let mode = AppearanceMode::for_daytime(state.is_daytime);
        let actuator_error = self.apply(mode);

        let (Some(sunrise), Some(sunset)) = (state.sunrise, state.sunset) else {
            self.disarm_then_arm(None);
            log_pipe!();
            log_info!(
                "No sunrise or sunset today ({}), nothing scheduled",
                if state.is_daytime { "polar day" } else { "polar night" }
            );
            return RecomputeReport::Completed {
                mode,
                actuator_error,
                next: None,
                armed: false,
            };
        };

        let next = if reference < sunrise {
            NextBoundary::Solar {
                at: sunrise,
                label: BoundaryLabel::Rise,
            }
        } else if state.is_daytime {
            NextBoundary::Solar {
                at: sunset,
                label: BoundaryLabel::Set,
            }
        } else {
            match self.tomorrow_sunrise(coordinate, reference) {
                Some(at) => NextBoundary::Solar {
                    at,
                    label: BoundaryLabel::Rise,
                },
                None => NextBoundary::Retry {
                    at: reference + Duration::seconds(ORACLE_RETRY_DELAY_SECS),
                },
            }
        };

        let armed = if next.at() - reference >= Duration::seconds(MINIMUM_LEAD_TIME_SECS) {
            self.disarm_then_arm(Some(PendingWakeUp {
                fire_at: next.at(),
                tolerance: self.wake_tolerance,
                coordinate,
            }));
            true
        } else {
            self.disarm_then_arm(None);
            if next.at() <= reference {
                log_pipe!();
                log_warning!(
                    "Next boundary {} is not after {}, nothing scheduled",
                    self.local_time(next.at()),
                    self.local_time(reference)
                );
                log_indented!("Waiting for another trigger to re-evaluate");
            } else if self.debug_enabled {
                log_pipe!();
                log_debug!(
                    "Boundary at {} is too close to schedule",
                    self.local_time(next.at())
                );
            }
            false
        };

        // A failure text stays visible until the next successful apply
        if actuator_error.is_none()
            && let NextBoundary::Solar { at, label } = next
        {
            let text = self.boundary_text(label, at);
            self.display.set_status_text(&text);
        }

        RecomputeReport::Completed {
            mode,
            actuator_error,
            next: Some(next),
            armed,
        }
    }

    /// Switch to the opposite of what is displayed, without touching the schedule.
    ///
    /// With nothing displayed yet the current mode counts as light.
    pub fn manual_override(&mut self) -> Result<AppearanceMode, AutomationError> {
        let target = self
            .displayed_mode
            .unwrap_or(AppearanceMode::Light)
            .opposite();

        log_block_start!("Manual override: switching to {target}");

        match self.apply(target) {
            None => Ok(target),
            Some(e) => Err(e),
        }
    }

    fn apply(&mut self, mode: AppearanceMode) -> Option<AutomationError> {
        match self.actuator.apply(mode) {
            Ok(()) => {
                self.displayed_mode = Some(mode);
                self.display.set_icon(Icon::for_mode(mode));
                None
            }
            Err(AutomationError::PermissionDenied) => {
                log_pipe!();
                log_warning!(
                    "Not allowed to switch to {mode} appearance via {}",
                    self.actuator.name()
                );
                self.display.set_status_text(STATUS_AUTOMATION_PERMISSION);
                Some(AutomationError::PermissionDenied)
            }
            Err(AutomationError::Other(reason)) => {
                log_pipe!();
                log_error!("Failed to switch to {mode} appearance: {reason}");
                self.display.set_status_text(STATUS_APPEARANCE_ERROR);
                Some(AutomationError::Other(reason))
            }
        }
    }

    /// Sunrise of the day after `reference` at `coordinate`, queried at that
    /// day's solar noon.
    fn tomorrow_sunrise(
        &self,
        coordinate: Coordinate,
        reference: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        let tomorrow = geo::solar_date(coordinate, reference).succ_opt()?;
        let query = geo::solar_noon(coordinate, tomorrow)?;

        match self.oracle.solar_state(coordinate, query) {
            Ok(state) => {
                if state.sunrise.is_none() {
                    log_pipe!();
                    log_warning!("No sunrise on {tomorrow}, retrying shortly");
                }
                state.sunrise
            }
            Err(e) => {
                log_pipe!();
                log_warning!("Solar calculation for {tomorrow} failed: {e}");
                log_indented!("Retrying in {ORACLE_RETRY_DELAY_SECS} seconds");
                None
            }
        }
    }

    fn disarm_then_arm(&mut self, wake: Option<PendingWakeUp>) {
        if let Some(old) = self.pending.take()
            && self.debug_enabled
        {
            log_pipe!();
            log_debug!("Disarmed wake-up at {}", self.local_time(old.fire_at));
        }

        if let Some(wake) = wake {
            if self.debug_enabled {
                log_pipe!();
                log_debug!("Armed wake-up at {}", self.local_time(wake.fire_at));
            }
            self.pending = Some(wake);
        }
    }

    fn boundary_text(&self, label: BoundaryLabel, at: DateTime<Utc>) -> String {
        format!(
            "Sun{}: {}",
            label.suffix(),
            at.with_timezone(&self.zone).format("%-I:%M %p")
        )
    }

    fn local_time(&self, at: DateTime<Utc>) -> String {
        at.with_timezone(&self.zone)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
    }

    fn log_state(&self, state: &SolarState) {
        log_pipe!();
        log_debug!("Solar state for {}:", state.coordinate);
        log_indented!("As of: {}", self.local_time(state.as_of));
        log_indented!("Daytime: {}", state.is_daytime);
        match (state.sunrise, state.sunset) {
            (Some(sunrise), Some(sunset)) => {
                log_indented!("Sunrise: {}", self.local_time(sunrise));
                log_indented!("Sunset: {}", self.local_time(sunset));
            }
            _ => log_indented!("No sunrise/sunset"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::appearance::{DryRunActuator, MockAppearanceActuator};
    use crate::common::constants::test_constants::*;
    use crate::geo::{MockSolarOracle, SunriseOracle};
    use crate::state::display::DisplayRecorder;
    use chrono::NaiveDate;
    use chrono_tz::America::Los_Angeles;
    use chrono_tz::Tz;
    use mockall::predicate::eq;

    fn sf() -> Coordinate {
        Coordinate::new(SF_LATITUDE, SF_LONGITUDE)
    }

    fn la(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Los_Angeles
            .with_ymd_and_hms(y, m, d, h, min, 0)
            .single()
            .unwrap()
            .with_timezone(&Utc)
    }

    /// San Francisco around the 2023 summer solstice.
    fn solstice_state(coordinate: Coordinate, time: DateTime<Utc>) -> SolarState {
        let date = time.with_timezone(&Los_Angeles).date_naive();
        let (sunrise, sunset) = if date == NaiveDate::from_ymd_opt(2023, 6, 22).unwrap() {
            (la(2023, 6, 22, 5, 47), la(2023, 6, 22, 20, 35))
        } else {
            (la(2023, 6, 21, 5, 48), la(2023, 6, 21, 20, 35))
        };
        SolarState {
            coordinate,
            as_of: time,
            is_daytime: sunrise <= time && time < sunset,
            sunrise: Some(sunrise),
            sunset: Some(sunset),
        }
    }

    fn solstice_oracle() -> MockSolarOracle {
        let mut oracle = MockSolarOracle::new();
        oracle
            .expect_solar_state()
            .returning(|c, t| Ok(solstice_state(c, t)));
        oracle
    }

    fn ok_actuator() -> MockAppearanceActuator {
        let mut actuator = MockAppearanceActuator::new();
        actuator.expect_apply().returning(|_| Ok(()));
        actuator.expect_name().return_const("mock");
        actuator
    }

    fn scheduler(
        oracle: MockSolarOracle,
        actuator: MockAppearanceActuator,
    ) -> (Scheduler<Tz>, DisplayRecorder) {
        let display = DisplayRecorder::new();
        let scheduler = Scheduler::new(
            Box::new(oracle),
            Box::new(actuator),
            Box::new(display.clone()),
            Los_Angeles,
        );
        (scheduler, display)
    }

    #[test]
    fn test_before_sunrise_is_dark_until_sunrise() {
        let mut actuator = MockAppearanceActuator::new();
        actuator
            .expect_apply()
            .with(eq(AppearanceMode::Dark))
            .times(1)
            .returning(|_| Ok(()));
        let (mut scheduler, display) = scheduler(solstice_oracle(), actuator);

        let report = scheduler.recompute_for_time(sf(), la(2023, 6, 21, 4, 0));

        assert_eq!(
            report,
            RecomputeReport::Completed {
                mode: AppearanceMode::Dark,
                actuator_error: None,
                next: Some(NextBoundary::Solar {
                    at: la(2023, 6, 21, 5, 48),
                    label: BoundaryLabel::Rise
                }),
                armed: true,
            }
        );
        assert_eq!(display.icon(), Some(Icon::Night));
        assert_eq!(display.status_text().as_deref(), Some("Sunrise: 5:48 AM"));
    }

    #[test]
    fn test_midday_is_light_until_sunset() {
        let (mut scheduler, display) = scheduler(solstice_oracle(), ok_actuator());

        scheduler.recompute_for_time(sf(), la(2023, 6, 21, 12, 0));

        let wake = scheduler.pending_wake_up().unwrap();
        assert_eq!(wake.fire_at, la(2023, 6, 21, 20, 35));
        assert_eq!(wake.tolerance, Duration::seconds(60));
        assert_eq!(wake.coordinate, sf());
        assert_eq!(scheduler.displayed_mode(), Some(AppearanceMode::Light));
        assert_eq!(display.icon(), Some(Icon::Day));
        assert_eq!(display.status_text().as_deref(), Some("Sunset: 8:35 PM"));
    }

    #[test]
    fn test_after_sunset_waits_for_tomorrows_sunrise() {
        let mut oracle = MockSolarOracle::new();
        oracle
            .expect_solar_state()
            .with(eq(sf()), eq(la(2023, 6, 21, 21, 0)))
            .times(1)
            .returning(|c, t| Ok(solstice_state(c, t)));
        // Tomorrow is queried at solar noon in San Francisco, 13:09:41 PDT
        let solar_noon = la(2023, 6, 22, 13, 9) + Duration::seconds(41);
        oracle
            .expect_solar_state()
            .with(eq(sf()), eq(solar_noon))
            .times(1)
            .returning(|c, t| Ok(solstice_state(c, t)));
        let (mut scheduler, display) = scheduler(oracle, ok_actuator());

        scheduler.recompute_for_time(sf(), la(2023, 6, 21, 21, 0));

        assert_eq!(
            scheduler.pending_wake_up().unwrap().fire_at,
            la(2023, 6, 22, 5, 47)
        );
        assert_eq!(scheduler.displayed_mode(), Some(AppearanceMode::Dark));
        assert_eq!(display.status_text().as_deref(), Some("Sunrise: 5:47 AM"));
    }

    #[test]
    fn test_tomorrow_failure_arms_short_retry() {
        let mut oracle = MockSolarOracle::new();
        oracle
            .expect_solar_state()
            .returning(|c, t| {
                if t >= la(2023, 6, 22, 0, 0) {
                    Err(OracleError::Unresolvable {
                        date: NaiveDate::from_ymd_opt(2023, 6, 22).unwrap(),
                    })
                } else {
                    Ok(solstice_state(c, t))
                }
            });
        let (mut scheduler, display) = scheduler(oracle, ok_actuator());

        let report = scheduler.recompute_for_time(sf(), la(2023, 6, 21, 21, 0));

        assert_eq!(
            report,
            RecomputeReport::Completed {
                mode: AppearanceMode::Dark,
                actuator_error: None,
                next: Some(NextBoundary::Retry {
                    at: la(2023, 6, 21, 21, 1)
                }),
                armed: true,
            }
        );
        assert_eq!(
            scheduler.pending_wake_up().unwrap().fire_at,
            la(2023, 6, 21, 21, 1)
        );
        assert!(display.status_texts().is_empty());
        assert_eq!(display.icon(), Some(Icon::Night));
    }

    #[test]
    fn test_permission_denied_still_schedules() {
        let mut actuator = MockAppearanceActuator::new();
        actuator
            .expect_apply()
            .returning(|_| Err(AutomationError::PermissionDenied));
        actuator.expect_name().return_const("mock");
        let (mut scheduler, display) = scheduler(solstice_oracle(), actuator);

        scheduler.recompute_for_time(sf(), la(2023, 6, 21, 12, 0));

        assert_eq!(
            scheduler.pending_wake_up().unwrap().fire_at,
            la(2023, 6, 21, 20, 35)
        );
        assert_eq!(display.icon(), None);
        assert_eq!(
            display.status_texts(),
            vec![STATUS_AUTOMATION_PERMISSION.to_string()]
        );
        assert_eq!(scheduler.displayed_mode(), None);
    }

    #[test]
    fn test_other_actuator_error_shows_generic_text() {
        let mut actuator = MockAppearanceActuator::new();
        actuator
            .expect_apply()
            .returning(|_| Err(AutomationError::Other("no session bus".into())));
        actuator.expect_name().return_const("mock");
        let (mut scheduler, display) = scheduler(solstice_oracle(), actuator);

        scheduler.recompute_for_time(sf(), la(2023, 6, 21, 12, 0));

        assert!(scheduler.pending_wake_up().is_some());
        assert_eq!(
            display.status_texts(),
            vec![STATUS_APPEARANCE_ERROR.to_string()]
        );
    }

    #[test]
    fn test_oracle_failure_changes_nothing() {
        let (mut scheduler, display) = scheduler(solstice_oracle(), ok_actuator());
        scheduler.recompute_for_time(sf(), la(2023, 6, 21, 12, 0));
        let armed = *scheduler.pending_wake_up().unwrap();
        display.clear();

        // Swap in an oracle that always fails and an actuator that must not be called
        let mut failing = MockSolarOracle::new();
        failing.expect_solar_state().returning(|c, _| {
            Err(OracleError::InvalidCoordinate {
                latitude: c.latitude,
                longitude: c.longitude,
            })
        });
        let mut untouched = MockAppearanceActuator::new();
        untouched.expect_apply().times(0);
        scheduler.oracle = Box::new(failing);
        scheduler.actuator = Box::new(untouched);

        let report = scheduler.recompute_for_time(sf(), la(2023, 6, 21, 13, 0));

        assert!(matches!(report, RecomputeReport::Aborted(_)));
        assert_eq!(scheduler.pending_wake_up(), Some(&armed));
        assert!(display.updates().is_empty());
    }

    #[test]
    fn test_polar_day_disarms_pending_wake_up() {
        let (mut scheduler, _display) = scheduler(solstice_oracle(), ok_actuator());
        scheduler.recompute_for_time(sf(), la(2023, 6, 21, 12, 0));
        assert!(scheduler.pending_wake_up().is_some());

        let mut polar = MockSolarOracle::new();
        polar.expect_solar_state().returning(|c, t| {
            Ok(SolarState {
                coordinate: c,
                as_of: t,
                is_daytime: true,
                sunrise: None,
                sunset: None,
            })
        });
        scheduler.oracle = Box::new(polar);

        let report = scheduler.recompute_for_time(sf(), la(2023, 6, 21, 13, 0));

        assert_eq!(
            report,
            RecomputeReport::Completed {
                mode: AppearanceMode::Light,
                actuator_error: None,
                next: None,
                armed: false,
            }
        );
        assert!(scheduler.pending_wake_up().is_none());
    }

    #[test]
    fn test_boundary_too_close_is_not_armed() {
        let (mut scheduler, display) = scheduler(solstice_oracle(), ok_actuator());
        scheduler.recompute_for_time(sf(), la(2023, 6, 21, 12, 0));

        // 30 seconds before sunset
        let reference = la(2023, 6, 21, 20, 35) - Duration::seconds(30);
        let report = scheduler.recompute_for_time(sf(), reference);

        assert!(matches!(
            report,
            RecomputeReport::Completed { armed: false, .. }
        ));
        assert!(scheduler.pending_wake_up().is_none());
        assert_eq!(display.status_text().as_deref(), Some("Sunset: 8:35 PM"));
    }

    #[test]
    fn test_exactly_minimum_lead_is_armed() {
        let (mut scheduler, _display) = scheduler(solstice_oracle(), ok_actuator());
        let reference = la(2023, 6, 21, 20, 34);

        scheduler.recompute_for_time(sf(), reference);

        assert_eq!(
            scheduler.pending_wake_up().unwrap().fire_at,
            la(2023, 6, 21, 20, 35)
        );
    }

    #[test]
    fn test_boundary_in_the_past_is_not_armed() {
        // Answers with the 21st whatever day is asked for
        let mut stale = MockSolarOracle::new();
        stale.expect_solar_state().returning(|c, t| {
            let sunrise = la(2023, 6, 21, 5, 48);
            let sunset = la(2023, 6, 21, 20, 35);
            Ok(SolarState {
                coordinate: c,
                as_of: t,
                is_daytime: sunrise <= t && t < sunset,
                sunrise: Some(sunrise),
                sunset: Some(sunset),
            })
        });
        let (mut scheduler, _display) = scheduler(stale, ok_actuator());
        scheduler.recompute_for_time(sf(), la(2023, 6, 21, 12, 0));
        assert!(scheduler.pending_wake_up().is_some());

        let reference = la(2023, 6, 21, 21, 0);
        let report = scheduler.recompute_for_time(sf(), reference);

        let RecomputeReport::Completed {
            mode,
            next: Some(next),
            armed,
            ..
        } = report
        else {
            panic!("expected a completed recompute");
        };
        assert_eq!(mode, AppearanceMode::Dark);
        assert!(next.at() <= reference);
        assert!(!armed);
        assert!(scheduler.pending_wake_up().is_none());
    }

    #[test]
    fn test_display_zone_does_not_move_the_solar_day() {
        let display = DisplayRecorder::new();
        let mut scheduler = Scheduler::new(
            Box::new(SunriseOracle::new()),
            Box::new(DryRunActuator::new()),
            Box::new(display.clone()),
            chrono_tz::Europe::Oslo,
        );

        // 16:00 PDT is already 01:00 on the 22nd in Oslo
        scheduler.recompute_for_time(sf(), la(2023, 6, 21, 16, 0));

        assert_eq!(scheduler.displayed_mode(), Some(AppearanceMode::Light));
        let sunset = scheduler.pending_wake_up().unwrap().fire_at;
        assert!(sunset > la(2023, 6, 21, 20, 30) && sunset < la(2023, 6, 21, 20, 40));
        // Rendered in the display zone: 20:35 PDT is 05:35 CEST
        assert!(display.status_text().unwrap().starts_with("Sunset: 5:3"));

        scheduler.recompute_for_time(sf(), la(2023, 6, 21, 21, 0));

        assert_eq!(scheduler.displayed_mode(), Some(AppearanceMode::Dark));
        let sunrise = scheduler.pending_wake_up().unwrap().fire_at;
        assert!(sunrise > la(2023, 6, 22, 5, 40) && sunrise < la(2023, 6, 22, 5, 55));
    }

    #[test]
    fn test_recompute_replaces_pending_wake_up() {
        let (mut scheduler, _display) = scheduler(solstice_oracle(), ok_actuator());
        let other = Coordinate::new(40.7128, -74.0060);

        scheduler.recompute_for_time(sf(), la(2023, 6, 21, 4, 0));
        scheduler.recompute_for_time(other, la(2023, 6, 21, 12, 0));

        let wake = scheduler.pending_wake_up().unwrap();
        assert_eq!(wake.fire_at, la(2023, 6, 21, 20, 35));
        assert_eq!(wake.coordinate, other);
    }

    #[test]
    fn test_manual_override_flips_without_rescheduling() {
        let (mut scheduler, display) = scheduler(solstice_oracle(), ok_actuator());
        scheduler.recompute_for_time(sf(), la(2023, 6, 21, 12, 0));
        let armed = *scheduler.pending_wake_up().unwrap();

        assert_eq!(scheduler.manual_override(), Ok(AppearanceMode::Dark));
        assert_eq!(scheduler.displayed_mode(), Some(AppearanceMode::Dark));
        assert_eq!(display.icon(), Some(Icon::Night));
        // Boundary text is left as it was
        assert_eq!(display.status_text().as_deref(), Some("Sunset: 8:35 PM"));
        assert_eq!(scheduler.pending_wake_up(), Some(&armed));

        assert_eq!(scheduler.manual_override(), Ok(AppearanceMode::Light));
    }

    #[test]
    fn test_manual_override_with_nothing_displayed_goes_dark() {
        let oracle = MockSolarOracle::new();
        let (mut scheduler, _display) = scheduler(oracle, ok_actuator());
        assert_eq!(scheduler.manual_override(), Ok(AppearanceMode::Dark));
    }

    #[test]
    fn test_manual_override_failure_keeps_displayed_mode() {
        let mut actuator = MockAppearanceActuator::new();
        let mut calls = 0;
        actuator.expect_apply().returning(move |_| {
            calls += 1;
            if calls == 1 {
                Ok(())
            } else {
                Err(AutomationError::PermissionDenied)
            }
        });
        actuator.expect_name().return_const("mock");
        let (mut scheduler, display) = scheduler(solstice_oracle(), actuator);
        scheduler.recompute_for_time(sf(), la(2023, 6, 21, 12, 0));

        assert_eq!(
            scheduler.manual_override(),
            Err(AutomationError::PermissionDenied)
        );
        assert_eq!(scheduler.displayed_mode(), Some(AppearanceMode::Light));
        assert_eq!(
            display.status_text().as_deref(),
            Some(STATUS_AUTOMATION_PERMISSION)
        );
    }

    #[test]
    fn test_take_due_wake_up() {
        let (mut scheduler, _display) = scheduler(solstice_oracle(), ok_actuator());
        scheduler.recompute_for_time(sf(), la(2023, 6, 21, 12, 0));

        assert!(scheduler.take_due_wake_up(la(2023, 6, 21, 20, 34)).is_none());
        assert!(scheduler.pending_wake_up().is_some());

        let wake = scheduler.take_due_wake_up(la(2023, 6, 21, 20, 35)).unwrap();
        assert_eq!(wake.fire_at, la(2023, 6, 21, 20, 35));
        assert!(scheduler.pending_wake_up().is_none());
    }

    #[test]
    fn test_pending_wake_up_lateness() {
        let wake = PendingWakeUp {
            fire_at: la(2023, 6, 21, 20, 35),
            tolerance: Duration::seconds(60),
            coordinate: sf(),
        };
        assert!(!wake.is_due(la(2023, 6, 21, 20, 34)));
        assert!(wake.is_due(la(2023, 6, 21, 20, 35)));
        assert!(!wake.is_late(la(2023, 6, 21, 20, 36)));
        assert!(wake.is_late(la(2023, 6, 21, 20, 37)));
    }
}
