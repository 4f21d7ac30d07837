//! Implementation of the simulate command.
//!
//! Runs the real scheduler against a fast-forward clock and a dry-run
//! actuator, stepping from one wake-up to the next until the end time. Every
//! log line is stamped with the simulated time, so the output reads like a
//! daemon log for the chosen range.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Local, TimeZone, Utc};
use std::fmt;
use std::sync::Arc;

use crate::appearance::{AppearanceMode, DryRunActuator};
use crate::config::Config;
use crate::core::scheduler::{RecomputeReport, Scheduler};
use crate::geo::{Coordinate, SunriseOracle};
use crate::location::file::read_location;
use crate::logger::Log;
use crate::state::display::{LogDisplay, MultiDisplay};
use crate::time_source::{self, SimulatedTimeSource, TimeSource};

/// What happened during a simulation run.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SimulationSummary {
    pub recomputes: usize,
    /// Every change of the applied mode, the first apply included
    pub transitions: Vec<(DateTime<Utc>, AppearanceMode)>,
}

impl SimulationSummary {
    fn record(&mut self, at: DateTime<Utc>, report: &RecomputeReport) {
        self.recomputes += 1;
        if let RecomputeReport::Completed {
            mode,
            actuator_error: None,
            ..
        } = report
            && self.transitions.last().is_none_or(|(_, last)| last != mode)
        {
            self.transitions.push((at, *mode));
        }
    }
}

pub fn handle_simulate_command(
    start_time: &str,
    end_time: &str,
    log_file: Option<String>,
    debug_enabled: bool,
) -> Result<()> {
    let config = Config::load()?;

    match config.time_zone()? {
        Some(tz) => simulate_in_zone(tz, &config, start_time, end_time, log_file, debug_enabled),
        None => simulate_in_zone(Local, &config, start_time, end_time, log_file, debug_enabled),
    }
}

fn simulate_in_zone<Z>(
    zone: Z,
    config: &Config,
    start_time: &str,
    end_time: &str,
    log_file: Option<String>,
    debug_enabled: bool,
) -> Result<()>
where
    Z: TimeZone + Send + 'static,
    Z::Offset: fmt::Display,
{
    let start = time_source::parse_datetime_in(start_time, &zone)
        .map_err(|e| anyhow::anyhow!("Invalid start time: {e}"))?
        .with_timezone(&Utc);
    let end = time_source::parse_datetime_in(end_time, &zone)
        .map_err(|e| anyhow::anyhow!("Invalid end time: {e}"))?
        .with_timezone(&Utc);

    if end <= start {
        anyhow::bail!("End time must be after start time");
    }

    let reading = read_location(
        &Config::get_geo_path()?,
        config.coordinate(),
        config.location_disabled(),
    );
    let coordinate = reading
        .coordinate
        .context("No coordinates to simulate with; set them with 'sunsetter geo <lat> <lon>'")?;

    // Must outlive every log line below
    let _log_guard = match log_file {
        Some(file) => Some(Log::start_file_logging(file)?),
        None => None,
    };

    let clock = Arc::new(SimulatedTimeSource::new(start, end));
    Log::set_simulated_clock(clock.clone());

    log_version!();
    log_block_start!("Simulation Mode");
    log_decorated!(
        "Simulating from {} to {}",
        start_time,
        end_time
    );
    let duration = end - start;
    log_indented!(
        "Total simulated time: {} hours {} minutes",
        duration.num_hours(),
        duration.num_minutes() % 60
    );
    log_indented!("Coordinates: {coordinate}");
    log_indented!("Appearance changes are not applied (dry run)");

    let mut scheduler = Scheduler::new(
        Box::new(SunriseOracle::new()),
        Box::new(DryRunActuator::new()),
        Box::new(MultiDisplay::new().with(LogDisplay)),
        zone,
    )
    .with_wake_tolerance(config.wake_tolerance())
    .with_debug(debug_enabled);

    let summary = run_simulation(&mut scheduler, coordinate, &clock);

    log_block_start!("Simulation complete");
    log_indented!("Re-evaluations: {}", summary.recomputes);
    log_indented!("Appearance changes: {}", summary.transitions.len());
    log_end!();
    Ok(())
}

/// Step `scheduler` through the clock's range.
///
/// Each step jumps to the pending wake-up and recomputes with the coordinate it
/// was armed for. With nothing armed (polar day or night, or a boundary too
/// close to schedule) the clock advances a day and recomputes with `coordinate`.
pub fn run_simulation<Z>(
    scheduler: &mut Scheduler<Z>,
    coordinate: Coordinate,
    clock: &SimulatedTimeSource,
) -> SimulationSummary
where
    Z: TimeZone,
    Z::Offset: fmt::Display,
{
    let mut summary = SimulationSummary::default();
    let end = clock.end_time();

    let now = clock.now();
    let report = scheduler.recompute_for_time(coordinate, now);
    summary.record(now, &report);

    loop {
        let now = clock.now();
        let next = scheduler
            .pending_wake_up()
            .map(|wake| wake.fire_at)
            .unwrap_or(now + Duration::days(1));

        if next > end {
            break;
        }

        clock.advance_to(next);
        let at = clock.now();

        let report = match scheduler.take_due_wake_up(at) {
            Some(wake) => scheduler.recompute_for_time(wake.coordinate, at),
            None => scheduler.recompute_for_time(coordinate, at),
        };
        summary.record(at, &report);
    }

    clock.advance_to(end);
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::constants::test_constants::*;
    use crate::state::display::DisplayRecorder;
    use chrono_tz::America::Los_Angeles;
    use chrono_tz::Europe::Oslo;

    fn scheduler<Z>(zone: Z) -> Scheduler<Z>
    where
        Z: TimeZone + Send + 'static,
        Z::Offset: fmt::Display,
    {
        Scheduler::new(
            Box::new(SunriseOracle::new()),
            Box::new(DryRunActuator::new()),
            Box::new(DisplayRecorder::new()),
            zone,
        )
    }

    fn local<Z: TimeZone>(zone: &Z, s: &str) -> DateTime<Utc> {
        time_source::parse_datetime_in(s, zone)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_two_days_in_san_francisco() {
        let start = local(&Los_Angeles, "2023-06-21 00:00:00");
        let end = local(&Los_Angeles, "2023-06-23 00:00:00");
        let clock = SimulatedTimeSource::new(start, end);
        let mut scheduler = scheduler(Los_Angeles);

        let summary = run_simulation(
            &mut scheduler,
            Coordinate::new(SF_LATITUDE, SF_LONGITUDE),
            &clock,
        );

        let modes: Vec<AppearanceMode> = summary.transitions.iter().map(|(_, m)| *m).collect();
        assert_eq!(
            modes,
            vec![
                AppearanceMode::Dark,
                AppearanceMode::Light,
                AppearanceMode::Dark,
                AppearanceMode::Light,
                AppearanceMode::Dark,
            ]
        );

        // Switches happen at the boundaries themselves
        let first_sunrise = summary.transitions[1].0.with_timezone(&Los_Angeles);
        assert_eq!(first_sunrise.format("%Y-%m-%d %H").to_string(), "2023-06-21 05");
        assert!(clock.is_ended());
    }

    #[test]
    fn test_polar_day_steps_daily() {
        let start = local(&Oslo, "2023-06-21 00:00:00");
        let end = local(&Oslo, "2023-06-24 00:00:00");
        let clock = SimulatedTimeSource::new(start, end);
        let mut scheduler = scheduler(Oslo);

        let summary = run_simulation(
            &mut scheduler,
            Coordinate::new(TROMSO_LATITUDE, TROMSO_LONGITUDE),
            &clock,
        );

        assert_eq!(summary.transitions.len(), 1);
        assert_eq!(summary.transitions[0].1, AppearanceMode::Light);
        // Start plus one recompute per simulated day
        assert_eq!(summary.recomputes, 4);
        assert!(scheduler.pending_wake_up().is_none());
    }
}
