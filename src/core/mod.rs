//! Core event loop.
//!
//! `Core` owns the [`Scheduler`], the [`TriggerBus`] and the location source,
//! and processes trigger events strictly one at a time:
//!
//! - location updates, clock changes and wake from sleep recompute with the
//!   freshest coordinate and the current time
//! - authorization changes re-select the tracking mode, then recompute if a
//!   coordinate is known and tracking is permitted; while location may not be
//!   tracked the source keeps watching authorization alone
//! - the manual trigger flips the appearance without touching the schedule
//! - the pending wake-up is a deadline the loop waits for itself; when due it
//!   recomputes with the coordinate it was armed for
//!
//! The loop waits in slices no longer than the wake tolerance and compares
//! against wall-clock time, so a deadline that passed during suspend or a
//! clock jump still fires within one slice.

pub mod scheduler;
pub mod trigger;

use anyhow::Result;
use chrono::TimeZone;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::common::constants::*;
use crate::config::TrackingPreference;
use crate::geo::Coordinate;
use crate::location::{AuthorizationState, LocationSource, TrackingMode, select_tracking_mode};
use crate::time_source::TimeSource;
use scheduler::{RecomputeReport, Scheduler};
use trigger::{BusMessage, TriggerBus, TriggerEvent, TriggerKind};

/// Dependencies of a [`Core`].
pub struct CoreParams<Z: TimeZone> {
    pub scheduler: Scheduler<Z>,
    pub bus: TriggerBus,
    pub location: Box<dyn LocationSource>,
    pub tracking_preference: TrackingPreference,
    pub time_source: Arc<dyn TimeSource>,
    pub running: Arc<AtomicBool>,
    pub debug_enabled: bool,
}

pub struct Core<Z: TimeZone> {
    scheduler: Scheduler<Z>,
    bus: TriggerBus,
    location: Box<dyn LocationSource>,
    tracking_preference: TrackingPreference,
    tracking: Option<TrackingMode>,
    watching_authorization: bool,
    coordinate: Option<Coordinate>,
    authorization: AuthorizationState,
    time_source: Arc<dyn TimeSource>,
    running: Arc<AtomicBool>,
    debug_enabled: bool,
}

impl<Z> Core<Z>
where
    Z: TimeZone,
    Z::Offset: fmt::Display,
{
    pub fn new(params: CoreParams<Z>) -> Self {
        Self {
            scheduler: params.scheduler,
            bus: params.bus,
            location: params.location,
            tracking_preference: params.tracking_preference,
            tracking: None,
            watching_authorization: false,
            coordinate: None,
            authorization: AuthorizationState::NotDetermined,
            time_source: params.time_source,
            running: params.running,
            debug_enabled: params.debug_enabled,
        }
    }

    pub fn scheduler(&self) -> &Scheduler<Z> {
        &self.scheduler
    }

    pub fn coordinate(&self) -> Option<Coordinate> {
        self.coordinate
    }

    pub fn authorization(&self) -> AuthorizationState {
        self.authorization
    }

    pub fn tracking(&self) -> Option<TrackingMode> {
        self.tracking
    }

    /// Run until shutdown.
    pub fn execute(mut self) -> Result<()> {
        self.start();
        self.main_loop();
        self.shutdown();
        Ok(())
    }

    /// Seed location state, start tracking and set the initial appearance.
    pub fn start(&mut self) {
        self.authorization = self.location.authorization();
        self.coordinate = self.location.current_coordinate();

        log_block_start!("Location authorization: {}", self.authorization);
        match self.coordinate {
            Some(coordinate) => log_indented!("Coordinates: {coordinate}"),
            None => log_indented!("Coordinates: not known yet"),
        }

        self.apply_tracking();

        if self.authorization.permits_tracking() && self.coordinate.is_some() {
            self.recompute();
        } else if self.coordinate.is_none() && self.authorization.permits_tracking() {
            log_pipe!();
            log_info!("Waiting for a location before scheduling");
        }
    }

    fn main_loop(&mut self) {
        while self.running.load(Ordering::SeqCst) {
            self.check_wake_up();

            match self.bus.recv_timeout(self.next_wait()) {
                BusMessage::Event(event) => self.handle_event(event),
                BusMessage::Timeout => {}
                BusMessage::Disconnected => {
                    log_pipe!();
                    log_warning!("Trigger bus disconnected, stopping");
                    break;
                }
            }
        }
    }

    fn shutdown(&mut self) {
        let tracking = self.tracking.take().is_some();
        if tracking || std::mem::take(&mut self.watching_authorization) {
            self.location.stop_tracking();
        }
    }

    /// How long the loop may block before it has to look at the clock again.
    pub fn next_wait(&self) -> Duration {
        let slice = self
            .scheduler
            .wake_tolerance()
            .to_std()
            .unwrap_or(Duration::from_secs(DEFAULT_WAKE_TOLERANCE_SECS));

        match self.scheduler.pending_wake_up() {
            Some(wake) => {
                let until = (wake.fire_at - self.time_source.now())
                    .to_std()
                    .unwrap_or(Duration::ZERO);
                until.min(slice)
            }
            None => slice,
        }
    }

    /// Fire the pending wake-up if it is due. Returns whether one fired.
    pub fn check_wake_up(&mut self) -> bool {
        let now = self.time_source.now();
        let Some(wake) = self.scheduler.take_due_wake_up(now) else {
            return false;
        };

        if !self.bus.is_subscribed(TriggerKind::Timer) {
            if self.debug_enabled {
                log_pipe!();
                log_debug!("Timer trigger not subscribed, dropping wake-up");
            }
            return false;
        }

        if !self.authorization.permits_tracking() {
            if self.debug_enabled {
                log_pipe!();
                log_debug!("Location not authorized, dropping wake-up");
            }
            return false;
        }

        if wake.is_late(now) {
            log_pipe!();
            log_info!(
                "Scheduled wake-up fired {} seconds late",
                (now - wake.fire_at).num_seconds()
            );
        } else if self.debug_enabled {
            log_pipe!();
            log_debug!("Scheduled wake-up fired");
        }

        let report = self.scheduler.recompute_for_time(wake.coordinate, now);
        self.report(report);
        true
    }

    pub fn handle_event(&mut self, event: TriggerEvent) {
        if self.debug_enabled {
            log_pipe!();
            log_debug!("Trigger: {event:?}");
        }

        match event {
            TriggerEvent::LocationUpdated(coordinate) => {
                self.coordinate = Some(coordinate);
                if self.authorization.permits_tracking() {
                    self.recompute();
                }
            }
            TriggerEvent::AuthorizationChanged(state) => {
                self.authorization = state;
                // The source may have moved on while we weren't listening
                if state.permits_tracking()
                    && let Some(coordinate) = self.location.current_coordinate()
                {
                    self.coordinate = Some(coordinate);
                }
                self.apply_tracking();
                if state.permits_tracking() && self.coordinate.is_some() {
                    self.recompute();
                }
            }
            TriggerEvent::ClockChanged => {
                log_block_start!("System clock changed, re-evaluating");
                self.recompute();
            }
            TriggerEvent::WokeFromSleep => {
                log_block_start!("Resumed from sleep, re-evaluating");
                self.recompute();
            }
            TriggerEvent::ManualOverride => {
                if let Err(e) = self.scheduler.manual_override() {
                    log_pipe!();
                    log_warning!("Manual override failed: {e}");
                }
            }
            TriggerEvent::Shutdown => {
                log_block_start!("Shutdown requested");
                self.running.store(false, Ordering::SeqCst);
            }
        }
    }

    /// Recompute with the freshest coordinate at the current time.
    fn recompute(&mut self) {
        if !self.authorization.permits_tracking() {
            return;
        }
        let Some(coordinate) = self.coordinate else {
            return;
        };

        let now = self.time_source.now();
        let report = self.scheduler.recompute_for_time(coordinate, now);
        self.report(report);
    }

    fn report(&self, report: RecomputeReport) {
        if !self.debug_enabled {
            return;
        }
        log_pipe!();
        match report {
            RecomputeReport::Aborted(e) => log_debug!("Recompute aborted: {e}"),
            RecomputeReport::Completed {
                mode, next, armed, ..
            } => log_debug!(
                "Recompute: mode {mode}, next {:?}, armed {armed}",
                next.map(|n| n.at())
            ),
        }
    }

    /// Start, switch or stop location tracking to match the authorization.
    /// Without tracking, authorization alone is watched.
    fn apply_tracking(&mut self) {
        let wanted = if self.bus.is_subscribed(TriggerKind::Location) {
            select_tracking_mode(
                self.authorization,
                self.location.supports_significant_change(),
                self.tracking_preference,
            )
        } else {
            if self.debug_enabled {
                log_pipe!();
                log_debug!("Location trigger not subscribed, not tracking");
            }
            None
        };

        if !self.authorization.permits_tracking() {
            log_pipe!();
            log_warning!("Location use is {}, nothing will be scheduled", self.authorization);
            self.scheduler.show_status(STATUS_LOCATION_PERMISSION);
        }

        match wanted {
            Some(mode) if self.tracking == Some(mode) => {}
            Some(mode) => self.start_tracking(mode),
            None => self.watch_authorization(),
        }
    }

    fn watch_authorization(&mut self) {
        let was_running = self.tracking.take().is_some() || self.watching_authorization;
        self.watching_authorization = false;

        if !self.bus.is_subscribed(TriggerKind::Authorization) {
            if was_running {
                self.location.stop_tracking();
            }
            return;
        }

        match self
            .location
            .watch_authorization(self.authorization, self.bus.sender())
        {
            Ok(()) => {
                self.watching_authorization = true;
                if self.debug_enabled {
                    log_pipe!();
                    log_debug!("Watching location authorization ({})", self.authorization);
                }
            }
            Err(e) => {
                log_pipe!();
                log_warning!("Cannot watch location authorization: {e}");
                log_indented!("Restart sunsetter after granting access");
            }
        }
    }

    fn start_tracking(&mut self, mode: TrackingMode) {
        match self.location.start_tracking(mode, self.bus.sender()) {
            Ok(()) => {
                log_block_start!("Location tracking: {mode}");
                self.tracking = Some(mode);
                self.watching_authorization = false;
            }
            Err(e) if mode == TrackingMode::SignificantChange => {
                log_pipe!();
                log_warning!("Significant-change tracking unavailable: {e}");
                log_indented!("Falling back to polling");
                self.start_tracking(TrackingMode::Continuous);
            }
            Err(e) => {
                log_pipe!();
                log_warning!("Location tracking unavailable: {e}");
                self.tracking = None;
            }
        }
    }
}
