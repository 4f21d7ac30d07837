//! Application coordinator that manages the complete lifecycle of sunsetter.
//!
//! This module handles resource acquisition, initialization, and orchestration
//! of the core event loop. It manages:
//! - Configuration loading and actuator detection
//! - Lock file management for single-instance enforcement
//! - Signal handler setup and the sleep/clock monitors
//! - The location source and display sinks
//!
//! The configured time zone decides the concrete `Scheduler` type; everything
//! after that point is generic over it.

use anyhow::Result;
use chrono::{Local, TimeZone};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use crate::{
    appearance::{AppearanceActuator, create_actuator, detect_actuator},
    config::Config,
    core::trigger::{TriggerBus, TriggerKind},
    core::{Core, CoreParams, scheduler::Scheduler},
    geo::SunriseOracle,
    io::{dbus, instance, signals::setup_signal_handler},
    location::{FileLocationSource, LocationSource},
    state::display::{self, DisplaySink, JsonStateDisplay, LogDisplay, MultiDisplay},
    time_source::RealTimeSource,
};

/// The sunsetter daemon.
///
/// # Examples
///
/// ```no_run
/// use sunsetter::Sunsetter;
///
/// # fn main() -> anyhow::Result<()> {
/// Sunsetter::new(false).run()?;
/// # Ok(())
/// # }
/// ```
pub struct Sunsetter {
    debug_enabled: bool,
}

/// Everything the core loop needs apart from the time zone.
struct Parts {
    config: Config,
    bus: TriggerBus,
    location: Box<dyn LocationSource>,
    actuator: Box<dyn AppearanceActuator>,
    display: Box<dyn DisplaySink>,
    running: Arc<AtomicBool>,
}

impl Sunsetter {
    pub fn new(debug_enabled: bool) -> Self {
        Self { debug_enabled }
    }

    /// Execute the daemon until a shutdown signal arrives.
    pub fn run(self) -> Result<()> {
        log_version!();
        if self.debug_enabled {
            log_pipe!();
            log_debug!("Debug mode enabled - showing every trigger and recompute");
        }

        let config = Config::load()?;
        let actuator_type = detect_actuator(&config)?;

        // Before any monitor starts, so a second instance stops here
        let _lock = instance::ensure_single_instance()?;

        let running = Arc::new(AtomicBool::new(true));
        let bus = TriggerBus::new(config.subscribed_triggers(), self.debug_enabled);

        setup_signal_handler(bus.sender(), running.clone(), self.debug_enabled)?;
        dbus::start_system_monitors(
            bus.sender(),
            bus.is_subscribed(TriggerKind::Wake),
            bus.is_subscribed(TriggerKind::ClockChange),
            self.debug_enabled,
        );

        config.log_config(Some(actuator_type));
        let actuator = create_actuator(&config, self.debug_enabled)?;

        let location = FileLocationSource::new(
            Config::get_geo_path()?,
            config.coordinate(),
            config.location_disabled(),
            self.debug_enabled,
        );

        let display_path = display::display_state_path();
        let display = MultiDisplay::new()
            .with(LogDisplay)
            .with(JsonStateDisplay::new(display_path.clone()));

        log_block_start!("Lock acquired, starting sunsetter...");

        let time_zone = config.time_zone()?;
        let parts = Parts {
            config,
            bus,
            location: Box::new(location),
            actuator,
            display: Box::new(display),
            running,
        };

        let result = match time_zone {
            Some(tz) => self.run_core(tz, parts),
            None => self.run_core(Local, parts),
        };

        display::clear_display_state(&display_path);
        log_block_start!("sunsetter stopped");
        log_end!();

        result
    }

    fn run_core<Z>(&self, zone: Z, parts: Parts) -> Result<()>
    where
        Z: TimeZone + Send + 'static,
        Z::Offset: fmt::Display,
    {
        let scheduler = Scheduler::new(
            Box::new(SunriseOracle::new()),
            parts.actuator,
            parts.display,
            zone,
        )
        .with_wake_tolerance(parts.config.wake_tolerance())
        .with_debug(self.debug_enabled);

        let core = Core::new(CoreParams {
            scheduler,
            bus: parts.bus,
            location: parts.location,
            tracking_preference: parts.config.tracking_preference(),
            time_source: Arc::new(RealTimeSource),
            running: parts.running,
            debug_enabled: self.debug_enabled,
        });

        core.execute()
    }
}
