//! Location from the configuration, overridable by a watched `geo.toml`.
//!
//! The coordinate comes from `geo.toml` when it holds both latitude and
//! longitude, otherwise from the main config. Authorization is derived from
//! what can be read:
//!
//! - `location = "disabled"` → `Restricted`
//! - `geo.toml` exists but may not be read → `Denied`
//! - no coordinate anywhere → `NotDetermined`
//! - otherwise → `Authorized`
//!
//! Significant-change tracking watches the directory holding `geo.toml` with
//! `notify` and reports moves of at least `SIGNIFICANT_CHANGE_METERS`.
//! Continuous tracking re-reads the file every `LOCATION_POLL_INTERVAL_SECS`
//! and reports any change.
//!
//! While location use is not permitted only authorization is watched, the
//! same way, so that making `geo.toml` readable again is noticed.

use anyhow::{Context, Result};
use notify::{
    Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::{AuthorizationState, LocationSource, TrackingMode};
use crate::common::constants::*;
use crate::common::utils::private_path;
use crate::config::GeoConfig;
use crate::core::trigger::TriggerEvent;
use crate::geo::Coordinate;

/// How often tracking threads check whether they should stop.
const STOP_CHECK_INTERVAL: Duration = Duration::from_millis(250);

/// Result of reading the location files once.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationReading {
    pub authorization: AuthorizationState,
    pub coordinate: Option<Coordinate>,
}

/// Read `geo_path`, falling back to `config_coordinate`.
pub fn read_location(
    geo_path: &Path,
    config_coordinate: Option<Coordinate>,
    disabled: bool,
) -> LocationReading {
    if disabled {
        return LocationReading {
            authorization: AuthorizationState::Restricted,
            coordinate: None,
        };
    }

    let coordinate = match fs::read_to_string(geo_path) {
        Ok(content) => match toml::from_str::<GeoConfig>(&content) {
            Ok(GeoConfig {
                latitude: Some(latitude),
                longitude: Some(longitude),
            }) => {
                let coordinate = Coordinate::new(latitude, longitude);
                if coordinate.is_valid() {
                    Some(coordinate)
                } else {
                    log_warning!(
                        "Ignoring out-of-range coordinates in {}",
                        private_path(geo_path)
                    );
                    config_coordinate
                }
            }
            Ok(_) => config_coordinate,
            Err(e) => {
                log_warning!("Failed to parse {}: {e}", private_path(geo_path));
                config_coordinate
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return LocationReading {
                authorization: AuthorizationState::Denied,
                coordinate: None,
            };
        }
        Err(_) => config_coordinate,
    };

    LocationReading {
        authorization: if coordinate.is_some() {
            AuthorizationState::Authorized
        } else {
            AuthorizationState::NotDetermined
        },
        coordinate,
    }
}

/// Tracks what has been reported so only real changes are sent.
struct Reporter {
    events: Sender<TriggerEvent>,
    last: LocationReading,
    threshold_meters: f64,
    /// `false` reports authorization changes only.
    track_coordinates: bool,
}

impl Reporter {
    /// Send events for differences from the last reading. `false` once the
    /// receiving side is gone.
    fn report(&mut self, reading: LocationReading) -> bool {
        if reading.authorization != self.last.authorization {
            log_pipe!();
            log_info!("Location authorization is now {}", reading.authorization);
            if self
                .events
                .send(TriggerEvent::AuthorizationChanged(reading.authorization))
                .is_err()
            {
                return false;
            }
            self.last.authorization = reading.authorization;
        }

        if self.track_coordinates
            && let Some(new) = reading.coordinate
        {
            let moved = match self.last.coordinate {
                None => true,
                Some(old) if self.threshold_meters > 0.0 => {
                    old.distance_meters(&new) >= self.threshold_meters
                }
                Some(old) => old != new,
            };

            if moved {
                log_pipe!();
                log_info!("Location changed to {new}");
                if self.events.send(TriggerEvent::LocationUpdated(new)).is_err() {
                    return false;
                }
                self.last.coordinate = Some(new);
            }
        }

        true
    }
}

struct Tracker {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

pub struct FileLocationSource {
    geo_path: PathBuf,
    config_coordinate: Option<Coordinate>,
    disabled: bool,
    tracker: Option<Tracker>,
    debug_enabled: bool,
}

impl FileLocationSource {
    pub fn new(
        geo_path: PathBuf,
        config_coordinate: Option<Coordinate>,
        disabled: bool,
        debug_enabled: bool,
    ) -> Self {
        Self {
            geo_path,
            config_coordinate,
            disabled,
            tracker: None,
            debug_enabled,
        }
    }

    fn read(&self) -> LocationReading {
        read_location(&self.geo_path, self.config_coordinate, self.disabled)
    }

    fn spawn_significant_change(
        &self,
        reporter: Reporter,
        stop: Arc<AtomicBool>,
    ) -> Result<JoinHandle<()>> {
        let watch_dir = self
            .geo_path
            .parent()
            .map(Path::to_path_buf)
            .context("Location file has no parent directory")?;
        let file_name = self
            .geo_path
            .file_name()
            .map(|n| n.to_os_string())
            .context("Location file has no file name")?;

        let (tx, rx) = std::sync::mpsc::channel();
        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| {
                if let Ok(event) = res
                    && matches!(
                        event.kind,
                        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
                    )
                    && event
                        .paths
                        .iter()
                        .any(|p| p.file_name() == Some(file_name.as_os_str()))
                {
                    let _ = tx.send(());
                }
            },
            NotifyConfig::default(),
        )
        .context("Failed to create location file watcher")?;

        watcher
            .watch(&watch_dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch {}", private_path(&watch_dir)))?;

        if self.debug_enabled {
            log_pipe!();
            log_debug!("Watching {} for location changes", private_path(&self.geo_path));
        }

        let geo_path = self.geo_path.clone();
        let config_coordinate = self.config_coordinate;
        let disabled = self.disabled;
        let mut reporter = reporter;

        Ok(thread::spawn(move || {
            // The watcher stops when dropped, so it lives in this thread
            let _watcher = watcher;

            while !stop.load(Ordering::SeqCst) {
                match rx.recv_timeout(STOP_CHECK_INTERVAL) {
                    Ok(()) => {
                        // Let editors finish writing, then collapse the burst
                        thread::sleep(Duration::from_millis(LOCATION_DEBOUNCE_MS));
                        while rx.try_recv().is_ok() {}

                        let reading = read_location(&geo_path, config_coordinate, disabled);
                        if !reporter.report(reading) {
                            break;
                        }
                    }
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        }))
    }

    fn spawn_continuous(&self, reporter: Reporter, stop: Arc<AtomicBool>) -> JoinHandle<()> {
        let geo_path = self.geo_path.clone();
        let config_coordinate = self.config_coordinate;
        let disabled = self.disabled;
        let interval = Duration::from_secs(LOCATION_POLL_INTERVAL_SECS);
        let mut reporter = reporter;

        if self.debug_enabled {
            log_pipe!();
            log_debug!(
                "Polling {} every {}s for location changes",
                private_path(&self.geo_path),
                LOCATION_POLL_INTERVAL_SECS
            );
        }

        thread::spawn(move || {
            let mut next_poll = Instant::now() + interval;

            while !stop.load(Ordering::SeqCst) {
                if Instant::now() >= next_poll {
                    let reading = read_location(&geo_path, config_coordinate, disabled);
                    if !reporter.report(reading) {
                        break;
                    }
                    next_poll = Instant::now() + interval;
                }
                thread::sleep(STOP_CHECK_INTERVAL);
            }
        })
    }
}

impl LocationSource for FileLocationSource {
    fn authorization(&self) -> AuthorizationState {
        self.read().authorization
    }

    fn current_coordinate(&self) -> Option<Coordinate> {
        self.read().coordinate
    }

    fn supports_significant_change(&self) -> bool {
        self.geo_path.parent().is_some_and(Path::is_dir)
    }

    fn start_tracking(&mut self, mode: TrackingMode, events: Sender<TriggerEvent>) -> Result<()> {
        self.stop_tracking();

        let threshold_meters = match mode {
            TrackingMode::SignificantChange => SIGNIFICANT_CHANGE_METERS,
            TrackingMode::Continuous => 0.0,
        };
        let reporter = Reporter {
            events,
            last: self.read(),
            threshold_meters,
            track_coordinates: true,
        };
        let stop = Arc::new(AtomicBool::new(false));

        let handle = match mode {
            TrackingMode::SignificantChange => {
                self.spawn_significant_change(reporter, stop.clone())?
            }
            TrackingMode::Continuous => self.spawn_continuous(reporter, stop.clone()),
        };

        self.tracker = Some(Tracker { stop, handle });
        Ok(())
    }

    fn watch_authorization(
        &mut self,
        current: AuthorizationState,
        events: Sender<TriggerEvent>,
    ) -> Result<()> {
        self.stop_tracking();

        // Nothing at runtime can lift a restriction from the config
        if self.disabled {
            return Ok(());
        }

        let reporter = Reporter {
            events,
            last: LocationReading {
                authorization: current,
                coordinate: None,
            },
            threshold_meters: 0.0,
            track_coordinates: false,
        };
        let stop = Arc::new(AtomicBool::new(false));

        let handle = if self.supports_significant_change() {
            self.spawn_significant_change(reporter, stop.clone())?
        } else {
            self.spawn_continuous(reporter, stop.clone())
        };

        self.tracker = Some(Tracker { stop, handle });
        Ok(())
    }

    fn stop_tracking(&mut self) {
        if let Some(tracker) = self.tracker.take() {
            tracker.stop.store(true, Ordering::SeqCst);
            let _ = tracker.handle.join();
        }
    }
}

impl Drop for FileLocationSource {
    fn drop(&mut self) {
        self.stop_tracking();
    }
}
