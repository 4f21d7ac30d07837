//! Sleep/resume and clock-change monitoring.
//!
//! - Wake from sleep: systemd-logind `PrepareForSleep(false)` over the system
//!   bus (zbus blocking API) → [`TriggerEvent::WokeFromSleep`]
//! - Clock changes: a far-future `CLOCK_REALTIME` timerfd armed with
//!   `TFD_TIMER_CANCEL_ON_SET` → [`TriggerEvent::ClockChanged`]
//! - Time zone changes: a `notify` watch on `/etc/localtime`, which setting the
//!   clock never touches → [`TriggerEvent::ClockChanged`]
//!
//! Each monitor runs in its own thread and is only started when its trigger
//! kind is subscribed; both clock monitors belong to the clock-change kind. Resuming also jumps the realtime clock, so clock events
//! during sleep or shortly after resume are suppressed; the wake event already
//! covers them.

use anyhow::{Context, Result};
use nix::errno::Errno;
use nix::sys::time::TimeSpec;
use nix::sys::timerfd::{ClockId, Expiration, TimerFd, TimerFlags, TimerSetTimeFlags};
use notify::{
    Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher,
};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use zbus::blocking::Connection;

use crate::common::constants::*;
use crate::core::trigger::TriggerEvent;

/// D-Bus proxy for the systemd-logind Manager interface.
#[zbus::proxy(
    interface = "org.freedesktop.login1.Manager",
    default_service = "org.freedesktop.login1",
    default_path = "/org/freedesktop/login1"
)]
trait LogindManager {
    /// `start` is true before suspending and false after resuming.
    #[zbus(signal)]
    fn prepare_for_sleep(&self, start: bool) -> zbus::Result<()>;
}

/// Sleep state shared between the two monitors.
#[derive(Clone, Default)]
pub(crate) struct SleepTracker {
    is_sleeping: Arc<AtomicBool>,
    /// Unix seconds of the last resume, 0 if none yet
    resume_time: Arc<AtomicI64>,
}

impl SleepTracker {
    fn current_timestamp() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64
    }

    pub(crate) fn mark_sleeping(&self) {
        self.is_sleeping.store(true, Ordering::SeqCst);
    }

    pub(crate) fn mark_resumed_at(&self, timestamp: i64) {
        self.resume_time.store(timestamp, Ordering::SeqCst);
        self.is_sleeping.store(false, Ordering::SeqCst);
    }

    /// Whether a clock change seen at `now` should be ignored.
    pub(crate) fn suppresses_clock_change_at(&self, now: i64) -> bool {
        if self.is_sleeping.load(Ordering::SeqCst) {
            return true;
        }
        let resume_time = self.resume_time.load(Ordering::SeqCst);
        resume_time != 0 && (now - resume_time) <= RESUME_GRACE_PERIOD_SECS
    }
}

/// Start the monitors for the subscribed kinds.
///
/// Failures only cost the affected trigger; they are logged, never returned.
pub fn start_system_monitors(
    events: Sender<TriggerEvent>,
    wake_enabled: bool,
    clock_enabled: bool,
    debug_enabled: bool,
) {
    let sleep_tracker = SleepTracker::default();

    if wake_enabled {
        let events = events.clone();
        let sleep_tracker = sleep_tracker.clone();
        thread::spawn(move || run_sleep_monitor(events, sleep_tracker, debug_enabled));
    }

    if clock_enabled {
        let zone_events = events.clone();
        thread::spawn(move || {
            let zone_file = PathBuf::from(LOCALTIME_PATH);
            if let Err(e) = monitor_time_zone_changes(&zone_file, zone_events, debug_enabled) {
                log_pipe!();
                log_warning!("Time zone monitor error: {e}");
                log_indented!("Time zone changes will not be detected");
            }
        });

        thread::spawn(move || {
            if let Err(e) = monitor_time_changes(events, debug_enabled, sleep_tracker) {
                log_pipe!();
                log_warning!("Time change monitor error: {e}");
                log_indented!("System clock changes will not be detected");
            }
        });
    }
}

/// Sleep monitor with bounded restarts after D-Bus errors.
fn run_sleep_monitor(events: Sender<TriggerEvent>, sleep_tracker: SleepTracker, debug_enabled: bool) {
    let mut restart_count: u8 = 0;

    loop {
        match monitor_sleep_signals(events.clone(), debug_enabled, sleep_tracker.clone()) {
            Ok(()) => {
                if debug_enabled {
                    log_pipe!();
                    log_debug!("Sleep monitor thread exiting normally");
                }
                return;
            }
            Err(e) => {
                log_pipe!();
                log_warning!("Sleep monitor error: {e}");

                if restart_count >= MAX_MONITOR_RESTARTS {
                    log_indented!("Maximum restart attempts reached for sleep monitor");
                    log_indented!("Wake from sleep will not be detected");
                    return;
                }

                restart_count += 1;
                log_indented!(
                    "Will restart D-Bus monitor (attempt {}/{})",
                    restart_count,
                    MAX_MONITOR_RESTARTS
                );
                thread::sleep(Duration::from_millis(MONITOR_RESTART_DELAY_MS));
            }
        }
    }
}

fn monitor_sleep_signals(
    events: Sender<TriggerEvent>,
    debug_enabled: bool,
    sleep_tracker: SleepTracker,
) -> Result<()> {
    let connection = Connection::system().context("Failed to connect to system D-Bus")?;

    let logind_proxy =
        LogindManagerProxyBlocking::new(&connection).context("Failed to create logind proxy")?;

    let mut sleep_signals = logind_proxy
        .receive_prepare_for_sleep()
        .context("Failed to subscribe to PrepareForSleep signals")?;

    if debug_enabled {
        log_pipe!();
        log_debug!("Subscribed to systemd-logind PrepareForSleep signals");
    }

    loop {
        let Some(signal) = sleep_signals.next() else {
            anyhow::bail!("D-Bus connection lost - PrepareForSleep signal stream ended");
        };

        match signal.args() {
            Ok(args) if args.start => {
                sleep_tracker.mark_sleeping();
                log_pipe!();
                log_info!("System entering sleep/suspend mode");
            }
            Ok(_) => {
                sleep_tracker.mark_resumed_at(SleepTracker::current_timestamp());
                log_pipe!();
                log_info!("System resumed from sleep/suspend");

                if events.send(TriggerEvent::WokeFromSleep).is_err() {
                    // Event loop is gone
                    return Ok(());
                }
            }
            Err(e) => {
                log_pipe!();
                log_warning!("Failed to parse PrepareForSleep signal args: {e}");
            }
        }
    }
}

/// Far-future realtime timer that only ever fires when the clock is set.
struct TimeChangeDetector {
    timer: TimerFd,
}

impl TimeChangeDetector {
    fn new() -> nix::Result<Self> {
        let timer = TimerFd::new(ClockId::CLOCK_REALTIME, TimerFlags::empty())?;
        let mut detector = TimeChangeDetector { timer };
        detector.arm_timer()?;
        Ok(detector)
    }

    fn arm_timer(&mut self) -> nix::Result<()> {
        let flags =
            TimerSetTimeFlags::TFD_TIMER_ABSTIME | TimerSetTimeFlags::TFD_TIMER_CANCEL_ON_SET;

        // i64::MAX seconds would overflow inside the kernel
        let far_future = TimeSpec::new(i64::MAX / 1000, 0);

        self.timer.set(Expiration::OneShot(far_future), flags)?;
        Ok(())
    }

    /// Block until the clock is set. Expiration and `ECANCELED` both count.
    fn wait_for_time_change(&mut self) -> Result<()> {
        match self.timer.wait() {
            Ok(()) | Err(Errno::ECANCELED) => {
                self.arm_timer().context("Failed to re-arm timer")?;
                Ok(())
            }
            Err(other_error) => Err(anyhow::anyhow!("Timer wait error: {other_error}")),
        }
    }
}

fn monitor_time_changes(
    events: Sender<TriggerEvent>,
    debug_enabled: bool,
    sleep_tracker: SleepTracker,
) -> Result<()> {
    let mut detector =
        TimeChangeDetector::new().context("Failed to create time change detector")?;

    if debug_enabled {
        log_pipe!();
        log_debug!("Watching for system clock changes");
    }

    loop {
        detector
            .wait_for_time_change()
            .context("Time change detection failed")?;

        if sleep_tracker.suppresses_clock_change_at(SleepTracker::current_timestamp()) {
            if debug_enabled {
                log_pipe!();
                log_debug!("Ignoring clock change caused by sleep/resume");
            }
            continue;
        }

        log_pipe!();
        log_info!("System time changed (clock adjustment/NTP/manual)");

        if events.send(TriggerEvent::ClockChanged).is_err() {
            return Ok(());
        }
    }
}

/// Watches the directory holding the zone symlink, since replacing the
/// symlink would orphan a watch on the file itself.
struct TimeZoneWatcher {
    _watcher: RecommendedWatcher,
    changes: Receiver<()>,
}

impl TimeZoneWatcher {
    fn new(zone_file: &Path) -> Result<Self> {
        let dir = zone_file
            .parent()
            .context("Time zone file has no parent directory")?;
        let file_name: OsString = zone_file
            .file_name()
            .context("Time zone file has no file name")?
            .to_os_string();

        let (tx, changes) = mpsc::channel();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
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
        .context("Failed to create time zone watcher")?;

        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch {}", dir.display()))?;

        Ok(Self {
            _watcher: watcher,
            changes,
        })
    }

    /// Wait up to `timeout` for the zone file to change; a burst counts once.
    fn wait_for_change(&self, timeout: Duration) -> Result<(), RecvTimeoutError> {
        self.changes.recv_timeout(timeout)?;
        thread::sleep(Duration::from_millis(TIME_ZONE_DEBOUNCE_MS));
        while self.changes.try_recv().is_ok() {}
        Ok(())
    }
}

fn monitor_time_zone_changes(
    zone_file: &Path,
    events: Sender<TriggerEvent>,
    debug_enabled: bool,
) -> Result<()> {
    let watcher = TimeZoneWatcher::new(zone_file)?;

    if debug_enabled {
        log_pipe!();
        log_debug!("Watching {} for time zone changes", zone_file.display());
    }

    loop {
        match watcher.wait_for_change(Duration::from_secs(60)) {
            Ok(()) => {
                log_pipe!();
                log_info!("System time zone changed");

                if events.send(TriggerEvent::ClockChanged).is_err() {
                    return Ok(());
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                anyhow::bail!("Time zone watcher stopped delivering events")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_zone_symlink_replacement_is_a_change() {
        let dir = tempdir().unwrap();
        let zone_file = dir.path().join("localtime");
        std::os::unix::fs::symlink("/usr/share/zoneinfo/UTC", &zone_file).unwrap();
        let watcher = TimeZoneWatcher::new(&zone_file).unwrap();

        // Other files in the directory don't count
        fs::write(dir.path().join("hostname"), "workstation\n").unwrap();
        assert_eq!(
            watcher.wait_for_change(Duration::from_millis(700)),
            Err(RecvTimeoutError::Timeout)
        );

        fs::remove_file(&zone_file).unwrap();
        std::os::unix::fs::symlink("/usr/share/zoneinfo/Europe/Oslo", &zone_file).unwrap();

        assert_eq!(watcher.wait_for_change(Duration::from_secs(5)), Ok(()));
    }

    #[test]
    fn test_time_zone_change_sends_clock_changed() {
        let dir = tempdir().unwrap();
        let zone_file = dir.path().join("localtime");
        fs::write(&zone_file, "TZif").unwrap();
        let (tx, rx) = mpsc::channel();

        let monitored = zone_file.clone();
        thread::spawn(move || monitor_time_zone_changes(&monitored, tx, false));
        // Let the watch get established
        thread::sleep(Duration::from_millis(300));

        fs::write(&zone_file, "TZif2").unwrap();

        assert_eq!(
            rx.recv_timeout(Duration::from_secs(5)).unwrap(),
            TriggerEvent::ClockChanged
        );
    }

    #[test]
    fn test_clock_changes_pass_without_sleep() {
        let tracker = SleepTracker::default();
        assert!(!tracker.suppresses_clock_change_at(1_700_000_000));
    }

    #[test]
    fn test_clock_changes_suppressed_while_sleeping() {
        let tracker = SleepTracker::default();
        tracker.mark_sleeping();
        assert!(tracker.suppresses_clock_change_at(1_700_000_000));
    }

    #[test]
    fn test_resume_grace_period() {
        let tracker = SleepTracker::default();
        tracker.mark_sleeping();
        tracker.mark_resumed_at(1_700_000_000);

        assert!(tracker.suppresses_clock_change_at(1_700_000_000 + RESUME_GRACE_PERIOD_SECS));
        assert!(!tracker.suppresses_clock_change_at(
            1_700_000_000 + RESUME_GRACE_PERIOD_SECS + 1
        ));
    }
}
