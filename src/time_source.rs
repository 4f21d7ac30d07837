//! Time source abstraction for real and simulated time.
//!
//! The event loop and the simulate command read "now" through a `TimeSource`
//! so that schedules can be exercised without waiting for real time to pass.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use std::sync::Mutex;

/// Trait for abstracting the wall clock.
pub trait TimeSource: Send + Sync {
    /// Current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// The system wall clock.
pub struct RealTimeSource;

impl TimeSource for RealTimeSource {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Fast-forward clock: time only moves when `advance_to` is called and never
/// passes the configured end.
pub struct SimulatedTimeSource {
    current: Mutex<DateTime<Utc>>,
    end_time: DateTime<Utc>,
}

impl SimulatedTimeSource {
    pub fn new(start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> Self {
        Self {
            current: Mutex::new(start_time.min(end_time)),
            end_time,
        }
    }

    /// Jump forward to `target`, capped at the end time. Moving backwards is ignored.
    pub fn advance_to(&self, target: DateTime<Utc>) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        if target > *current {
            *current = target.min(self.end_time);
        }
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        self.end_time
    }

    /// Check if the simulation has reached its end time
    pub fn is_ended(&self) -> bool {
        self.now() >= self.end_time
    }
}

impl TimeSource for SimulatedTimeSource {
    fn now(&self) -> DateTime<Utc> {
        *self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Parse a "YYYY-MM-DD HH:MM:SS" wall-clock time in `zone`.
pub fn parse_datetime_in<Z: TimeZone>(s: &str, zone: &Z) -> Result<DateTime<Z>, String> {
    let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map_err(|e| format!("Invalid datetime format: {e}. Use YYYY-MM-DD HH:MM:SS"))?;

    zone.from_local_datetime(&naive)
        .single()
        .ok_or_else(|| format!("Ambiguous or invalid local time: {s}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn instant(s: &str) -> DateTime<Utc> {
        parse_datetime_in(s, &Utc).unwrap()
    }

    #[test]
    fn test_simulated_clock_starts_at_start_time() {
        let clock = SimulatedTimeSource::new(
            instant("2024-03-01 06:00:00"),
            instant("2024-03-02 06:00:00"),
        );
        assert_eq!(clock.now(), instant("2024-03-01 06:00:00"));
        assert!(!clock.is_ended());
    }

    #[test]
    fn test_simulated_clock_never_moves_backwards() {
        let start = instant("2024-03-01 06:00:00");
        let clock = SimulatedTimeSource::new(start, start + Duration::days(1));

        clock.advance_to(start + Duration::hours(3));
        clock.advance_to(start + Duration::hours(1));

        assert_eq!(clock.now(), start + Duration::hours(3));
    }

    #[test]
    fn test_simulated_clock_caps_at_end() {
        let start = instant("2024-03-01 06:00:00");
        let end = start + Duration::hours(2);
        let clock = SimulatedTimeSource::new(start, end);

        clock.advance_to(end + Duration::hours(5));

        assert_eq!(clock.now(), end);
        assert!(clock.is_ended());
    }

    #[test]
    fn test_parse_datetime_rejects_bad_format() {
        assert!(parse_datetime_in("2024-03-01T06:00", &Utc).is_err());
    }

    #[test]
    fn test_parse_datetime_in_named_zone() {
        let tz = chrono_tz::America::Los_Angeles;
        let parsed = parse_datetime_in("2023-06-21 12:00:00", &tz).unwrap();
        assert_eq!(parsed.with_timezone(&Utc), instant("2023-06-21 19:00:00"));
    }

    #[test]
    fn test_parse_datetime_rejects_skipped_local_time() {
        // 02:30 does not exist on the spring-forward day
        let tz = chrono_tz::America::Los_Angeles;
        assert!(parse_datetime_in("2024-03-10 02:30:00", &tz).is_err());
    }
}
