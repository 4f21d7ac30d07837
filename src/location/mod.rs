//! Location acquisition and authorization.
//!
//! A [`LocationSource`] knows the current coordinate (if any), whether using it
//! is authorized, and how to keep reporting changes onto the trigger bus once
//! tracking starts. Which tracking mode to request follows from the
//! authorization state and what the source supports; see
//! [`select_tracking_mode`].

pub mod file;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::mpsc::Sender;

use crate::config::TrackingPreference;
use crate::core::trigger::TriggerEvent;
use crate::geo::Coordinate;

pub use file::FileLocationSource;

/// Whether the location may be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationState {
    NotDetermined,
    Authorized,
    Denied,
    Restricted,
}

impl AuthorizationState {
    /// Tracking may be requested and the scheduler may run.
    pub fn permits_tracking(&self) -> bool {
        matches!(
            self,
            AuthorizationState::NotDetermined | AuthorizationState::Authorized
        )
    }
}

impl fmt::Display for AuthorizationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuthorizationState::NotDetermined => "not determined",
            AuthorizationState::Authorized => "authorized",
            AuthorizationState::Denied => "denied",
            AuthorizationState::Restricted => "restricted",
        };
        f.write_str(name)
    }
}

/// How location changes are monitored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingMode {
    /// Report only movements beyond the significant-change threshold.
    SignificantChange,
    /// Poll at a fixed interval and report every change.
    Continuous,
}

impl fmt::Display for TrackingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackingMode::SignificantChange => f.write_str("significant-change"),
            TrackingMode::Continuous => f.write_str("continuous"),
        }
    }
}

/// Tracking mode to request, or `None` when tracking must stop.
pub fn select_tracking_mode(
    authorization: AuthorizationState,
    supports_significant_change: bool,
    preference: TrackingPreference,
) -> Option<TrackingMode> {
    if !authorization.permits_tracking() {
        return None;
    }

    match preference {
        TrackingPreference::Continuous => Some(TrackingMode::Continuous),
        TrackingPreference::Auto | TrackingPreference::Significant => {
            if supports_significant_change {
                Some(TrackingMode::SignificantChange)
            } else {
                Some(TrackingMode::Continuous)
            }
        }
    }
}

/// Provider of coordinates and authorization changes.
pub trait LocationSource: Send {
    fn authorization(&self) -> AuthorizationState;

    /// Freshest coordinate known right now.
    fn current_coordinate(&self) -> Option<Coordinate>;

    fn supports_significant_change(&self) -> bool;

    /// Start reporting `LocationUpdated`/`AuthorizationChanged` events.
    /// Replaces any tracking already running.
    fn start_tracking(&mut self, mode: TrackingMode, events: Sender<TriggerEvent>) -> Result<()>;

    /// Report only `AuthorizationChanged` events, starting from `current`.
    /// Replaces any tracking already running; `stop_tracking` ends it.
    fn watch_authorization(
        &mut self,
        current: AuthorizationState,
        events: Sender<TriggerEvent>,
    ) -> Result<()>;

    /// Stop tracking or authorization watching, whichever is running.
    fn stop_tracking(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permitting_states() {
        assert!(AuthorizationState::NotDetermined.permits_tracking());
        assert!(AuthorizationState::Authorized.permits_tracking());
        assert!(!AuthorizationState::Denied.permits_tracking());
        assert!(!AuthorizationState::Restricted.permits_tracking());
    }

    #[test]
    fn test_prefers_significant_change_when_supported() {
        assert_eq!(
            select_tracking_mode(
                AuthorizationState::Authorized,
                true,
                TrackingPreference::Auto
            ),
            Some(TrackingMode::SignificantChange)
        );
        assert_eq!(
            select_tracking_mode(
                AuthorizationState::NotDetermined,
                false,
                TrackingPreference::Auto
            ),
            Some(TrackingMode::Continuous)
        );
    }

    #[test]
    fn test_continuous_preference_wins() {
        assert_eq!(
            select_tracking_mode(
                AuthorizationState::Authorized,
                true,
                TrackingPreference::Continuous
            ),
            Some(TrackingMode::Continuous)
        );
    }

    #[test]
    fn test_denied_and_restricted_stop_tracking() {
        for state in [AuthorizationState::Denied, AuthorizationState::Restricted] {
            for supported in [true, false] {
                assert_eq!(
                    select_tracking_mode(state, supported, TrackingPreference::Auto),
                    None
                );
            }
        }
    }
}
