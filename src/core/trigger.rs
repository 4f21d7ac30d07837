//! Trigger events and the bus that carries them to the event loop.
//!
//! Monitor threads (signals, logind, timerfd, location tracking) only ever send
//! [`TriggerEvent`]s; the event loop is the single consumer. Which kinds of
//! trigger are honored comes from the `triggers` config list: an unsubscribed
//! kind is never started, and if one of its events arrives anyway the bus drops
//! it before the loop sees it.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

use crate::geo::Coordinate;
use crate::location::AuthorizationState;

/// Kinds of trigger that can be subscribed in the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    Location,
    Authorization,
    ClockChange,
    Wake,
    Timer,
    Manual,
}

impl TriggerKind {
    pub const ALL: [TriggerKind; 6] = [
        TriggerKind::Location,
        TriggerKind::Authorization,
        TriggerKind::ClockChange,
        TriggerKind::Wake,
        TriggerKind::Timer,
        TriggerKind::Manual,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerKind::Location => "location",
            TriggerKind::Authorization => "authorization",
            TriggerKind::ClockChange => "clock_change",
            TriggerKind::Wake => "wake",
            TriggerKind::Timer => "timer",
            TriggerKind::Manual => "manual",
        }
    }
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Something happened that may change the appearance or the schedule.
///
/// Pending wake-ups are not events: the loop keeps their deadline itself.
#[derive(Debug, Clone, PartialEq)]
pub enum TriggerEvent {
    LocationUpdated(Coordinate),
    AuthorizationChanged(AuthorizationState),
    ClockChanged,
    WokeFromSleep,
    ManualOverride,
    /// Always delivered, regardless of subscriptions.
    Shutdown,
}

impl TriggerEvent {
    /// Subscription kind of this event; `None` for control events.
    pub fn kind(&self) -> Option<TriggerKind> {
        match self {
            TriggerEvent::LocationUpdated(_) => Some(TriggerKind::Location),
            TriggerEvent::AuthorizationChanged(_) => Some(TriggerKind::Authorization),
            TriggerEvent::ClockChanged => Some(TriggerKind::ClockChange),
            TriggerEvent::WokeFromSleep => Some(TriggerKind::Wake),
            TriggerEvent::ManualOverride => Some(TriggerKind::Manual),
            TriggerEvent::Shutdown => None,
        }
    }
}

/// Outcome of waiting on the bus.
#[derive(Debug, PartialEq)]
pub enum BusMessage {
    Event(TriggerEvent),
    Timeout,
    Disconnected,
}

/// Single queue of trigger events with subscription filtering.
pub struct TriggerBus {
    sender: Sender<TriggerEvent>,
    receiver: Receiver<TriggerEvent>,
    subscribed: HashSet<TriggerKind>,
    debug_enabled: bool,
}

impl TriggerBus {
    pub fn new(subscribed: impl IntoIterator<Item = TriggerKind>, debug_enabled: bool) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            sender,
            receiver,
            subscribed: subscribed.into_iter().collect(),
            debug_enabled,
        }
    }

    /// Sender handed to monitor threads.
    pub fn sender(&self) -> Sender<TriggerEvent> {
        self.sender.clone()
    }

    pub fn is_subscribed(&self, kind: TriggerKind) -> bool {
        self.subscribed.contains(&kind)
    }

    /// Subscribed kinds in canonical order.
    pub fn subscribed(&self) -> Vec<TriggerKind> {
        TriggerKind::ALL
            .into_iter()
            .filter(|kind| self.subscribed.contains(kind))
            .collect()
    }

    fn accepts(&self, event: &TriggerEvent) -> bool {
        event.kind().is_none_or(|kind| self.is_subscribed(kind))
    }

    /// Wait up to `timeout` for the next accepted event.
    pub fn recv_timeout(&self, timeout: Duration) -> BusMessage {
        let deadline = Instant::now() + timeout;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.receiver.recv_timeout(remaining) {
                Ok(event) if self.accepts(&event) => return BusMessage::Event(event),
                Ok(event) => {
                    if self.debug_enabled {
                        log_pipe!();
                        log_debug!("Dropping unsubscribed trigger: {event:?}");
                    }
                }
                Err(RecvTimeoutError::Timeout) => return BusMessage::Timeout,
                Err(RecvTimeoutError::Disconnected) => return BusMessage::Disconnected,
            }
        }
    }

    /// Next accepted event if one is already queued.
    pub fn try_recv(&self) -> Option<TriggerEvent> {
        while let Ok(event) = self.receiver.try_recv() {
            if self.accepts(&event) {
                return Some(event);
            }
        }
        None
    }
}
