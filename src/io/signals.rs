//! Unix signal handling.
//!
//! A background thread turns signals into trigger events:
//!
//! - `SIGUSR1` (sent by `sunsetter toggle`) → manual override
//! - `SIGINT`, `SIGTERM`, `SIGHUP` → shutdown
//!
//! `SIGUSR1` is always registered so a stray toggle can never kill the daemon
//! through the default action; whether it does anything is decided by the
//! trigger subscriptions.

use anyhow::{Context, Result};
use signal_hook::{
    consts::signal::{SIGHUP, SIGINT, SIGTERM, SIGUSR1},
    iterator::Signals,
};
use std::{
    sync::Arc,
    sync::atomic::{AtomicBool, Ordering},
    sync::mpsc::Sender,
    thread,
};

use crate::core::trigger::TriggerEvent;

/// Trigger event a signal maps to.
pub fn event_for_signal(sig: i32) -> Option<TriggerEvent> {
    match sig {
        SIGUSR1 => Some(TriggerEvent::ManualOverride),
        SIGINT | SIGTERM | SIGHUP => Some(TriggerEvent::Shutdown),
        _ => None,
    }
}

/// Register signal handlers and spawn the thread forwarding them to `events`.
///
/// Shutdown signals also clear `running`, so the loop stops even if the
/// shutdown event is never read.
pub fn setup_signal_handler(
    events: Sender<TriggerEvent>,
    running: Arc<AtomicBool>,
    debug_enabled: bool,
) -> Result<()> {
    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP, SIGUSR1])
        .context("failed to register signal handlers")?;

    thread::spawn(move || {
        for sig in signals.forever() {
            let Some(event) = event_for_signal(sig) else {
                continue;
            };

            match sig {
                SIGUSR1 => {
                    log_pipe!();
                    log_info!("Received manual override request");
                }
                SIGINT => {
                    log_pipe!();
                    if debug_enabled {
                        log_info!("Received SIGINT (Ctrl+C), shutting down...");
                    } else {
                        log_info!("Received interrupt signal, shutting down...");
                    }
                }
                SIGTERM => {
                    log_pipe!();
                    log_info!("Received termination request, shutting down...");
                }
                // SIGHUP: the terminal is gone, don't write to it
                _ => {}
            }

            let shutdown = event == TriggerEvent::Shutdown;
            if shutdown {
                running.store(false, Ordering::SeqCst);
            }

            if events.send(event).is_err() || shutdown {
                break;
            }
        }
    });

    Ok(())
}
