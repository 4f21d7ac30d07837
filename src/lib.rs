//! # Sunsetter Library
//!
//! Internal library for the sunsetter binary: switches the desktop between
//! light and dark appearance at local sunrise and sunset.
//!
//! This library exists to enable testing of the scheduling internals and to
//! keep CLI dispatch (main.rs) apart from application logic.
//!
//! ## Architecture
//!
//! - **Entry Point**: `Sunsetter` acquires resources and runs the daemon
//! - **Core Logic**: `core` holds the event loop, the trigger bus and the
//!   `Scheduler` that owns the single pending wake-up
//! - **Solar**: `geo` answers day/night and boundary questions for a coordinate
//! - **Appearance**: `appearance` drives GNOME or user commands
//! - **Location**: `location` supplies coordinates and authorization changes
//! - **Presentation**: `state::display` publishes the icon and status line
//! - **Configuration**: `config` for TOML settings and `geo.toml`
//! - **Commands**: `commands` for CLI subcommands (toggle, stop, status, ...)
//! - **Infrastructure**: signals, sleep/clock monitors, instance lock, logging

// Import macros from logger module for use in all submodules
#[macro_use]
pub mod logger;

pub mod appearance;
pub mod args;
pub mod commands;
pub mod common;
pub mod config;
pub mod core;
pub mod geo;
pub mod io;
pub mod location;
pub mod state;
pub mod time_source;

mod sunsetter;

pub use sunsetter::Sunsetter;
