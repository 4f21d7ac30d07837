//! Runtime state published by the daemon.
//!
//! Nothing here survives a restart; the schedule is rebuilt from scratch on
//! every start.

pub mod display;
