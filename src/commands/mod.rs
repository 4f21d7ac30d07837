//! Command-line command handlers for sunsetter.
//!
//! Each one-shot CLI command lives in its own submodule. Commands that talk to
//! a running daemon find it through the instance lock (`io::instance`).

pub mod geo;
pub mod simulate;
pub mod status;
pub mod stop;
pub mod toggle;

use anyhow::Result;

use crate::io::instance::{self, InstanceInfo};

/// The running instance, or an error suitable for the user.
pub(crate) fn require_running_instance() -> Result<InstanceInfo> {
    instance::get_running_instance()?
        .ok_or_else(|| anyhow::anyhow!("sunsetter isn't running"))
}
