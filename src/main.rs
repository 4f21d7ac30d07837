//! Main application entry point.
//!
//! Parses the command line, applies the global `--config` directory and hands
//! off to the daemon or the matching one-shot command. Errors from either are
//! reported in the log style and turned into a non-zero exit status.

use sunsetter::args::{self, CliAction, ParsedArgs};
use sunsetter::common::constants::{EXIT_FAILURE, EXIT_SUCCESS};
use sunsetter::{Sunsetter, commands, config, log_error_exit};

/// Pin `--config` if given; otherwise leave the directory open so client
/// commands can adopt the running instance's.
fn apply_config_dir(config_dir: Option<String>) -> anyhow::Result<()> {
    match config_dir {
        Some(_) => config::set_config_dir(config_dir),
        None => Ok(()),
    }
}

fn main() {
    let parsed_args = ParsedArgs::from_env();

    let result = match parsed_args.action {
        CliAction::ShowVersion => {
            args::display_version_info();
            Ok(())
        }
        CliAction::ShowHelp => {
            args::display_help();
            Ok(())
        }
        CliAction::ShowHelpDueToError => {
            args::display_help();
            std::process::exit(EXIT_FAILURE);
        }
        CliAction::Run {
            debug_enabled,
            config_dir,
        } => apply_config_dir(config_dir).and_then(|_| Sunsetter::new(debug_enabled).run()),
        CliAction::Toggle {
            debug_enabled,
            config_dir,
        } => apply_config_dir(config_dir)
            .and_then(|_| commands::toggle::handle_toggle_command(debug_enabled)),
        CliAction::Stop {
            debug_enabled,
            config_dir,
        } => apply_config_dir(config_dir)
            .and_then(|_| commands::stop::handle_stop_command(debug_enabled)),
        CliAction::Status { json, config_dir } => apply_config_dir(config_dir)
            .and_then(|_| commands::status::handle_status_command(json)),
        CliAction::Simulate {
            debug_enabled,
            start_time,
            end_time,
            log_file,
            config_dir,
        } => apply_config_dir(config_dir).and_then(|_| {
            commands::simulate::handle_simulate_command(
                &start_time,
                &end_time,
                log_file,
                debug_enabled,
            )
        }),
        CliAction::Geo {
            debug_enabled,
            latitude,
            longitude,
            config_dir,
        } => apply_config_dir(config_dir).and_then(|_| {
            commands::geo::handle_geo_command(latitude, longitude, debug_enabled)
        }),
    };

    match result {
        Ok(()) => std::process::exit(EXIT_SUCCESS),
        Err(e) => {
            log_error_exit!("{e:#}");
            std::process::exit(EXIT_FAILURE);
        }
    }
}
