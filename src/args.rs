//! Command-line argument parsing and processing.
//!
//! The first non-flag argument selects a subcommand; without one the daemon
//! runs. Global flags (`--debug`, `--config <dir>`) may appear anywhere, and
//! `--help`/`--version` take precedence over everything else.

/// Represents the parsed command-line arguments and their intended actions.
#[derive(Debug, PartialEq)]
pub enum CliAction {
    /// Run the scheduler daemon
    Run {
        debug_enabled: bool,
        config_dir: Option<String>,
    },
    /// Flip the appearance of the running instance
    Toggle {
        debug_enabled: bool,
        config_dir: Option<String>,
    },
    /// Stop the running instance
    Stop {
        debug_enabled: bool,
        config_dir: Option<String>,
    },
    /// Show what the running instance displays
    Status {
        json: bool,
        config_dir: Option<String>,
    },
    /// Dry-run the schedule over a time range
    Simulate {
        debug_enabled: bool,
        start_time: String,
        end_time: String,
        log_file: Option<String>,
        config_dir: Option<String>,
    },
    /// Write coordinates to geo.toml
    Geo {
        debug_enabled: bool,
        latitude: f64,
        longitude: f64,
        config_dir: Option<String>,
    },

    /// Display help information and exit
    ShowHelp,
    /// Display version information and exit
    ShowVersion,
    /// Show help due to invalid arguments and exit
    ShowHelpDueToError,
}

/// Result of parsing command-line arguments.
pub struct ParsedArgs {
    pub action: CliAction,
}

const COMMANDS: [&str; 5] = ["toggle", "stop", "status", "simulate", "geo"];

impl ParsedArgs {
    /// Parse command-line arguments (including the program name) into an action.
    pub fn parse<I, S>(args: I) -> ParsedArgs
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let args_vec: Vec<String> = args
            .into_iter()
            .skip(1)
            .map(|s| s.as_ref().to_string())
            .collect();

        ParsedArgs {
            action: Self::parse_action(&args_vec),
        }
    }

    /// Convenience method to parse from std::env::args()
    pub fn from_env() -> ParsedArgs {
        Self::parse(std::env::args())
    }

    fn parse_action(args_vec: &[String]) -> CliAction {
        if args_vec
            .iter()
            .any(|arg| arg == "--version" || arg == "-V" || arg == "-v")
        {
            return CliAction::ShowVersion;
        }
        if args_vec.iter().any(|arg| arg == "--help" || arg == "-h") {
            return CliAction::ShowHelp;
        }

        let mut debug_enabled = false;
        let mut json = false;
        let mut config_dir: Option<String> = None;
        let mut log_file: Option<String> = None;
        let mut positionals: Vec<String> = Vec::new();

        let mut i = 0;
        while i < args_vec.len() {
            let arg_str = &args_vec[i];
            match arg_str.as_str() {
                "--debug" | "-d" => debug_enabled = true,
                "--json" => json = true,
                "--config" | "-c" => {
                    // Parse: --config <directory>
                    match args_vec.get(i + 1) {
                        Some(dir) if !dir.starts_with('-') => {
                            config_dir = Some(dir.clone());
                            i += 1;
                        }
                        _ => {
                            log_warning!(
                                "Missing directory for --config. Usage: --config <directory>"
                            );
                            return CliAction::ShowHelpDueToError;
                        }
                    }
                }
                "--log" => match args_vec.get(i + 1) {
                    Some(file) if !file.starts_with('-') => {
                        log_file = Some(file.clone());
                        i += 1;
                    }
                    _ => {
                        log_warning!("Missing file for --log. Usage: --log <file>");
                        return CliAction::ShowHelpDueToError;
                    }
                },
                // Negative numbers are geo arguments, not options
                other if other.starts_with('-') && other.parse::<f64>().is_err() => {
                    log_warning!("Unknown option: {other}");
                    return CliAction::ShowHelpDueToError;
                }
                _ => positionals.push(arg_str.clone()),
            }
            i += 1;
        }

        let Some((command, rest)) = positionals.split_first() else {
            if json || log_file.is_some() {
                log_warning!("--json and --log need a command");
                return CliAction::ShowHelpDueToError;
            }
            return CliAction::Run {
                debug_enabled,
                config_dir,
            };
        };

        if let Some(conflict) = rest.iter().find(|arg| COMMANDS.contains(&arg.as_str())) {
            log_error!(
                "Cannot use multiple commands at once: '{}' and '{}'",
                command,
                conflict
            );
            return CliAction::ShowHelpDueToError;
        }

        if json && command != "status" {
            log_warning!("--json is only valid for status");
            return CliAction::ShowHelpDueToError;
        }
        if log_file.is_some() && command != "simulate" {
            log_warning!("--log is only valid for simulate");
            return CliAction::ShowHelpDueToError;
        }

        match (command.as_str(), rest) {
            ("toggle", []) => CliAction::Toggle {
                debug_enabled,
                config_dir,
            },
            ("stop", []) => CliAction::Stop {
                debug_enabled,
                config_dir,
            },
            ("status", []) => CliAction::Status { json, config_dir },
            ("simulate", [start, end]) => {
                if !is_datetime_shaped(start) {
                    log_error!("Invalid start time format: '{start}'. Use YYYY-MM-DD HH:MM:SS");
                    return CliAction::ShowHelpDueToError;
                }
                if !is_datetime_shaped(end) {
                    log_error!("Invalid end time format: '{end}'. Use YYYY-MM-DD HH:MM:SS");
                    return CliAction::ShowHelpDueToError;
                }
                CliAction::Simulate {
                    debug_enabled,
                    start_time: start.clone(),
                    end_time: end.clone(),
                    log_file,
                    config_dir,
                }
            }
            ("simulate", _) => {
                log_warning!(
                    "Usage: sunsetter simulate \"YYYY-MM-DD HH:MM:SS\" \"YYYY-MM-DD HH:MM:SS\" [--log <file>]"
                );
                CliAction::ShowHelpDueToError
            }
            ("geo", [lat, lon]) => match (lat.parse::<f64>(), lon.parse::<f64>()) {
                (Ok(latitude), Ok(longitude)) => CliAction::Geo {
                    debug_enabled,
                    latitude,
                    longitude,
                    config_dir,
                },
                _ => {
                    log_warning!("Invalid coordinates. Usage: sunsetter geo <latitude> <longitude>");
                    CliAction::ShowHelpDueToError
                }
            },
            ("geo", _) => {
                log_warning!("Usage: sunsetter geo <latitude> <longitude>");
                CliAction::ShowHelpDueToError
            }
            (known, _) if COMMANDS.contains(&known) => {
                log_warning!("'{known}' takes no arguments");
                CliAction::ShowHelpDueToError
            }
            (unknown, _) => {
                log_warning!("Unknown command: {unknown}");
                CliAction::ShowHelpDueToError
            }
        }
    }
}

/// Rough "YYYY-MM-DD HH:MM:SS" shape check; full parsing happens in the zone.
fn is_datetime_shaped(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() == 19
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes[10] == b' '
        && bytes[13] == b':'
        && bytes[16] == b':'
}

/// Displays version information using custom logging style.
pub fn display_version_info() {
    log_version!();
    log_pipe!();
    println!("┗ {}", env!("CARGO_PKG_DESCRIPTION"));
}

/// Displays custom help message using logger methods.
pub fn display_help() {
    log_version!();
    log_block_start!(env!("CARGO_PKG_DESCRIPTION"));
    log_block_start!("Usage:");
    log_indented!("sunsetter [OPTIONS] [COMMAND]");
    log_block_start!("Options:");
    log_indented!("-c, --config <dir>     Use custom configuration directory");
    log_indented!("-d, --debug            Enable detailed debug output");
    log_indented!("-h, --help             Print help information");
    log_indented!("-V, --version          Print version information");
    log_block_start!("Commands:");
    log_indented!("toggle                 Flip light/dark in the running instance");
    log_indented!("stop                   Stop the running instance");
    log_indented!("status [--json]        Show the current icon and next boundary");
    log_indented!("simulate <start> <end> Dry-run the schedule over a time range");
    log_indented!("         [--log <file>]");
    log_indented!("geo <lat> <lon>        Set coordinates (picked up while running)");
    log_end!();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliAction {
        ParsedArgs::parse(std::iter::once("sunsetter").chain(args.iter().copied())).action
    }

    #[test]
    fn test_parse_no_args() {
        assert_eq!(
            parse(&[]),
            CliAction::Run {
                debug_enabled: false,
                config_dir: None,
            }
        );
    }

    #[test]
    fn test_parse_debug_and_config() {
        assert_eq!(
            parse(&["-d", "--config", "/tmp/conf"]),
            CliAction::Run {
                debug_enabled: true,
                config_dir: Some("/tmp/conf".to_string()),
            }
        );
    }

    #[test]
    fn test_help_and_version_precedence() {
        assert_eq!(parse(&["--help"]), CliAction::ShowHelp);
        assert_eq!(parse(&["-h", "status"]), CliAction::ShowHelp);
        assert_eq!(parse(&["--version", "--help", "--debug"]), CliAction::ShowVersion);
        assert_eq!(parse(&["-V"]), CliAction::ShowVersion);
    }

    #[test]
    fn test_parse_unknown_flag() {
        assert_eq!(parse(&["--unknown"]), CliAction::ShowHelpDueToError);
        assert_eq!(parse(&["--debug", "--invalid"]), CliAction::ShowHelpDueToError);
        assert_eq!(parse(&["--config"]), CliAction::ShowHelpDueToError);
    }

    #[test]
    fn test_parse_toggle_and_stop() {
        assert_eq!(
            parse(&["toggle"]),
            CliAction::Toggle {
                debug_enabled: false,
                config_dir: None,
            }
        );
        assert_eq!(
            parse(&["stop", "-d"]),
            CliAction::Stop {
                debug_enabled: true,
                config_dir: None,
            }
        );
        assert_eq!(parse(&["toggle", "now"]), CliAction::ShowHelpDueToError);
    }

    #[test]
    fn test_parse_status_json() {
        assert_eq!(
            parse(&["status", "--json"]),
            CliAction::Status {
                json: true,
                config_dir: None,
            }
        );
        assert_eq!(parse(&["stop", "--json"]), CliAction::ShowHelpDueToError);
    }

    #[test]
    fn test_parse_simulate() {
        assert_eq!(
            parse(&[
                "simulate",
                "2023-06-21 00:00:00",
                "2023-06-23 00:00:00",
                "--log",
                "sim.log"
            ]),
            CliAction::Simulate {
                debug_enabled: false,
                start_time: "2023-06-21 00:00:00".to_string(),
                end_time: "2023-06-23 00:00:00".to_string(),
                log_file: Some("sim.log".to_string()),
                config_dir: None,
            }
        );
        assert_eq!(
            parse(&["simulate", "2023-06-21", "2023-06-23 00:00:00"]),
            CliAction::ShowHelpDueToError
        );
        assert_eq!(
            parse(&["simulate", "2023-06-21 00:00:00"]),
            CliAction::ShowHelpDueToError
        );
    }

    #[test]
    fn test_parse_geo_negative_longitude() {
        assert_eq!(
            parse(&["geo", "37.7749", "-122.4194"]),
            CliAction::Geo {
                debug_enabled: false,
                latitude: 37.7749,
                longitude: -122.4194,
                config_dir: None,
            }
        );
        assert_eq!(parse(&["geo", "north", "west"]), CliAction::ShowHelpDueToError);
    }

    #[test]
    fn test_multiple_commands_rejected() {
        assert_eq!(parse(&["toggle", "stop"]), CliAction::ShowHelpDueToError);
        assert_eq!(parse(&["frobnicate"]), CliAction::ShowHelpDueToError);
    }

    #[test]
    fn test_log_requires_simulate() {
        assert_eq!(parse(&["--log", "x.log"]), CliAction::ShowHelpDueToError);
        assert_eq!(parse(&["status", "--log", "x.log"]), CliAction::ShowHelpDueToError);
    }
}
