//! Structured logging with box-drawing output.
//!
//! Every line sunsetter prints goes through the macros in this module so that
//! daemon output, command output, and simulation output share one visual style.
//! Logging can be switched off globally (tests, quiet commands) and can be
//! redirected into a file while a simulation runs.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Sender, channel};
use std::sync::{Arc, OnceLock};

use crate::time_source::{SimulatedTimeSource, TimeSource};

static LOGGING_ENABLED: AtomicBool = AtomicBool::new(true);

// Clock used to stamp simulation output
static SIMULATED_CLOCK: OnceLock<Arc<SimulatedTimeSource>> = OnceLock::new();

// Set when --log routes output into a file
static LOG_CHANNEL: OnceLock<Sender<LogMessage>> = OnceLock::new();

enum LogMessage {
    Formatted(String),
    Shutdown,
}

/// Logging facade shared by the macros.
///
/// ## Conventions
///
/// - `log_block_start!` opens a new block (`┃` spacer, then `┣ message`).
/// - `log_decorated!` continues a block (`┣ message`).
/// - `log_indented!` nests details under the previous line (`┃   message`).
/// - `log_pipe!` inserts an empty `┃` line, used before a leveled message
///   that starts a new block.
/// - `log_version!` / `log_end!` open and close the whole output.
/// - `log_info!`, `log_warning!`, `log_error!`, `log_debug!`, `log_critical!`
///   print a colored `[LEVEL]` tag.
pub struct Log;

impl Log {
    /// Enable or disable all logging output.
    pub fn set_enabled(enabled: bool) {
        LOGGING_ENABLED.store(enabled, Ordering::SeqCst);
    }

    pub fn is_enabled() -> bool {
        LOGGING_ENABLED.load(Ordering::SeqCst)
    }

    /// Stamp every following line with the simulated wall-clock time.
    pub fn set_simulated_clock(clock: Arc<SimulatedTimeSource>) {
        let _ = SIMULATED_CLOCK.set(clock);
    }

    /// Route all output into `file_path` until the returned guard is dropped.
    pub fn start_file_logging(file_path: String) -> anyhow::Result<LoggerGuard> {
        let (tx, rx) = channel();

        LOG_CHANNEL
            .set(tx.clone())
            .map_err(|_| anyhow::anyhow!("Logger channel already initialized"))?;

        let handle = std::thread::spawn(move || {
            let mut file = std::fs::File::create(&file_path)?;

            loop {
                match rx.recv() {
                    Ok(LogMessage::Formatted(text)) => file.write_all(text.as_bytes())?,
                    Ok(LogMessage::Shutdown) | Err(_) => {
                        file.flush()?;
                        break;
                    }
                }
            }

            Ok::<(), anyhow::Error>(())
        });

        Ok(LoggerGuard {
            tx,
            handle: Some(handle),
        })
    }

    /// Timestamp prefix for simulation output, empty otherwise.
    pub fn get_timestamp_prefix() -> String {
        match SIMULATED_CLOCK.get() {
            Some(clock) => {
                let now = clock.now().with_timezone(&chrono::Local);
                format!("[{}] ", now.format("%Y-%m-%d %H:%M"))
            }
            None => String::new(),
        }
    }
}

/// Flushes and closes the log file on drop.
pub struct LoggerGuard {
    tx: Sender<LogMessage>,
    handle: Option<std::thread::JoinHandle<anyhow::Result<()>>>,
}

impl Drop for LoggerGuard {
    fn drop(&mut self) {
        let _ = self.tx.send(LogMessage::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn strip_ansi_codes(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '\x1b' && chars.peek() == Some(&'[') {
            chars.next();
            for ch in chars.by_ref() {
                if ch == 'm' {
                    break;
                }
            }
        } else {
            result.push(ch);
        }
    }

    result
}

/// Write already formatted text to stdout or the log file.
pub fn write_output(text: &str) {
    if let Some(tx) = LOG_CHANNEL.get() {
        let _ = tx.send(LogMessage::Formatted(strip_ansi_codes(text)));
    } else {
        print!("{text}");
        let _ = std::io::stdout().flush();
    }
}

/// Emit one line as `<timestamp><lead><message>`.
#[doc(hidden)]
pub fn emit_line(lead: &str, message: &str) {
    if !Log::is_enabled() {
        return;
    }
    let prefix = Log::get_timestamp_prefix();
    write_output(&format!("{prefix}{lead}{message}\n"));
}

/// Emit a spacer line followed by `┣ message`.
#[doc(hidden)]
pub fn emit_block_start(message: &str) {
    if !Log::is_enabled() {
        return;
    }
    let prefix = Log::get_timestamp_prefix();
    write_output(&format!("{prefix}┃\n{prefix}┣ {message}\n"));
}

#[doc(hidden)]
#[macro_export]
macro_rules! __log_with_lead {
    ($lead:expr, $fmt:literal $($arg:tt)*) => {{
        $crate::logger::emit_line($lead, &format!($fmt $($arg)*));
    }};
    ($lead:expr, $expr:expr) => {{
        $crate::logger::emit_line($lead, &format!("{}", $expr));
    }};
}

/// Log a message that continues the current block.
#[macro_export]
macro_rules! log_decorated {
    ($($t:tt)*) => { $crate::__log_with_lead!("┣ ", $($t)*) };
}

/// Log a nested detail line.
#[macro_export]
macro_rules! log_indented {
    ($($t:tt)*) => { $crate::__log_with_lead!("┃   ", $($t)*) };
}

/// Log an empty spacer line.
#[macro_export]
macro_rules! log_pipe {
    () => {{
        $crate::logger::emit_line("┃", "");
    }};
}

/// Log the first line of a new block, preceded by a spacer.
#[macro_export]
macro_rules! log_block_start {
    ($fmt:literal $($arg:tt)*) => {{
        $crate::logger::emit_block_start(&format!($fmt $($arg)*));
    }};
    ($expr:expr) => {{
        $crate::logger::emit_block_start(&format!("{}", $expr));
    }};
}

/// Log the application header.
#[macro_export]
macro_rules! log_version {
    () => {{
        $crate::logger::emit_line(
            "┏ ",
            &format!("sunsetter v{} ━━╸", env!("CARGO_PKG_VERSION")),
        );
    }};
}

/// Log the final termination marker.
#[macro_export]
macro_rules! log_end {
    () => {{
        $crate::logger::emit_line("╹", "");
    }};
}

/// Log a warning in yellow.
#[macro_export]
macro_rules! log_warning {
    ($($t:tt)*) => { $crate::__log_with_lead!("┣[\x1b[33mWARNING\x1b[0m] ", $($t)*) };
}

/// Log an error in red.
#[macro_export]
macro_rules! log_error {
    ($($t:tt)*) => { $crate::__log_with_lead!("┣[\x1b[31mERROR\x1b[0m] ", $($t)*) };
}

/// Log an error without the pipe, for output outside a block.
#[macro_export]
macro_rules! log_error_standalone {
    ($($t:tt)*) => { $crate::__log_with_lead!("[\x1b[31mERROR\x1b[0m] ", $($t)*) };
}

/// Log a terminal error that closes the output.
#[macro_export]
macro_rules! log_error_exit {
    ($($t:tt)*) => {{
        $crate::log_pipe!();
        $crate::__log_with_lead!("┗[\x1b[31mERROR\x1b[0m] ", $($t)*);
    }};
}

/// Log an informational message in green.
#[macro_export]
macro_rules! log_info {
    ($($t:tt)*) => { $crate::__log_with_lead!("┣[\x1b[32mINFO\x1b[0m] ", $($t)*) };
}

/// Log a debug message in green.
#[macro_export]
macro_rules! log_debug {
    ($($t:tt)*) => { $crate::__log_with_lead!("┣[\x1b[32mDEBUG\x1b[0m] ", $($t)*) };
}

/// Log a critical message in red.
#[macro_export]
macro_rules! log_critical {
    ($($t:tt)*) => { $crate::__log_with_lead!("┣[\x1b[31mCRITICAL\x1b[0m] ", $($t)*) };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_ansi_codes_removes_color_sequences() {
        let colored = "┣[\x1b[33mWARNING\x1b[0m] careful";
        assert_eq!(strip_ansi_codes(colored), "┣[WARNING] careful");
    }

    #[test]
    fn test_strip_ansi_codes_keeps_plain_text() {
        assert_eq!(strip_ansi_codes("┃   plain"), "┃   plain");
    }
}
