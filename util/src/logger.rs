//! Logger initialisation
//!
//! Log lines go to stdout and to the session's log file, prefixed with the
//! seconds since the session epoch and a three letter level tag.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use colored::{ColoredString, Colorize};
use log::{info, Level};
use thiserror::Error;

// Internal imports
use crate::session::{self, Session};

// Re-exports
pub use log::LevelFilter;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Targets which log on every link tick, capped at `Debug` so a `Trace`
/// session stays readable.
const PER_TICK_TARGETS: [&str; 3] = [
    "drone_lib::writer",
    "drone_lib::reader",
    "comms_if::msp::link",
];

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum LoggerInitError {
    #[error("The minimum log level must include info messages, found {0}")]
    InvalidMinLogLevel(LevelFilter),

    #[error("Could not open the log file: {0}")]
    LogFileInitError(std::io::Error),

    #[error("A logger has already been set: {0}")]
    FernInitError(log::SetLoggerError),
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Initialise logging for this run.
///
/// `min_level` must be `Info` or more verbose. Setting `PLUTO_LOG_TICKS`
/// lifts the cap on the per-tick link targets.
///
/// Must only be called once per process.
pub fn logger_init(
    min_level: LevelFilter,
    session: &Session
) -> Result<(), LoggerInitError> {

    if min_level < Level::Info {
        return Err(LoggerInitError::InvalidMinLogLevel(min_level))
    }

    let log_file = fern::log_file(&session.log_file_path)
        .map_err(LoggerInitError::LogFileInitError)?;

    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}{}",
                prefix(session::get_elapsed_seconds(), record.level(), record.target()),
                message
            ))
        })
        .level(min_level);

    if std::env::var_os("PLUTO_LOG_TICKS").is_none() {
        for target in PER_TICK_TARGETS.iter() {
            dispatch = dispatch.level_for(*target, min_level.min(LevelFilter::Debug));
        }
    }

    dispatch
        .chain(std::io::stdout())
        .chain(log_file)
        .apply()
        .map_err(LoggerInitError::FernInitError)?;

    info!("Logging initialised for {}", session.exec_name);
    if let Some(e) = session::epoch() {
        info!("    Session epoch: {}", e);
    }
    info!("    Log level: {:?}", min_level);
    info!("    Log file path: {:?}", session.log_file_path);

    Ok(())
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Line prefix. Debug and trace lines also name their target.
fn prefix(elapsed_s: f64, level: Level, target: &str) -> String {
    if level > Level::Info {
        format!("[{:10.6} {}] {}: ", elapsed_s, level_tag(level), target)
    }
    else {
        format!("[{:10.6} {}] ", elapsed_s, level_tag(level))
    }
}

fn level_tag(level: Level) -> ColoredString {
    match level {
        Level::Trace => "TRC".dimmed().italic(),
        Level::Debug => "DBG".dimmed(),
        Level::Info  => "INF".normal(),
        Level::Warn  => "WRN".yellow(),
        Level::Error => "ERR".red().bold()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_prefix() {
        colored::control::set_override(false);

        assert_eq!(prefix(1.5, Level::Info, "drone_exec"), "[  1.500000 INF] ");
        assert_eq!(
            prefix(0.25, Level::Debug, "drone_lib::drone"),
            "[  0.250000 DBG] drone_lib::drone: "
        );
        assert_eq!(prefix(2.0, Level::Warn, "x"), "[  2.000000 WRN] ");
    }
}
