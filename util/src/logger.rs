//! Logger setup for the tracking executable
//!
//! Records go to stdout and to the session log file. The overall level and any per-target
//! levels come from a `LogParams` struct, usually loaded from `log.toml`, so the per-tick trace
//! output of the tracking modules can be switched on for one module at a time.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use colored::{ColoredString, Colorize};
use log::{info, Level, Record};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// Internal imports
use crate::session::{self, Session};

// Re-exports
pub use log::LevelFilter;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Logging parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct LogParams {
    /// Level applied to every target without its own entry in `targets`, one of `"off"`,
    /// `"error"`, `"warn"`, `"info"`, `"debug"` or `"trace"`.
    pub level: String,

    /// Levels for individual targets, keyed by module path (e.g. `"track_lib::lqr"`). An entry
    /// also applies to the submodules of the target.
    #[serde(default)]
    pub targets: BTreeMap<String, String>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors associated with initialising the logger.
#[derive(Debug, Error)]
pub enum LoggerInitError {
    #[error("Expected a log level of at least `INFO`, found `{0}`")]
    InvalidMinLogLevel(LevelFilter),

    #[error("Unknown log level \"{level}\" for {target}")]
    UnknownLevel { target: String, level: String },

    #[error("Error initialising the log file: {0}")]
    LogFileInitError(std::io::Error),

    #[error("An error occured while setting up the logger: {0}")]
    FernInitError(log::SetLoggerError),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for LogParams {
    fn default() -> Self {
        Self {
            level: "info".into(),
            targets: BTreeMap::new(),
        }
    }
}

impl LogParams {
    /// Parse the overall level.
    ///
    /// The overall level must let `INFO` records through, the session information is logged
    /// at that level.
    pub fn min_level(&self) -> Result<LevelFilter, LoggerInitError> {
        let level = parse_level("the overall level", &self.level)?;

        if level < Level::Info {
            return Err(LoggerInitError::InvalidMinLogLevel(level));
        }

        Ok(level)
    }

    /// Parse the per-target levels.
    pub fn target_levels(&self) -> Result<Vec<(String, LevelFilter)>, LoggerInitError> {
        self.targets
            .iter()
            .map(|(t, l)| Ok((t.clone(), parse_level(t, l)?)))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Initialise the logger for this execution.
///
/// Must be called once, later calls fail with `FernInitError`.
pub fn logger_init(params: &LogParams, session: &Session) -> Result<(), LoggerInitError> {
    let min_level = params.min_level()?;
    let target_levels = params.target_levels()?;

    let log_file =
        fern::log_file(&session.log_file_path).map_err(LoggerInitError::LogFileInitError)?;

    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!("{}", format_record(message, record)))
        })
        .level(min_level);

    for (target, level) in target_levels.iter() {
        dispatch = dispatch.level_for(target.clone(), *level);
    }

    dispatch
        .chain(std::io::stdout())
        .chain(log_file)
        .apply()
        .map_err(LoggerInitError::FernInitError)?;

    info!("Logging initialised");
    if let Some(epoch) = session::get_epoch() {
        info!("    Session epoch: {}", epoch);
    }
    info!("    Log level: {:?}", min_level);
    for (target, level) in target_levels.iter() {
        info!("    Log level for {}: {:?}", target, level);
    }
    info!("    Log file path: {:?}", session.log_file_path);

    Ok(())
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn parse_level(target: &str, level: &str) -> Result<LevelFilter, LoggerInitError> {
    LevelFilter::from_str(level).map_err(|_| LoggerInitError::UnknownLevel {
        target: target.into(),
        level: level.into(),
    })
}

/// Format a single record, debug and trace records carry their target.
fn format_record(message: &fmt::Arguments, record: &Record) -> String {
    let time_s = session::get_elapsed_seconds();

    if record.level() > Level::Info {
        format!(
            "[{:10.6} {}] {}: {}",
            time_s,
            level_to_str(record.level()),
            record.target(),
            message
        )
    } else {
        format!("[{:10.6} {}] {}", time_s, level_to_str(record.level()), message)
    }
}

/// Get the string representation of a log level
fn level_to_str(level: Level) -> ColoredString {
    match level {
        Level::Trace => "TRC".dimmed().italic(),
        Level::Debug => "DBG".dimmed(),
        Level::Info => "INF".normal(),
        Level::Warn => "WRN".yellow(),
        Level::Error => "ERR".red().bold(),
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
