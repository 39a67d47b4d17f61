// Define a new module for logging initialization
use serde::{Deserialize, Serialize};
use std::fmt::Arguments;
use tracing::level_filters::LevelFilter;
use tracing::{Level, event};
use tracing_subscriber::{
    EnvFilter, filter::Targets, fmt, prelude::__tracing_subscriber_SubscriberExt,
    util::SubscriberInitExt,
};

pub fn init_logging(verbose: bool) {
    let (level_filter, level) = if verbose {
        (LevelFilter::DEBUG, "debug")
    } else {
        (LevelFilter::WARN, "warn")
    };
    let app_filter = Targets::new().with_target("fxrates", level_filter);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().pretty().without_time())
        .with(app_filter)
        .with(env_filter)
        .try_init()
        .ok();
}

/// A severity chosen in configuration, or `off` to silence a class of events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Levels for the three classes of service events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogLevels {
    pub success: LogLevel,
    pub failure: LogLevel,
    pub info: LogLevel,
}

impl Default for LogLevels {
    fn default() -> Self {
        LogLevels {
            success: LogLevel::Off,
            failure: LogLevel::Warn,
            info: LogLevel::Info,
        }
    }
}

/// Emits `args` at a level only known at runtime.
pub fn emit(level: LogLevel, args: Arguments<'_>) {
    // `event!` needs a constant level
    match level {
        LogLevel::Off => {}
        LogLevel::Error => event!(Level::ERROR, "{}", args),
        LogLevel::Warn => event!(Level::WARN, "{}", args),
        LogLevel::Info => event!(Level::INFO, "{}", args),
        LogLevel::Debug => event!(Level::DEBUG, "{}", args),
        LogLevel::Trace => event!(Level::TRACE, "{}", args),
    }
}
