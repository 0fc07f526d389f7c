//! Logging setup for applications using the SDK
//!
//! Every crate in the workspace logs through `tracing`. Nothing is printed
//! until the application installs a subscriber, either its own or one of the
//! presets below.

use tracing_subscriber::{fmt, EnvFilter, Registry};

/// Logging mode for different use cases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggingMode {
    /// No subscriber is installed
    Silent,
    /// Compact stderr output at info level
    Development,
    /// Verbose output with targets and source locations
    Debug,
    /// One JSON object per line, for log collectors
    Json,
}

/// Logging configuration error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Failed to initialize tracing subscriber: {0}")]
    TracingInit(String),

    #[error("Invalid environment variable: {0}")]
    InvalidEnv(String),
}

const LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Initialize logging with the specified mode
///
/// # Environment Variables
///
/// - `WEMO_LOG_LEVEL`: Override the level (error, warn, info, debug, trace)
/// - `WEMO_LOG_TARGET`: Extra filter directive, e.g. `wemo_sdk::subscription=trace`
///
/// ```rust,ignore
/// wemo_sdk::logging::init_logging(LoggingMode::Development)?;
/// ```
pub fn init_logging(mode: LoggingMode) -> Result<(), LoggingError> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let result = match mode {
        LoggingMode::Silent => return Ok(()),
        LoggingMode::Development => Registry::default()
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false)
                    .compact(),
            )
            .with(create_env_filter("info")?)
            .try_init(),
        LoggingMode::Debug => Registry::default()
            .with(
                fmt::layer()
                    .pretty()
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .with(create_env_filter("debug")?)
            .try_init(),
        LoggingMode::Json => Registry::default()
            .with(fmt::layer().json().with_current_span(false))
            .with(create_env_filter("info")?)
            .try_init(),
    };

    result.map_err(|e| LoggingError::TracingInit(e.to_string()))
}

/// Initialize logging from `WEMO_LOG_MODE` (silent, development, debug, json)
///
/// Defaults to silent when unset or unrecognized.
pub fn init_logging_from_env() -> Result<(), LoggingError> {
    let mode = match std::env::var("WEMO_LOG_MODE").as_deref() {
        Ok("development") => LoggingMode::Development,
        Ok("debug") => LoggingMode::Debug,
        Ok("json") => LoggingMode::Json,
        _ => LoggingMode::Silent,
    };

    init_logging(mode)
}

fn create_env_filter(default_level: &str) -> Result<EnvFilter, LoggingError> {
    let level = match std::env::var("WEMO_LOG_LEVEL") {
        Ok(level) => parse_level(&level)?,
        Err(_) => default_level.to_string(),
    };

    let mut filter = EnvFilter::new(level);
    if let Ok(target) = std::env::var("WEMO_LOG_TARGET") {
        let directive = target
            .parse()
            .map_err(|e| LoggingError::InvalidEnv(format!("WEMO_LOG_TARGET={target}: {e}")))?;
        filter = filter.add_directive(directive);
    }

    Ok(filter)
}

fn parse_level(raw: &str) -> Result<String, LoggingError> {
    let level = raw.trim().to_ascii_lowercase();
    if LEVELS.contains(&level.as_str()) {
        Ok(level)
    } else {
        Err(LoggingError::InvalidEnv(format!("WEMO_LOG_LEVEL={raw}")))
    }
}

/// Check if a global subscriber has been installed
pub fn is_initialized() -> bool {
    tracing::dispatcher::has_been_set()
}
