//! Tracing initialisation.
//!
//! Logging is configured from the `[logging]` table of a session file and can
//! be overridden at runtime through `RUST_LOG`.
//!
//! # Example
//! ```no_run
//! use hybrid_sim::logging::{self, LogFormat, LoggingConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = LoggingConfig {
//!     level: "debug".to_string(),
//!     format: LogFormat::Json,
//! };
//! logging::init(&config)?;
//! # Ok(())
//! # }
//! ```

use serde::Deserialize;
use thiserror::Error;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Output format for log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-line human readable output.
    #[default]
    Pretty,
    /// Single-line output without colours.
    Compact,
    /// One JSON object per event.
    Json,
}

/// `[logging]` table of a session file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Default level: trace, debug, info, warn or error.
    #[serde(default = "default_level")]
    pub level: String,
    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
        }
    }
}

impl LoggingConfig {
    /// Parsed default level.
    pub fn level(&self) -> Result<Level, LoggingError> {
        parse_log_level(&self.level)
    }
}

/// Logging setup failure.
#[derive(Error, Debug)]
pub enum LoggingError {
    /// Level name not recognised.
    #[error("invalid log level '{0}', must be one of: trace, debug, info, warn, error")]
    InvalidLevel(String),

    /// The subscriber could not be installed.
    #[error("failed to initialize tracing: {0}")]
    Init(String),
}

/// Parse a level name, ignoring case.
pub fn parse_log_level(level: &str) -> Result<Level, LoggingError> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => Err(LoggingError::InvalidLevel(level.to_string())),
    }
}

/// Install the global subscriber.
///
/// Succeeds without change when a subscriber is already installed, which is
/// the normal case in tests.
pub fn init(config: &LoggingConfig) -> Result<(), LoggingError> {
    let level = config.level()?;
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    let layer = match config.format {
        LogFormat::Pretty => fmt::layer().pretty().with_filter(env_filter).boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_ansi(false)
            .with_filter(env_filter)
            .boxed(),
        LogFormat::Json => fmt::layer().json().with_filter(env_filter).boxed(),
    };

    tracing_subscriber::registry()
        .with(layer)
        .try_init()
        .or_else(|e| {
            if e.to_string().contains("a global default trace dispatcher has already been set") {
                Ok(())
            } else {
                Err(LoggingError::Init(e.to_string()))
            }
        })
}
