//! Structured logging setup.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use crate::ObservabilityError;

/// Log level for the default filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = ObservabilityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(ObservabilityError::InvalidFilter {
                directive: other.to_string(),
                message: "expected trace, debug, info, warn or error".to_string(),
            }),
        }
    }
}

/// Output format for logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable format (for development).
    #[default]
    Human,
    /// JSON format (for log aggregation).
    Json,
}

impl FromStr for LogFormat {
    type Err = ObservabilityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "human" | "pretty" | "text" => Ok(Self::Human),
            "json" => Ok(Self::Json),
            other => Err(ObservabilityError::InvalidFilter {
                directive: other.to_string(),
                message: "expected human or json".to_string(),
            }),
        }
    }
}

/// Logging configuration, the `[logging]` section of the client config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default level when `RUST_LOG` is unset.
    pub level: LogLevel,
    pub format: LogFormat,
    /// Extra filter directives, e.g. `bazaar_data=debug`.
    pub directives: Vec<String>,
    /// Colored output for the human format.
    pub ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Human,
            directives: Vec::new(),
            ansi: true,
        }
    }
}

impl LogConfig {
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Filter string built from the level and extra directives.
    pub fn filter_directive(&self) -> String {
        std::iter::once(self.level.as_str().to_string())
            .chain(self.directives.iter().map(|d| d.trim().to_string()))
            .filter(|d| !d.is_empty())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Filter from the config only, ignoring the environment.
    pub fn env_filter(&self) -> Result<EnvFilter, ObservabilityError> {
        let directive = self.filter_directive();
        EnvFilter::try_new(&directive).map_err(|e| ObservabilityError::InvalidFilter {
            directive,
            message: e.to_string(),
        })
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG`, when set and valid, takes precedence over the configured level.
pub fn init_logging(config: &LogConfig) -> Result<(), ObservabilityError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => config.env_filter()?,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let result = match config.format {
        LogFormat::Json => builder.json().with_current_span(true).try_init(),
        LogFormat::Human => builder.with_ansi(config.ansi).compact().try_init(),
    };
    result.map_err(|e| ObservabilityError::AlreadyInitialized(e.to_string()))
}
