#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `logging` wires up the [`tracing`] ecosystem for a DistFS storage node:
//! one call to [`init`] installs a global subscriber with the requested
//! level filter and output format, after which every crate in the
//! workspace logs through the ordinary `tracing::{trace,debug,info,warn,
//! error}!` macros with structured fields (`node_id`, `block_id`,
//! `conn_id`, `task_id`, ...).
//!
//! # Design
//!
//! Two output formats are supported: `text`, a human-readable line format
//! for interactive use, and `json`, a structured format intended for log
//! aggregation in a multi-node cluster. Both honor `RUST_LOG` if it is
//! set, falling back to the configured [`Level`] otherwise.
//!
//! # Invariants
//!
//! - [`init`] may be called at most once per process; a second call
//!   returns [`LoggingError::AlreadyInitialized`] rather than panicking.
//! - The installed subscriber is global (`tracing::subscriber::set_global_default`);
//!   no per-thread subscriber juggling is required by callers.
//!
//! # Errors
//!
//! [`init`] fails with [`LoggingError::AlreadyInitialized`] if a global
//! subscriber is already installed, which callers should treat as
//! non-fatal in tests that call `init` from more than one test function.
//!
//! # Examples
//!
//! ```
//! use logging::{init, Level, LogFormat};
//!
//! // Duplicate init calls in the same process are reported, not fatal.
//! let _ = init(Level::Info, LogFormat::Text);
//! let second = init(Level::Debug, LogFormat::Json);
//! assert!(second.is_err());
//! ```

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Errors returned by [`init`].
#[derive(Debug, Error)]
pub enum LoggingError {
    /// A global subscriber was already installed for this process.
    #[error("logging subsystem is already initialized")]
    AlreadyInitialized,
}

/// Minimum severity a log record must have to be emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Only errors.
    Error,
    /// Errors and warnings.
    Warn,
    /// Errors, warnings, and informational records (the default).
    Info,
    /// Everything above plus debug records.
    Debug,
    /// Everything, including fine-grained trace records.
    Trace,
}

impl Level {
    const fn as_tracing_level(self) -> tracing::Level {
        match self {
            Self::Error => tracing::Level::ERROR,
            Self::Warn => tracing::Level::WARN,
            Self::Info => tracing::Level::INFO,
            Self::Debug => tracing::Level::DEBUG,
            Self::Trace => tracing::Level::TRACE,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        };
        f.write_str(text)
    }
}

/// Error returned when a [`Level`] or [`LogFormat`] cannot be parsed from text.
#[derive(Debug, Error)]
#[error("invalid value {0:?}: expected one of {1}")]
pub struct ParseEnumError(String, &'static str);

impl FromStr for Level {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            other => Err(ParseEnumError(
                other.to_owned(),
                "error, warn, info, debug, trace",
            )),
        }
    }
}

/// Output encoding for log records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable single-line-per-event text.
    Text,
    /// Newline-delimited JSON, one object per event.
    Json,
}

impl FromStr for LogFormat {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(ParseEnumError(other.to_owned(), "text, json")),
        }
    }
}

/// Installs the global `tracing` subscriber for the process.
///
/// `level` is used as the default filter when `RUST_LOG` is not set in
/// the environment; `RUST_LOG`, when present, always takes precedence so
/// operators can enable per-module tracing without a restart-time flag.
pub fn init(level: Level, format: LogFormat) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_tracing_level().to_string()));

    let result = match format {
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .try_init(),
    };

    result.map_err(|_| LoggingError::AlreadyInitialized)
}
