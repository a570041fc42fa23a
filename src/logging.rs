//! Structured logging setup
//!
//! Initializes a global `tracing` subscriber with:
//! - An `EnvFilter` (`RUST_LOG` wins over the configured level)
//! - JSON output for production or pretty output for development
//! - Optional non-blocking writer so request threads never wait on stdout
//!
//! ## Environment Variables
//!
//! - `TRIEROUTER_LOG_LEVEL`: trace/debug/info/warn/error (default `info`)
//! - `TRIEROUTER_LOG_FORMAT`: json/pretty (default `json`)
//! - `TRIEROUTER_LOG_ASYNC`: buffered writer on/off (default on)
//! - `TRIEROUTER_LOG_INCLUDE_LOCATION`: file:line in every event (default off)
//! - `TRIEROUTER_LOG_TARGET_FILTER`: extra comma separated directives,
//!   e.g. `trierouter::router=debug`

use std::env;

use anyhow::{Context, Result};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::parse_bool;

/// Log format: JSON for production, pretty-print for development
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "pretty" => LogFormat::Pretty,
            _ => LogFormat::Json, // Default to JSON
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Log level: trace/debug/info/warn/error
    pub log_level: String,
    pub format: LogFormat,
    /// Write through a buffered background thread
    pub async_logging: bool,
    /// Extra filter directives (comma-separated)
    pub target_filter: Option<String>,
    /// Include file:line location (dev only)
    pub include_location: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            format: LogFormat::Json,
            async_logging: true,
            target_filter: None,
            include_location: false,
        }
    }
}

impl LogConfig {
    /// Parse configuration from environment variables with defaults
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            log_level: lookup("TRIEROUTER_LOG_LEVEL").unwrap_or(defaults.log_level),
            format: lookup("TRIEROUTER_LOG_FORMAT")
                .map_or(defaults.format, |v| LogFormat::parse(&v)),
            async_logging: lookup("TRIEROUTER_LOG_ASYNC")
                .and_then(|v| parse_bool(&v))
                .unwrap_or(defaults.async_logging),
            target_filter: lookup("TRIEROUTER_LOG_TARGET_FILTER").filter(|v| !v.trim().is_empty()),
            include_location: lookup("TRIEROUTER_LOG_INCLUDE_LOCATION")
                .and_then(|v| parse_bool(&v))
                .unwrap_or(defaults.include_location),
        }
    }

    /// Human readable output at debug level, written synchronously
    #[must_use]
    pub fn default_dev() -> Self {
        Self {
            log_level: "debug".to_string(),
            format: LogFormat::Pretty,
            async_logging: false,
            target_filter: None,
            include_location: true,
        }
    }

    fn level(&self) -> Level {
        match self.log_level.trim().to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }

    /// Parsed `target_filter` directives. Invalid entries are returned
    /// separately so the caller can report them once logging is up.
    fn directives(&self) -> (Vec<Directive>, Vec<String>) {
        let mut valid = Vec::new();
        let mut invalid = Vec::new();
        if let Some(target_filter) = &self.target_filter {
            for filter in target_filter.split(',').map(str::trim).filter(|f| !f.is_empty()) {
                match filter.parse::<Directive>() {
                    Ok(directive) => valid.push(directive),
                    Err(_) => invalid.push(filter.to_string()),
                }
            }
        }
        (valid, invalid)
    }
}

/// Install the global subscriber.
///
/// With `async_logging` the returned guard owns the background writer; keep
/// it alive until shutdown so buffered events are flushed.
///
/// # Errors
///
/// A global subscriber is already installed.
pub fn init_logging(config: &LogConfig) -> Result<Option<WorkerGuard>> {
    let mut env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level().as_str()));

    let (directives, invalid) = config.directives();
    for directive in directives {
        env_filter = env_filter.add_directive(directive);
    }

    let (writer, guard) = if config.async_logging {
        let (non_blocking, guard) = tracing_appender::non_blocking(std::io::stdout());
        (tracing_subscriber::fmt::writer::BoxMakeWriter::new(non_blocking), Some(guard))
    } else {
        (tracing_subscriber::fmt::writer::BoxMakeWriter::new(std::io::stdout), None)
    };

    let fmt_layer = match config.format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_writer(writer)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_writer(writer)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .context("Failed to initialize logging")?;

    for filter in invalid {
        tracing::warn!(directive = %filter, "Ignoring invalid log filter directive");
    }

    Ok(guard)
}
