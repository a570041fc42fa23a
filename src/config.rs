//! # Configuration
//!
//! Two small configuration structs, both loadable from environment variables:
//!
//! - [`RouterConfig`] holds the dispatch switches of the [`Router`](crate::Router).
//!   It can also be read from YAML.
//! - [`ServerConfig`] holds the settings of the bundled HTTP adapter.
//!
//! ## Environment Variables
//!
//! | Variable | Default |
//! |---|---|
//! | `TRIEROUTER_REDIRECT_TRAILING_SLASH` | `true` |
//! | `TRIEROUTER_REDIRECT_FIXED_PATH` | `true` |
//! | `TRIEROUTER_HANDLE_METHOD_NOT_ALLOWED` | `true` |
//! | `TRIEROUTER_HANDLE_OPTIONS` | `true` |
//! | `TRIEROUTER_ADDR` | `127.0.0.1:8080` |
//! | `TRIEROUTER_WORKERS` | available parallelism |
//! | `TRIEROUTER_MAX_BODY_BYTES` | `1048576` |
//!
//! Booleans accept `true/false`, `1/0`, `yes/no` and `on/off`. Unparseable
//! values fall back to the default.
//!
//! ## YAML
//!
//! ```yaml
//! redirect_trailing_slash: true
//! redirect_fixed_path: false
//! # omitted keys keep their defaults
//! ```

use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

const DEFAULT_ADDR: &str = "127.0.0.1:8080";
const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// Dispatch switches of the router. Everything is enabled by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RouterConfig {
    /// Redirect `/foo/` to `/foo` (or the reverse) when only the other form
    /// is registered. 301 for GET, 307 for every other method.
    pub redirect_trailing_slash: bool,
    /// Clean the path and retry case-insensitively before answering 404,
    /// redirecting to the corrected path on success.
    pub redirect_fixed_path: bool,
    /// Answer 405 with an `Allow` header when another method matches.
    pub handle_method_not_allowed: bool,
    /// Answer `OPTIONS` requests automatically with an `Allow` header.
    pub handle_options: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            redirect_trailing_slash: true,
            redirect_fixed_path: true,
            handle_method_not_allowed: true,
            handle_options: true,
        }
    }
}

impl RouterConfig {
    /// Load from `TRIEROUTER_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let flag = |key: &str, default: bool| {
            lookup(key)
                .and_then(|v| parse_bool(&v))
                .unwrap_or(default)
        };
        Self {
            redirect_trailing_slash: flag(
                "TRIEROUTER_REDIRECT_TRAILING_SLASH",
                defaults.redirect_trailing_slash,
            ),
            redirect_fixed_path: flag(
                "TRIEROUTER_REDIRECT_FIXED_PATH",
                defaults.redirect_fixed_path,
            ),
            handle_method_not_allowed: flag(
                "TRIEROUTER_HANDLE_METHOD_NOT_ALLOWED",
                defaults.handle_method_not_allowed,
            ),
            handle_options: flag("TRIEROUTER_HANDLE_OPTIONS", defaults.handle_options),
        }
    }

    /// # Errors
    ///
    /// Malformed YAML or unknown keys.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Read a YAML file.
    ///
    /// # Errors
    ///
    /// The file cannot be read or does not parse.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading router config {}", path.display()))?;
        Self::from_yaml_str(&raw)
            .with_context(|| format!("parsing router config {}", path.display()))
    }
}

/// Settings of the bundled HTTP adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    /// Worker threads pulling requests off the listener
    pub workers: usize,
    /// Larger request bodies are answered with 413
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            workers: default_workers(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl ServerConfig {
    /// Load from `TRIEROUTER_ADDR`, `TRIEROUTER_WORKERS` and
    /// `TRIEROUTER_MAX_BODY_BYTES`.
    ///
    /// # Errors
    ///
    /// `TRIEROUTER_ADDR` is set but is not a socket address. Bad numeric
    /// values fall back to their defaults.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::default();
        let addr_raw = lookup("TRIEROUTER_ADDR").unwrap_or_else(|| DEFAULT_ADDR.to_string());
        let addr = addr_raw
            .trim()
            .parse::<SocketAddr>()
            .with_context(|| format!("TRIEROUTER_ADDR is not a socket address: {addr_raw}"))?;
        let workers = lookup("TRIEROUTER_WORKERS")
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|&n| n > 0)
            .unwrap_or(defaults.workers);
        let max_body_bytes = lookup("TRIEROUTER_MAX_BODY_BYTES")
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(defaults.max_body_bytes);
        Ok(Self {
            addr,
            workers,
            max_body_bytes,
        })
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism().map_or(4, |n| n.get())
}

/// Shared reading of on/off environment switches; unknown values yield `None`.
pub(crate) fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
