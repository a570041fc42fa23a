//! # CLI Module
//!
//! Command-line front end for exercising the router by hand.
//!
//! ## Commands
//!
//! ### `serve`
//!
//! Serve a small demo routing table over HTTP:
//!
//! ```bash
//! trierouter serve --addr 127.0.0.1:8080 --static-dir ./public
//! ```
//!
//! Options:
//! - `--addr <ADDR>` - Bind address (default from `TRIEROUTER_ADDR`)
//! - `--workers <N>` - Worker threads (default from `TRIEROUTER_WORKERS`)
//! - `--config <FILE>` - YAML router switches (default from `TRIEROUTER_*` variables)
//! - `--static-dir <DIR>` - Also serve files under `/static/*filepath`
//! - `--dev-logs` - Pretty debug logs
//!
//! ### `lookup`
//!
//! Show which route a request resolves to and what the router answers:
//!
//! ```bash
//! trierouter lookup GET /Hello/gopher/
//! ```
//!
//! ### `routes`
//!
//! Print the demo routing table.

mod commands;

#[cfg(test)]
mod tests;

pub use commands::{demo_router, describe_lookup, run, run_cli, Cli, Commands};
