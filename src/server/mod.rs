//! HTTP adapter around the router.
//!
//! The router itself never touches sockets. This module binds a listener,
//! converts requests into [`http::Request`] values, calls
//! [`SharedRouter::serve`](crate::SharedRouter::serve) and writes the
//! response back.

pub mod http_server;
pub mod service;

pub use http_server::{HttpServer, ServerHandle};
pub use service::{parse_request, AppService, RequestError};
