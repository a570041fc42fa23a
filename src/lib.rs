//! # trierouter
//!
//! **trierouter** is an HTTP request router built on a radix tree. Given a
//! method and a path it finds the registered handler in time proportional to
//! the path length, extracts named parameters, and decides whether a
//! trailing-slash or case-correcting redirect beats a 404.
//!
//! ## Architecture
//!
//! - **[`router`]** - Radix tree, path cleaning, the [`Router`] dispatch
//!   policy and the copy-on-write [`SharedRouter`]
//! - **[`handler`]** - Handler, pre-handler and panic handler traits, and the
//!   per-request [`RequestContext`]
//! - **[`static_files`]** - The [`FileSystem`] boundary used by
//!   [`Router::serve_files`] and a directory-backed implementation
//! - **[`config`]** - Router switches and server settings from env or YAML
//! - **[`logging`]** - `tracing-subscriber` setup
//! - **[`server`]** - Blocking HTTP adapter feeding a worker pool
//! - **[`cli`]** - The `trierouter` binary: demo server and lookup inspector
//!
//! ### Request Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Client
//!     participant Server as server::HttpServer
//!     participant Router as Router::serve
//!     participant Tree as method tree
//!     participant Handler
//!
//!     Client->>Server: HTTP request
//!     Server->>Router: http::Request<Vec<u8>>
//!     Router->>Tree: get_value(path)
//!     alt match
//!         Tree-->>Router: endpoint + params
//!         Router->>Handler: pre-handler, then handler
//!         Handler-->>Router: Response
//!     else miss
//!         Tree-->>Router: tsr hint
//!         Router->>Router: redirect / OPTIONS / 405 / 404
//!     end
//!     Router-->>Server: Response
//!     Server-->>Client: HTTP response
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use trierouter::{Params, Request, RequestContext, Response, Router};
//!
//! fn index(_: &Request, _: &Params, _: &RequestContext) -> Response {
//!     Response::new(b"Welcome!\n".to_vec())
//! }
//!
//! fn hello(_: &Request, params: &Params, _: &RequestContext) -> Response {
//!     let name = params.get("name").unwrap_or_default();
//!     Response::new(format!("hello, {name}!\n").into_bytes())
//! }
//!
//! let mut router = Router::new();
//! router.get("/", index).unwrap();
//! router.get("/hello/:name", hello).unwrap();
//!
//! let req = http::Request::get("/hello/gopher").body(Vec::new()).unwrap();
//! assert_eq!(router.serve(&req).body(), b"hello, gopher!\n");
//!
//! // Trailing slash redirect
//! let req = http::Request::get("/hello/gopher/").body(Vec::new()).unwrap();
//! let res = router.serve(&req);
//! assert_eq!(res.status(), 301);
//! assert_eq!(res.headers()["location"], "/hello/gopher");
//! ```
//!
//! To serve over HTTP, hand the router to [`server::HttpServer`].

pub mod cli;
pub mod config;
pub mod handler;
pub mod ids;
pub mod logging;
pub mod router;
pub mod server;
pub mod static_files;

pub use config::{RouterConfig, ServerConfig};
pub use handler::{
    Handler, PanicHandler, PreHandler, RemoteAddr, Request, RequestContext, Response, Route,
};
pub use router::{clean_path, Endpoint, Lookup, Param, Params, RouteError, Router, SharedRouter};
pub use static_files::{FileSystem, StaticFiles};
