//! # Router Module
//!
//! The router module resolves `(method, path)` pairs to handlers using one
//! radix tree per HTTP method, and applies the redirect and fallback policy
//! for requests that do not match.
//!
//! ## Overview
//!
//! The router is responsible for:
//! - Registering routes and rejecting ambiguous or malformed patterns at startup
//! - Matching incoming requests in O(k), k being the path length
//! - Extracting `:name` and `*name` parameters in declaration order
//! - Redirecting to the trailing-slash or case-corrected variant of a path
//! - Answering `OPTIONS`, 405 and 404 on misses
//!
//! ## Pattern syntax
//!
//! | Pattern | Matches | Params |
//! |---|---|---|
//! | `/users` | `/users` only | none |
//! | `/users/:id` | `/users/42`, not `/users/42/x` | `id = 42` |
//! | `/files/*filepath` | `/files/`, `/files/a/b.txt` | `filepath = a/b.txt` |
//!
//! Static segments take precedence over a parameter at the same position, so
//! `/users/new` and `/users/:id` can both be registered.
//!
//! ## Example
//!
//! ```rust
//! use http::Method;
//! use trierouter::{Params, Request, RequestContext, Response, Router};
//!
//! fn show(_: &Request, params: &Params, _: &RequestContext) -> Response {
//!     Response::new(format!("user {}", &params[0]).into_bytes())
//! }
//!
//! let mut router = Router::new();
//! router.get("/users/:id", show).unwrap();
//!
//! let found = router.lookup(&Method::GET, "/users/42");
//! assert_eq!(found.params.get("id"), Some("42"));
//!
//! let missed = router.lookup(&Method::GET, "/users/42/");
//! assert!(missed.value.is_none());
//! assert!(missed.tsr);
//! ```
//!
//! ## Concurrency
//!
//! A [`Router`] is immutable once built and can be shared through an `Arc`.
//! [`SharedRouter`] adds copy-on-write registration for routers that must
//! learn routes while serving.

mod core;
mod error;
mod params;
mod path;
mod shared;
mod tree;

pub use self::core::{Endpoint, Router};
pub use error::RouteError;
pub use params::{Param, Params, MAX_INLINE_PARAMS};
pub use path::clean_path;
pub use shared::SharedRouter;
pub use tree::{Lookup, Node, NodeKind};
