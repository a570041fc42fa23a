//! Handler model shared by the router and the server adapter.
//!
//! Requests and responses are plain [`http`] types with in-memory bodies.
//! Handlers are anything implementing [`Handler`]; ordinary functions and
//! closures of the right shape qualify through blanket impls:
//!
//! ```rust
//! use trierouter::{Params, Request, RequestContext, Response, Router};
//!
//! fn hello(_req: &Request, params: &Params, _ctx: &RequestContext) -> Response {
//!     let name = params.get("name").unwrap_or("world");
//!     Response::new(format!("hello {name}\n").into_bytes())
//! }
//!
//! let mut router = Router::new();
//! router.get("/hello/:name", hello).unwrap();
//! ```

use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use http::Method;

use crate::ids::RequestId;
use crate::router::Params;

/// Request with a fully buffered body
pub type Request = http::Request<Vec<u8>>;

/// Response with a fully buffered body
pub type Response = http::Response<Vec<u8>>;

/// Peer address of the connection, stored as a request extension by the
/// server adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteAddr(pub SocketAddr);

/// Per-request information handed to every handler alongside the request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Correlation id, reused from `x-request-id` when valid
    pub request_id: RequestId,
    started: Instant,
    remote_addr: Option<SocketAddr>,
    route: Option<Arc<str>>,
}

impl RequestContext {
    #[must_use]
    pub fn from_request(req: &Request) -> Self {
        Self {
            request_id: RequestId::from_headers(req.headers()),
            started: Instant::now(),
            remote_addr: req.extensions().get::<RemoteAddr>().map(|addr| addr.0),
            route: None,
        }
    }

    /// Time since dispatch of this request began
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    #[must_use]
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    /// Registration pattern of the matched route, e.g. `/users/:id`
    #[must_use]
    pub fn route(&self) -> Option<&str> {
        self.route.as_deref()
    }

    pub(crate) fn set_route(&mut self, pattern: &Arc<str>) {
        self.route = Some(Arc::clone(pattern));
    }
}

/// Route handler
pub trait Handler: Send + Sync + 'static {
    fn call(&self, req: &Request, params: &Params, ctx: &RequestContext) -> Response;
}

impl<F> Handler for F
where
    F: Fn(&Request, &Params, &RequestContext) -> Response + Send + Sync + 'static,
{
    fn call(&self, req: &Request, params: &Params, ctx: &RequestContext) -> Response {
        self(req, params, ctx)
    }
}

/// Runs before the route handler. Returning `Some(response)` marks the
/// request as handled and the route handler is skipped.
pub trait PreHandler: Send + Sync + 'static {
    fn call(&self, req: &Request, params: &Params, ctx: &RequestContext) -> Option<Response>;
}

impl<F> PreHandler for F
where
    F: Fn(&Request, &Params, &RequestContext) -> Option<Response> + Send + Sync + 'static,
{
    fn call(&self, req: &Request, params: &Params, ctx: &RequestContext) -> Option<Response> {
        self(req, params, ctx)
    }
}

/// Turns a panic payload recovered during dispatch into a response,
/// typically a 500 page.
pub trait PanicHandler: Send + Sync + 'static {
    fn call(&self, req: &Request, payload: Box<dyn Any + Send>) -> Response;
}

impl<F> PanicHandler for F
where
    F: Fn(&Request, Box<dyn Any + Send>) -> Response + Send + Sync + 'static,
{
    fn call(&self, req: &Request, payload: Box<dyn Any + Send>) -> Response {
        self(req, payload)
    }
}

/// Best-effort text of a panic payload.
#[must_use]
pub fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "Box<dyn Any>"
    }
}

type OnRegistered = Box<dyn FnOnce(&Method, &str) + Send>;

/// A handler plus the optional extras that may accompany its registration.
///
/// ```rust
/// use http::Method;
/// use trierouter::{Params, Request, RequestContext, Response, Route, Router};
///
/// fn list(_: &Request, _: &Params, _: &RequestContext) -> Response {
///     Response::new(b"[]".to_vec())
/// }
///
/// let mut router = Router::new();
/// let route = Route::new(list).on_registered(|method, pattern| {
///     println!("documenting {method} {pattern}");
/// });
/// router.handle(Method::GET, "/users", route).unwrap();
/// ```
pub struct Route {
    pub(crate) handler: Arc<dyn Handler>,
    pub(crate) pre_handler: Option<Arc<dyn PreHandler>>,
    pub(crate) on_registered: Option<OnRegistered>,
}

impl Route {
    pub fn new(handler: impl Handler) -> Self {
        Self {
            handler: Arc::new(handler),
            pre_handler: None,
            on_registered: None,
        }
    }

    /// Install a pre-handler that may short-circuit the route handler.
    #[must_use]
    pub fn pre_handler(mut self, pre_handler: impl PreHandler) -> Self {
        self.pre_handler = Some(Arc::new(pre_handler));
        self
    }

    /// Callback invoked with `(method, pattern)` once the route has been
    /// inserted. It is not called when registration fails.
    #[must_use]
    pub fn on_registered(mut self, f: impl FnOnce(&Method, &str) + Send + 'static) -> Self {
        self.on_registered = Some(Box::new(f));
        self
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("pre_handler", &self.pre_handler.is_some())
            .field("on_registered", &self.on_registered.is_some())
            .finish_non_exhaustive()
    }
}
