//! Router core: method trees, registration and the dispatch policy.
//!
//! One radix tree is kept per HTTP method. A request is resolved against the
//! tree of its method; when that fails, [`Router::serve`] decides between a
//! trailing-slash redirect, a fixed-path redirect, an automatic `OPTIONS`
//! reply, a 405 and a 404, in that order.

use std::borrow::Cow;
use std::fmt;
use std::io;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use http::header::{ALLOW, CONTENT_TYPE, LOCATION};
use http::{HeaderValue, Method, StatusCode};
use tracing::{debug, info, warn};

use super::error::RouteError;
use super::params::Params;
use super::path::clean_path;
use super::tree::{Lookup, Node};
use crate::config::RouterConfig;
use crate::handler::{
    panic_message, Handler, PanicHandler, PreHandler, Request, RequestContext, Response, Route,
};
use crate::static_files::FileSystem;

/// Catch-all suffix required by [`Router::serve_files`]
const FILEPATH_SUFFIX: &str = "/*filepath";

/// What a route resolves to: its handler, optional pre-handler and the
/// pattern it was registered under.
#[derive(Clone)]
pub struct Endpoint {
    handler: Arc<dyn Handler>,
    pre_handler: Option<Arc<dyn PreHandler>>,
    pattern: Arc<str>,
}

impl Endpoint {
    /// Registration pattern, e.g. `/users/:id`
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    #[must_use]
    pub fn has_pre_handler(&self) -> bool {
        self.pre_handler.is_some()
    }

    /// Run the pre-handler, then the handler unless the pre-handler already
    /// produced a response.
    pub fn call(&self, req: &Request, params: &Params, ctx: &RequestContext) -> Response {
        if let Some(pre) = &self.pre_handler {
            if let Some(response) = pre.call(req, params, ctx) {
                debug!(
                    request_id = %ctx.request_id,
                    route_pattern = %self.pattern,
                    "Pre-handler short-circuited request"
                );
                return response;
            }
        }
        self.handler.call(req, params, ctx)
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("pattern", &self.pattern)
            .field("pre_handler", &self.pre_handler.is_some())
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
struct MethodTree {
    method: Method,
    root: Node<Endpoint>,
}

/// HTTP request router
///
/// Routes are registered at startup through [`handle`](Router::handle) and
/// its per-method shorthands. After that the router is only read, so it can
/// be shared behind an `Arc` by any number of threads.
///
/// ```rust
/// use trierouter::{Params, Request, RequestContext, Response, Router};
///
/// fn user(_: &Request, params: &Params, _: &RequestContext) -> Response {
///     Response::new(params.get("name").unwrap_or_default().as_bytes().to_vec())
/// }
///
/// let mut router = Router::new();
/// router.get("/user/:name", user).unwrap();
///
/// let req = http::Request::get("/user/gopher").body(Vec::new()).unwrap();
/// assert_eq!(router.serve(&req).body(), b"gopher");
/// ```
#[derive(Clone, Default)]
pub struct Router {
    /// Registration order, which is also the order of `Allow` headers
    trees: Vec<MethodTree>,
    config: RouterConfig,
    not_found: Option<Arc<dyn Handler>>,
    method_not_allowed: Option<Arc<dyn Handler>>,
    panic_handler: Option<Arc<dyn PanicHandler>>,
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let methods: Vec<&str> = self.trees.iter().map(|t| t.method.as_str()).collect();
        f.debug_struct("Router")
            .field("methods", &methods)
            .field("config", &self.config)
            .field("not_found", &self.not_found.is_some())
            .field("method_not_allowed", &self.method_not_allowed.is_some())
            .field("panic_handler", &self.panic_handler.is_some())
            .finish()
    }
}

impl Router {
    /// Router with every redirect and auto-reply switch enabled
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_config(config: RouterConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut RouterConfig {
        &mut self.config
    }

    /// Handler for requests no route matches. Defaults to a plain-text 404.
    pub fn set_not_found(&mut self, handler: impl Handler) {
        self.not_found = Some(Arc::new(handler));
    }

    /// Handler for 405 responses. The `Allow` header is set on whatever it
    /// returns. Defaults to a plain-text 405.
    pub fn set_method_not_allowed(&mut self, handler: impl Handler) {
        self.method_not_allowed = Some(Arc::new(handler));
    }

    /// Recover handler panics and answer with the response built by
    /// `handler`. Without one, a panic unwinds out of [`serve`](Router::serve).
    pub fn set_panic_handler(&mut self, handler: impl PanicHandler) {
        self.panic_handler = Some(Arc::new(handler));
    }

    /// Register a route for `method` and `path`.
    ///
    /// `path` must start with `/`. A `:name` segment binds one path element
    /// and a final `*name` segment binds the rest of the path.
    ///
    /// # Errors
    ///
    /// Malformed patterns, conflicts with existing routes and duplicate
    /// registrations. The router is unchanged when an error is returned.
    pub fn handle(&mut self, method: Method, path: &str, route: Route) -> Result<(), RouteError> {
        let Route {
            handler,
            pre_handler,
            on_registered,
        } = route;
        let endpoint = Endpoint {
            handler,
            pre_handler,
            pattern: Arc::from(path),
        };

        let idx = match self.trees.iter().position(|t| t.method == method) {
            Some(idx) => idx,
            None => {
                self.trees.push(MethodTree {
                    method: method.clone(),
                    root: Node::new(),
                });
                self.trees.len() - 1
            }
        };

        if let Err(err) = self.trees[idx].root.insert(path, endpoint) {
            if self.trees[idx].root.is_empty() {
                self.trees.remove(idx);
            }
            let err = err.with_method(method.as_str());
            warn!(method = %method, path = %path, error = %err, "Route registration rejected");
            return Err(err);
        }

        debug!(method = %method, path = %path, "Route registered");
        if let Some(callback) = on_registered {
            callback(&method, path);
        }
        Ok(())
    }

    /// Shorthand for `handle(Method::GET, path, Route::new(handler))`
    ///
    /// # Errors
    ///
    /// See [`handle`](Router::handle).
    pub fn get(&mut self, path: &str, handler: impl Handler) -> Result<(), RouteError> {
        self.handle(Method::GET, path, Route::new(handler))
    }

    /// # Errors
    ///
    /// See [`handle`](Router::handle).
    pub fn post(&mut self, path: &str, handler: impl Handler) -> Result<(), RouteError> {
        self.handle(Method::POST, path, Route::new(handler))
    }

    /// # Errors
    ///
    /// See [`handle`](Router::handle).
    pub fn put(&mut self, path: &str, handler: impl Handler) -> Result<(), RouteError> {
        self.handle(Method::PUT, path, Route::new(handler))
    }

    /// # Errors
    ///
    /// See [`handle`](Router::handle).
    pub fn patch(&mut self, path: &str, handler: impl Handler) -> Result<(), RouteError> {
        self.handle(Method::PATCH, path, Route::new(handler))
    }

    /// # Errors
    ///
    /// See [`handle`](Router::handle).
    pub fn delete(&mut self, path: &str, handler: impl Handler) -> Result<(), RouteError> {
        self.handle(Method::DELETE, path, Route::new(handler))
    }

    /// # Errors
    ///
    /// See [`handle`](Router::handle).
    pub fn head(&mut self, path: &str, handler: impl Handler) -> Result<(), RouteError> {
        self.handle(Method::HEAD, path, Route::new(handler))
    }

    /// An explicit OPTIONS route takes priority over the automatic reply.
    ///
    /// # Errors
    ///
    /// See [`handle`](Router::handle).
    pub fn options(&mut self, path: &str, handler: impl Handler) -> Result<(), RouteError> {
        self.handle(Method::OPTIONS, path, Route::new(handler))
    }

    /// Serve files from `files` under `path`, which must end in
    /// `/*filepath`. Registers a GET route; `/src/*filepath` maps
    /// `/src/css/app.css` to `files.open("css/app.css")`.
    ///
    /// # Errors
    ///
    /// [`RouteError::ServeFilesPattern`] for a wrong suffix, otherwise as
    /// [`handle`](Router::handle).
    pub fn serve_files(&mut self, path: &str, files: impl FileSystem) -> Result<(), RouteError> {
        self.serve_files_route(path, files, None)
    }

    /// Like [`serve_files`](Router::serve_files) with a pre-handler guarding
    /// every file, e.g. an authentication check.
    ///
    /// # Errors
    ///
    /// See [`serve_files`](Router::serve_files).
    pub fn serve_files_with(
        &mut self,
        path: &str,
        files: impl FileSystem,
        pre_handler: impl PreHandler,
    ) -> Result<(), RouteError> {
        self.serve_files_route(path, files, Some(Arc::new(pre_handler)))
    }

    fn serve_files_route(
        &mut self,
        path: &str,
        files: impl FileSystem,
        pre_handler: Option<Arc<dyn PreHandler>>,
    ) -> Result<(), RouteError> {
        if !path.ends_with(FILEPATH_SUFFIX) {
            return Err(RouteError::ServeFilesPattern {
                path: path.to_string(),
            });
        }

        let files = Arc::new(files);
        let mut route = Route::new(
            move |req: &Request, params: &Params, ctx: &RequestContext| -> Response {
                serve_file(files.as_ref(), req, params.get("filepath").unwrap_or(""), ctx)
            },
        );
        route.pre_handler = pre_handler;
        self.handle(Method::GET, path, route)
    }

    /// Resolve `path` in the tree of `method` without any redirect or
    /// fallback policy. `path` is matched as given, without percent-decoding.
    #[must_use]
    pub fn lookup(&self, method: &Method, path: &str) -> Lookup<'_, Endpoint> {
        match self.tree(method) {
            Some(root) => root.get_value(path),
            None => Lookup::miss(false),
        }
    }

    /// Every registered `(method, pattern)` pair
    #[must_use]
    pub fn routes(&self) -> Vec<(Method, String)> {
        self.trees
            .iter()
            .flat_map(|tree| {
                tree.root
                    .patterns()
                    .into_iter()
                    .map(move |pattern| (tree.method.clone(), pattern.to_string()))
            })
            .collect()
    }

    /// Emit a one-line summary of the routing table.
    pub fn log_routes(&self) {
        let routes = self.routes();
        let routes_summary: Vec<String> = routes
            .iter()
            .take(10)
            .map(|(method, pattern)| format!("{method} {pattern}"))
            .collect();
        info!(
            routes_count = routes.len(),
            routes_summary = ?routes_summary,
            routing_algorithm = "radix_tree",
            "Routing table loaded"
        );
    }

    fn tree(&self, method: &Method) -> Option<&Node<Endpoint>> {
        self.trees
            .iter()
            .find(|t| t.method == *method)
            .map(|t| &t.root)
    }

    /// Comma separated list of the methods that have a route for `path`,
    /// skipping `req_method` and OPTIONS, with OPTIONS appended. `*` asks for
    /// every method the router knows. `None` when nothing else matches.
    #[must_use]
    pub fn allowed(&self, path: &str, req_method: &Method) -> Option<String> {
        let mut allow: Vec<&str> = Vec::with_capacity(self.trees.len() + 1);
        if path == "*" {
            // server-wide
            for tree in &self.trees {
                if tree.method != Method::OPTIONS {
                    allow.push(tree.method.as_str());
                }
            }
        } else {
            for tree in &self.trees {
                if tree.method == *req_method || tree.method == Method::OPTIONS {
                    continue;
                }
                if tree.root.get_value(path).is_match() {
                    allow.push(tree.method.as_str());
                }
            }
        }

        if allow.is_empty() {
            return None;
        }
        allow.push(Method::OPTIONS.as_str());
        Some(allow.join(", "))
    }

    /// Dispatch a request.
    ///
    /// The percent-decoded request path is resolved in the tree of the
    /// request method. Misses fall through the redirect, OPTIONS, 405 and 404
    /// policy configured on the router. When a panic handler is installed,
    /// panics raised below this call are recovered and answered by it.
    pub fn serve(&self, req: &Request) -> Response {
        let mut ctx = RequestContext::from_request(req);

        let Some(panic_handler) = &self.panic_handler else {
            return self.dispatch(req, &mut ctx);
        };

        match catch_unwind(AssertUnwindSafe(|| self.dispatch(req, &mut ctx))) {
            Ok(response) => response,
            Err(payload) => {
                warn!(
                    request_id = %ctx.request_id,
                    method = %req.method(),
                    path = %req.uri().path(),
                    route_pattern = ctx.route().unwrap_or(""),
                    panic = %panic_message(payload.as_ref()),
                    elapsed_us = ctx.elapsed().as_micros() as u64,
                    "Handler panicked, recovered by panic handler"
                );
                panic_handler.call(req, payload)
            }
        }
    }

    fn dispatch(&self, req: &Request, ctx: &mut RequestContext) -> Response {
        let method = req.method();
        let path = decode_path(req.uri().path());

        if let Some(root) = self.tree(method) {
            let lookup = root.get_value(&path);
            if let Some(endpoint) = lookup.value {
                ctx.set_route(&endpoint.pattern);
                debug!(
                    request_id = %ctx.request_id,
                    method = %method,
                    path = %path,
                    route_pattern = %endpoint.pattern,
                    params = lookup.params.len(),
                    "Route matched"
                );
                return endpoint.call(req, &lookup.params, ctx);
            }

            if *method != Method::CONNECT && path != "/" {
                // 301 for GET, 307 keeps the method and body for everything else
                let code = if *method == Method::GET {
                    StatusCode::MOVED_PERMANENTLY
                } else {
                    StatusCode::TEMPORARY_REDIRECT
                };

                if lookup.tsr && self.config.redirect_trailing_slash {
                    let target = match path.strip_suffix('/') {
                        Some(trimmed) if path.len() > 1 => trimmed.to_string(),
                        _ => format!("{path}/"),
                    };
                    debug!(
                        request_id = %ctx.request_id,
                        method = %method,
                        path = %path,
                        location = %target,
                        "Trailing slash redirect"
                    );
                    return redirect(req, &target, code);
                }

                // Try to fix the request path
                if self.config.redirect_fixed_path {
                    if let Some(fixed) = root.find_case_insensitive_path(
                        &clean_path(&path),
                        self.config.redirect_trailing_slash,
                    ) {
                        debug!(
                            request_id = %ctx.request_id,
                            method = %method,
                            path = %path,
                            location = %fixed,
                            "Fixed path redirect"
                        );
                        return redirect(req, &fixed, code);
                    }
                }
            }
        }

        if *method == Method::OPTIONS && self.config.handle_options {
            // Handle OPTIONS requests
            if let Some(allow) = self.allowed(&path, method) {
                let mut response = Response::new(Vec::new());
                set_allow(&mut response, &allow);
                return response;
            }
        } else if self.config.handle_method_not_allowed {
            // Handle 405
            if let Some(allow) = self.allowed(&path, method) {
                debug!(
                    request_id = %ctx.request_id,
                    method = %method,
                    path = %path,
                    allow = %allow,
                    "Method not allowed"
                );
                let mut response = match &self.method_not_allowed {
                    Some(handler) => handler.call(req, &Params::new(), ctx),
                    None => text_response(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed\n"),
                };
                set_allow(&mut response, &allow);
                return response;
            }
        }

        // Handle 404
        debug!(
            request_id = %ctx.request_id,
            method = %method,
            path = %path,
            "No route matched"
        );
        match &self.not_found {
            Some(handler) => handler.call(req, &Params::new(), ctx),
            None => not_found(),
        }
    }
}

/// Percent-decode a request path. Paths that do not decode to UTF-8 are
/// matched as they arrived.
fn decode_path(raw: &str) -> Cow<'_, str> {
    if !raw.contains('%') {
        return Cow::Borrowed(raw);
    }
    urlencoding::decode(raw).unwrap_or(Cow::Borrowed(raw))
}

/// Inverse of [`decode_path`], segment by segment so `/` stays a separator.
fn encode_path(path: &str) -> String {
    path.split('/')
        .map(urlencoding::encode)
        .collect::<Vec<_>>()
        .join("/")
}

fn redirect(req: &Request, target_path: &str, code: StatusCode) -> Response {
    let mut location = encode_path(target_path);
    if let Some(query) = req.uri().query() {
        location.push('?');
        location.push_str(query);
    }

    let body = if *req.method() == Method::GET {
        format!(
            "<a href=\"{}\">{}</a>.\n\n",
            html_escape(&location),
            code.canonical_reason().unwrap_or("Redirect")
        )
        .into_bytes()
    } else {
        Vec::new()
    };

    let mut response = Response::new(body);
    *response.status_mut() = code;
    if let Ok(value) = HeaderValue::from_str(&location) {
        response.headers_mut().insert(LOCATION, value);
    }
    if *req.method() == Method::GET || *req.method() == Method::HEAD {
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8"));
    }
    response
}

fn set_allow(response: &mut Response, allow: &str) {
    if let Ok(value) = HeaderValue::from_str(allow) {
        response.headers_mut().insert(ALLOW, value);
    }
}

fn text_response(status: StatusCode, body: &str) -> Response {
    let mut response = Response::new(body.as_bytes().to_vec());
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    headers.insert("x-content-type-options", HeaderValue::from_static("nosniff"));
    response
}

fn not_found() -> Response {
    text_response(StatusCode::NOT_FOUND, "404 page not found\n")
}

fn serve_file(files: &dyn FileSystem, req: &Request, path: &str, ctx: &RequestContext) -> Response {
    match files.open(path) {
        Ok((bytes, content_type)) => {
            let mut response = Response::new(bytes);
            response
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
            response
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => not_found(),
        Err(err) if err.kind() == io::ErrorKind::PermissionDenied => {
            text_response(StatusCode::FORBIDDEN, "403 Forbidden\n")
        }
        Err(err) => {
            warn!(
                request_id = %ctx.request_id,
                path = %req.uri().path(),
                error = %err,
                "Failed to read static file"
            );
            text_response(StatusCode::INTERNAL_SERVER_ERROR, "500 Internal Server Error\n")
        }
    }
}

fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
