//! Conversion between `tiny_http` and the router's `http` types.

use std::io::Read;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Instant;

use http::header::CONTENT_TYPE;
use http::{HeaderValue, StatusCode};
use tracing::{debug, error};

use crate::handler::{panic_message, RemoteAddr, Request, Response};
use crate::router::SharedRouter;

/// Why an incoming request could not be handed to the router
#[derive(Debug)]
pub enum RequestError {
    /// Body exceeds the configured limit
    BodyTooLarge { limit: usize },
    /// Reading the body failed
    Io(std::io::Error),
    /// Method, URI or a header is not valid HTTP
    Invalid(http::Error),
}

impl std::fmt::Display for RequestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestError::BodyTooLarge { limit } => {
                write!(f, "request body exceeds {limit} bytes")
            }
            RequestError::Io(e) => write!(f, "failed to read request body: {e}"),
            RequestError::Invalid(e) => write!(f, "malformed request: {e}"),
        }
    }
}

impl std::error::Error for RequestError {}

/// Feeds `tiny_http` requests through a [`SharedRouter`].
#[derive(Clone, Debug)]
pub struct AppService {
    pub router: SharedRouter,
    pub max_body_bytes: usize,
}

impl AppService {
    #[must_use]
    pub fn new(router: SharedRouter, max_body_bytes: usize) -> Self {
        Self {
            router,
            max_body_bytes,
        }
    }

    /// Serve one request and write the response back to the client.
    pub fn handle(&self, mut request: tiny_http::Request) {
        let start = Instant::now();
        let method = request.method().as_str().to_string();
        let url = request.url().to_string();

        let response = match parse_request(&mut request, self.max_body_bytes) {
            Ok(req) => self.call_router(&req),
            Err(err @ RequestError::BodyTooLarge { .. }) => {
                debug!(method = %method, url = %url, error = %err, "Rejected request");
                plain(StatusCode::PAYLOAD_TOO_LARGE, "413 Payload Too Large\n")
            }
            Err(err) => {
                debug!(method = %method, url = %url, error = %err, "Rejected request");
                plain(StatusCode::BAD_REQUEST, "400 Bad Request\n")
            }
        };

        let status = response.status().as_u16();
        if let Err(err) = request.respond(into_tiny_response(response)) {
            debug!(method = %method, url = %url, error = %err, "Client went away before the response was written");
        }
        debug!(
            method = %method,
            url = %url,
            status,
            latency_us = start.elapsed().as_micros() as u64,
            "Request completed"
        );
    }

    /// Run the router, turning an unrecovered panic into a bare 500 so the
    /// worker thread survives.
    fn call_router(&self, req: &Request) -> Response {
        match catch_unwind(AssertUnwindSafe(|| self.router.serve(req))) {
            Ok(response) => response,
            Err(payload) => {
                error!(
                    method = %req.method(),
                    path = %req.uri().path(),
                    panic = %panic_message(payload.as_ref()),
                    "Handler panicked"
                );
                plain(StatusCode::INTERNAL_SERVER_ERROR, "500 Internal Server Error\n")
            }
        }
    }
}

/// Build an `http::Request` from a `tiny_http` one, reading at most
/// `max_body_bytes` of body.
///
/// # Errors
///
/// See [`RequestError`].
pub fn parse_request(
    request: &mut tiny_http::Request,
    max_body_bytes: usize,
) -> Result<Request, RequestError> {
    if request.body_length().is_some_and(|len| len > max_body_bytes) {
        return Err(RequestError::BodyTooLarge {
            limit: max_body_bytes,
        });
    }

    let mut builder = http::Request::builder()
        .method(request.method().as_str())
        .uri(request.url());
    for header in request.headers() {
        builder = builder.header(header.field.as_str().as_str(), header.value.as_str());
    }
    if let Some(addr) = request.remote_addr() {
        builder = builder.extension(RemoteAddr(*addr));
    }

    let mut body = Vec::new();
    request
        .as_reader()
        .take(max_body_bytes as u64 + 1)
        .read_to_end(&mut body)
        .map_err(RequestError::Io)?;
    if body.len() > max_body_bytes {
        return Err(RequestError::BodyTooLarge {
            limit: max_body_bytes,
        });
    }

    builder.body(body).map_err(RequestError::Invalid)
}

fn into_tiny_response(response: Response) -> tiny_http::Response<std::io::Cursor<Vec<u8>>> {
    let (parts, body) = response.into_parts();
    let mut out =
        tiny_http::Response::from_data(body).with_status_code(tiny_http::StatusCode(parts.status.as_u16()));
    for (name, value) in &parts.headers {
        if let Ok(header) = tiny_http::Header::from_bytes(name.as_str().as_bytes(), value.as_bytes()) {
            out.add_header(header);
        }
    }
    out
}

fn plain(status: StatusCode, body: &str) -> Response {
    let mut response = Response::new(body.as_bytes().to_vec());
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    response
}
