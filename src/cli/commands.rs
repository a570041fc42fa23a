use std::any::Any;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use http::header::CONTENT_TYPE;
use http::{HeaderValue, Method, StatusCode};
use tracing::info;

use crate::config::{RouterConfig, ServerConfig};
use crate::handler::{panic_message, Request, RequestContext, Response};
use crate::logging::{init_logging, LogConfig};
use crate::router::{Params, Router};
use crate::server::HttpServer;
use crate::static_files::StaticFiles;

/// Command-line interface for trierouter
#[derive(Parser)]
#[command(name = "trierouter")]
#[command(about = "Radix tree HTTP router", long_about = None)]
pub struct Cli {
    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Serve the demo routes over HTTP
    Serve {
        /// Address to bind (overrides TRIEROUTER_ADDR)
        #[arg(short, long)]
        addr: Option<SocketAddr>,

        /// Worker threads (overrides TRIEROUTER_WORKERS)
        #[arg(short, long)]
        workers: Option<usize>,

        /// YAML file with router switches
        #[arg(short, long, env = "TRIEROUTER_CONFIG")]
        config: Option<PathBuf>,

        /// Directory served under /static/*filepath
        #[arg(long)]
        static_dir: Option<PathBuf>,

        /// Pretty, synchronous debug logs instead of JSON
        #[arg(long, default_value_t = false)]
        dev_logs: bool,
    },
    /// Resolve a request against the demo routes and print the outcome
    Lookup {
        /// HTTP method, e.g. GET
        method: String,

        /// Request path, optionally with a query string
        path: String,

        /// YAML file with router switches
        #[arg(short, long, env = "TRIEROUTER_CONFIG")]
        config: Option<PathBuf>,
    },
    /// List the demo routes
    Routes,
}

/// Parse `std::env::args` and run the selected command.
///
/// # Errors
///
/// Configuration, logging or bind failures.
pub fn run_cli() -> anyhow::Result<()> {
    run(Cli::parse())
}

/// Run an already parsed command line.
///
/// # Errors
///
/// See [`run_cli`].
pub fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Serve {
            addr,
            workers,
            config,
            static_dir,
            dev_logs,
        } => {
            let log_config = if dev_logs {
                LogConfig::default_dev()
            } else {
                LogConfig::from_env()
            };
            // Flushes buffered log lines when dropped
            let _log_guard = init_logging(&log_config)?;

            let mut server_config = ServerConfig::from_env()?;
            if let Some(addr) = addr {
                server_config.addr = addr;
            }
            if let Some(workers) = workers {
                server_config.workers = workers.max(1);
            }

            let router = demo_router(load_router_config(config.as_deref())?, static_dir)?;
            let handle = HttpServer::new(router, server_config)
                .start()
                .with_context(|| format!("binding {}", server_config.addr))?;
            info!(addr = %handle.addr(), "Serving demo routes");

            handle
                .join()
                .map_err(|payload| anyhow::anyhow!("worker panicked: {}", panic_message(payload.as_ref())))
        }
        Commands::Lookup {
            method,
            path,
            config,
        } => {
            let router = demo_router(load_router_config(config.as_deref())?, None)?;
            let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
                .with_context(|| format!("invalid method {method}"))?;
            println!("{}", describe_lookup(&router, &method, &path)?);
            Ok(())
        }
        Commands::Routes => {
            let router = demo_router(RouterConfig::default(), None)?;
            for (method, pattern) in router.routes() {
                println!("{method:<7} {pattern}");
            }
            Ok(())
        }
    }
}

fn load_router_config(path: Option<&Path>) -> anyhow::Result<RouterConfig> {
    match path {
        Some(path) => RouterConfig::load(path),
        None => Ok(RouterConfig::from_env()),
    }
}

/// Human readable account of how `router` answers `method path`.
///
/// # Errors
///
/// `path` is not a valid request target.
pub fn describe_lookup(router: &Router, method: &Method, path: &str) -> anyhow::Result<String> {
    let req = http::Request::builder()
        .method(method.clone())
        .uri(path)
        .body(Vec::new())
        .with_context(|| format!("invalid request target {path}"))?;

    let mut out = String::new();
    let found = router.lookup(method, req.uri().path());
    match found.value {
        Some(endpoint) => {
            out.push_str(&format!("route:  {} {}\n", method, endpoint.pattern()));
            for (key, value) in found.params.iter() {
                out.push_str(&format!("param:  {key} = {value:?}\n"));
            }
        }
        None => {
            out.push_str("route:  <none>\n");
            if found.tsr {
                out.push_str("hint:   trailing slash redirect available\n");
            }
        }
    }

    let response = router.serve(&req);
    out.push_str(&format!("status: {}", response.status().as_u16()));
    for name in ["location", "allow"] {
        if let Some(value) = response.headers().get(name).and_then(|v| v.to_str().ok()) {
            out.push_str(&format!("\n{name}: {value}"));
        }
    }
    Ok(out)
}

/// Routes served by the `serve` command.
///
/// # Errors
///
/// Registration conflicts, which would be a bug in this function.
pub fn demo_router(config: RouterConfig, static_dir: Option<PathBuf>) -> anyhow::Result<Router> {
    let mut router = Router::with_config(config);
    router.get("/", index)?;
    router.get("/hello/:name", hello)?;
    router.get("/users/:id", show_user)?;
    router.get("/users/new", new_user_form)?;
    router.post("/users", create_user)?;
    router.get("/users/:id/files/*filepath", user_file)?;
    router.get("/panic", explode)?;
    if let Some(dir) = static_dir {
        router.serve_files("/static/*filepath", StaticFiles::new(dir))?;
    }
    router.set_panic_handler(recover);
    Ok(router)
}

fn text(status: StatusCode, body: String) -> Response {
    let mut response = Response::new(body.into_bytes());
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    response
}

fn index(_: &Request, _: &Params, _: &RequestContext) -> Response {
    text(StatusCode::OK, "Welcome!\n".to_string())
}

fn hello(_: &Request, params: &Params, _: &RequestContext) -> Response {
    let name = params.get("name").unwrap_or_default();
    text(StatusCode::OK, format!("hello, {name}!\n"))
}

fn show_user(_: &Request, params: &Params, ctx: &RequestContext) -> Response {
    let id = params.get("id").unwrap_or_default();
    text(
        StatusCode::OK,
        format!("user {id} (request {})\n", ctx.request_id),
    )
}

fn new_user_form(_: &Request, _: &Params, _: &RequestContext) -> Response {
    text(StatusCode::OK, "new user form\n".to_string())
}

fn create_user(req: &Request, _: &Params, _: &RequestContext) -> Response {
    text(
        StatusCode::CREATED,
        format!("created user from {} bytes\n", req.body().len()),
    )
}

fn user_file(_: &Request, params: &Params, _: &RequestContext) -> Response {
    let id = params.get("id").unwrap_or_default();
    let file = params.get("filepath").unwrap_or_default();
    text(StatusCode::OK, format!("user {id} file {file:?}\n"))
}

#[allow(clippy::panic)]
fn explode(_: &Request, _: &Params, _: &RequestContext) -> Response {
    panic!("demo panic")
}

fn recover(_: &Request, payload: Box<dyn Any + Send>) -> Response {
    text(
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("internal error: {}\n", panic_message(payload.as_ref())),
    )
}
