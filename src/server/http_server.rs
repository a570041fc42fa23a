use std::io;
use std::net::{SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{info, warn};

use super::service::AppService;
use crate::config::ServerConfig;
use crate::router::SharedRouter;

/// How long a worker blocks on the listener before re-checking the stop flag
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Blocking HTTP server feeding a pool of worker threads
///
/// Each worker pulls requests off a shared `tiny_http` listener and runs
/// them through the router on its own thread.
pub struct HttpServer {
    service: AppService,
    config: ServerConfig,
}

/// Handle to a running HTTP server
///
/// Provides methods for waiting until the server is ready, stopping it gracefully,
/// or joining the worker threads.
pub struct ServerHandle {
    addr: SocketAddr,
    stop: Arc<AtomicBool>,
    workers: Vec<JoinHandle<()>>,
}

impl ServerHandle {
    /// Address the server is bound to, with the real port when `:0` was
    /// requested
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Wait for the server to be ready to accept connections
    ///
    /// Polls the server address by attempting TCP connections until successful.
    /// Useful in tests to ensure the server is fully started before sending requests.
    ///
    /// # Errors
    ///
    /// Returns `TimedOut` error if the server doesn't become ready within ~250ms (50 attempts × 5ms).
    pub fn wait_ready(&self) -> io::Result<()> {
        for _ in 0..50 {
            if TcpStream::connect(self.addr).is_ok() {
                return Ok(());
            }
            thread::sleep(Duration::from_millis(5));
        }
        Err(io::Error::new(io::ErrorKind::TimedOut, "server not ready"))
    }

    /// Stop the server gracefully
    ///
    /// Workers finish the request in hand, notice the stop flag within one
    /// poll interval and exit. Consumes the handle.
    pub fn stop(self) {
        self.stop.store(true, Ordering::Release);
        for worker in self.workers {
            if worker.join().is_err() {
                warn!("Worker thread panicked during shutdown");
            }
        }
        info!(addr = %self.addr, "HTTP server stopped");
    }

    /// Block until every worker thread has exited, which only happens after
    /// [`stop`](ServerHandle::stop) was requested from elsewhere.
    ///
    /// # Errors
    ///
    /// Returns the payload of the first worker that panicked.
    pub fn join(self) -> thread::Result<()> {
        for worker in self.workers {
            worker.join()?;
        }
        Ok(())
    }
}

impl HttpServer {
    pub fn new(router: impl Into<SharedRouter>, config: ServerConfig) -> Self {
        Self {
            service: AppService::new(router.into(), config.max_body_bytes),
            config,
        }
    }

    /// Bind the configured address and spawn the workers.
    ///
    /// # Errors
    ///
    /// Returns an error if the port cannot be bound or a worker thread
    /// cannot be spawned.
    pub fn start(self) -> io::Result<ServerHandle> {
        let server = tiny_http::Server::http(self.config.addr)
            .map_err(|e| io::Error::new(io::ErrorKind::AddrNotAvailable, e))?;
        let addr = server
            .server_addr()
            .to_ip()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "not an IP listener"))?;

        let server = Arc::new(server);
        let stop = Arc::new(AtomicBool::new(false));
        let worker_count = self.config.workers.max(1);

        let mut workers = Vec::with_capacity(worker_count);
        for i in 0..worker_count {
            let server = Arc::clone(&server);
            let service = self.service.clone();
            let worker_stop = Arc::clone(&stop);
            let worker = thread::Builder::new()
                .name(format!("trierouter-worker-{i}"))
                .spawn(move || worker_loop(&server, &service, &worker_stop));
            match worker {
                Ok(handle) => workers.push(handle),
                Err(err) => {
                    stop.store(true, Ordering::Release);
                    return Err(err);
                }
            }
        }

        self.service.router.snapshot().log_routes();
        info!(
            addr = %addr,
            workers = worker_count,
            max_body_bytes = self.config.max_body_bytes,
            "HTTP server listening"
        );

        Ok(ServerHandle {
            addr,
            stop,
            workers,
        })
    }
}

fn worker_loop(server: &tiny_http::Server, service: &AppService, stop: &AtomicBool) {
    while !stop.load(Ordering::Acquire) {
        match server.recv_timeout(POLL_INTERVAL) {
            Ok(Some(request)) => service.handle(request),
            Ok(None) => {}
            Err(err) => {
                warn!(error = %err, "Failed to accept request");
                thread::sleep(POLL_INTERVAL);
            }
        }
    }
}
