//! Router handle that accepts registrations while serving.
//!
//! Readers load the current [`Router`] snapshot without locking. Writers
//! clone the snapshot, register on the clone and publish it in one atomic
//! swap, so a request always sees either the old or the new table.

use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwap;
use http::Method;
use tracing::info;

use super::core::{Endpoint, Router};
use super::error::RouteError;
use super::tree::Lookup;
use crate::handler::{Request, Response};

/// Copy-on-write wrapper around [`Router`]
#[derive(Clone)]
pub struct SharedRouter {
    inner: Arc<Inner>,
}

struct Inner {
    current: ArcSwap<Router>,
    /// Serializes writers so concurrent registrations are not lost
    write_lock: Mutex<()>,
}

impl SharedRouter {
    #[must_use]
    pub fn new(router: Router) -> Self {
        Self {
            inner: Arc::new(Inner {
                current: ArcSwap::new(Arc::new(router)),
                write_lock: Mutex::new(()),
            }),
        }
    }

    /// Current routing table
    #[must_use]
    pub fn snapshot(&self) -> Arc<Router> {
        self.inner.current.load_full()
    }

    /// Dispatch against the current snapshot.
    pub fn serve(&self, req: &Request) -> Response {
        self.inner.current.load().serve(req)
    }

    /// Resolve against the current snapshot, returning the matched endpoint
    /// by value since the snapshot may be replaced at any time.
    #[must_use]
    pub fn lookup(&self, method: &Method, path: &str) -> Option<(Endpoint, crate::Params)> {
        let snapshot = self.inner.current.load();
        let Lookup { value, params, .. } = snapshot.lookup(method, path);
        value.cloned().map(|endpoint| (endpoint, params))
    }

    /// Apply `f` to a copy of the router and publish the copy if `f`
    /// succeeds. On error the published router is left as it was.
    ///
    /// # Errors
    ///
    /// Whatever `f` returns.
    pub fn register<F>(&self, f: F) -> Result<(), RouteError>
    where
        F: FnOnce(&mut Router) -> Result<(), RouteError>,
    {
        let _guard = self
            .inner
            .write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let mut next = Router::clone(&self.inner.current.load());
        let before = next.routes().len();
        f(&mut next)?;
        let after = next.routes().len();

        self.inner.current.store(Arc::new(next));
        info!(
            routes_added = after.saturating_sub(before),
            routes_count = after,
            "Routing table updated"
        );
        Ok(())
    }
}

impl From<Router> for SharedRouter {
    fn from(router: Router) -> Self {
        Self::new(router)
    }
}

impl std::fmt::Debug for SharedRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedRouter")
            .field("current", &self.inner.current.load())
            .finish()
    }
}
