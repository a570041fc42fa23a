use std::fmt;

/// Route registration error
///
/// Returned by [`Router::handle`](super::Router::handle) and friends when a
/// pattern is malformed or collides with a route that is already in the tree.
/// These are startup failures: a half-built routing table should never serve
/// traffic, so callers are expected to abort on them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    /// The pattern is the empty string
    Empty,
    /// The pattern does not begin with `/`
    MissingLeadingSlash {
        /// The offending pattern
        path: String,
    },
    /// A `:` or `*` with nothing after it
    UnnamedWildcard {
        /// The offending pattern
        path: String,
    },
    /// More than one wildcard inside a single path segment, e.g. `/:a:b`
    MultipleWildcardsInSegment {
        /// The segment holding the wildcards
        segment: String,
        /// The offending pattern
        path: String,
    },
    /// Characters follow a `*name` catch-all
    CatchAllNotAtEnd {
        /// The offending pattern
        path: String,
    },
    /// A catch-all that does not directly follow a `/`
    CatchAllWithoutSlash {
        /// The offending pattern
        path: String,
    },
    /// A wildcard at a fork already claimed by a different wildcard
    WildcardConflict {
        /// The new wildcard segment
        segment: String,
        /// The new pattern
        path: String,
        /// The wildcard already registered at this fork
        existing: String,
        /// The registered prefix leading to the fork
        prefix: String,
    },
    /// A catch-all that would shadow (or be shadowed by) another route
    CatchAllConflict {
        /// The new pattern
        path: String,
        /// The route already registered at the fork
        existing: String,
    },
    /// The exact (method, pattern) pair is already registered
    Duplicate {
        /// HTTP method
        method: String,
        /// The duplicated pattern
        path: String,
    },
    /// `serve_files` was given a pattern not ending in `/*filepath`
    ServeFilesPattern {
        /// The offending pattern
        path: String,
    },
}

impl RouteError {
    /// Attach the HTTP method to a duplicate error raised by the tree, which
    /// has no notion of methods.
    pub(crate) fn with_method(self, method: &str) -> Self {
        match self {
            RouteError::Duplicate { path, .. } => RouteError::Duplicate {
                method: method.to_string(),
                path,
            },
            other => other,
        }
    }
}

impl fmt::Display for RouteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteError::Empty => write!(f, "route pattern is empty"),
            RouteError::MissingLeadingSlash { path } => {
                write!(f, "path must begin with '/' in path '{path}'")
            }
            RouteError::UnnamedWildcard { path } => {
                write!(
                    f,
                    "wildcards must be named with a non-empty name in path '{path}'"
                )
            }
            RouteError::MultipleWildcardsInSegment { segment, path } => {
                write!(
                    f,
                    "only one wildcard per path segment is allowed, has: '{segment}' in path '{path}'"
                )
            }
            RouteError::CatchAllNotAtEnd { path } => {
                write!(
                    f,
                    "catch-all routes are only allowed at the end of the path in path '{path}'"
                )
            }
            RouteError::CatchAllWithoutSlash { path } => {
                write!(f, "no / before catch-all in path '{path}'")
            }
            RouteError::WildcardConflict {
                segment,
                path,
                existing,
                prefix,
            } => {
                write!(
                    f,
                    "'{segment}' in new path '{path}' conflicts with existing wildcard '{existing}' in existing prefix '{prefix}'"
                )
            }
            RouteError::CatchAllConflict { path, existing } => {
                write!(
                    f,
                    "catch-all in new path '{path}' conflicts with existing route '{existing}'"
                )
            }
            RouteError::Duplicate { method, path } => {
                write!(f, "a handle is already registered for {method} '{path}'")
            }
            RouteError::ServeFilesPattern { path } => {
                write!(f, "path must end with /*filepath in path '{path}'")
            }
        }
    }
}

impl std::error::Error for RouteError {}
