//! Files served under a `/*filepath` catch-all route.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Source of static content for [`Router::serve_files`](crate::Router::serve_files).
///
/// `path` is the catch-all value of the request, relative and without a
/// leading slash (`""` for the mount point itself). Implementations return
/// the file contents together with a content type.
pub trait FileSystem: Send + Sync + 'static {
    /// # Errors
    ///
    /// `NotFound` for missing files, `PermissionDenied` for paths the
    /// implementation refuses to serve; anything else maps to a 500.
    fn open(&self, path: &str) -> io::Result<(Vec<u8>, &'static str)>;
}

/// Directory-backed [`FileSystem`].
#[derive(Debug, Clone)]
pub struct StaticFiles {
    base_dir: PathBuf,
    index_file: String,
}

impl StaticFiles {
    pub fn new<P: Into<PathBuf>>(base: P) -> Self {
        Self {
            base_dir: base.into(),
            index_file: "index.html".to_string(),
        }
    }

    /// File served for directory paths, `index.html` unless overridden.
    #[must_use]
    pub fn with_index_file(mut self, name: impl Into<String>) -> Self {
        self.index_file = name.into();
        self
    }

    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Map a URL path onto the base directory. Anything other than plain
    /// names and `.` is rejected, so the result never leaves `base_dir`.
    fn map_path(&self, url_path: &str) -> Option<PathBuf> {
        let mut pb = self.base_dir.clone();
        for comp in Path::new(url_path.trim_start_matches('/')).components() {
            match comp {
                Component::Normal(s) => pb.push(s),
                Component::CurDir => {}
                _ => return None,
            }
        }
        Some(pb)
    }

    fn content_type(path: &Path) -> &'static str {
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        match ext.as_str() {
            "html" | "htm" => "text/html; charset=utf-8",
            "css" => "text/css; charset=utf-8",
            "js" | "mjs" => "text/javascript; charset=utf-8",
            "json" => "application/json",
            "txt" => "text/plain; charset=utf-8",
            "svg" => "image/svg+xml",
            "png" => "image/png",
            "jpg" | "jpeg" => "image/jpeg",
            "gif" => "image/gif",
            "ico" => "image/x-icon",
            "wasm" => "application/wasm",
            "pdf" => "application/pdf",
            _ => "application/octet-stream",
        }
    }
}

impl FileSystem for StaticFiles {
    fn open(&self, url_path: &str) -> io::Result<(Vec<u8>, &'static str)> {
        let mut path = self
            .map_path(url_path)
            .ok_or_else(|| io::Error::new(io::ErrorKind::PermissionDenied, "invalid path"))?;
        if url_path.is_empty() || url_path.ends_with('/') || path.is_dir() {
            path.push(&self.index_file);
        }
        if !path.is_file() {
            return Err(io::Error::new(io::ErrorKind::NotFound, "file not found"));
        }
        let bytes = fs::read(&path)?;
        Ok((bytes, Self::content_type(&path)))
    }
}
