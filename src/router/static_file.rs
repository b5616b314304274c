//! Default Router: serves static files and directory listings from a
//! configured root.
//!
//! Grounded in `original_source/src/http_router.c`. Path resolution is raw
//! concatenation of the root and the request URI — no percent-decoding, as
//! in the original (`is_valid_uri` doesn't admit `?`, and `on_request`
//! `snprintf`s the URI onto the root verbatim). `..` anywhere in the URI is
//! rejected before any filesystem access; the resolved path is additionally
//! required to canonicalize inside the root, guarding against symlinks the
//! substring check alone wouldn't catch.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use mio::Registry;
use tracing::warn;

use crate::error::{Result, ServerError};
use crate::http::{
    error_body, error_response, generate_directory_listing, mime_type_for_extension, DirEntry,
    HttpRequest, HttpResponse, Method,
};
use crate::reactor::Connection;
use crate::router::Router;

const FILE_CHUNK_SIZE: usize = 4096;

pub struct StaticFileRouter {
    root: PathBuf,
    browse_enabled: bool,
}

impl StaticFileRouter {
    pub fn new(root: impl AsRef<Path>, browse_enabled: bool) -> Result<Self> {
        let root = root.as_ref();
        let canonical = std::fs::canonicalize(root).map_err(|source| ServerError::RootResolve {
            path: root.to_path_buf(),
            source,
        })?;
        if !canonical.is_dir() {
            return Err(ServerError::RootNotADirectory(canonical));
        }
        Ok(Self {
            root: canonical,
            browse_enabled,
        })
    }

    /// Resolve a request URI to a filesystem path under the root, or the
    /// status code that should be returned instead.
    fn resolve(&self, uri: &str) -> std::result::Result<PathBuf, u16> {
        if uri.contains("..") {
            return Err(400);
        }
        let relative = uri.trim_start_matches('/');
        let candidate = self.root.join(relative);
        match std::fs::canonicalize(&candidate) {
            Ok(resolved) if resolved.starts_with(&self.root) => Ok(resolved),
            Ok(_) => Err(403),
            Err(_) => Err(404),
        }
    }

    fn serve(&self, conn: &mut Connection, registry: &Registry, request: &HttpRequest) {
        let include_body = matches!(request.method, Method::Get);
        let path = match self.resolve(&request.uri) {
            Ok(p) => p,
            Err(code) => {
                self.send_error(conn, registry, code);
                return;
            }
        };

        let metadata = match std::fs::metadata(&path) {
            Ok(m) => m,
            Err(_) => {
                self.send_error(conn, registry, 404);
                return;
            }
        };

        if metadata.is_dir() {
            self.handle_dir(conn, registry, &request.uri, &path, include_body);
        } else if metadata.is_file() {
            self.handle_file(conn, registry, &path, &metadata, include_body);
        } else {
            self.send_error(conn, registry, 403);
        }
    }

    fn handle_dir(
        &self,
        conn: &mut Connection,
        registry: &Registry,
        uri: &str,
        path: &Path,
        include_body: bool,
    ) {
        if !self.browse_enabled {
            let index = path.join("index.html");
            if index.is_file() {
                let metadata = match std::fs::metadata(&index) {
                    Ok(m) => m,
                    Err(_) => {
                        self.send_error(conn, registry, 404);
                        return;
                    }
                };
                self.handle_file(conn, registry, &index, &metadata, include_body);
            } else {
                self.send_error(conn, registry, 403);
            }
            return;
        }

        let entries = match std::fs::read_dir(path) {
            Ok(rd) => rd
                .filter_map(|e| e.ok())
                .map(|e| DirEntry {
                    name: e.file_name().to_string_lossy().into_owned(),
                    is_dir: e.file_type().map(|t| t.is_dir()).unwrap_or(false),
                })
                .collect::<Vec<_>>(),
            Err(_) => {
                self.send_error(conn, registry, 403);
                return;
            }
        };

        let body = generate_directory_listing(uri, &entries);
        let response = HttpResponse::status(200).content_type("text/html").body(body);
        let head = response.head_bytes();
        if conn.send(registry, &head).is_err() {
            conn.close_conn(registry);
            return;
        }
        if include_body && conn.send(registry, &response.body).is_err() {
            conn.close_conn(registry);
        }
    }

    fn handle_file(
        &self,
        conn: &mut Connection,
        registry: &Registry,
        path: &Path,
        metadata: &std::fs::Metadata,
        include_body: bool,
    ) {
        let mime = path
            .extension()
            .and_then(|e| e.to_str())
            .map(mime_type_for_extension)
            .unwrap_or("application/octet-stream");

        let head = HttpResponse::status(200)
            .content_type(mime)
            .header("Content-Length", metadata.len().to_string())
            .head_bytes();
        if conn.send(registry, &head).is_err() {
            conn.close_conn(registry);
            return;
        }

        if !include_body {
            return;
        }

        let mut file = match File::open(path) {
            Ok(f) => f,
            Err(e) => {
                warn!(error = %e, path = %path.display(), "failed to open file for streaming");
                conn.close_conn(registry);
                return;
            }
        };
        let mut buf = [0u8; FILE_CHUNK_SIZE];
        loop {
            match file.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if conn.send(registry, &buf[..n]).is_err() {
                        conn.close_conn(registry);
                        break;
                    }
                }
                Err(e) => {
                    warn!(error = %e, path = %path.display(), "error reading file body");
                    conn.close_conn(registry);
                    break;
                }
            }
        }
    }

    /// `error_response` always sets `Connection: close`; the socket must
    /// actually close to match, exactly as `send_error_response` does in
    /// the original router.
    fn send_error(&self, conn: &mut Connection, registry: &Registry, code: u16) {
        let response = error_response(code);
        let _ = conn.send(registry, &response.to_bytes());
        conn.close_conn(registry);
    }
}

impl Router for StaticFileRouter {
    fn on_connect(&mut self, _conn: &mut Connection, _registry: &Registry) {}

    fn on_request(&mut self, conn: &mut Connection, registry: &Registry, request: HttpRequest) {
        match request.method {
            Method::Get | Method::Head => self.serve(conn, registry, &request),
            _ => {
                let response = HttpResponse::status(405)
                    .header("Allow", "GET, HEAD")
                    .header("Connection", "close")
                    .content_type("text/html")
                    .body(error_body(405));
                let _ = conn.send(registry, &response.to_bytes());
                conn.close_conn(registry);
            }
        }
    }
}
