pub mod static_file;

pub use static_file::StaticFileRouter;

use mio::Registry;

use crate::http::HttpRequest;
use crate::reactor::Connection;

/// The collaborator contract between the reactor and request-handling
/// policy. Every method receives the concrete connection it concerns —
/// Rust's borrow checker enforces that the reference is only valid for the
/// call, which is the same "don't hold this past the callback" discipline
/// the original enforces by convention around its raw connection pointers.
pub trait Router: Send {
    /// Called once a new connection is accepted. Whatever is returned
    /// (stashed via `conn.router_data`) is available on every later call
    /// for this connection.
    fn on_connect(&mut self, conn: &mut Connection, registry: &Registry);

    /// A full request has been parsed. The router must either answer it
    /// (via `conn.send`) or close the connection — leaving neither undone
    /// stalls the client.
    fn on_request(&mut self, conn: &mut Connection, registry: &Registry, request: HttpRequest);

    /// The request could not be parsed. Default behaviour is a `400` with
    /// `Connection: close`; routers may override to customize the body.
    fn on_bad_request(&mut self, conn: &mut Connection, registry: &Registry) {
        let response = crate::http::error_response(400);
        let _ = conn.send(registry, &response.to_bytes());
    }

    /// An unexpected error occurred while handling a request.
    fn on_server_error(&mut self, conn: &mut Connection, registry: &Registry) {
        let response = crate::http::error_response(500);
        let _ = conn.send(registry, &response.to_bytes());
    }

    /// The connection has been fully reclaimed; this is the last callback
    /// for it.
    fn on_close(&mut self, _conn: &mut Connection) {}
}
