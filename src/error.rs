use std::path::PathBuf;

use thiserror::Error;

/// Crate-level failures: startup, binding, and configuration. Never raised
/// for a single connection's bad input — see [`crate::http::ParseError`] for
/// that.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind listening socket on port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to register with the readiness multiplexer: {0}")]
    Poll(#[source] std::io::Error),

    #[error("could not resolve web root {path}: {source}")]
    RootResolve {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("web root {0} is not a directory")]
    RootNotADirectory(PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ServerError>;
