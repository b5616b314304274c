//! Common imports for internal modules. Mirrors the shape of the reactor
//! crate's own prelude, trimmed to what this crate actually has: no CGI,
//! uploads, or sessions survived the transformation into a static-file
//! server.

pub use crate::body::{BodySink, BODY_IN_FILE_THRESHOLD, MAX_CONTENT_LENGTH};
pub use crate::config::Args;
pub use crate::error::{Result, ServerError};
pub use crate::http::{
    error_body, error_response, status_text, Body, ConnState, HttpRequest, HttpResponse,
    HttpState, Method, ParseError,
};
pub use crate::reactor::{Connection, Server};
pub use crate::router::{Router, StaticFileRouter};

pub use mio::{Events, Interest, Poll, Registry, Token};
pub use std::io::{self, Read, Write};
pub use std::path::{Path, PathBuf};
pub use std::time::{Duration, Instant};
