//! Request line, method, and header types.
//!
//! Grounded in `original_source/src/http_parser.c`: nine known methods
//! matched by exact case-sensitive token, anything else is `Unknown` and
//! rejected by the parser itself as malformed (`parse_method` /
//! `http_parse_request`).

use std::fs::File;

/// HTTP method token. `Unknown` exists only so the parser can report it as
/// part of a `BadRequest`; no request carrying it ever reaches a Router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Head,
    Options,
    Patch,
    Trace,
    Connect,
    Unknown,
}

impl Method {
    pub fn parse(token: &str) -> Method {
        match token {
            "GET" => Method::Get,
            "POST" => Method::Post,
            "PUT" => Method::Put,
            "DELETE" => Method::Delete,
            "HEAD" => Method::Head,
            "OPTIONS" => Method::Options,
            "PATCH" => Method::Patch,
            "TRACE" => Method::Trace,
            "CONNECT" => Method::Connect,
            _ => Method::Unknown,
        }
    }
}

/// A fully parsed request body, handed to the Router at dispatch time.
pub enum Body {
    Absent,
    Bytes(Vec<u8>),
    File(File),
}

/// A parsed HTTP/1.1 request. Headers are kept in arrival order, as
/// `parse_headers` in the original builds them: first match wins on lookup,
/// duplicates are never merged.
pub struct HttpRequest {
    pub method: Method,
    pub uri: String,
    pub version: String,
    pub headers: Vec<(String, String)>,
    pub body: Body,
}

impl HttpRequest {
    /// Case-insensitive first-match header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn keep_alive(&self) -> bool {
        match self.header("Connection") {
            Some(v) => !v.eq_ignore_ascii_case("close"),
            None => true,
        }
    }
}
