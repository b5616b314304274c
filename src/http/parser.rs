//! Header-block parsing: request line, method, URI validation, version, and
//! the header list, plus `Content-Length` extraction.
//!
//! Grounded in `original_source/src/http_parser.c`. Errors here are always
//! localized to one connection — never promoted to a crate-level
//! `ServerError`.

use thiserror::Error;

use super::request::Method;
use crate::body::MAX_CONTENT_LENGTH;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed request")]
    BadRequest,
    #[error("request header fields too large")]
    HeadersTooLarge,
    /// Internal allocation or I/O failure while assembling the request
    /// (e.g. the body's temp file couldn't be created) — never the
    /// client's fault, so it's answered with `500` via the Router's
    /// `on_server_error` rather than `400`.
    #[error("internal error while parsing request: {0}")]
    Internal(#[source] std::io::Error),
}

/// A fully parsed header block: method/URI/version/headers, and the byte
/// offset (including the trailing blank line) where the body begins.
pub struct ParsedHead {
    pub method: Method,
    pub uri: String,
    pub version: String,
    pub headers: Vec<(String, String)>,
    pub headers_len: usize,
}

/// Characters `is_valid_uri` in the original accepts outside
/// alphanumeric/percent-escapes: unreserved marks plus a handful of the
/// reserved set. No `?` — query strings are not part of the valid
/// character class, so they make a URI malformed rather than introducing a
/// query component.
const URI_EXTRA_CHARS: &[u8] = b"-._~/:@!$&+,;=()*'";

fn is_valid_uri(uri: &str) -> bool {
    if !uri.starts_with('/') {
        return false;
    }
    let bytes = uri.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        if c.is_ascii_alphanumeric() || URI_EXTRA_CHARS.contains(&c) {
            i += 1;
            continue;
        }
        if c == b'%' {
            if i + 2 >= bytes.len()
                || !bytes[i + 1].is_ascii_hexdigit()
                || !bytes[i + 2].is_ascii_hexdigit()
            {
                return false;
            }
            i += 3;
            continue;
        }
        return false;
    }
    true
}

fn trim(s: &str) -> &str {
    s.trim_matches(|c: char| c == ' ' || c == '\t')
}

fn parse_request_line(line: &str) -> Result<(Method, String, String), ParseError> {
    let mut parts = line.splitn(3, ' ');
    let method_tok = parts.next().ok_or(ParseError::BadRequest)?;
    let uri = parts.next().ok_or(ParseError::BadRequest)?;
    let version = parts.next().ok_or(ParseError::BadRequest)?;

    let method = Method::parse(method_tok);
    if method == Method::Unknown {
        return Err(ParseError::BadRequest);
    }
    if !is_valid_uri(uri) {
        return Err(ParseError::BadRequest);
    }
    if version != "HTTP/1.1" {
        return Err(ParseError::BadRequest);
    }
    Ok((method, uri.to_string(), version.to_string()))
}

fn parse_headers(block: &str) -> Result<Vec<(String, String)>, ParseError> {
    let mut headers = Vec::with_capacity(8);
    for line in block.split("\r\n") {
        if line.is_empty() {
            continue;
        }
        let colon = line.find(':').ok_or(ParseError::BadRequest)?;
        let name = trim(&line[..colon]);
        let value = trim(&line[colon + 1..]);
        if name.is_empty() {
            return Err(ParseError::BadRequest);
        }
        headers.push((name.to_string(), value.to_string()));
    }
    Ok(headers)
}

/// Look for a full header block (terminated by `\r\n\r\n`) in `buf` and
/// parse it. Returns `Ok(None)` if the terminator hasn't arrived yet.
pub fn try_parse_head(buf: &[u8]) -> Result<Option<ParsedHead>, ParseError> {
    let terminator = b"\r\n\r\n";
    let end = match find_subsequence(buf, terminator) {
        Some(pos) => pos,
        None => return Ok(None),
    };
    let headers_len = end + terminator.len();
    let text = std::str::from_utf8(&buf[..end]).map_err(|_| ParseError::BadRequest)?;
    let mut lines = text.splitn(2, "\r\n");
    let request_line = lines.next().ok_or(ParseError::BadRequest)?;
    let rest = lines.next().unwrap_or("");

    let (method, uri, version) = parse_request_line(request_line)?;
    let headers = parse_headers(rest)?;

    if !headers
        .iter()
        .any(|(k, _)| k.eq_ignore_ascii_case("Host"))
    {
        return Err(ParseError::BadRequest);
    }

    Ok(Some(ParsedHead {
        method,
        uri,
        version,
        headers,
        headers_len,
    }))
}

/// Extract and validate `Content-Length`. Absent or non-positive means no
/// body is expected. Values above `MAX_CONTENT_LENGTH`, or that don't parse
/// as a full non-negative integer, are malformed.
pub fn content_length(headers: &[(String, String)]) -> Result<u64, ParseError> {
    let raw = match headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("Content-Length"))
    {
        Some((_, v)) => v,
        None => return Ok(0),
    };
    let value: u64 = raw.trim().parse().map_err(|_| ParseError::BadRequest)?;
    if value > MAX_CONTENT_LENGTH {
        return Err(ParseError::BadRequest);
    }
    Ok(value)
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_method() {
        let req = b"FOO / HTTP/1.1\r\nHost: x\r\n\r\n";
        assert!(matches!(
            try_parse_head(req),
            Err(ParseError::BadRequest)
        ));
    }

    #[test]
    fn rejects_missing_host() {
        let req = b"GET / HTTP/1.1\r\n\r\n";
        assert!(matches!(
            try_parse_head(req),
            Err(ParseError::BadRequest)
        ));
    }

    #[test]
    fn rejects_query_string() {
        let req = b"GET /a?b=1 HTTP/1.1\r\nHost: x\r\n\r\n";
        assert!(matches!(
            try_parse_head(req),
            Err(ParseError::BadRequest)
        ));
    }

    #[test]
    fn parses_simple_get() {
        let req = b"GET /index.html HTTP/1.1\r\nHost: x\r\nConnection: keep-alive\r\n\r\n";
        let head = try_parse_head(req).unwrap().unwrap();
        assert_eq!(head.method, Method::Get);
        assert_eq!(head.uri, "/index.html");
        assert_eq!(head.headers_len, req.len());
    }

    #[test]
    fn incomplete_head_returns_none() {
        let req = b"GET / HTTP/1.1\r\nHost: x\r\n";
        assert!(try_parse_head(req).unwrap().is_none());
    }

    #[test]
    fn content_length_over_ceiling_rejected() {
        let headers = vec![("Content-Length".to_string(), "999999999999999".to_string())];
        assert!(matches!(content_length(&headers), Err(ParseError::BadRequest)));
    }
}
