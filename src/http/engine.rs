//! Per-connection HTTP/1.1 state machine: accumulates header bytes, hands
//! off to the body sink, and assembles a dispatch-ready [`HttpRequest`].
//!
//! Grounded in `original_source/src/http_server.c`'s `http_on_data` /
//! `try_parse_request` / `init_body_reading` / `check_if_body_received` /
//! `handle_request` / `reset_http_conn`. `headers_buf` only ever grows while
//! `ConnState::ReadingHeaders`; once a full head is parsed, any bytes past
//! the header terminator that are already sitting in the buffer are the
//! start of the body (or of the next pipelined request) and are moved into
//! the body sink before more socket reads are consulted — this mirrors
//! `init_body_reading`'s spillover copy exactly, including that
//! `headers_buf` is never truncated at that point, only shifted later once
//! a request is fully dispatched.

use std::collections::VecDeque;

use super::parser::{self, ParseError, ParsedHead};
use super::request::{Body, HttpRequest};
use crate::body::BodySink;

/// Header blocks larger than this are rejected with `431`.
pub const HEADERS_MAX: usize = 8192;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    ReadingHeaders,
    ReadingBody,
}

pub struct HttpState {
    pub conn_state: ConnState,
    headers_buf: Vec<u8>,
    head: Option<ParsedHead>,
    body_expected: u64,
    body_received: u64,
    body_sink: Option<BodySink>,
    /// Completed requests awaiting dispatch. A plain `Option` slot isn't
    /// enough: a single `feed` call can complete more than one request at
    /// once (e.g. a body finishes and the same chunk's leftover bytes hold
    /// a whole second headers-only pipelined request), so each completion
    /// must queue rather than overwrite.
    ready: VecDeque<HttpRequest>,
}

impl Default for HttpState {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpState {
    pub fn new() -> Self {
        Self {
            conn_state: ConnState::ReadingHeaders,
            headers_buf: Vec::with_capacity(HEADERS_MAX),
            head: None,
            body_expected: 0,
            body_received: 0,
            body_sink: None,
            ready: VecDeque::new(),
        }
    }

    /// Ingest a freshly-read chunk of socket bytes. Returns an error when
    /// the request is malformed or the header block has grown past
    /// `HEADERS_MAX`; either case is the caller's signal to answer with the
    /// matching status and close the connection.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<(), ParseError> {
        match self.conn_state {
            ConnState::ReadingHeaders => self.feed_headers(chunk),
            ConnState::ReadingBody => self.feed_body(chunk),
        }
    }

    /// Keep parsing complete header blocks out of `headers_buf` for as long
    /// as this chunk already contains them — a read can carry several
    /// pipelined requests's worth of bytes at once. `headers_buf` only ever
    /// accumulates cumulative junk if nothing in it ever completes; as soon
    /// as a block parses, its bytes are drained (`complete_request`) or the
    /// state moves to `ReadingBody`, so 431 must be judged only once no more
    /// progress is possible — never against the raw cumulative length,
    /// which would also count already-drained-away pipelined requests'
    /// worth of throughput that happened to arrive in one big read.
    fn feed_headers(&mut self, chunk: &[u8]) -> Result<(), ParseError> {
        self.headers_buf.extend_from_slice(chunk);
        loop {
            let found = self.try_parse_head()?;
            if !found {
                if self.headers_buf.len() > HEADERS_MAX {
                    return Err(ParseError::HeadersTooLarge);
                }
                return Ok(());
            }
            if self.conn_state != ConnState::ReadingHeaders || self.headers_buf.is_empty() {
                return Ok(());
            }
        }
    }

    /// Returns `true` if a full header block (`CRLF CRLF`) was found and
    /// consumed — whether that request then dispatched immediately
    /// (`Content-Length: 0`) or moved to `ReadingBody` — and `false` if
    /// `headers_buf` holds only a partial header block so far.
    fn try_parse_head(&mut self) -> Result<bool, ParseError> {
        let head = match parser::try_parse_head(&self.headers_buf)? {
            Some(head) => head,
            None => return Ok(false),
        };
        let expected = parser::content_length(&head.headers)?;
        let headers_len = head.headers_len;
        self.head = Some(head);
        self.body_expected = expected;
        self.body_received = 0;

        if expected == 0 {
            self.complete_request(headers_len)?;
            return Ok(true);
        }

        self.body_sink = Some(BodySink::for_expected_len(expected).map_err(ParseError::Internal)?);
        self.conn_state = ConnState::ReadingBody;

        // Spillover: bytes already in headers_buf past the terminator
        // belong to the body (or a pipelined next request). Copy up to
        // body_expected bytes into the sink now, matching
        // init_body_reading's to_copy = min(body_in_buffer, body_expected).
        let available = self.headers_buf.len() - headers_len;
        let to_copy = available.min(expected as usize);
        if to_copy > 0 {
            let slice = self.headers_buf[headers_len..headers_len + to_copy].to_vec();
            self.body_sink
                .as_mut()
                .unwrap()
                .write_all(&slice)
                .map_err(ParseError::Internal)?;
            self.body_received += to_copy as u64;
        }

        if self.body_received >= self.body_expected {
            self.complete_request(headers_len)?;
        }
        Ok(true)
    }

    fn feed_body(&mut self, chunk: &[u8]) -> Result<(), ParseError> {
        let remaining = (self.body_expected - self.body_received) as usize;
        let take = remaining.min(chunk.len());
        self.body_sink
            .as_mut()
            .expect("body sink present while ReadingBody")
            .write_all(&chunk[..take])
            .map_err(ParseError::Internal)?;
        self.body_received += take as u64;

        // Any leftover bytes in this same read are the start of the next
        // pipelined request's header block.
        let leftover = &chunk[take..];

        if self.body_received >= self.body_expected {
            let headers_len = self.head.as_ref().map(|h| h.headers_len).unwrap_or(0);
            self.complete_request(headers_len)?;
            if !leftover.is_empty() {
                return self.feed_headers(leftover);
            }
        }
        Ok(())
    }

    /// Finish the current request: rewind the body sink, stash the request
    /// for `take_ready`, and shift any bytes past this request's total size
    /// to the front of `headers_buf` for the next request — exactly
    /// `handle_request`'s final memmove.
    fn complete_request(&mut self, headers_len: usize) -> Result<(), ParseError> {
        let head = self.head.take().expect("head parsed before completion");
        let total = headers_len + self.body_expected as usize;

        let body = match self.body_sink.take() {
            Some(mut sink) => {
                sink.finalize().map_err(ParseError::Internal)?;
                match sink {
                    BodySink::Memory(buf) => Body::Bytes(buf),
                    BodySink::File(file) => Body::File(file),
                }
            }
            None => Body::Absent,
        };

        self.ready.push_back(HttpRequest {
            method: head.method,
            uri: head.uri,
            version: head.version,
            headers: head.headers,
            body,
        });

        if self.headers_buf.len() > total {
            self.headers_buf.drain(..total);
        } else {
            self.headers_buf.clear();
        }
        self.conn_state = ConnState::ReadingHeaders;
        self.body_expected = 0;
        self.body_received = 0;
        Ok(())
    }

    /// Pop a fully-assembled request if one is ready. While the queue is
    /// empty but bytes already buffered could complete another headers-only
    /// request (a pipelined next request with no body), keep parsing so
    /// back-to-back requests in one read don't wait on another socket
    /// readiness event.
    pub fn take_ready(&mut self) -> Result<Option<HttpRequest>, ParseError> {
        while self.ready.is_empty()
            && self.conn_state == ConnState::ReadingHeaders
            && !self.headers_buf.is_empty()
        {
            let before = self.headers_buf.len();
            self.try_parse_head()?;
            if self.headers_buf.len() == before && self.ready.is_empty() {
                break;
            }
        }
        Ok(self.ready.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_completion_and_next_pipelined_request_both_survive_one_feed() {
        // One `feed` call whose chunk both finishes a POST's body and
        // carries a whole second, headers-only GET. Before the ready queue,
        // the second completion silently clobbered the first.
        let mut state = HttpState::new();
        state
            .feed(b"POST /p HTTP/1.1\r\nHost: x\r\nContent-Length: 5\r\n\r\n")
            .unwrap();
        assert_eq!(state.conn_state, ConnState::ReadingBody);

        state
            .feed(b"helloGET /q HTTP/1.1\r\nHost: x\r\n\r\n")
            .unwrap();

        let first = state.take_ready().unwrap().expect("first request lost");
        assert_eq!(first.uri, "/p");
        let second = state.take_ready().unwrap().expect("second request lost");
        assert_eq!(second.uri, "/q");
        assert!(state.take_ready().unwrap().is_none());
    }

    #[test]
    fn pipelined_headers_only_requests_in_one_chunk_both_queue() {
        let mut state = HttpState::new();
        state
            .feed(b"GET /a HTTP/1.1\r\nHost: x\r\n\r\nGET /b HTTP/1.1\r\nHost: x\r\n\r\n")
            .unwrap();

        let first = state.take_ready().unwrap().expect("first request lost");
        assert_eq!(first.uri, "/a");
        let second = state.take_ready().unwrap().expect("second request lost");
        assert_eq!(second.uri, "/b");
    }
}
