//! Per-connection state: socket, outbound buffer, LRU links, and HTTP
//! sub-state.
//!
//! `send`/write-buffering grounded in `original_source/src/tcp_server.c`'s
//! `tcp_server_write` (try a direct write, buffer the remainder and arm
//! `EPOLLOUT` on a short write or `WouldBlock`) and `handle_write_event`
//! (drain from `sent`, disarm write interest once empty).

use std::any::Any;
use std::io::{self, Read, Write};
use std::time::Instant;

use mio::net::TcpStream;
use mio::{Interest, Registry, Token};
use tracing::trace;

use crate::http::HttpState;

/// Bytes read from the socket per readiness notification.
pub const READ_BUFFER_SIZE: usize = 8192;
/// Starting capacity for the outbound buffer; doubles as needed.
pub const INITIAL_WRITE_BUFFER_CAPACITY: usize = 4096;

pub struct Connection {
    pub socket: TcpStream,
    pub token: Token,
    pub peer_addr: String,
    pub last_activity: Instant,

    pub(crate) lru_prev: Option<Token>,
    pub(crate) lru_next: Option<Token>,

    out_buf: Vec<u8>,
    out_sent: usize,
    write_interest: bool,

    pub http: HttpState,
    pub closed: bool,

    /// Opaque per-connection data a Router may stash on `on_connect` and
    /// retrieve on later calls. Never inspected by the reactor itself.
    pub router_data: Option<Box<dyn Any + Send>>,
}

impl Connection {
    pub fn new(socket: TcpStream, token: Token, peer_addr: String) -> Self {
        Self {
            socket,
            token,
            peer_addr,
            last_activity: Instant::now(),
            lru_prev: None,
            lru_next: None,
            out_buf: Vec::with_capacity(INITIAL_WRITE_BUFFER_CAPACITY),
            out_sent: 0,
            write_interest: false,
            http: HttpState::new(),
            closed: false,
            router_data: None,
        }
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    pub fn is_idle_for(&self, timeout: std::time::Duration) -> bool {
        self.last_activity.elapsed() >= timeout
    }

    /// Read available bytes into a caller-provided buffer, draining until
    /// the socket would block, is closed by the peer, or errors. Returns
    /// `true` if the peer closed the connection (a zero-length read).
    pub fn read_available(&mut self, mut on_chunk: impl FnMut(&[u8])) -> io::Result<bool> {
        let mut buf = [0u8; READ_BUFFER_SIZE];
        loop {
            match self.socket.read(&mut buf) {
                Ok(0) => return Ok(true),
                Ok(n) => {
                    self.touch();
                    on_chunk(&buf[..n]);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(false),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// Send data to the peer, writing directly when the outbound buffer is
    /// empty and buffering whatever doesn't fit. Arms `Interest::WRITABLE`
    /// when a remainder is buffered.
    pub fn send(&mut self, registry: &Registry, data: &[u8]) -> io::Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        if self.out_buf.is_empty() {
            match self.socket.write(data) {
                Ok(n) if n == data.len() => {
                    self.touch();
                    return Ok(());
                }
                Ok(n) => {
                    self.touch();
                    self.buffer_remainder(registry, &data[n..])?;
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    self.buffer_remainder(registry, data)?;
                }
                Err(e) => return Err(e),
            }
        } else {
            self.out_buf.extend_from_slice(data);
        }
        Ok(())
    }

    fn buffer_remainder(&mut self, registry: &Registry, remainder: &[u8]) -> io::Result<()> {
        self.out_buf.extend_from_slice(remainder);
        self.out_sent = 0;
        self.arm_writable(registry)
    }

    /// Drain the outbound buffer when the socket becomes writable. Returns
    /// `true` once fully drained (and disarms write interest).
    pub fn flush(&mut self, registry: &Registry) -> io::Result<bool> {
        if self.out_buf.is_empty() {
            return Ok(true);
        }
        loop {
            match self.socket.write(&self.out_buf[self.out_sent..]) {
                Ok(0) => return Err(io::Error::from(io::ErrorKind::WriteZero)),
                Ok(n) => {
                    self.touch();
                    self.out_sent += n;
                    if self.out_sent >= self.out_buf.len() {
                        self.out_buf.clear();
                        self.out_sent = 0;
                        self.disarm_writable(registry)?;
                        return Ok(true);
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(false),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    fn arm_writable(&mut self, registry: &Registry) -> io::Result<()> {
        if self.write_interest {
            return Ok(());
        }
        self.write_interest = true;
        registry.reregister(&mut self.socket, self.token, Interest::READABLE | Interest::WRITABLE)
    }

    fn disarm_writable(&mut self, registry: &Registry) -> io::Result<()> {
        if !self.write_interest {
            return Ok(());
        }
        self.write_interest = false;
        registry.reregister(&mut self.socket, self.token, Interest::READABLE)
    }

    /// Deregister from the event source and mark closed. Actual removal
    /// from the connection table and LRU, and the `on_close` callback, are
    /// deferred until the current event has finished processing.
    pub fn close_conn(&mut self, registry: &Registry) {
        if self.closed {
            return;
        }
        trace!(token = ?self.token, peer = %self.peer_addr, "closing connection");
        let _ = registry.deregister(&mut self.socket);
        self.closed = true;
    }
}
