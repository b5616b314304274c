//! The reactor: single-threaded, edge-triggered event loop driving accept,
//! read, write, and inactivity eviction.
//!
//! Grounded in `original_source/src/tcp_server.c`'s `tcp_server_run`,
//! `create_listening_socket`, `handle_new_conn_event`, `handle_read_event`,
//! `handle_write_event`, and `close_inactive_connections`.

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mio::net::{TcpListener, TcpStream};
use mio::{Events, Interest, Poll, Registry, Token};
use tracing::{debug, info, warn};

use super::connection::Connection;
use super::lru::Lru;
use crate::error::{Result, ServerError};
use crate::http::{error_response, ParseError};
use crate::router::Router;

const LISTENER_TOKEN: Token = Token(0);
const MAX_EVENTS: usize = 64;
const EPOLL_CHECK_INTERVAL_MS: u64 = 5000;

pub struct Server {
    poll: Poll,
    listener: TcpListener,
    connections: HashMap<Token, Connection>,
    lru: Lru,
    next_token: usize,
    conn_timeout: Duration,
    stop_flag: Arc<AtomicBool>,
    router: Box<dyn Router>,
}

impl Server {
    pub fn new(port: u16, conn_timeout_secs: u64, router: Box<dyn Router>) -> Result<Self> {
        let addr: SocketAddr = ([0, 0, 0, 0], port).into();
        let mut listener = TcpListener::bind(addr).map_err(|source| ServerError::Bind {
            port,
            source,
        })?;

        let poll = Poll::new().map_err(ServerError::Poll)?;
        poll.registry()
            .register(&mut listener, LISTENER_TOKEN, Interest::READABLE)
            .map_err(ServerError::Poll)?;

        Ok(Self {
            poll,
            listener,
            connections: HashMap::new(),
            lru: Lru::new(),
            next_token: 1,
            conn_timeout: Duration::from_secs(conn_timeout_secs),
            stop_flag: Arc::new(AtomicBool::new(false)),
            router,
        })
    }

    /// A handle that can be used from a signal handler to request a clean
    /// shutdown on the next loop iteration.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.stop_flag.clone()
    }

    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::SeqCst);
    }

    fn next_token(&mut self) -> Token {
        let token = Token(self.next_token);
        self.next_token += 1;
        token
    }

    pub fn run(&mut self) -> Result<()> {
        let mut events = Events::with_capacity(MAX_EVENTS);
        let timeout = if self.conn_timeout.is_zero() {
            None
        } else {
            Some(Duration::from_millis(EPOLL_CHECK_INTERVAL_MS))
        };

        info!("server running");
        loop {
            if self.stop_flag.load(Ordering::SeqCst) {
                info!("stop requested, shutting down");
                return Ok(());
            }

            match self.poll.poll(&mut events, timeout) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(ServerError::Io(e)),
            }

            for event in events.iter() {
                if event.token() == LISTENER_TOKEN {
                    self.accept_loop();
                    continue;
                }
                self.dispatch_event(event.token(), event.is_readable(), event.is_writable());
            }

            if !self.conn_timeout.is_zero() {
                self.evict_inactive();
            }
        }
    }

    fn accept_loop(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((socket, addr)) => self.handle_new_conn(socket, addr),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    break;
                }
            }
        }
    }

    fn handle_new_conn(&mut self, mut socket: TcpStream, addr: SocketAddr) {
        let token = self.next_token();
        if let Err(e) = self
            .poll
            .registry()
            .register(&mut socket, token, Interest::READABLE)
        {
            warn!(error = %e, "failed to register new connection");
            return;
        }

        let mut conn = Connection::new(socket, token, addr.to_string());
        self.router.on_connect(&mut conn, self.poll.registry());
        self.connections.insert(token, conn);
        self.lru.push_back(&mut self.connections, token);
        debug!(%addr, "accepted connection");
    }

    fn dispatch_event(&mut self, token: Token, readable: bool, writable: bool) {
        if readable {
            self.handle_read(token);
        }
        if writable && !self.is_closed(token) {
            self.handle_write(token);
        }
        self.reclaim_if_closed(token);
    }

    fn is_closed(&self, token: Token) -> bool {
        self.connections.get(&token).map(|c| c.closed).unwrap_or(true)
    }

    /// A malformed request or an overflowing header block always closes the
    /// connection. Header overflow is answered directly with `431` (it is
    /// not a Router concern — the Router's `on_bad_request` contract only
    /// covers `400`); everything else goes through the Router so it can
    /// customize the body.
    fn reject(router: &mut dyn Router, conn: &mut Connection, registry: &Registry, err: ParseError) {
        match err {
            ParseError::HeadersTooLarge => {
                let response = error_response(431);
                let _ = conn.send(registry, &response.to_bytes());
            }
            ParseError::BadRequest => {
                router.on_bad_request(conn, registry);
            }
            ParseError::Internal(ref e) => {
                warn!(error = %e, "internal error assembling request");
                router.on_server_error(conn, registry);
            }
        }
        conn.close_conn(registry);
    }

    fn handle_read(&mut self, token: Token) {
        self.lru.move_to_back(&mut self.connections, token);
        let registry = self.poll.registry();

        let conn = match self.connections.get_mut(&token) {
            Some(c) => c,
            None => return,
        };

        let mut chunks: Vec<Vec<u8>> = Vec::new();
        let peer_closed = match conn.read_available(|chunk| chunks.push(chunk.to_vec())) {
            Ok(closed) => closed,
            Err(e) => {
                warn!(error = %e, ?token, "read error");
                conn.close_conn(registry);
                return;
            }
        };

        for chunk in chunks {
            if conn.closed {
                break;
            }
            if let Err(parse_err) = conn.http.feed(&chunk) {
                Self::reject(&mut *self.router, conn, registry, parse_err);
                break;
            }
            loop {
                match conn.http.take_ready() {
                    Ok(Some(request)) => {
                        let keep_alive = request.keep_alive();
                        self.router.on_request(conn, registry, request);
                        if !keep_alive {
                            conn.close_conn(registry);
                        }
                    }
                    Ok(None) => break,
                    Err(parse_err) => {
                        Self::reject(&mut *self.router, conn, registry, parse_err);
                        break;
                    }
                }
                if conn.closed {
                    break;
                }
            }
        }

        if peer_closed {
            conn.close_conn(registry);
        }
    }

    fn handle_write(&mut self, token: Token) {
        let registry = self.poll.registry();
        let conn = match self.connections.get_mut(&token) {
            Some(c) => c,
            None => return,
        };
        match conn.flush(registry) {
            Ok(_drained) => self.lru.move_to_back(&mut self.connections, token),
            Err(e) => {
                warn!(error = %e, ?token, "write error");
                conn.close_conn(registry);
            }
        }
    }

    fn reclaim_if_closed(&mut self, token: Token) {
        let closed = self.connections.get(&token).map(|c| c.closed).unwrap_or(false);
        if !closed {
            return;
        }
        self.lru.unlink(&mut self.connections, token);
        if let Some(mut conn) = self.connections.remove(&token) {
            self.router.on_close(&mut conn);
        }
    }

    fn evict_inactive(&mut self) {
        let timeout = self.conn_timeout;
        loop {
            let token = match self.lru.front() {
                Some(t) => t,
                None => break,
            };
            let expired = self
                .connections
                .get(&token)
                .map(|c| c.is_idle_for(timeout))
                .unwrap_or(false);
            if !expired {
                break;
            }
            let registry = self.poll.registry();
            if let Some(conn) = self.connections.get_mut(&token) {
                conn.close_conn(registry);
            }
            self.reclaim_if_closed(token);
        }
    }
}
