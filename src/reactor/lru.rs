//! Intrusive doubly-linked LRU over the connection table, keyed by
//! `mio::Token`. Every live connection holds its own prev/next links
//! (`Connection::lru_prev`/`lru_next`), so every operation here is O(1) and
//! no separate allocation is needed per move.
//!
//! Grounded in `original_source/src/tcp_server.c`'s `move_conn_to_tail` and
//! `close_inactive_connections`, which rely on the same invariant: the list
//! is kept in activity order, oldest at the head, so eviction can stop
//! scanning at the first connection that hasn't timed out.

use std::collections::HashMap;

use mio::Token;

use super::connection::Connection;

#[derive(Default)]
pub struct Lru {
    head: Option<Token>,
    tail: Option<Token>,
}

impl Lru {
    pub fn new() -> Self {
        Self {
            head: None,
            tail: None,
        }
    }

    pub fn front(&self) -> Option<Token> {
        self.head
    }

    /// Append a newly-accepted connection to the tail (most recently
    /// active position).
    pub fn push_back(&mut self, conns: &mut HashMap<Token, Connection>, token: Token) {
        let old_tail = self.tail.take();
        if let Some(conn) = conns.get_mut(&token) {
            conn.lru_prev = old_tail;
            conn.lru_next = None;
        }
        if let Some(old_tail_token) = old_tail {
            if let Some(old_tail_conn) = conns.get_mut(&old_tail_token) {
                old_tail_conn.lru_next = Some(token);
            }
        } else {
            self.head = Some(token);
        }
        self.tail = Some(token);
    }

    /// Splice `token` out of the list. Safe to call on a token already
    /// unlinked (no-op).
    pub fn unlink(&mut self, conns: &mut HashMap<Token, Connection>, token: Token) {
        let (prev, next) = match conns.get(&token) {
            Some(conn) => (conn.lru_prev, conn.lru_next),
            None => return,
        };
        match prev {
            Some(p) => {
                if let Some(pc) = conns.get_mut(&p) {
                    pc.lru_next = next;
                }
            }
            None => {
                if self.head == Some(token) {
                    self.head = next;
                }
            }
        }
        match next {
            Some(n) => {
                if let Some(nc) = conns.get_mut(&n) {
                    nc.lru_prev = prev;
                }
            }
            None => {
                if self.tail == Some(token) {
                    self.tail = prev;
                }
            }
        }
        if let Some(conn) = conns.get_mut(&token) {
            conn.lru_prev = None;
            conn.lru_next = None;
        }
    }

    /// Move `token` to the tail on every successful read or write,
    /// recording it as the most recently active connection. No-op when it
    /// is already the tail.
    pub fn move_to_back(&mut self, conns: &mut HashMap<Token, Connection>, token: Token) {
        if self.tail == Some(token) {
            return;
        }
        self.unlink(conns, token);
        self.push_back(conns, token);
    }
}
