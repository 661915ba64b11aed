//! Non-blocking transport seam.
//!
//! Implementations wrap a concrete TCP stack (smoltcp on the device, a
//! non-blocking `std` listener in the simulator, an in-memory fake in
//! tests). The stack is only ever driven from [`Transport::poll`], which the
//! service calls once per tick; everything the stack did since the previous
//! poll comes back as [`TransportEvent`]s.

use alloc::vec::Vec;

use heapless::Deque;
use thiserror_no_std::Error;

pub type ConnectionId = u32;

/// Events buffered per poll. A transport stops draining its stack when the
/// queue is full and picks up the remainder on the next poll.
pub const EVENT_QUEUE_CAPACITY: usize = 16;

pub type EventQueue = Deque<TransportEvent, EVENT_QUEUE_CAPACITY>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Accepted(ConnectionId),
    /// Bytes received on a connection. An empty payload means the peer
    /// closed its side.
    Received {
        conn: ConnectionId,
        payload: Vec<u8>,
    },
    /// The stack finished transmitting `len` previously written bytes.
    Sent { conn: ConnectionId, len: usize },
    PeerClosed(ConnectionId),
}

impl TransportEvent {
    pub fn connection(&self) -> ConnectionId {
        match self {
            TransportEvent::Accepted(conn) | TransportEvent::PeerClosed(conn) => *conn,
            TransportEvent::Received { conn, .. } | TransportEvent::Sent { conn, .. } => *conn,
        }
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    #[error("Connection is closed")]
    Closed,
    #[error("Unknown connection")]
    UnknownConnection,
    #[error("Network stack error")]
    Stack,
}

pub trait Transport {
    /// Drive the stack and report what happened since the last poll.
    fn poll(&mut self, now_ms: u32, events: &mut EventQueue);

    /// Queue bytes for transmission. Returns how many were accepted, which
    /// may be fewer than offered (zero when the send buffer is full).
    fn write(&mut self, conn: ConnectionId, data: &[u8]) -> Result<usize, TransportError>;

    /// Close a connection. Closing an unknown or already closed connection
    /// is a no-op.
    fn close(&mut self, conn: ConnectionId);
}
