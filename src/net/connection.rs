//! Per-connection state and the connection table: a sparse, slot-stable
//! array of connections backed by `slab::Slab`.

use crate::net::buffer::{ConnectionBuffer, DEFAULT_BUFFER_CAPACITY};
use mio::net::TcpStream;
use slab::Slab;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnecting,
    Disconnected,
}

pub struct Connection {
    pub stream: TcpStream,
    pub buffer: ConnectionBuffer,
    pub state: ConnectionState,
}

impl Connection {
    pub fn new(stream: TcpStream) -> Self {
        Self::with_buffer_capacity(stream, DEFAULT_BUFFER_CAPACITY)
    }

    pub fn with_buffer_capacity(stream: TcpStream, buffer_capacity: usize) -> Self {
        Self {
            stream,
            buffer: ConnectionBuffer::new(buffer_capacity),
            state: ConnectionState::Connecting,
        }
    }
}

/// Indexable, sparse connection storage. A slot, once assigned index `i`,
/// keeps identity `i` for the connection's lifetime; freed slots are reused
/// by `Slab` before the backing array grows, so a connection's index can
/// double as its subscriber identity elsewhere in the broker.
#[derive(Default)]
pub struct ConnectionTable {
    slots: Slab<Connection>,
}

impl ConnectionTable {
    pub fn new() -> Self {
        Self { slots: Slab::new() }
    }

    pub fn insert(&mut self, connection: Connection) -> usize {
        self.slots.insert(connection)
    }

    pub fn remove(&mut self, index: usize) -> Option<Connection> {
        if self.slots.contains(index) {
            Some(self.slots.remove(index))
        } else {
            None
        }
    }

    pub fn get(&self, index: usize) -> Option<&Connection> {
        self.slots.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Connection> {
        self.slots.get_mut(index)
    }

    pub fn contains(&self, index: usize) -> bool {
        self.slots.contains(index)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
