//! Single, uniform interface over the platform-native readiness mechanism.
//! `mio`'s `Poll`/`Events`/`Token` provide that abstraction rather than
//! hand-rolling per-platform `epoll`/`kqueue` FFI.

use mio::event::Source;
use mio::{Events, Interest, Poll, Token};
use std::io;
use std::time::Duration;

/// The event-kind tag packed into the low bits of a `mio::Token`, alongside a
/// slot index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    MqttListener,
    MqttClient,
    AdminListener,
    AdminClient,
}

const KIND_BITS: usize = 2;
const KIND_MASK: usize = (1 << KIND_BITS) - 1;

impl EventKind {
    fn bits(self) -> usize {
        match self {
            EventKind::MqttListener => 0,
            EventKind::MqttClient => 1,
            EventKind::AdminListener => 2,
            EventKind::AdminClient => 3,
        }
    }

    fn from_bits(bits: usize) -> Self {
        match bits {
            0 => EventKind::MqttListener,
            1 => EventKind::MqttClient,
            2 => EventKind::AdminListener,
            _ => EventKind::AdminClient,
        }
    }
}

/// Packs an event kind and a connection-table slot index into one `Token`.
pub fn pack_token(kind: EventKind, slot: usize) -> Token {
    Token((slot << KIND_BITS) | kind.bits())
}

/// Inverse of `pack_token`.
pub fn unpack_token(token: Token) -> (EventKind, usize) {
    let bits = token.0 & KIND_MASK;
    let slot = token.0 >> KIND_BITS;
    (EventKind::from_bits(bits), slot)
}

pub struct Reactor {
    poll: Poll,
    events: Events,
}

impl Reactor {
    pub fn new(event_capacity: usize) -> io::Result<Self> {
        Ok(Self {
            poll: Poll::new()?,
            events: Events::with_capacity(event_capacity),
        })
    }

    pub fn register_read(&mut self, source: &mut impl Source, token: Token) -> io::Result<()> {
        self.poll.registry().register(source, token, Interest::READABLE)
    }

    pub fn remove(&mut self, source: &mut impl Source) -> io::Result<()> {
        self.poll.registry().deregister(source)
    }

    /// Blocks until at least one fd is ready or `timeout_ms` elapses (`None`
    /// blocks indefinitely), then invokes `callback` once per ready token.
    /// This call is the sole suspension point in the whole core.
    pub fn run(&mut self, timeout_ms: Option<u64>, mut callback: impl FnMut(Token)) -> io::Result<()> {
        let timeout = timeout_ms.map(Duration::from_millis);
        self.poll.poll(&mut self.events, timeout)?;
        for event in self.events.iter() {
            callback(event.token());
        }
        Ok(())
    }
}
