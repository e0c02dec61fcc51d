//! The non-blocking TCP substrate: per-connection buffers, the connection
//! table, the reactor abstraction over `mio`, and the server loop tying them
//! together.

pub mod buffer;
pub mod connection;
pub mod reactor;
pub mod server;

pub use connection::{Connection, ConnectionState, ConnectionTable};
pub use reactor::{EventKind, Reactor};
pub use server::{Server, ServerError};
