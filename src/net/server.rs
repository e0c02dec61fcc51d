//! Accept loop, per-fd dispatch, and the per-connection packet framing loop.

use crate::broker::Broker;
use crate::config::Config;
use crate::discovery::SERVICE_DISCOVERY_RESPONSE_SCHEMA;
use crate::mqtt::{FixedHeader, MqttCodecError, Packet};
use crate::net::buffer::{BufferError, ReadOutcome};
use crate::net::connection::{Connection, ConnectionState, ConnectionTable};
use crate::net::reactor::{pack_token, unpack_token, EventKind, Reactor};
use crate::schema::parser::parse_schema;
use crate::schema::registry::SchemaRegistry;
use crate::session::{self, HandlerAction, SessionTable};
use mio::net::TcpListener;
use socket2::{Domain, Socket, Type};
use std::io;
use std::net::SocketAddr;
use thiserror::Error;

/// Builds a non-blocking `mio::net::TcpListener` bound with the configured
/// listen backlog. `std::net::TcpListener::bind` hardcodes its own backlog,
/// so the socket is assembled by hand with `socket2` and handed to mio, the
/// same split the pack's other MQTT broker uses for backlog control.
fn bind_listener_with_backlog(addr: SocketAddr, backlog: u32) -> io::Result<TcpListener> {
    let domain = if addr.is_ipv6() { Domain::IPV6 } else { Domain::IPV4 };
    let socket = Socket::new(domain, Type::STREAM, None)?;
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(backlog as i32)?;
    socket.set_nonblocking(true)?;
    TcpListener::from_std(socket.into())
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind listener on {0}: {1}")]
    Bind(SocketAddr, #[source] io::Error),
    #[error("reactor setup failed: {0}")]
    Reactor(#[source] io::Error),
}

pub struct Server {
    listener: TcpListener,
    reactor: Reactor,
    connections: ConnectionTable,
    sessions: SessionTable,
    broker: Broker,
    registry: SchemaRegistry,
    buffer_capacity: usize,
}

impl Server {
    /// Binds the listener, registers it with the reactor as `mqtt_listener`,
    /// loads schemas from `config.schemas_dir`, bundles the reserved
    /// discovery schema, and inserts the example `sensor/data` binding.
    pub fn bind(config: &Config) -> Result<Self, ServerError> {
        let mut listener = bind_listener_with_backlog(config.bind, config.backlog)
            .map_err(|e| ServerError::Bind(config.bind, e))?;
        let mut reactor = Reactor::new(1024).map_err(ServerError::Reactor)?;
        reactor
            .register_read(&mut listener, pack_token(EventKind::MqttListener, 0))
            .map_err(ServerError::Reactor)?;
        log::info!("MQTT listener bound on {}", config.bind);

        let mut registry = SchemaRegistry::with_schemas_dir(config.schemas_dir.clone());
        for def in parse_schema(SERVICE_DISCOVERY_RESPONSE_SCHEMA)
            .expect("the bundled discovery schema is always well-formed")
        {
            let _ = registry.register_message(def);
        }
        match registry.load_from_directory(&config.schemas_dir) {
            Ok(n) => log::info!("loaded {n} message type(s) from {:?}", config.schemas_dir),
            Err(e) => log::warn!("schema directory load failed: {e}"),
        }
        if registry.lookup_message("SensorData").is_some() {
            if let Err(e) = registry.bind_topic("sensor/data", "SensorData") {
                log::warn!("could not bind example sensor/data topic: {e}");
            }
        }

        Ok(Self {
            listener,
            reactor,
            connections: ConnectionTable::new(),
            sessions: SessionTable::new(),
            broker: Broker::new(),
            registry,
            buffer_capacity: config.buffer_capacity,
        })
    }

    pub fn active_connections(&self) -> usize {
        self.connections.len()
    }

    pub fn listener_addr(&self) -> SocketAddr {
        self.listener
            .local_addr()
            .expect("a bound listener always has a local address")
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Runs the reactor forever. The sole suspension point is the reactor's
    /// `run`.
    pub fn run(&mut self) -> Result<(), ServerError> {
        loop {
            self.run_once(Some(1000))?;
        }
    }

    /// Services exactly one reactor batch; exposed separately so tests (and
    /// an embedding caller) can drive the loop deterministically.
    pub fn run_once(&mut self, timeout_ms: Option<u64>) -> Result<(), ServerError> {
        let mut ready = Vec::new();
        self.reactor
            .run(timeout_ms, |token| ready.push(token))
            .map_err(ServerError::Reactor)?;
        for token in ready {
            let (kind, slot) = unpack_token(token);
            match kind {
                EventKind::MqttListener => self.accept_loop(),
                EventKind::MqttClient => self.service_connection(slot),
                EventKind::AdminListener | EventKind::AdminClient => {
                    log::trace!("admin-channel event ignored (collaborator out of scope)");
                }
            }
        }
        Ok(())
    }

    fn accept_loop(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((stream, addr)) => {
                    log::info!("accepted connection from {addr}");
                    let index = self
                        .connections
                        .insert(Connection::with_buffer_capacity(stream, self.buffer_capacity));
                    let registered = self.connections.get_mut(index).map(|conn| {
                        let token = pack_token(EventKind::MqttClient, index);
                        self.reactor.register_read(&mut conn.stream, token)
                    });
                    match registered {
                        Some(Ok(())) => {
                            if let Some(conn) = self.connections.get_mut(index) {
                                conn.state = ConnectionState::Connected;
                            }
                            self.registry.connection_opened();
                        }
                        Some(Err(e)) => {
                            log::warn!("failed to register connection {index}: {e}");
                            self.connections.remove(index);
                        }
                        None => unreachable!("slot was just inserted"),
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    log::warn!("accept error: {e}");
                    break;
                }
            }
        }
    }

    fn service_connection(&mut self, index: usize) {
        if self.drain_connection(index) {
            self.close_connection(index);
        }
    }

    /// Reads (possibly several times, until `WouldBlock`) and, after each
    /// chunk, extracts and dispatches every complete packet already in the
    /// buffer. Returns whether the connection should be closed.
    fn drain_connection(&mut self, index: usize) -> bool {
        loop {
            let outcome = match self.connections.get_mut(index) {
                Some(conn) => conn.buffer.read_from(&mut conn.stream),
                None => return true,
            };
            match outcome {
                Ok(ReadOutcome::Read(0)) => continue,
                Ok(ReadOutcome::Read(_)) => {
                    if self.process_framed_packets(index) {
                        return true;
                    }
                }
                Ok(ReadOutcome::WouldBlock) => return false,
                Ok(ReadOutcome::EndOfStream) => return true,
                Err(BufferError::Overflow) => {
                    log::warn!("connection {index} read-buffer overflow, closing");
                    return true;
                }
            }
        }
    }

    fn process_framed_packets(&mut self, index: usize) -> bool {
        loop {
            let filled_len = match self.connections.get(index) {
                Some(conn) => conn.buffer.filled().len(),
                None => return true,
            };
            if filled_len == 0 {
                return false;
            }
            let header = match self.connections.get(index) {
                Some(conn) => FixedHeader::parse(conn.buffer.filled()),
                None => return true,
            };
            match header {
                Ok(header) => {
                    let total = header.total_len();
                    if filled_len < total {
                        return false;
                    }
                    let packet_bytes = self.connections.get(index).unwrap().buffer.filled()[..total].to_vec();
                    match Packet::parse(&packet_bytes) {
                        Ok((packet, consumed)) => {
                            if let Some(conn) = self.connections.get_mut(index) {
                                conn.buffer.consume(consumed);
                            }
                            let action = session::dispatch(
                                index,
                                packet,
                                &packet_bytes,
                                &mut self.sessions,
                                &mut self.broker,
                                &mut self.registry,
                                &mut self.connections,
                            );
                            if action == HandlerAction::CloseConnection {
                                return true;
                            }
                        }
                        Err(e) => {
                            log::warn!("protocol violation on connection {index}: {e}, closing");
                            return true;
                        }
                    }
                }
                Err(MqttCodecError::InsufficientData) => return false,
                Err(e) => {
                    log::warn!("malformed fixed header on connection {index}: {e}, closing");
                    return true;
                }
            }
        }
    }

    fn close_connection(&mut self, index: usize) {
        if let Some(mut conn) = self.connections.remove(index) {
            let _ = self.reactor.remove(&mut conn.stream);
        }
        self.sessions.remove(index);
        self.broker.remove_client(index);
        self.registry.connection_closed();
        log::debug!("closed connection {index}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mqtt::ConnectPacket;
    use std::io::{Read, Write};
    use std::net::TcpStream as StdStream;
    use std::time::Duration;

    fn test_config() -> Config {
        let mut config = Config::default();
        config.bind = "127.0.0.1:0".parse().unwrap();
        config.schemas_dir = std::env::temp_dir().join("torii-server-test-schemas-nonexistent");
        config
    }

    #[test]
    fn connect_then_disconnect_over_loopback() {
        let config = test_config();
        let mut server = Server::bind(&config).unwrap();
        let addr = server.listener.local_addr().unwrap();

        let mut client = StdStream::connect(addr).unwrap();
        client.set_read_timeout(Some(Duration::from_secs(2))).unwrap();

        // Drive the accept event.
        server.run_once(Some(500)).unwrap();

        let connect = ConnectPacket::new(String::new(), true);
        let mut buf = Vec::new();
        Packet::Connect(connect).encode(&mut buf).unwrap();
        client.write_all(&buf).unwrap();

        // Drive the readable-client event.
        server.run_once(Some(500)).unwrap();

        let mut reply = [0u8; 4];
        client.read_exact(&mut reply).unwrap();
        assert_eq!(reply, [0x20, 0x02, 0x00, 0x00]);
        assert_eq!(server.active_connections(), 1);

        let mut disc_buf = Vec::new();
        Packet::Disconnect.encode(&mut disc_buf).unwrap();
        client.write_all(&disc_buf).unwrap();
        server.run_once(Some(500)).unwrap();

        assert_eq!(server.active_connections(), 0);
    }
}
