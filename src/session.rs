//! Per-client MQTT session table and packet dispatch: the heart of the core.
//! `dispatch` is invoked by the TCP server once per fully-framed packet with
//! `(connection index, packet, raw bytes)`.

use crate::broker::Broker;
use crate::discovery::{build_discovery_publish, DISCOVERY_REQUEST_TOPIC, DISCOVERY_RESPONSE_TOPIC};
use crate::mqtt::{
    ConnackPacket, Packet, SubackPacket, SubscribePacket, UnsubackPacket, UnsubscribePacket,
};
use crate::net::connection::ConnectionTable;
use crate::proto::decode;
use crate::schema::registry::SchemaRegistry;
use std::collections::HashMap;

/// Per-client-index record created on CONNECT, destroyed on DISCONNECT or
/// socket close.
#[derive(Debug, Clone)]
pub struct MqttSession {
    pub client_id: String,
    pub clean_session: bool,
    pub connected: bool,
    next_packet_id: u16,
}

impl MqttSession {
    pub fn new(client_id: String, clean_session: bool) -> Self {
        Self {
            client_id,
            clean_session,
            connected: true,
            next_packet_id: 1,
        }
    }

    /// Rotates 0 -> 1 rather than wrapping to 0; packet id 0 is never issued.
    pub fn next_packet_id(&mut self) -> u16 {
        let id = self.next_packet_id;
        self.next_packet_id = if self.next_packet_id == u16::MAX {
            1
        } else {
            self.next_packet_id + 1
        };
        id
    }
}

#[derive(Default)]
pub struct SessionTable {
    sessions: HashMap<usize, MqttSession>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, index: usize, session: MqttSession) {
        // Re-CONNECT on an existing index replaces the prior entry: the
        // connection index does not survive a disconnect, so there is no
        // persisted clean_session=false state to merge.
        self.sessions.insert(index, session);
    }

    pub fn remove(&mut self, index: usize) -> Option<MqttSession> {
        self.sessions.remove(&index)
    }

    pub fn get(&self, index: usize) -> Option<&MqttSession> {
        self.sessions.get(&index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut MqttSession> {
        self.sessions.get_mut(&index)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// What the server loop should do with the connection after `dispatch`
/// returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerAction {
    Continue,
    CloseConnection,
}

/// A single non-blocking fan-out write per subscriber: queue the bytes onto
/// the target's write buffer and attempt one flush, logging and dropping on
/// partial success or `WouldBlock`.
fn fan_out(
    connections: &mut ConnectionTable,
    broker: &Broker,
    targets: impl IntoIterator<Item = usize>,
    sender: Option<usize>,
    bytes: &[u8],
) {
    for target in targets {
        if Some(target) == sender {
            continue;
        }
        let Some(conn) = connections.get_mut(target) else {
            continue;
        };
        conn.buffer.queue_write(bytes);
        match conn.buffer.flush_once(&mut conn.stream) {
            Ok(_) => broker.record_routed(),
            Err(e) => log::warn!("dropping delivery to connection {target}: {e}"),
        }
    }
}

/// Dispatches one fully-framed packet received on connection `index`.
/// `raw_bytes` is the exact wire encoding of `packet`, needed for verbatim
/// PUBLISH fan-out.
pub fn dispatch(
    index: usize,
    packet: Packet,
    raw_bytes: &[u8],
    sessions: &mut SessionTable,
    broker: &mut Broker,
    registry: &mut SchemaRegistry,
    connections: &mut ConnectionTable,
) -> HandlerAction {
    match packet {
        Packet::Connect(connect) => {
            sessions.insert(
                index,
                MqttSession::new(connect.client_id.clone(), connect.flags.clean_session),
            );
            log::info!("client {:?} connected at slot {index}", connect.client_id);
            reply(connections, index, &Packet::Connack(ConnackPacket::accepted()));
            HandlerAction::Continue
        }
        Packet::Subscribe(sub) => {
            handle_subscribe(index, sub, broker, connections);
            HandlerAction::Continue
        }
        Packet::Unsubscribe(unsub) => {
            handle_unsubscribe(index, unsub, broker, connections);
            HandlerAction::Continue
        }
        Packet::Publish(publish) => {
            if publish.topic == DISCOVERY_REQUEST_TOPIC {
                handle_discovery_request(registry, broker, connections);
                return HandlerAction::Continue;
            }
            if let Some(type_name) = registry.lookup_type_for_topic(&publish.topic) {
                let type_name = type_name.to_string();
                match decode(registry, &type_name, &publish.payload) {
                    Ok(value) => log::debug!("decoded {type_name} on {}: {value:?}", publish.topic),
                    Err(e) => log::warn!(
                        "payload on {} did not decode as {type_name}: {e} (routing anyway)",
                        publish.topic
                    ),
                }
            }
            let targets = broker.matching_subscribers(&publish.topic);
            fan_out(connections, broker, targets, Some(index), raw_bytes);
            HandlerAction::Continue
        }
        Packet::Pingreq => {
            reply(connections, index, &Packet::Pingresp);
            HandlerAction::Continue
        }
        Packet::Disconnect => {
            // `registry.connection_closed()` is left to the server's single
            // close path (`close_connection`), the same place that owns the
            // matching `connection_opened()` call, so every close decrements
            // the counter exactly once regardless of why the connection ended.
            sessions.remove(index);
            broker.remove_client(index);
            HandlerAction::CloseConnection
        }
        other => {
            log::debug!("ignoring unsupported packet type {:?} from slot {index}", other.packet_type());
            HandlerAction::Continue
        }
    }
}

fn handle_subscribe(
    index: usize,
    sub: SubscribePacket,
    broker: &mut Broker,
    connections: &mut ConnectionTable,
) {
    for s in &sub.subscriptions {
        broker.subscribe(s.topic.clone(), index);
    }
    let suback = SubackPacket::granted(sub.packet_id, sub.subscriptions.len());
    reply(connections, index, &Packet::Suback(suback));
}

fn handle_unsubscribe(
    index: usize,
    unsub: UnsubscribePacket,
    broker: &mut Broker,
    connections: &mut ConnectionTable,
) {
    for topic in &unsub.topics {
        broker.unsubscribe(topic, index);
    }
    let unsuback = UnsubackPacket {
        packet_id: unsub.packet_id,
    };
    reply(connections, index, &Packet::Unsuback(unsuback));
}

fn handle_discovery_request(
    registry: &mut SchemaRegistry,
    broker: &mut Broker,
    connections: &mut ConnectionTable,
) {
    let publish = match build_discovery_publish(registry) {
        Ok(p) => p,
        Err(e) => {
            log::error!("discovery reply skipped: {e}");
            return;
        }
    };
    debug_assert_eq!(publish.topic, DISCOVERY_RESPONSE_TOPIC);
    let mut bytes = Vec::new();
    if let Err(e) = Packet::Publish(publish).encode(&mut bytes) {
        log::error!("discovery reply skipped (encode failed): {e}");
        return;
    }
    let targets = broker.matching_subscribers(DISCOVERY_RESPONSE_TOPIC);
    fan_out(connections, broker, targets, None, &bytes);
}

fn reply(connections: &mut ConnectionTable, index: usize, packet: &Packet) {
    let Some(conn) = connections.get_mut(index) else {
        return;
    };
    let mut bytes = Vec::new();
    if let Err(e) = packet.encode(&mut bytes) {
        log::warn!("failed to encode reply for slot {index}: {e}");
        return;
    }
    conn.buffer.queue_write(&bytes);
    if let Err(e) = conn.buffer.flush_once(&mut conn.stream) {
        log::warn!("failed to flush reply to slot {index}: {e}");
    }
}
