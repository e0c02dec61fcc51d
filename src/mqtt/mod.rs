//! MQTT v3.1.1 packet codec (QoS 0 core). Grounded on `codepr-sake/src/mqtt/mod.rs`,
//! whose `FixedHeader`, `PacketType`, `Qos`, and per-packet submodules are kept
//! and generalized; the teacher's blocking-client-only `Request`/`Response`/
//! `Protocol` wrapper is dropped (out of scope — see `DESIGN.md`) in favor of a
//! single `Packet` enum the broker side parses and dispatches on directly.

pub mod connack;
pub mod connect;
pub mod fixed_header;
pub mod ping_disconnect;
pub mod publish;
pub mod subscribe;
pub mod unsubscribe;

pub use connack::ConnackPacket;
pub use connect::ConnectPacket;
pub use fixed_header::{FixedHeader, FixedHeaderFlags, MqttCodecError, PacketType, Qos};
pub use publish::PublishPacket;
pub use subscribe::{SubackPacket, SubscribePacket, SubscriptionTopic};
pub use unsubscribe::{UnsubackPacket, UnsubscribePacket};

use std::io::{self, Write};

/// A fully-decoded MQTT packet of any of the types this core understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Connect(ConnectPacket),
    Connack(ConnackPacket),
    Publish(PublishPacket),
    Subscribe(SubscribePacket),
    Suback(SubackPacket),
    Unsubscribe(UnsubscribePacket),
    Unsuback(UnsubackPacket),
    Pingreq,
    Pingresp,
    Disconnect,
}

impl Packet {
    pub fn packet_type(&self) -> PacketType {
        match self {
            Packet::Connect(_) => PacketType::Connect,
            Packet::Connack(_) => PacketType::Connack,
            Packet::Publish(_) => PacketType::Publish,
            Packet::Subscribe(_) => PacketType::Subscribe,
            Packet::Suback(_) => PacketType::Suback,
            Packet::Unsubscribe(_) => PacketType::Unsubscribe,
            Packet::Unsuback(_) => PacketType::Unsuback,
            Packet::Pingreq => PacketType::Pingreq,
            Packet::Pingresp => PacketType::Pingresp,
            Packet::Disconnect => PacketType::Disconnect,
        }
    }

    /// Parses a complete packet (fixed header + body) from the front of `input`.
    /// Returns the packet and the number of bytes it consumed. Requires the
    /// caller to have already ensured `input.len() >= header.total_len()`
    /// (the framing loop in `net::server` does this before calling).
    pub fn parse(input: &[u8]) -> Result<(Packet, usize), MqttCodecError> {
        let header = FixedHeader::parse(input)?;
        let total = header.total_len();
        if input.len() < total {
            return Err(MqttCodecError::InsufficientData);
        }
        let body = &input[header.header_size..total];
        let mut cursor = body;

        let packet = match header.packet_type {
            PacketType::Connect => Packet::Connect(
                ConnectPacket::parse(&mut cursor).map_err(|_| MqttCodecError::ProtocolViolation)?,
            ),
            PacketType::Connack => Packet::Connack(
                ConnackPacket::from_bytes(&mut cursor)
                    .map_err(|_| MqttCodecError::ProtocolViolation)?,
            ),
            PacketType::Publish => Packet::Publish(
                PublishPacket::parse_body(&mut cursor, &header)
                    .map_err(|_| MqttCodecError::ProtocolViolation)?,
            ),
            PacketType::Subscribe => {
                if header.flags.to_byte() & 0x0F != 0x02 {
                    return Err(MqttCodecError::ProtocolViolation);
                }
                Packet::Subscribe(
                    SubscribePacket::parse_body(&mut cursor, header.remaining_length)
                        .map_err(|_| MqttCodecError::ProtocolViolation)?,
                )
            }
            PacketType::Suback => Packet::Suback(
                SubackPacket::parse_body(&mut cursor, header.remaining_length)
                    .map_err(|_| MqttCodecError::ProtocolViolation)?,
            ),
            PacketType::Unsubscribe => Packet::Unsubscribe(
                UnsubscribePacket::parse_body(&mut cursor, header.remaining_length)
                    .map_err(|_| MqttCodecError::ProtocolViolation)?,
            ),
            PacketType::Unsuback => Packet::Unsuback(
                UnsubackPacket::parse_body(&mut cursor)
                    .map_err(|_| MqttCodecError::ProtocolViolation)?,
            ),
            PacketType::Pingreq => Packet::Pingreq,
            PacketType::Pingresp => Packet::Pingresp,
            PacketType::Disconnect => Packet::Disconnect,
            PacketType::Unknown => return Err(MqttCodecError::ProtocolViolation),
        };
        Ok((packet, total))
    }

    /// Encodes the packet (fixed header + body) into `buf`.
    pub fn encode(&self, buf: &mut Vec<u8>) -> io::Result<()> {
        match self {
            Packet::Connect(p) => {
                let mut body = Vec::new();
                p.write(&mut body)?;
                write_fixed(buf, PacketType::Connect, FixedHeaderFlags::from_byte(0), &body)
            }
            Packet::Connack(p) => {
                let mut body = Vec::new();
                p.write(&mut body)?;
                write_fixed(buf, PacketType::Connack, FixedHeaderFlags::from_byte(0), &body)
            }
            Packet::Publish(p) => {
                let mut body = Vec::new();
                p.write_body(&mut body)?;
                write_fixed(buf, PacketType::Publish, p.flags(), &body)
            }
            Packet::Subscribe(p) => {
                let mut body = Vec::new();
                p.write_body(&mut body)?;
                write_fixed(
                    buf,
                    PacketType::Subscribe,
                    FixedHeaderFlags::from_byte(0x02),
                    &body,
                )
            }
            Packet::Suback(p) => {
                let mut body = Vec::new();
                p.write_body(&mut body)?;
                write_fixed(buf, PacketType::Suback, FixedHeaderFlags::from_byte(0), &body)
            }
            Packet::Unsubscribe(p) => {
                let mut body = Vec::new();
                p.write_body(&mut body)?;
                write_fixed(
                    buf,
                    PacketType::Unsubscribe,
                    FixedHeaderFlags::from_byte(0x02),
                    &body,
                )
            }
            Packet::Unsuback(p) => {
                let mut body = Vec::new();
                p.write_body(&mut body)?;
                write_fixed(buf, PacketType::Unsuback, FixedHeaderFlags::from_byte(0), &body)
            }
            Packet::Pingreq => write_fixed(buf, PacketType::Pingreq, FixedHeaderFlags::from_byte(0), &[]),
            Packet::Pingresp => {
                write_fixed(buf, PacketType::Pingresp, FixedHeaderFlags::from_byte(0), &[])
            }
            Packet::Disconnect => {
                write_fixed(buf, PacketType::Disconnect, FixedHeaderFlags::from_byte(0), &[])
            }
        }
    }
}

fn write_fixed(
    buf: &mut Vec<u8>,
    packet_type: PacketType,
    flags: FixedHeaderFlags,
    body: &[u8],
) -> io::Result<()> {
    let header = FixedHeader {
        packet_type,
        flags,
        remaining_length: body.len() as u32,
        header_size: 0,
    };
    header.write(buf)?;
    buf.write_all(body)
}
