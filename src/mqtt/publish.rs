//! PUBLISH packet. Grounded on `codepr-sake/src/mqtt/publish.rs`, extended to
//! carry dup/retain (the teacher's struct only tracked `qos`) and to compute
//! its own remaining length so `mqtt::Packet::encode` doesn't need to.

use crate::mqtt::fixed_header::{FixedHeader, FixedHeaderFlags, Qos};
use crate::wire::{read_mqtt_string, write_mqtt_string};
use byteorder::{NetworkEndian, ReadBytesExt, WriteBytesExt};
use std::fmt;
use std::io::{self, Read, Write};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishPacket {
    pub dup: bool,
    pub qos: Qos,
    pub retain: bool,
    pub packet_id: Option<u16>,
    pub topic: String,
    pub payload: Vec<u8>,
}

impl fmt::Display for PublishPacket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "PUBLISH topic={} payload_len={} qos={:?}",
            self.topic,
            self.payload.len(),
            self.qos
        )
    }
}

impl PublishPacket {
    pub fn at_most_once(topic: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            dup: false,
            qos: Qos::AtMostOnce,
            retain: false,
            packet_id: None,
            topic: topic.into(),
            payload,
        }
    }

    pub fn remaining_length(&self) -> usize {
        2 + self.topic.len() + if self.qos != Qos::AtMostOnce { 2 } else { 0 } + self.payload.len()
    }

    pub fn flags(&self) -> FixedHeaderFlags {
        FixedHeaderFlags {
            dup: self.dup,
            qos: self.qos,
            retain: self.retain,
        }
    }

    pub fn write_body(&self, buf: &mut impl Write) -> io::Result<()> {
        write_mqtt_string(buf, &self.topic)?;
        if self.qos != Qos::AtMostOnce {
            buf.write_u16::<NetworkEndian>(self.packet_id.unwrap_or(0))?;
        }
        buf.write_all(&self.payload)?;
        Ok(())
    }

    pub fn parse_body(buf: &mut impl Read, header: &FixedHeader) -> io::Result<Self> {
        let topic = read_mqtt_string(buf)?;
        let mut consumed = 2 + topic.len();
        let packet_id = if header.flags.qos != Qos::AtMostOnce {
            consumed += 2;
            Some(buf.read_u16::<NetworkEndian>()?)
        } else {
            None
        };
        let payload_len = (header.remaining_length as usize).saturating_sub(consumed);
        let mut payload = vec![0u8; payload_len];
        buf.read_exact(&mut payload)?;
        Ok(Self {
            dup: header.flags.dup,
            qos: header.flags.qos,
            retain: header.flags.retain,
            packet_id,
            topic,
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mqtt::fixed_header::PacketType;

    fn round_trip(packet: &PublishPacket) -> PublishPacket {
        let mut buf = Vec::new();
        packet.write_body(&mut buf).unwrap();
        let header = FixedHeader {
            packet_type: PacketType::Publish,
            flags: packet.flags(),
            remaining_length: buf.len() as u32,
            header_size: 2,
        };
        PublishPacket::parse_body(&mut buf.as_slice(), &header).unwrap()
    }

    #[test]
    fn roundtrip_qos0_no_packet_id() {
        let packet = PublishPacket::at_most_once("sensors/temp", b"22.5".to_vec());
        let parsed = round_trip(&packet);
        assert_eq!(parsed, packet);
        assert_eq!(parsed.packet_id, None);
    }

    #[test]
    fn roundtrip_zero_length_payload() {
        let packet = PublishPacket::at_most_once("a/b", vec![]);
        let parsed = round_trip(&packet);
        assert_eq!(parsed.payload.len(), 0);
    }

    #[test]
    fn roundtrip_with_packet_id_for_qos1() {
        let mut packet = PublishPacket::at_most_once("q1/topic", b"hi".to_vec());
        packet.qos = Qos::AtLeastOnce;
        packet.packet_id = Some(42);
        let parsed = round_trip(&packet);
        assert_eq!(parsed.packet_id, Some(42));
    }

    #[test]
    fn remaining_length_matches_encoded_size() {
        let packet = PublishPacket::at_most_once("topic", b"payload".to_vec());
        let mut buf = Vec::new();
        packet.write_body(&mut buf).unwrap();
        assert_eq!(buf.len(), packet.remaining_length());
    }
}
