//! UNSUBSCRIBE / UNSUBACK packets. New module, same idiom as
//! `mqtt::subscribe`; UNSUBACK must always be returned in response to an
//! UNSUBSCRIBE, one status per requested topic filter.

use crate::wire::{read_mqtt_string, write_mqtt_string};
use byteorder::{NetworkEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsubscribePacket {
    pub packet_id: u16,
    pub topics: Vec<String>,
}

impl UnsubscribePacket {
    pub fn remaining_length(&self) -> usize {
        2 + self.topics.iter().map(|t| 2 + t.len()).sum::<usize>()
    }

    pub fn write_body(&self, buf: &mut impl Write) -> io::Result<()> {
        buf.write_u16::<NetworkEndian>(self.packet_id)?;
        for topic in &self.topics {
            write_mqtt_string(buf, topic)?;
        }
        Ok(())
    }

    pub fn parse_body(buf: &mut impl Read, remaining_length: u32) -> io::Result<Self> {
        let packet_id = buf.read_u16::<NetworkEndian>()?;
        let mut consumed = 2usize;
        let mut topics = Vec::new();
        while consumed < remaining_length as usize {
            let topic = read_mqtt_string(buf)?;
            consumed += 2 + topic.len();
            topics.push(topic);
        }
        Ok(Self { packet_id, topics })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnsubackPacket {
    pub packet_id: u16,
}

impl UnsubackPacket {
    pub fn write_body(&self, buf: &mut impl Write) -> io::Result<()> {
        buf.write_u16::<NetworkEndian>(self.packet_id)
    }

    pub fn parse_body(buf: &mut impl Read) -> io::Result<Self> {
        Ok(Self {
            packet_id: buf.read_u16::<NetworkEndian>()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsubscribe_roundtrip() {
        let packet = UnsubscribePacket {
            packet_id: 9,
            topics: vec!["a/b".into(), "c/+/d".into()],
        };
        let mut buf = Vec::new();
        packet.write_body(&mut buf).unwrap();
        let parsed = UnsubscribePacket::parse_body(&mut buf.as_slice(), buf.len() as u32).unwrap();
        assert_eq!(parsed, packet);
    }

    #[test]
    fn unsuback_roundtrip() {
        let packet = UnsubackPacket { packet_id: 9 };
        let mut buf = Vec::new();
        packet.write_body(&mut buf).unwrap();
        let parsed = UnsubackPacket::parse_body(&mut buf.as_slice()).unwrap();
        assert_eq!(parsed, packet);
    }
}
