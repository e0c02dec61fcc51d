//! SUBSCRIBE / SUBACK packets. Grounded on `codepr-sake/src/mqtt/subscribe.rs`
//! (which only wrote SUBSCRIBE for the teacher's demo client); this adds the
//! decode path and SUBACK, both required by the broker side.

use crate::mqtt::fixed_header::Qos;
use crate::wire::{read_mqtt_string, write_mqtt_string};
use byteorder::{NetworkEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionTopic {
    pub topic: String,
    pub qos: Qos,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribePacket {
    pub packet_id: u16,
    pub subscriptions: Vec<SubscriptionTopic>,
}

impl SubscribePacket {
    pub fn remaining_length(&self) -> usize {
        2 + self
            .subscriptions
            .iter()
            .map(|s| 2 + s.topic.len() + 1)
            .sum::<usize>()
    }

    pub fn write_body(&self, buf: &mut impl Write) -> io::Result<()> {
        buf.write_u16::<NetworkEndian>(self.packet_id)?;
        for s in &self.subscriptions {
            write_mqtt_string(buf, &s.topic)?;
            buf.write_u8(s.qos as u8)?;
        }
        Ok(())
    }

    pub fn parse_body(buf: &mut impl Read, remaining_length: u32) -> io::Result<Self> {
        let packet_id = buf.read_u16::<NetworkEndian>()?;
        let mut consumed = 2usize;
        let mut subscriptions = Vec::new();
        while consumed < remaining_length as usize {
            let topic = read_mqtt_string(buf)?;
            let qos = Qos::from(buf.read_u8()?);
            consumed += 2 + topic.len() + 1;
            subscriptions.push(SubscriptionTopic { topic, qos });
        }
        Ok(Self {
            packet_id,
            subscriptions,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubackPacket {
    pub packet_id: u16,
    /// One return code per requested topic; 0 = granted QoS 0.
    pub return_codes: Vec<u8>,
}

impl SubackPacket {
    pub fn granted(packet_id: u16, count: usize) -> Self {
        Self {
            packet_id,
            return_codes: vec![0; count],
        }
    }

    pub fn remaining_length(&self) -> usize {
        2 + self.return_codes.len()
    }

    pub fn write_body(&self, buf: &mut impl Write) -> io::Result<()> {
        buf.write_u16::<NetworkEndian>(self.packet_id)?;
        buf.write_all(&self.return_codes)
    }

    pub fn parse_body(buf: &mut impl Read, remaining_length: u32) -> io::Result<Self> {
        let packet_id = buf.read_u16::<NetworkEndian>()?;
        let mut return_codes = vec![0u8; remaining_length as usize - 2];
        buf.read_exact(&mut return_codes)?;
        Ok(Self {
            packet_id,
            return_codes,
        })
    }
}
