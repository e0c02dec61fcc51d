//! CONNECT packet. Grounded on `codepr-sake/src/mqtt/connect.rs`'s
//! `ConnectFlags`/`ConnectVariableHeader`/`ConnectPayload` split, extended with
//! a `parse` path driven by the flag bits (the teacher only implemented
//! `write`, for its demo client).

use crate::mqtt::fixed_header::MqttCodecError;
use crate::wire::{read_mqtt_bytes, read_mqtt_string, write_mqtt_bytes, write_mqtt_string};
use byteorder::{NetworkEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

const PROTOCOL_NAME: &str = "MQTT";
const MQTT_V4: u8 = 0x04;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectFlags {
    pub clean_session: bool,
    pub will: bool,
    pub will_qos: u8,
    pub will_retain: bool,
    pub password: bool,
    pub username: bool,
}

impl ConnectFlags {
    pub fn from_byte(byte: u8) -> Self {
        Self {
            clean_session: byte & 0x02 != 0,
            will: byte & 0x04 != 0,
            will_qos: (byte >> 3) & 0x03,
            will_retain: byte & 0x20 != 0,
            password: byte & 0x40 != 0,
            username: byte & 0x80 != 0,
        }
    }

    pub fn to_byte(&self) -> u8 {
        let mut b = 0u8;
        if self.clean_session {
            b |= 0x02;
        }
        if self.will {
            b |= 0x04;
        }
        b |= (self.will_qos & 0x03) << 3;
        if self.will_retain {
            b |= 0x20;
        }
        if self.password {
            b |= 0x40;
        }
        if self.username {
            b |= 0x80;
        }
        b
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectPacket {
    pub protocol_level: u8,
    pub flags: ConnectFlags,
    pub keep_alive: u16,
    pub client_id: String,
    pub will_topic: Option<String>,
    pub will_message: Option<Vec<u8>>,
    pub username: Option<String>,
    pub password: Option<Vec<u8>>,
}

impl ConnectPacket {
    pub fn new(client_id: String, clean_session: bool) -> Self {
        Self {
            protocol_level: MQTT_V4,
            flags: ConnectFlags {
                clean_session,
                will: false,
                will_qos: 0,
                will_retain: false,
                password: false,
                username: false,
            },
            keep_alive: 60,
            client_id,
            will_topic: None,
            will_message: None,
            username: None,
            password: None,
        }
    }

    pub fn write(&self, buf: &mut impl Write) -> io::Result<()> {
        write_mqtt_string(buf, PROTOCOL_NAME)?;
        buf.write_u8(self.protocol_level)?;
        buf.write_u8(self.flags.to_byte())?;
        buf.write_u16::<NetworkEndian>(self.keep_alive)?;
        write_mqtt_string(buf, &self.client_id)?;
        if self.flags.will {
            write_mqtt_string(buf, self.will_topic.as_deref().unwrap_or(""))?;
            write_mqtt_bytes(buf, self.will_message.as_deref().unwrap_or(&[]))?;
        }
        if self.flags.username {
            write_mqtt_string(buf, self.username.as_deref().unwrap_or(""))?;
        }
        if self.flags.password {
            write_mqtt_bytes(buf, self.password.as_deref().unwrap_or(&[]))?;
        }
        Ok(())
    }

    pub fn parse(buf: &mut impl Read) -> io::Result<Self> {
        let protocol_name = read_mqtt_string(buf)?;
        if protocol_name != PROTOCOL_NAME {
            return Err(MqttCodecError::ProtocolViolation.into());
        }
        let protocol_level = buf.read_u8()?;
        let flags = ConnectFlags::from_byte(buf.read_u8()?);
        let keep_alive = buf.read_u16::<NetworkEndian>()?;
        let client_id = read_mqtt_string(buf)?;

        let (will_topic, will_message) = if flags.will {
            (Some(read_mqtt_string(buf)?), Some(read_mqtt_bytes(buf)?))
        } else {
            (None, None)
        };
        let username = if flags.username {
            Some(read_mqtt_string(buf)?)
        } else {
            None
        };
        let password = if flags.password {
            Some(read_mqtt_bytes(buf)?)
        } else {
            None
        };

        Ok(Self {
            protocol_level,
            flags,
            keep_alive,
            client_id,
            will_topic,
            will_message,
            username,
            password,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_minimal() {
        let connect = ConnectPacket::new("test-id".into(), true);
        let mut buf = Vec::new();
        connect.write(&mut buf).unwrap();
        let parsed = ConnectPacket::parse(&mut buf.as_slice()).unwrap();
        assert_eq!(parsed, connect);
    }

    #[test]
    fn roundtrip_with_will_and_credentials() {
        let mut connect = ConnectPacket::new("dev-1".into(), false);
        connect.flags.will = true;
        connect.flags.username = true;
        connect.flags.password = true;
        connect.will_topic = Some("status/dev-1".into());
        connect.will_message = Some(b"offline".to_vec());
        connect.username = Some("alice".into());
        connect.password = Some(b"s3cret".to_vec());

        let mut buf = Vec::new();
        connect.write(&mut buf).unwrap();
        let parsed = ConnectPacket::parse(&mut buf.as_slice()).unwrap();
        assert_eq!(parsed, connect);
    }

    #[test]
    fn literal_wire_bytes() {
        let connect = ConnectPacket::new("".into(), true);
        let mut buf = Vec::new();
        connect.write(&mut buf).unwrap();
        // 00 04 "MQTT" 04 02 00 3C 00 00
        assert_eq!(
            buf,
            &[0, 4, b'M', b'Q', b'T', b'T', 0x04, 0x02, 0x00, 0x3C, 0x00, 0x00]
        );
    }

    #[test]
    fn rejects_wrong_protocol_name() {
        let mut buf = Vec::new();
        write_mqtt_string(&mut buf, "MQIS").unwrap();
        buf.extend_from_slice(&[4, 0, 0, 60, 0, 0]);
        assert!(ConnectPacket::parse(&mut buf.as_slice()).is_err());
    }
}
