//! Wire-format primitives shared by the MQTT codec and the dynamic Protobuf codec.
//!
//! Two length-prefix conventions exist in this broker: MQTT strings use a 16-bit
//! big-endian length prefix, while Protobuf length-delimited fields use a varint
//! length prefix. Both live here alongside the two differently-shaped varints:
//! MQTT's "remaining length" (max 4 bytes, max value ~268,435,455) and Protobuf's
//! full 64-bit LEB128 varint.

use byteorder::{NetworkEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum WireError {
    #[error("truncated input: expected more bytes than were available")]
    Truncated,
    #[error("varint exceeds 64 bits")]
    VarintOverflow,
}

impl From<WireError> for io::Error {
    fn from(e: WireError) -> Self {
        io::Error::new(io::ErrorKind::InvalidData, e)
    }
}

/// Reads an unsigned LEB128 varint (7 data bits per byte, continuation bit high).
pub fn read_varint(buf: &mut impl Read) -> io::Result<u64> {
    let mut value: u64 = 0;
    let mut shift: u32 = 0;
    loop {
        if shift >= 64 {
            return Err(WireError::VarintOverflow.into());
        }
        let byte = buf.read_u8().map_err(|_| io::Error::from(WireError::Truncated))?;
        value |= ((byte & 0x7F) as u64) << shift;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
        shift += 7;
    }
}

/// Writes an unsigned LEB128 varint, returning the number of bytes written.
pub fn write_varint(buf: &mut impl Write, mut value: u64) -> io::Result<usize> {
    let mut count = 0;
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        buf.write_u8(byte)?;
        count += 1;
        if value == 0 {
            return Ok(count);
        }
    }
}

/// ZigZag-encodes a signed 32-bit integer for `sint32` fields.
pub fn zigzag_encode32(v: i32) -> u32 {
    ((v << 1) ^ (v >> 31)) as u32
}

/// ZigZag-decodes a `sint32` field back to a signed integer.
pub fn zigzag_decode32(v: u32) -> i32 {
    ((v >> 1) as i32) ^ -((v & 1) as i32)
}

/// ZigZag-encodes a signed 64-bit integer for `sint64` fields.
pub fn zigzag_encode64(v: i64) -> u64 {
    ((v << 1) ^ (v >> 63)) as u64
}

/// ZigZag-decodes a `sint64` field back to a signed integer.
pub fn zigzag_decode64(v: u64) -> i64 {
    ((v >> 1) as i64) ^ -((v & 1) as i64)
}

pub fn read_fixed32(buf: &mut impl Read) -> io::Result<u32> {
    buf.read_u32::<byteorder::LittleEndian>()
        .map_err(|_| WireError::Truncated.into())
}

pub fn write_fixed32(buf: &mut impl Write, value: u32) -> io::Result<()> {
    buf.write_u32::<byteorder::LittleEndian>(value)
}

pub fn read_fixed64(buf: &mut impl Read) -> io::Result<u64> {
    buf.read_u64::<byteorder::LittleEndian>()
        .map_err(|_| WireError::Truncated.into())
}

pub fn write_fixed64(buf: &mut impl Write, value: u64) -> io::Result<()> {
    buf.write_u64::<byteorder::LittleEndian>(value)
}

/// Reads a length-delimited (varint length) byte string, Protobuf style.
pub fn read_length_delimited(buf: &mut impl Read) -> io::Result<Vec<u8>> {
    let len = read_varint(buf)?;
    let mut bytes = vec![0u8; len as usize];
    buf.read_exact(&mut bytes)
        .map_err(|_| io::Error::from(WireError::Truncated))?;
    Ok(bytes)
}

/// Writes a length-delimited (varint length) byte string, Protobuf style.
pub fn write_length_delimited(buf: &mut impl Write, bytes: &[u8]) -> io::Result<()> {
    write_varint(buf, bytes.len() as u64)?;
    buf.write_all(bytes)
}

/// Reads an MQTT string: 16-bit big-endian length prefix followed by UTF-8 bytes.
pub fn read_mqtt_string(buf: &mut impl Read) -> io::Result<String> {
    let length = buf
        .read_u16::<NetworkEndian>()
        .map_err(|_| io::Error::from(WireError::Truncated))?;
    let mut bytes = vec![0u8; length as usize];
    buf.read_exact(&mut bytes)
        .map_err(|_| io::Error::from(WireError::Truncated))?;
    String::from_utf8(bytes).map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "invalid utf8"))
}

/// Writes an MQTT string: 16-bit big-endian length prefix followed by UTF-8 bytes.
pub fn write_mqtt_string(buf: &mut impl Write, string: &str) -> io::Result<()> {
    let bytes = string.as_bytes();
    buf.write_u16::<NetworkEndian>(bytes.len() as u16)?;
    buf.write_all(bytes)
}

/// Reads an MQTT-length-prefixed opaque byte string (used for will message / password).
pub fn read_mqtt_bytes(buf: &mut impl Read) -> io::Result<Vec<u8>> {
    let length = buf
        .read_u16::<NetworkEndian>()
        .map_err(|_| io::Error::from(WireError::Truncated))?;
    let mut bytes = vec![0u8; length as usize];
    buf.read_exact(&mut bytes)
        .map_err(|_| io::Error::from(WireError::Truncated))?;
    Ok(bytes)
}

pub fn write_mqtt_bytes(buf: &mut impl Write, bytes: &[u8]) -> io::Result<()> {
    buf.write_u16::<NetworkEndian>(bytes.len() as u16)?;
    buf.write_all(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn varint_roundtrip_small() {
        for n in [0u64, 1, 127, 128, 300, 16384] {
            let mut buf = Vec::new();
            write_varint(&mut buf, n).unwrap();
            let decoded = read_varint(&mut buf.as_slice()).unwrap();
            assert_eq!(decoded, n);
        }
    }

    #[test]
    fn varint_roundtrip_max() {
        let n = u64::MAX;
        let mut buf = Vec::new();
        write_varint(&mut buf, n).unwrap();
        assert_eq!(read_varint(&mut buf.as_slice()).unwrap(), n);
    }

    #[test]
    fn varint_truncated_is_error() {
        let buf = [0x80u8, 0x80];
        let err = read_varint(&mut buf.as_slice()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn zigzag_roundtrip() {
        for n in [-1i32, 0, 1, -1000, i32::MIN, i32::MAX] {
            assert_eq!(zigzag_decode32(zigzag_encode32(n)), n);
        }
        for n in [-1i64, 0, 1, i64::MIN, i64::MAX] {
            assert_eq!(zigzag_decode64(zigzag_encode64(n)), n);
        }
    }

    #[test]
    fn mqtt_string_roundtrip() {
        let mut buf = Vec::new();
        write_mqtt_string(&mut buf, "hello/world").unwrap();
        let s = read_mqtt_string(&mut buf.as_slice()).unwrap();
        assert_eq!(s, "hello/world");
    }

    #[test]
    fn length_delimited_roundtrip() {
        let mut buf = Vec::new();
        write_length_delimited(&mut buf, b"abc").unwrap();
        let out = read_length_delimited(&mut buf.as_slice()).unwrap();
        assert_eq!(out, b"abc");
    }
}
