//! Registry-driven Protobuf decoder. Unknown tags are skipped based on their
//! wire type rather than rejected, matching Protobuf's forward-compatibility
//! contract; packed repeated scalars are rejected rather than silently
//! misparsed.

use crate::proto::value::{MessageValue, Value};
use crate::schema::parser::{FieldDef, Label, MessageDef, ScalarType};
use crate::schema::registry::SchemaRegistry;
use crate::wire::{read_length_delimited, read_varint};
use std::io::Read;
use thiserror::Error;

const MAX_DEPTH: u32 = 100;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("message type {0:?} is not registered")]
    UnknownType(String),
    #[error("truncated input while decoding a tag/wire-type key")]
    Truncated,
    #[error("field tag {0} on {1:?} was encoded with wire type {2} but the schema expects a different one")]
    UnexpectedWireType(u32, String, u64),
    #[error("packed repeated scalar encoding is not supported (tag {0} on {1:?})")]
    PackedRepeatedUnsupported(u32, String),
    #[error("nested message recursion exceeded {0} levels")]
    DepthExceeded(u32),
    #[error("malformed fixed32/fixed64/varint payload")]
    MalformedScalar,
}

const WIRE_VARINT: u64 = 0;
const WIRE_FIXED64: u64 = 1;
const WIRE_BYTES: u64 = 2;
const WIRE_FIXED32: u64 = 5;

fn wire_type_for_scalar(scalar: ScalarType) -> u64 {
    match scalar {
        ScalarType::Int32
        | ScalarType::Int64
        | ScalarType::Uint32
        | ScalarType::Uint64
        | ScalarType::Sint32
        | ScalarType::Sint64
        | ScalarType::Bool
        | ScalarType::Enum => WIRE_VARINT,
        ScalarType::Fixed64 | ScalarType::Sfixed64 | ScalarType::Double => WIRE_FIXED64,
        ScalarType::Fixed32 | ScalarType::Sfixed32 | ScalarType::Float => WIRE_FIXED32,
        ScalarType::String | ScalarType::Bytes | ScalarType::Message => WIRE_BYTES,
    }
}

fn skip_value(cursor: &mut &[u8], wire_type: u64) -> Result<(), DecodeError> {
    match wire_type {
        WIRE_VARINT => {
            read_varint(cursor).map_err(|_| DecodeError::Truncated)?;
        }
        WIRE_FIXED64 => {
            let mut buf = [0u8; 8];
            cursor.read_exact(&mut buf).map_err(|_| DecodeError::Truncated)?;
        }
        WIRE_FIXED32 => {
            let mut buf = [0u8; 4];
            cursor.read_exact(&mut buf).map_err(|_| DecodeError::Truncated)?;
        }
        WIRE_BYTES => {
            read_length_delimited(cursor).map_err(|_| DecodeError::Truncated)?;
        }
        _ => return Err(DecodeError::Truncated),
    }
    Ok(())
}

fn decode_scalar(
    cursor: &mut &[u8],
    field: &FieldDef,
    wire_type: u64,
    registry: &SchemaRegistry,
    depth: u32,
) -> Result<Value, DecodeError> {
    match wire_type {
        WIRE_VARINT => {
            let raw = read_varint(cursor).map_err(|_| DecodeError::MalformedScalar)?;
            let value = match field.scalar {
                ScalarType::Sint32 => crate::wire::zigzag_decode32(raw as u32) as i64 as u64,
                ScalarType::Sint64 => crate::wire::zigzag_decode64(raw) as u64,
                _ => raw,
            };
            Ok(Value::Varint(value))
        }
        WIRE_FIXED64 => {
            let mut buf = [0u8; 8];
            cursor.read_exact(&mut buf).map_err(|_| DecodeError::MalformedScalar)?;
            Ok(Value::Fixed64(u64::from_le_bytes(buf)))
        }
        WIRE_FIXED32 => {
            let mut buf = [0u8; 4];
            cursor.read_exact(&mut buf).map_err(|_| DecodeError::MalformedScalar)?;
            Ok(Value::Fixed32(u32::from_le_bytes(buf)))
        }
        WIRE_BYTES => {
            let bytes = read_length_delimited(cursor).map_err(|_| DecodeError::MalformedScalar)?;
            if field.scalar == ScalarType::Message {
                let type_name = field.type_name.as_deref().unwrap_or(&field.name);
                let nested = decode_message(registry, type_name, &bytes, depth + 1)?;
                Ok(Value::Message(Box::new(nested)))
            } else {
                Ok(Value::Bytes(bytes))
            }
        }
        _ => Err(DecodeError::MalformedScalar),
    }
}

/// Decodes `bytes` as an instance of `type_name` looked up in `registry`.
pub fn decode(
    registry: &SchemaRegistry,
    type_name: &str,
    bytes: &[u8],
) -> Result<MessageValue, DecodeError> {
    decode_message(registry, type_name, bytes, 0)
}

fn decode_message(
    registry: &SchemaRegistry,
    type_name: &str,
    bytes: &[u8],
    depth: u32,
) -> Result<MessageValue, DecodeError> {
    if depth > MAX_DEPTH {
        return Err(DecodeError::DepthExceeded(MAX_DEPTH));
    }
    let def: &MessageDef = registry
        .lookup_message(type_name)
        .ok_or_else(|| DecodeError::UnknownType(type_name.to_string()))?;

    let mut result = MessageValue::new(type_name.to_string());
    let mut cursor: &[u8] = bytes;

    while !cursor.is_empty() {
        let key = read_varint(&mut cursor).map_err(|_| DecodeError::Truncated)?;
        let tag = (key >> 3) as u32;
        let wire_type = key & 0x7;

        match def.fields.get(&tag) {
            None => {
                skip_value(&mut cursor, wire_type)?;
            }
            Some(field) => {
                let expected = wire_type_for_scalar(field.scalar);
                if wire_type != expected {
                    // A varint-wire-type occurrence of a field declared
                    // repeated-scalar most likely means the encoder packed
                    // it; this decoder does not accept packed encoding.
                    if field.label == Label::Repeated && wire_type == WIRE_BYTES {
                        return Err(DecodeError::PackedRepeatedUnsupported(
                            tag,
                            def.name.clone(),
                        ));
                    }
                    return Err(DecodeError::UnexpectedWireType(tag, def.name.clone(), wire_type));
                }
                let value = decode_scalar(&mut cursor, field, wire_type, registry, depth)?;
                if field.label == Label::Repeated {
                    match result.fields.get_mut(&tag) {
                        Some(Value::Repeated(items)) => items.push(value),
                        _ => {
                            result.fields.insert(tag, Value::Repeated(vec![value]));
                        }
                    }
                } else {
                    result.fields.insert(tag, value);
                }
            }
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::encode::encode;
    use crate::schema::parser::parse_schema;

    fn registry_with_person() -> SchemaRegistry {
        let mut reg = SchemaRegistry::new();
        let def = parse_schema(
            "message Person { string name = 1; int32 id = 2; repeated string emails = 3; }",
        )
        .unwrap()
        .remove(0);
        reg.register_message(def).unwrap();
        reg
    }

    #[test]
    fn decode_roundtrips_encode() {
        let reg = registry_with_person();
        let mut person = MessageValue::new("Person");
        person.set(1, Value::Bytes(b"alice".to_vec()));
        person.set(2, Value::Varint(42));
        person.set(
            3,
            Value::Repeated(vec![
                Value::Bytes(b"a@x.com".to_vec()),
                Value::Bytes(b"b@x.com".to_vec()),
            ]),
        );
        let bytes = encode(&reg, &person).unwrap();
        let decoded = decode(&reg, "Person", &bytes).unwrap();
        assert_eq!(decoded, person);
    }

    #[test]
    fn unknown_tags_are_skipped_not_rejected() {
        let reg = registry_with_person();
        let mut buf = Vec::new();
        // Field tag 99, wire type 0 (varint), value 5 -- not in the schema.
        crate::wire::write_varint(&mut buf, (99u64 << 3) | 0).unwrap();
        crate::wire::write_varint(&mut buf, 5).unwrap();
        // Known field 2 afterwards.
        crate::wire::write_varint(&mut buf, (2u64 << 3) | 0).unwrap();
        crate::wire::write_varint(&mut buf, 7).unwrap();
        let decoded = decode(&reg, "Person", &buf).unwrap();
        assert_eq!(decoded.get(2), Some(&Value::Varint(7)));
        assert_eq!(decoded.get(99), None);
    }

    #[test]
    fn wire_type_mismatch_is_rejected() {
        let reg = registry_with_person();
        let mut buf = Vec::new();
        // Field 2 is int32 (varint) but we encode it as fixed32.
        crate::wire::write_varint(&mut buf, (2u64 << 3) | 5).unwrap();
        buf.extend_from_slice(&7u32.to_le_bytes());
        assert!(matches!(
            decode(&reg, "Person", &buf),
            Err(DecodeError::UnexpectedWireType(2, _, 5))
        ));
    }

    #[test]
    fn packed_repeated_numeric_rejected() {
        let mut reg = SchemaRegistry::new();
        let def = parse_schema("message Samples { repeated int32 values = 1; }")
            .unwrap()
            .remove(0);
        reg.register_message(def).unwrap();

        let mut buf = Vec::new();
        // A packed encoding would put all values in one length-delimited
        // blob under wire type 2; this decoder only accepts unpacked
        // (one varint per occurrence) repeated scalars.
        crate::wire::write_varint(&mut buf, (1u64 << 3) | 2).unwrap();
        crate::wire::write_length_delimited(&mut buf, &[1, 2, 3]).unwrap();
        assert!(matches!(
            decode(&reg, "Samples", &buf),
            Err(DecodeError::PackedRepeatedUnsupported(1, _))
        ));
    }

    #[test]
    fn nested_message_decodes_recursively() {
        let mut reg = SchemaRegistry::new();
        for def in
            parse_schema("message Inner { int32 x = 1; } message Outer { Inner inner = 1; }")
                .unwrap()
        {
            reg.register_message(def).unwrap();
        }
        let mut inner = MessageValue::new("Inner");
        inner.set(1, Value::Varint(9));
        let mut outer = MessageValue::new("Outer");
        outer.set(1, Value::Message(Box::new(inner.clone())));
        let bytes = encode(&reg, &outer).unwrap();
        let decoded = decode(&reg, "Outer", &bytes).unwrap();
        match decoded.get(1) {
            Some(Value::Message(nested)) => assert_eq!(**nested, inner),
            other => panic!("expected nested message, got {other:?}"),
        }
    }

    #[test]
    fn sint64_roundtrip_through_zigzag() {
        let mut reg = SchemaRegistry::new();
        let def = parse_schema("message Delta { sint64 offset = 1; }")
            .unwrap()
            .remove(0);
        reg.register_message(def).unwrap();
        let mut value = MessageValue::new("Delta");
        value.set(1, Value::Varint(i64::MIN as u64));
        let bytes = encode(&reg, &value).unwrap();
        let decoded = decode(&reg, "Delta", &bytes).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn unknown_type_rejected() {
        let reg = SchemaRegistry::new();
        assert!(matches!(
            decode(&reg, "Ghost", &[]),
            Err(DecodeError::UnknownType(_))
        ));
    }
}
