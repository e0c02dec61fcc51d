//! Registry-driven Protobuf encoder. The root value must be a `Value::Message`;
//! each field is looked up by tag against the bound `MessageDef` to determine
//! wire type. A tag present in the value tree but absent from the schema is
//! silently dropped rather than rejected, mirroring the decoder's handling of
//! unknown tags on the wire.

use crate::proto::value::{MessageValue, Value};
use crate::schema::parser::{Label, MessageDef, ScalarType};
use crate::schema::registry::SchemaRegistry;
use crate::wire::{write_length_delimited, write_varint};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("message type {0:?} is not registered")]
    UnknownType(String),
    #[error("field tag {0} on {1:?} is declared repeated but value was not Value::Repeated")]
    ExpectedRepeated(u32, String),
    #[error("field tag {0} on {1:?} has a value that doesn't match its declared scalar type")]
    TypeMismatch(u32, String),
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

fn write_key(buf: &mut Vec<u8>, tag: u32, wire_type: u64) -> std::io::Result<()> {
    write_varint(buf, ((tag as u64) << 3) | wire_type).map(|_| ())
}

/// Encodes `value` against a `MessageDef` the caller has already resolved
/// (used recursively for nested messages, where the definition is implied by
/// the field, not looked up again by name).
fn encode_message_into(
    buf: &mut Vec<u8>,
    def: Option<&MessageDef>,
    value: &MessageValue,
) -> Result<(), EncodeError> {
    for (&tag, field_value) in &value.fields {
        let scalar = match def {
            Some(def) => match def.fields.get(&tag) {
                Some(field_def) => Some(field_def.scalar),
                None => continue,
            },
            None => None,
        };
        encode_field_raw(buf, tag, field_value, &value.type_name, scalar)?;
    }
    Ok(())
}

fn encode_field_raw(
    buf: &mut Vec<u8>,
    tag: u32,
    value: &Value,
    type_name: &str,
    scalar: Option<ScalarType>,
) -> Result<(), EncodeError> {
    match value {
        Value::Repeated(items) => {
            for item in items {
                encode_field_raw(buf, tag, item, type_name, scalar)?;
            }
            Ok(())
        }
        Value::Varint(v) => {
            write_key(buf, tag, WIRE_VARINT).map_err(|_| EncodeError::TypeMismatch(tag, type_name.to_string()))?;
            let wire_value = match scalar {
                Some(ScalarType::Sint32) => crate::wire::zigzag_encode32(*v as i32) as u64,
                Some(ScalarType::Sint64) => crate::wire::zigzag_encode64(*v as i64),
                _ => *v,
            };
            write_varint(buf, wire_value).map_err(|_| EncodeError::TypeMismatch(tag, type_name.to_string()))?;
            Ok(())
        }
        Value::Fixed64(v) => {
            write_key(buf, tag, WIRE_FIXED64).map_err(|_| EncodeError::TypeMismatch(tag, type_name.to_string()))?;
            buf.extend_from_slice(&v.to_le_bytes());
            Ok(())
        }
        Value::Fixed32(v) => {
            write_key(buf, tag, WIRE_FIXED32).map_err(|_| EncodeError::TypeMismatch(tag, type_name.to_string()))?;
            buf.extend_from_slice(&v.to_le_bytes());
            Ok(())
        }
        Value::Bytes(bytes) => {
            write_key(buf, tag, WIRE_BYTES).map_err(|_| EncodeError::TypeMismatch(tag, type_name.to_string()))?;
            write_length_delimited(buf, bytes).map_err(|_| EncodeError::TypeMismatch(tag, type_name.to_string()))?;
            Ok(())
        }
        Value::Message(nested) => {
            write_key(buf, tag, WIRE_BYTES).map_err(|_| EncodeError::TypeMismatch(tag, type_name.to_string()))?;
            let mut scratch = Vec::new();
            encode_message_into(&mut scratch, None, nested)?;
            write_length_delimited(buf, &scratch).map_err(|_| EncodeError::TypeMismatch(tag, type_name.to_string()))?;
            Ok(())
        }
    }
}

/// Validates `value` against the registered definition for its type name,
/// then encodes it. This is the entry point callers (session/discovery) use;
/// `encode_message_into` above is the unchecked recursive step.
pub fn encode(registry: &SchemaRegistry, value: &MessageValue) -> Result<Vec<u8>, EncodeError> {
    let def = registry
        .lookup_message(&value.type_name)
        .ok_or_else(|| EncodeError::UnknownType(value.type_name.clone()))?;
    validate_against_def(def, value)?;
    let mut buf = Vec::new();
    encode_message_into(&mut buf, Some(def), value)?;
    Ok(buf)
}

fn validate_against_def(def: &MessageDef, value: &MessageValue) -> Result<(), EncodeError> {
    for (&tag, field_value) in &value.fields {
        // Tags the schema doesn't define are silently dropped at encode time
        // rather than validated or rejected.
        let Some(field_def) = def.fields.get(&tag) else {
            continue;
        };
        let is_repeated_value = matches!(field_value, Value::Repeated(_));
        if field_def.label == Label::Repeated && !is_repeated_value {
            return Err(EncodeError::ExpectedRepeated(tag, def.name.clone()));
        }
        let sample = match field_value {
            Value::Repeated(items) => items.first(),
            other => Some(other),
        };
        if let Some(sample) = sample {
            let expected_wire = wire_type_for_scalar(field_def.scalar);
            let actual_wire = match sample {
                Value::Varint(_) => WIRE_VARINT,
                Value::Fixed64(_) => WIRE_FIXED64,
                Value::Fixed32(_) => WIRE_FIXED32,
                Value::Bytes(_) | Value::Message(_) => WIRE_BYTES,
                Value::Repeated(_) => unreachable!("flattened above"),
            };
            if expected_wire != actual_wire {
                return Err(EncodeError::TypeMismatch(tag, def.name.clone()));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
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
    fn encodes_scalar_and_repeated_fields() {
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
        assert!(!bytes.is_empty());
        // key for field 1 (wire type 2): (1<<3)|2 = 0x0A
        assert_eq!(bytes[0], 0x0A);
    }

    #[test]
    fn unknown_type_rejected() {
        let reg = SchemaRegistry::new();
        let value = MessageValue::new("Ghost");
        assert!(matches!(encode(&reg, &value), Err(EncodeError::UnknownType(_))));
    }

    #[test]
    fn unknown_field_tag_is_dropped_not_rejected() {
        let reg = registry_with_person();
        let mut person = MessageValue::new("Person");
        person.set(1, Value::Bytes(b"alice".to_vec()));
        person.set(99, Value::Varint(1));
        let bytes = encode(&reg, &person).unwrap();
        let decoded = crate::proto::decode::decode(&reg, "Person", &bytes).unwrap();
        assert_eq!(decoded.get(1), Some(&Value::Bytes(b"alice".to_vec())));
        assert_eq!(decoded.get(99), None);
    }

    #[test]
    fn repeated_field_requires_repeated_value() {
        let reg = registry_with_person();
        let mut person = MessageValue::new("Person");
        person.set(3, Value::Bytes(b"solo@x.com".to_vec()));
        assert!(matches!(
            encode(&reg, &person),
            Err(EncodeError::ExpectedRepeated(3, _))
        ));
    }

    #[test]
    fn sint32_field_applies_zigzag_before_decode_recovers_it() {
        let mut reg = SchemaRegistry::new();
        let def = parse_schema("message Delta { sint32 offset = 1; }")
            .unwrap()
            .remove(0);
        reg.register_message(def).unwrap();
        let mut value = MessageValue::new("Delta");
        value.set(1, Value::Varint((-5i32 as i64 as u64)));
        let bytes = encode(&reg, &value).unwrap();
        // ZigZag(-5) = 9, which fits in a single varint byte: 0x09.
        assert_eq!(bytes, vec![0x08, 0x09]);
        let decoded = crate::proto::decode::decode(&reg, "Delta", &bytes).unwrap();
        assert_eq!(decoded.get(1), Some(&Value::Varint(-5i32 as i64 as u64)));
    }

    #[test]
    fn nested_message_encodes_recursively() {
        let mut reg = SchemaRegistry::new();
        for def in parse_schema(
            "message Inner { int32 x = 1; } message Outer { Inner inner = 1; }",
        )
        .unwrap()
        {
            reg.register_message(def).unwrap();
        }
        let mut inner = MessageValue::new("Inner");
        inner.set(1, Value::Varint(7));
        let mut outer = MessageValue::new("Outer");
        outer.set(1, Value::Message(Box::new(inner)));
        let bytes = encode(&reg, &outer).unwrap();
        assert!(!bytes.is_empty());
    }
}
