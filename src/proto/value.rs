//! The tagged-value tree a decoded Protobuf message is represented as. A decode
//! produces a `Value::Message`, whose fields are keyed by tag number, mirroring
//! the registry's own `BTreeMap<u32, FieldDef>` keying.

use std::collections::BTreeMap;

/// One decoded field value. Unlike `prost`-style generated structs, this tree
/// is dynamically shaped at runtime by whatever `MessageDef` drove the
/// decode — there's no codegen and no `build.rs` step.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Varint(u64),
    Fixed64(u64),
    Fixed32(u32),
    Bytes(Vec<u8>),
    Message(Box<MessageValue>),
    /// A `repeated` field's values, accumulated in encounter order.
    Repeated(Vec<Value>),
}

/// A decoded message: its fields keyed by tag, plus the type name the
/// registry resolved it against (useful for diagnostics and for re-encoding).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MessageValue {
    pub type_name: String,
    pub fields: BTreeMap<u32, Value>,
}

impl MessageValue {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn get(&self, tag: u32) -> Option<&Value> {
        self.fields.get(&tag)
    }

    pub fn set(&mut self, tag: u32, value: Value) {
        self.fields.insert(tag, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_value_get_set() {
        let mut m = MessageValue::new("Person");
        m.set(1, Value::Bytes(b"alice".to_vec()));
        assert_eq!(m.get(1), Some(&Value::Bytes(b"alice".to_vec())));
        assert_eq!(m.get(2), None);
    }
}
