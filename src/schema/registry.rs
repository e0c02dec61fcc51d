//! In-process schema registry: type name -> `MessageDef`, topic -> bound type
//! name, and the admin operations the broker's CONNECT-time bootstrap and
//! discovery handler both call into.

use crate::proto::value::{MessageValue, Value};
use crate::schema::parser::{parse_schema, MessageDef, SchemaParseError};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;

/// Reserved message type clients discover bindings through; must be
/// registered (e.g. bundled at startup) for `build_discovery_value` to work.
pub const SERVICE_DISCOVERY_RESPONSE_TYPE: &str = "ServiceDiscoveryResponse";
const SERVICE_DISCOVERY_BINDING_TYPE: &str = "ServiceDiscoveryBinding";

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("schema parse error: {0}")]
    Parse(#[from] SchemaParseError),
    #[error("message type {0:?} is already registered")]
    DuplicateMessage(String),
    #[error("unknown message type {0:?}")]
    UnknownMessage(String),
    #[error("io error reading schema directory: {0}")]
    Io(#[from] std::io::Error),
}

/// Holds every parsed `MessageDef` plus the topic -> type-name bindings the
/// broker consults when routing a PUBLISH that carries a registered schema.
/// Topic lookup is exact-match only; wildcard filters are never resolved
/// against bindings.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    messages: HashMap<String, MessageDef>,
    topic_bindings: HashMap<String, String>,
    total_messages_routed: AtomicUsize,
    active_connections: AtomicUsize,
    /// Where `register_schema_and_bind` persists newly registered schemas so
    /// they survive a restart. `None` means registration only affects memory
    /// (used by tests that don't care about persistence).
    schemas_dir: Option<PathBuf>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_schemas_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            schemas_dir: Some(dir.into()),
            ..Self::default()
        }
    }

    pub fn register_message(&mut self, def: MessageDef) -> Result<(), RegistryError> {
        if self.messages.contains_key(&def.name) {
            return Err(RegistryError::DuplicateMessage(def.name));
        }
        self.messages.insert(def.name.clone(), def);
        Ok(())
    }

    pub fn lookup_message(&self, type_name: &str) -> Option<&MessageDef> {
        self.messages.get(type_name)
    }

    pub fn bind_topic(&mut self, topic: impl Into<String>, type_name: impl Into<String>) -> Result<(), RegistryError> {
        let type_name = type_name.into();
        if !self.messages.contains_key(&type_name) {
            return Err(RegistryError::UnknownMessage(type_name));
        }
        self.topic_bindings.insert(topic.into(), type_name);
        Ok(())
    }

    /// Exact-match only; wildcard topics are never matched against bindings.
    pub fn lookup_type_for_topic(&self, topic: &str) -> Option<&str> {
        self.topic_bindings.get(topic).map(String::as_str)
    }

    pub fn list_topic_bindings(&self) -> Vec<(String, String)> {
        self.topic_bindings
            .iter()
            .map(|(t, n)| (t.clone(), n.clone()))
            .collect()
    }

    pub fn schema_count(&self) -> usize {
        self.messages.len()
    }

    pub fn message_names(&self) -> Vec<&str> {
        self.messages.keys().map(String::as_str).collect()
    }

    pub fn record_message_routed(&self) {
        self.total_messages_routed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn total_messages_routed(&self) -> usize {
        self.total_messages_routed.load(Ordering::Relaxed)
    }

    pub fn connection_opened(&self) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }

    /// Scans `dir` for `*.proto` files at the top level and registers every
    /// message each defines. Used at startup to preload the schema directory
    /// named in configuration.
    pub fn load_from_directory(&mut self, dir: &Path) -> Result<usize, RegistryError> {
        let mut loaded = 0;
        let mut entries: Vec<_> = fs::read_dir(dir)?.filter_map(Result::ok).collect();
        entries.sort_by_key(|e| e.path());
        for entry in entries {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("proto") {
                continue;
            }
            let source = fs::read_to_string(&path)?;
            for def in parse_schema(&source)? {
                self.register_message(def)?;
                loaded += 1;
            }
        }
        Ok(loaded)
    }

    /// Atomic admin operation backing the Service Discovery registration
    /// path: parse the given source, persist it as `<bind_type>.proto` in the
    /// schemas directory, register every message it defines, and bind `topic`
    /// to `bind_type` in one call so a caller never observes a half-applied
    /// registration. The write happens before any in-memory mutation, so a
    /// failed write leaves the registry untouched.
    pub fn register_schema_and_bind(
        &mut self,
        source: &str,
        topic: impl Into<String>,
        bind_type: impl Into<String>,
    ) -> Result<(), RegistryError> {
        let defs = parse_schema(source)?;
        let bind_type = bind_type.into();
        if !defs.iter().any(|d| d.name == bind_type) {
            return Err(RegistryError::UnknownMessage(bind_type));
        }
        for def in &defs {
            if self.messages.contains_key(&def.name) {
                return Err(RegistryError::DuplicateMessage(def.name.clone()));
            }
        }
        if let Some(dir) = &self.schemas_dir {
            fs::write(dir.join(format!("{bind_type}.proto")), source)?;
        }
        for def in defs {
            self.messages.insert(def.name.clone(), def);
        }
        self.topic_bindings.insert(topic.into(), bind_type);
        Ok(())
    }

    /// Builds the `ServiceDiscoveryResponse`-shaped tagged value: field 1 is
    /// a repeated `ServiceDiscoveryBinding { topic, message_type, schema_source }`,
    /// one per current topic binding.
    pub fn build_discovery_value(&self) -> MessageValue {
        let mut response = MessageValue::new(SERVICE_DISCOVERY_RESPONSE_TYPE);
        let bindings: Vec<Value> = self
            .topic_bindings
            .iter()
            .map(|(topic, type_name)| {
                let mut binding = MessageValue::new(SERVICE_DISCOVERY_BINDING_TYPE);
                binding.set(1, Value::Bytes(topic.clone().into_bytes()));
                binding.set(2, Value::Bytes(type_name.clone().into_bytes()));
                let source = self
                    .messages
                    .get(type_name)
                    .map(|def| def.source_text.clone())
                    .unwrap_or_default();
                binding.set(3, Value::Bytes(source.into_bytes()));
                Value::Message(Box::new(binding))
            })
            .collect();
        if !bindings.is_empty() {
            response.set(1, Value::Repeated(bindings));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn person_def() -> MessageDef {
        parse_schema("message Person { string name = 1; int32 id = 2; }")
            .unwrap()
            .remove(0)
    }

    #[test]
    fn register_and_lookup() {
        let mut reg = SchemaRegistry::new();
        reg.register_message(person_def()).unwrap();
        assert!(reg.lookup_message("Person").is_some());
        assert!(reg.lookup_message("Ghost").is_none());
    }

    #[test]
    fn duplicate_registration_rejected() {
        let mut reg = SchemaRegistry::new();
        reg.register_message(person_def()).unwrap();
        assert!(matches!(
            reg.register_message(person_def()),
            Err(RegistryError::DuplicateMessage(_))
        ));
    }

    #[test]
    fn bind_topic_requires_known_type() {
        let mut reg = SchemaRegistry::new();
        assert!(reg.bind_topic("people/new", "Person").is_err());
        reg.register_message(person_def()).unwrap();
        reg.bind_topic("people/new", "Person").unwrap();
        assert_eq!(reg.lookup_type_for_topic("people/new"), Some("Person"));
        assert_eq!(reg.lookup_type_for_topic("people/+"), None);
    }

    #[test]
    fn load_from_directory_reads_proto_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut f = fs::File::create(dir.path().join("person.proto")).unwrap();
        writeln!(f, "message Person {{ string name = 1; }}").unwrap();
        let mut reg = SchemaRegistry::new();
        let loaded = reg.load_from_directory(dir.path()).unwrap();
        assert_eq!(loaded, 1);
        assert!(reg.lookup_message("Person").is_some());
    }

    #[test]
    fn register_schema_and_bind_is_atomic_on_unknown_type() {
        let mut reg = SchemaRegistry::new();
        let err = reg.register_schema_and_bind(
            "message Person { string name = 1; }",
            "people/new",
            "NotThere",
        );
        assert!(err.is_err());
        assert_eq!(reg.schema_count(), 0);
        assert!(reg.lookup_type_for_topic("people/new").is_none());
    }

    #[test]
    fn register_schema_and_bind_happy_path() {
        let mut reg = SchemaRegistry::new();
        reg.register_schema_and_bind(
            "message Person { string name = 1; }",
            "people/new",
            "Person",
        )
        .unwrap();
        assert_eq!(reg.lookup_type_for_topic("people/new"), Some("Person"));
        assert_eq!(reg.schema_count(), 1);
    }

    #[test]
    fn register_schema_and_bind_persists_source_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut reg = SchemaRegistry::with_schemas_dir(dir.path());
        reg.register_schema_and_bind(
            "message Person { string name = 1; }",
            "people/new",
            "Person",
        )
        .unwrap();
        let persisted = fs::read_to_string(dir.path().join("Person.proto")).unwrap();
        assert!(persisted.contains("message Person"));
    }

    #[test]
    fn register_schema_and_bind_without_schemas_dir_stays_in_memory_only() {
        let mut reg = SchemaRegistry::new();
        reg.register_schema_and_bind(
            "message Person { string name = 1; }",
            "people/new",
            "Person",
        )
        .unwrap();
        assert_eq!(reg.schema_count(), 1);
    }

    #[test]
    fn counters_track_connections_and_routing() {
        let reg = SchemaRegistry::new();
        reg.connection_opened();
        reg.connection_opened();
        reg.connection_closed();
        assert_eq!(reg.active_connections(), 1);
        reg.record_message_routed();
        reg.record_message_routed();
        assert_eq!(reg.total_messages_routed(), 2);
    }

    #[test]
    fn discovery_value_contains_one_binding_per_topic() {
        let mut reg = SchemaRegistry::new();
        reg.register_schema_and_bind(
            "message SensorData { double value = 1; }",
            "sensor/data",
            "SensorData",
        )
        .unwrap();
        let discovery = reg.build_discovery_value();
        assert_eq!(discovery.type_name, SERVICE_DISCOVERY_RESPONSE_TYPE);
        match discovery.get(1) {
            Some(Value::Repeated(bindings)) => {
                assert_eq!(bindings.len(), 1);
                match &bindings[0] {
                    Value::Message(binding) => {
                        assert_eq!(binding.get(1), Some(&Value::Bytes(b"sensor/data".to_vec())));
                        assert_eq!(binding.get(2), Some(&Value::Bytes(b"SensorData".to_vec())));
                    }
                    other => panic!("expected a message binding, got {other:?}"),
                }
            }
            other => panic!("expected a repeated field, got {other:?}"),
        }
    }

    #[test]
    fn discovery_value_empty_when_no_bindings() {
        let reg = SchemaRegistry::new();
        let discovery = reg.build_discovery_value();
        assert_eq!(discovery.get(1), None);
    }
}
