//! Service Discovery: the reserved `$SYS/discovery/request` /
//! `$SYS/discovery/response` topics layered on top of pub/sub.

use crate::mqtt::PublishPacket;
use crate::proto::{encode, EncodeError};
use crate::schema::registry::{SchemaRegistry, SERVICE_DISCOVERY_RESPONSE_TYPE};

pub const DISCOVERY_REQUEST_TOPIC: &str = "$SYS/discovery/request";
pub const DISCOVERY_RESPONSE_TOPIC: &str = "$SYS/discovery/response";

/// Source for the reserved `ServiceDiscoveryResponse` schema, bundled with
/// the broker rather than read from the schemas directory so discovery works
/// even before an operator has placed any `.proto` files there.
pub const SERVICE_DISCOVERY_RESPONSE_SCHEMA: &str = r#"
syntax = "proto3";

message ServiceDiscoveryBinding {
    bytes topic = 1;
    bytes message_type = 2;
    bytes schema_source = 3;
}

message ServiceDiscoveryResponse {
    repeated ServiceDiscoveryBinding bindings = 1;
}
"#;

/// Builds the PUBLISH packet the discovery handler fans out in response to a
/// discovery request: QoS 0, no retain, no dup, topic
/// `$SYS/discovery/response`.
pub fn build_discovery_publish(registry: &SchemaRegistry) -> Result<PublishPacket, EncodeError> {
    let value = registry.build_discovery_value();
    let payload = encode(registry, &value)?;
    Ok(PublishPacket::at_most_once(DISCOVERY_RESPONSE_TOPIC, payload))
}
