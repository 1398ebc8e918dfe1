//! AsyncAPI document assembly.
//!
//! Pure functions from (service info, broker descriptors, channel specs) to
//! the document value. Map keys are kept sorted so repeated synthesis of an
//! unchanged registry yields a structurally identical document.

use std::collections::BTreeMap;

use dispatch_types::{BrokerDescriptor, MessageSchema, ServiceInfo};
use serde_json::{json, Map, Value};

use crate::error::ExportError;

/// AsyncAPI version emitted into the document.
pub const ASYNCAPI_VERSION: &str = "2.5.0";

/// Direction of a channel operation, seen from the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelDirection {
    /// The application produces onto this topic.
    Publish,
    /// The application consumes from this topic.
    Subscribe,
}

impl ChannelDirection {
    fn key(&self) -> &'static str {
        match self {
            ChannelDirection::Publish => "publish",
            ChannelDirection::Subscribe => "subscribe",
        }
    }
}

/// One registered topic, as handed over by the topic registry.
#[derive(Debug, Clone)]
pub struct ChannelSpec {
    pub topic: String,
    pub direction: ChannelDirection,
    pub schema: MessageSchema,
    pub description: Option<String>,
}

/// Assemble the full AsyncAPI document.
pub fn build_document(
    service: &ServiceInfo,
    brokers: &BTreeMap<String, BrokerDescriptor>,
    channels: &[ChannelSpec],
) -> Result<Value, ExportError> {
    Ok(json!({
        "asyncapi": ASYNCAPI_VERSION,
        "info": serde_json::to_value(service)?,
        "servers": servers_value(brokers),
        "channels": channels_value(channels),
        "components": components_value(brokers, channels)?,
    }))
}

fn security_key(broker_key: &str) -> String {
    format!("{broker_key}_default_security")
}

/// One server entry per broker; the port becomes a server variable, and
/// brokers that declare security reference their scheme by name.
fn servers_value(brokers: &BTreeMap<String, BrokerDescriptor>) -> Value {
    let mut servers = Map::new();
    for (key, broker) in brokers {
        let mut server = Map::new();
        server.insert("url".to_string(), Value::String(broker.url.clone()));
        server.insert(
            "description".to_string(),
            Value::String(broker.description.clone()),
        );
        server.insert(
            "protocol".to_string(),
            Value::String(broker.protocol.clone()),
        );
        server.insert(
            "variables".to_string(),
            json!({"port": {"default": broker.port}}),
        );
        if broker.security.is_some() {
            server.insert(
                "security".to_string(),
                json!([{ security_key(key): [] }]),
            );
        }
        servers.insert(key.clone(), Value::Object(server));
    }
    Value::Object(servers)
}

/// Channel entries, referencing message schemas by name. A topic with both
/// a consume and a produce registration merges into one channel carrying
/// both operations.
fn channels_value(channels: &[ChannelSpec]) -> Value {
    let mut merged: BTreeMap<String, Map<String, Value>> = BTreeMap::new();
    for channel in channels {
        let mut operation = Map::new();
        operation.insert(
            "message".to_string(),
            json!({"$ref": format!("#/components/messages/{}", channel.schema.name)}),
        );
        if let Some(description) = &channel.description {
            operation.insert(
                "description".to_string(),
                Value::String(description.clone()),
            );
        }
        merged
            .entry(channel.topic.clone())
            .or_default()
            .insert(channel.direction.key().to_string(), Value::Object(operation));
    }

    let mut out = Map::new();
    for (topic, operations) in merged {
        out.insert(topic, Value::Object(operations));
    }
    Value::Object(out)
}

/// Message definitions (one per distinct schema, with an example only when
/// the schema can render one) plus security scheme definitions.
fn components_value(
    brokers: &BTreeMap<String, BrokerDescriptor>,
    channels: &[ChannelSpec],
) -> Result<Value, ExportError> {
    let mut schemas: BTreeMap<&str, &MessageSchema> = BTreeMap::new();
    for channel in channels {
        schemas.entry(channel.schema.name.as_str()).or_insert(&channel.schema);
    }

    let mut messages = Map::new();
    for (name, schema) in schemas {
        let mut message = Map::new();
        message.insert("payload".to_string(), schema.payload_schema());
        if let Some(example) = schema.example() {
            message.insert("example".to_string(), example);
        }
        messages.insert(name.to_string(), Value::Object(message));
    }

    let mut security_schemes = Map::new();
    for (key, broker) in brokers {
        if let Some(security) = &broker.security {
            security_schemes.insert(security_key(key), serde_json::to_value(security)?);
        }
    }

    Ok(json!({
        "messages": messages,
        "schemas": {},
        "securitySchemes": security_schemes,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use dispatch_types::{FieldSchema, FieldType, SecurityScheme, SecurityType};

    fn hello_schema() -> MessageSchema {
        MessageSchema::new("HelloMessage")
            .field(FieldSchema::required("msg", FieldType::String).with_example("Hello"))
    }

    fn brokers() -> BTreeMap<String, BrokerDescriptor> {
        let mut map = BTreeMap::new();
        map.insert("localhost".to_string(), BrokerDescriptor::local());
        map
    }

    #[test]
    fn document_has_top_level_sections() {
        let channels = [ChannelSpec {
            topic: "hello".to_string(),
            direction: ChannelDirection::Subscribe,
            schema: hello_schema(),
            description: None,
        }];
        let doc = build_document(&ServiceInfo::default(), &brokers(), &channels).unwrap();

        assert_eq!(doc["asyncapi"], ASYNCAPI_VERSION);
        assert_eq!(doc["info"]["version"], "0.0.1");
        assert_eq!(doc["servers"]["localhost"]["protocol"], "kafka");
        assert_eq!(
            doc["servers"]["localhost"]["variables"]["port"]["default"],
            "9092"
        );
        assert_eq!(
            doc["channels"]["hello"]["subscribe"]["message"]["$ref"],
            "#/components/messages/HelloMessage"
        );
        assert_eq!(
            doc["components"]["messages"]["HelloMessage"]["example"]["msg"],
            "Hello"
        );
    }

    #[test]
    fn channel_directions_merge_per_topic() {
        let channels = [
            ChannelSpec {
                topic: "hello".to_string(),
                direction: ChannelDirection::Subscribe,
                schema: hello_schema(),
                description: None,
            },
            ChannelSpec {
                topic: "hello".to_string(),
                direction: ChannelDirection::Publish,
                schema: hello_schema(),
                description: Some("replies".to_string()),
            },
        ];
        let doc = build_document(&ServiceInfo::default(), &brokers(), &channels).unwrap();
        let channel = &doc["channels"]["hello"];
        assert!(channel.get("subscribe").is_some());
        assert!(channel.get("publish").is_some());
        assert_eq!(channel["publish"]["description"], "replies");
    }

    #[test]
    fn example_omitted_when_schema_cannot_render_one() {
        let schema =
            MessageSchema::new("Opaque").field(FieldSchema::required("blob", FieldType::Object));
        let channels = [ChannelSpec {
            topic: "opaque".to_string(),
            direction: ChannelDirection::Publish,
            schema,
            description: None,
        }];
        let doc = build_document(&ServiceInfo::default(), &brokers(), &channels).unwrap();
        assert!(doc["components"]["messages"]["Opaque"]
            .get("example")
            .is_none());
    }

    #[test]
    fn secured_broker_emits_security_scheme() {
        let mut brokers = BTreeMap::new();
        brokers.insert(
            "production".to_string(),
            BrokerDescriptor::new("kafka.example.com")
                .with_security(SecurityScheme::new(SecurityType::ScramSha256)),
        );
        let doc = build_document(&ServiceInfo::default(), &brokers, &[]).unwrap();
        assert_eq!(
            doc["servers"]["production"]["security"],
            serde_json::json!([{"production_default_security": []}])
        );
        assert_eq!(
            doc["components"]["securitySchemes"]["production_default_security"]["type"],
            "scramSha256"
        );
    }
}
