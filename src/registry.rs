//! The topic registry: a pure mapping from topic names to registrations.
//!
//! Built at application setup time and read-only once the loops start. The
//! registry performs no I/O; the consumer and producer runtimes consume it.

use std::collections::HashMap;
use std::sync::Arc;

use dispatch_asyncapi::{ChannelDirection, ChannelSpec};
use dispatch_types::MessageSchema;
use futures::future::BoxFuture;
use serde_json::Value;

use crate::error::{Error, Result};

/// Default prefix stripped from consume handler names.
pub const CONSUME_PREFIX: &str = "on_";
/// Default prefix stripped from produce handler names.
pub const PRODUCE_PREFIX: &str = "to_";

/// Direction of a topic registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Consume,
    Produce,
}

/// Type-erased consume handler. Receives the schema-validated JSON payload;
/// the typed deserialization happens inside the erased closure.
pub(crate) type ConsumeFn =
    Arc<dyn Fn(Value) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Per-topic consumer configuration overrides.
#[derive(Debug, Clone, Default)]
pub struct ConsumerOverrides {
    pub group_id: Option<String>,
    pub auto_offset_reset: Option<String>,
    pub max_poll_records: Option<usize>,
    pub max_buffer_size: Option<usize>,
}

/// Per-topic producer configuration overrides.
#[derive(Debug, Clone, Default)]
pub struct ProducerOverrides {
    pub queue_capacity: Option<usize>,
}

#[derive(Clone)]
pub(crate) struct ConsumerRegistration {
    pub topic: String,
    pub schema: MessageSchema,
    pub handler: ConsumeFn,
    pub overrides: ConsumerOverrides,
    pub description: Option<String>,
}

#[derive(Clone)]
pub(crate) struct ProducerRegistration {
    pub topic: String,
    pub schema: MessageSchema,
    pub overrides: ProducerOverrides,
    pub description: Option<String>,
}

/// Derive a topic name from a handler name by stripping `prefix`.
///
/// A handler name that does not start with the prefix, or consists of the
/// prefix alone, is a configuration error raised at registration time.
pub fn topic_for_handler(handler_name: &str, prefix: &str) -> Result<String> {
    match handler_name.strip_prefix(prefix) {
        Some(topic) if !topic.is_empty() => Ok(topic.to_string()),
        _ => Err(Error::HandlerPrefix {
            name: handler_name.to_string(),
            prefix: prefix.to_string(),
        }),
    }
}

/// Mapping from topic names to consume and produce registrations.
///
/// A topic may carry at most one registration per direction; consume and
/// produce registrations on the same topic coexist. Re-registering a
/// topic+direction combination replaces the prior entry (last registration
/// wins), which supports handler replacement during iterative development.
#[derive(Default)]
pub struct TopicRegistry {
    consumers: HashMap<String, ConsumerRegistration>,
    producers: HashMap<String, ProducerRegistration>,
}

impl TopicRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schema names are globally unique among registered messages: the same
    /// name may recur only with a structurally identical definition.
    fn assert_schema_unique(&self, schema: &MessageSchema) -> Result<()> {
        let clash = self
            .consumers
            .values()
            .map(|r| &r.schema)
            .chain(self.producers.values().map(|r| &r.schema))
            .any(|existing| existing.name == schema.name && *existing != *schema);
        if clash {
            return Err(Error::DuplicateSchema {
                name: schema.name.clone(),
            });
        }
        Ok(())
    }

    pub(crate) fn register_consumer(&mut self, registration: ConsumerRegistration) -> Result<()> {
        self.assert_schema_unique(&registration.schema)?;
        let topic = registration.topic.clone();
        if self.consumers.insert(topic.clone(), registration).is_some() {
            tracing::debug!(topic = %topic, "replaced existing consume registration");
        }
        Ok(())
    }

    pub(crate) fn register_producer(&mut self, registration: ProducerRegistration) -> Result<()> {
        self.assert_schema_unique(&registration.schema)?;
        let topic = registration.topic.clone();
        if self.producers.insert(topic.clone(), registration).is_some() {
            tracing::debug!(topic = %topic, "replaced existing produce registration");
        }
        Ok(())
    }

    pub(crate) fn consumers(&self) -> impl Iterator<Item = &ConsumerRegistration> {
        self.consumers.values()
    }

    pub(crate) fn producer(&self, topic: &str) -> Option<&ProducerRegistration> {
        self.producers.get(topic)
    }

    /// Whether a registration exists for the given topic and direction.
    pub fn is_registered(&self, topic: &str, direction: Direction) -> bool {
        match direction {
            Direction::Consume => self.consumers.contains_key(topic),
            Direction::Produce => self.producers.contains_key(topic),
        }
    }

    /// Number of registrations across both directions.
    pub fn len(&self) -> usize {
        self.consumers.len() + self.producers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.consumers.is_empty() && self.producers.is_empty()
    }

    /// Snapshot of every registration for contract synthesis. Consume
    /// registrations become `subscribe` channels, produce registrations
    /// become `publish` channels.
    pub fn channel_specs(&self) -> Vec<ChannelSpec> {
        let consumers = self.consumers.values().map(|r| ChannelSpec {
            topic: r.topic.clone(),
            direction: ChannelDirection::Subscribe,
            schema: r.schema.clone(),
            description: r.description.clone(),
        });
        let producers = self.producers.values().map(|r| ChannelSpec {
            topic: r.topic.clone(),
            direction: ChannelDirection::Publish,
            schema: r.schema.clone(),
            description: r.description.clone(),
        });
        consumers.chain(producers).collect()
    }
}
