//! kafka-dispatch
//!
//! A typed topic-dispatch runtime for Kafka services. Applications declare
//! message handlers bound to broker topics; the runtime drives the consume
//! and produce loops, enforces schema-based decoding and encoding of
//! payloads, and derives a machine-readable AsyncAPI contract describing
//! the resulting pub/sub surface, regenerated only when it changes.
//!
//! # Features
//!
//! - Typed handlers: consume handlers receive schema-validated, typed
//!   messages; produce handles serialize typed values against their topic's
//!   schema
//! - Topic derivation: topic names come from handler names (`on_hello`
//!   consumes `hello`, `to_hello` produces to `hello`) or are given
//!   explicitly
//! - Batch consumption with at-least-once acknowledgment and per-message
//!   fault isolation
//! - A bounded background queue for synchronous produce callers, preserving
//!   submission order under backpressure
//! - Idempotent contract export: the persisted AsyncAPI document is
//!   replaced only when its content changes
//!
//! # Crate layout
//!
//! - `dispatch-types` - message schemas, payload contract, broker metadata
//! - `dispatch-asyncapi` - contract synthesis and idempotent export
//! - this crate - topic registry, consumer loops, producer runtime, broker
//!   clients and application orchestration

pub mod app;
pub mod broker;
pub mod config;
pub mod consumer;
pub mod error;
pub mod kafka;
pub mod producer;
pub mod registry;
pub mod testing;

pub use app::App;
pub use broker::{Broker, BrokerConsumer, BrokerProducer, ConsumerSettings, FetchedMessage};
pub use config::DispatchConfig;
pub use consumer::LoopState;
pub use error::{Error, Result};
pub use kafka::KafkaConnector;
pub use producer::Producer;
pub use registry::{
    topic_for_handler, ConsumerOverrides, Direction, ProducerOverrides, TopicRegistry,
    CONSUME_PREFIX, PRODUCE_PREFIX,
};

// Re-export the data model and contract synthesis so applications depend on
// one crate.
pub use dispatch_asyncapi::{
    build_document, export_spec, generate_docs, ChannelDirection, ChannelSpec, ExportError,
    ExportOutcome, SpecPaths, ASYNCAPI_VERSION,
};
pub use dispatch_types::{
    ApiKeyLocation, BrokerDescriptor, ContactInfo, FieldSchema, FieldType, KafkaMessage,
    MessageSchema, SchemaError, SecurityScheme, SecurityType, ServiceInfo,
};
