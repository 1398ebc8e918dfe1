//! Core types for the kafka-dispatch framework.
//!
//! This crate provides the foundational, data-only types used across the
//! framework:
//!
//! - [`MessageSchema`] / [`FieldSchema`] - structured descriptions of message
//!   payloads, with optional example values for documentation
//! - [`KafkaMessage`] - the typed payload contract (canonical JSON encoding,
//!   schema-validated decoding)
//! - [`BrokerDescriptor`] / [`SecurityScheme`] - broker metadata consumed by
//!   contract synthesis and client construction
//! - [`ServiceInfo`] / [`ContactInfo`] - service metadata rendered into the
//!   generated contract
//!
//! No I/O happens here; the runtime and contract-synthesis crates build on
//! top of these definitions.

pub mod broker;
pub mod error;
pub mod message;
pub mod schema;

pub use broker::{
    ApiKeyLocation, BrokerDescriptor, ContactInfo, SecurityScheme, SecurityType, ServiceInfo,
};
pub use error::SchemaError;
pub use message::KafkaMessage;
pub use schema::{FieldSchema, FieldType, MessageSchema};
