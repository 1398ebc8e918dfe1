//! AsyncAPI contract synthesis for kafka-dispatch.
//!
//! This crate turns a snapshot of the topic registry (channels, message
//! schemas) plus broker and service metadata into an AsyncAPI 2.5.0
//! document, and persists it idempotently:
//!
//! - [`build_document`] - pure assembly of the document value
//! - [`export_spec`] - render to YAML and atomically replace the persisted
//!   document only when its content changed (structural comparison, not
//!   byte comparison)
//! - [`generate_docs`] - trigger the external AsyncAPI documentation
//!   generator, invoked by callers only on a changed document

pub mod document;
pub mod error;
pub mod export;

pub use document::{build_document, ChannelDirection, ChannelSpec, ASYNCAPI_VERSION};
pub use error::ExportError;
pub use export::{export_spec, generate_docs, ExportOutcome, SpecPaths};
