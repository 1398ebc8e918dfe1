//! Export idempotence tests.
//!
//! The persisted document must be replaced only when the synthesized
//! content actually changes, and must be byte-identical across repeated
//! exports of an unchanged registry.

use std::collections::BTreeMap;

use dispatch_asyncapi::{
    build_document, export_spec, ChannelDirection, ChannelSpec, ExportOutcome, SpecPaths,
};
use dispatch_types::{BrokerDescriptor, FieldSchema, FieldType, MessageSchema, ServiceInfo};

fn hello_channels(extra_field: bool) -> Vec<ChannelSpec> {
    let mut schema = MessageSchema::new("HelloMessage")
        .field(FieldSchema::required("msg", FieldType::String).with_example("Hello"));
    if extra_field {
        schema = schema.field(FieldSchema::optional("sender", FieldType::String));
    }
    vec![ChannelSpec {
        topic: "hello".to_string(),
        direction: ChannelDirection::Subscribe,
        schema,
        description: None,
    }]
}

fn brokers() -> BTreeMap<String, BrokerDescriptor> {
    let mut map = BTreeMap::new();
    map.insert("localhost".to_string(), BrokerDescriptor::local());
    map
}

#[test]
fn export_is_idempotent_for_unchanged_registry() {
    let root = tempfile::tempdir().unwrap();
    let paths = SpecPaths::under(root.path());
    let document =
        build_document(&ServiceInfo::default(), &brokers(), &hello_channels(false)).unwrap();

    let first = export_spec(&document, &paths.spec_path, false).unwrap();
    assert_eq!(first, ExportOutcome::Changed);
    let first_bytes = std::fs::read(&paths.spec_path).unwrap();

    // Synthesizing again from the same inputs must not touch the file.
    let document_again =
        build_document(&ServiceInfo::default(), &brokers(), &hello_channels(false)).unwrap();
    let second = export_spec(&document_again, &paths.spec_path, false).unwrap();
    assert_eq!(second, ExportOutcome::Unchanged);
    assert_eq!(std::fs::read(&paths.spec_path).unwrap(), first_bytes);
}

#[test]
fn export_replaces_document_when_schema_changes() {
    let root = tempfile::tempdir().unwrap();
    let paths = SpecPaths::under(root.path());

    let before =
        build_document(&ServiceInfo::default(), &brokers(), &hello_channels(false)).unwrap();
    export_spec(&before, &paths.spec_path, false).unwrap();
    let before_bytes = std::fs::read(&paths.spec_path).unwrap();

    let after =
        build_document(&ServiceInfo::default(), &brokers(), &hello_channels(true)).unwrap();
    let outcome = export_spec(&after, &paths.spec_path, false).unwrap();
    assert_eq!(outcome, ExportOutcome::Changed);
    assert_ne!(std::fs::read(&paths.spec_path).unwrap(), before_bytes);
}

#[test]
fn force_rebuild_rewrites_an_unchanged_document() {
    let root = tempfile::tempdir().unwrap();
    let paths = SpecPaths::under(root.path());
    let document =
        build_document(&ServiceInfo::default(), &brokers(), &hello_channels(false)).unwrap();

    export_spec(&document, &paths.spec_path, false).unwrap();
    let outcome = export_spec(&document, &paths.spec_path, true).unwrap();
    assert_eq!(outcome, ExportOutcome::Changed);
}

#[test]
fn exported_document_parses_back_structurally_equal() {
    let root = tempfile::tempdir().unwrap();
    let paths = SpecPaths::under(root.path());
    let document =
        build_document(&ServiceInfo::default(), &brokers(), &hello_channels(false)).unwrap();
    export_spec(&document, &paths.spec_path, false).unwrap();

    let persisted = std::fs::read_to_string(&paths.spec_path).unwrap();
    let parsed: serde_json::Value = serde_yaml::from_str(&persisted).unwrap();
    assert_eq!(parsed, document);
}
