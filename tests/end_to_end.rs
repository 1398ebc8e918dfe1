//! End-to-end tests over the in-memory broker.
//!
//! These exercise the full register -> start -> dispatch -> acknowledge ->
//! shutdown cycle without a Kafka cluster:
//!
//! 1. A consume registration on `hello` receives a published payload
//!    exactly once and its offset is committed afterward.
//! 2. A produce registration on `hello` sends exactly one payload per
//!    `produce` call.
//! 3. Startup exports the AsyncAPI document and leaves it untouched on an
//!    unchanged restart.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use kafka_dispatch::testing::MemoryBroker;
use kafka_dispatch::{
    App, ConsumerOverrides, DispatchConfig, Error, FieldSchema, FieldType, KafkaMessage,
    MessageSchema, ProducerOverrides, SpecPaths,
};
use serde::{Deserialize, Serialize};
use tokio::time::sleep;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct HelloMessage {
    msg: String,
}

impl KafkaMessage for HelloMessage {
    fn schema() -> MessageSchema {
        MessageSchema::new("HelloMessage").field(
            FieldSchema::required("msg", FieldType::String)
                .with_example("Hello")
                .with_description("Demo hello world message"),
        )
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter("kafka_dispatch=debug")
        .try_init()
        .ok();
}

fn test_config(root: &std::path::Path) -> DispatchConfig {
    DispatchConfig {
        root_path: root.to_path_buf(),
        skip_docs_generation: true,
        ..DispatchConfig::default()
    }
}

async fn wait_for(mut condition: impl FnMut() -> bool) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within timeout");
}

#[tokio::test]
async fn consumed_message_is_dispatched_once_and_committed() {
    init_tracing();
    let root = tempfile::tempdir().unwrap();
    let broker = MemoryBroker::new();
    broker.publish("hello", b"{\"msg\":\"Hello\"}".to_vec()).await;

    let mut app = App::with_broker(test_config(root.path()), Arc::new(broker.clone()));

    let invocations = Arc::new(AtomicUsize::new(0));
    let received = Arc::new(Mutex::new(Vec::new()));
    {
        let invocations = Arc::clone(&invocations);
        let received = Arc::clone(&received);
        app.consumes::<HelloMessage, _, _>(
            "on_hello",
            ConsumerOverrides::default(),
            move |msg: HelloMessage| {
                let invocations = Arc::clone(&invocations);
                let received = Arc::clone(&received);
                async move {
                    invocations.fetch_add(1, Ordering::SeqCst);
                    received.lock().unwrap().push(msg.msg);
                    Ok(())
                }
            },
        )
        .unwrap();
    }

    app.start().await.unwrap();

    {
        let invocations = Arc::clone(&invocations);
        wait_for(move || invocations.load(Ordering::SeqCst) == 1).await;
    }
    assert_eq!(*received.lock().unwrap(), vec!["Hello"]);

    // The offset is committed only after the handler ran.
    for _ in 0..500 {
        if broker.committed_offset("kafka-dispatch", "hello").await == Some(1) {
            break;
        }
        sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(broker.committed_offset("kafka-dispatch", "hello").await, Some(1));

    app.shutdown().await.unwrap();
    assert_eq!(invocations.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn produced_value_reaches_the_topic_exactly_once() {
    init_tracing();
    let root = tempfile::tempdir().unwrap();
    let broker = MemoryBroker::new();

    let mut app = App::with_broker(test_config(root.path()), Arc::new(broker.clone()));
    let hello = app
        .produces::<HelloMessage>("to_hello", ProducerOverrides::default())
        .unwrap();
    assert_eq!(hello.topic(), "hello");

    app.start().await.unwrap();

    let returned = hello
        .produce(HelloMessage { msg: "hi".to_string() })
        .await
        .unwrap();
    assert_eq!(returned.msg, "hi");

    let published = broker.published("hello").await;
    assert_eq!(published.len(), 1);
    assert_eq!(published[0], b"{\"msg\":\"hi\"}");

    app.shutdown().await.unwrap();
}

#[tokio::test]
async fn registration_without_prefix_is_rejected() {
    let root = tempfile::tempdir().unwrap();
    let broker = MemoryBroker::new();
    let mut app = App::with_broker(test_config(root.path()), Arc::new(broker));

    let err = app
        .consumes::<HelloMessage, _, _>("hello", ConsumerOverrides::default(), |_msg| async {
            Ok(())
        })
        .unwrap_err();
    assert!(matches!(err, Error::HandlerPrefix { .. }));

    let err = app
        .produces::<HelloMessage>("hello", ProducerOverrides::default())
        .unwrap_err();
    assert!(matches!(err, Error::HandlerPrefix { .. }));
}

#[tokio::test]
async fn startup_exports_the_contract_and_restart_leaves_it_untouched() {
    init_tracing();
    let root = tempfile::tempdir().unwrap();
    let paths = SpecPaths::under(root.path());

    let build_app = |broker: MemoryBroker| {
        let mut app = App::with_broker(test_config(root.path()), Arc::new(broker));
        app.consumes::<HelloMessage, _, _>(
            "on_hello",
            ConsumerOverrides::default(),
            |_msg: HelloMessage| async { Ok(()) },
        )
        .unwrap();
        app
    };

    let broker = MemoryBroker::new();
    let mut app = build_app(broker.clone());
    app.start().await.unwrap();
    app.shutdown().await.unwrap();

    let document = std::fs::read_to_string(&paths.spec_path).unwrap();
    let parsed: serde_json::Value = serde_yaml::from_str(&document).unwrap();
    assert_eq!(
        parsed["channels"]["hello"]["subscribe"]["message"]["$ref"],
        "#/components/messages/HelloMessage"
    );
    assert_eq!(
        parsed["components"]["messages"]["HelloMessage"]["example"]["msg"],
        "Hello"
    );

    // An unchanged registry on restart must not rewrite the document.
    let first_bytes = std::fs::read(&paths.spec_path).unwrap();
    let mut app = build_app(broker);
    app.start().await.unwrap();
    app.shutdown().await.unwrap();
    assert_eq!(std::fs::read(&paths.spec_path).unwrap(), first_bytes);
}

#[tokio::test]
async fn handler_failures_are_forwarded_to_the_error_topic() {
    init_tracing();
    let root = tempfile::tempdir().unwrap();
    let broker = MemoryBroker::new();
    broker.publish("hello", b"{\"msg\":\"boom\"}".to_vec()).await;

    let config = DispatchConfig {
        error_topic: Some("undeliverable".to_string()),
        ..test_config(root.path())
    };
    let mut app = App::with_broker(config, Arc::new(broker.clone()));
    app.consumes::<HelloMessage, _, _>(
        "on_hello",
        ConsumerOverrides::default(),
        |_msg: HelloMessage| async { anyhow::bail!("nope") },
    )
    .unwrap();

    app.start().await.unwrap();

    for _ in 0..500 {
        if !broker.published("undeliverable").await.is_empty() {
            break;
        }
        sleep(Duration::from_millis(10)).await;
    }
    let forwarded = broker.published("undeliverable").await;
    assert_eq!(forwarded.len(), 1);
    let record: serde_json::Value = serde_json::from_slice(&forwarded[0]).unwrap();
    assert_eq!(record["topic"], "hello");
    assert_eq!(record["error"], "nope");

    app.shutdown().await.unwrap();
}
