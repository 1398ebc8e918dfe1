//! Hello-world producer.
//!
//! Sends a greeting onto the `hello` topic every two seconds until
//! interrupted:
//!
//! ```bash
//! cargo run --example hello_producer -- --bootstrap-servers localhost:9092
//! ```

use std::time::Duration;

use chrono::Utc;
use clap::Parser;
use kafka_dispatch::{
    App, DispatchConfig, FieldSchema, FieldType, KafkaMessage, MessageSchema, ProducerOverrides,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
struct HelloMessage {
    msg: String,
    sent_at: chrono::DateTime<Utc>,
}

impl KafkaMessage for HelloMessage {
    fn schema() -> MessageSchema {
        MessageSchema::new("HelloMessage")
            .field(
                FieldSchema::required("msg", FieldType::String)
                    .with_example("Hello")
                    .with_description("Demo hello world message"),
            )
            .field(
                FieldSchema::required("sent_at", FieldType::Timestamp)
                    .with_example("2020-04-23T10:20:30Z"),
            )
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("kafka_dispatch=debug,hello_producer=info")
        .init();

    let config = DispatchConfig::parse();
    let mut app = App::new(config);
    let hello = app.produces::<HelloMessage>("to_hello", ProducerOverrides::default())?;

    app.start().await?;

    let mut ticker = tokio::time::interval(Duration::from_secs(2));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let sent = hello
                    .produce(HelloMessage { msg: "hello".to_string(), sent_at: Utc::now() })
                    .await?;
                tracing::info!("Sent hello msg at {}", sent.sent_at);
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    app.shutdown().await?;
    Ok(())
}
