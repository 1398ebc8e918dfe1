//! Hello-world consumer.
//!
//! Registers a typed handler on the `hello` topic and runs until
//! interrupted:
//!
//! ```bash
//! cargo run --example hello_consumer -- --bootstrap-servers localhost:9092
//! ```

use clap::Parser;
use kafka_dispatch::{
    App, ConsumerOverrides, DispatchConfig, FieldSchema, FieldType, KafkaMessage, MessageSchema,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
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

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("kafka_dispatch=debug,hello_consumer=info")
        .init();

    let config = DispatchConfig::parse();
    let mut app = App::new(config);

    app.consumes::<HelloMessage, _, _>(
        "on_hello",
        ConsumerOverrides::default(),
        |msg: HelloMessage| async move {
            tracing::info!("Got data, msg={}", msg.msg);
            Ok(())
        },
    )?;

    app.start().await?;
    tokio::signal::ctrl_c().await?;
    app.shutdown().await?;
    Ok(())
}
