use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("handler name '{name}' must start with prefix '{prefix}'")]
    HandlerPrefix { name: String, prefix: String },

    #[error("message schema '{name}' already registered with a different definition")]
    DuplicateSchema { name: String },

    #[error("application already started")]
    AlreadyStarted,

    #[error("producer for topic '{0}' is not started")]
    ProducerNotStarted(String),

    #[error("producer for topic '{0}' is shut down")]
    ProducerClosed(String),

    #[error("schema error: {0}")]
    Schema(#[from] dispatch_types::SchemaError),

    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    #[error("broker error: {0}")]
    Broker(String),

    #[error("consumer loop for topic '{topic}' failed: {reason}")]
    LoopFault { topic: String, reason: String },

    #[error("specification export failed: {0}")]
    SpecExport(#[from] dispatch_asyncapi::ExportError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
