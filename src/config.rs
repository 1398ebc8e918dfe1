//! Runtime configuration.

use std::path::PathBuf;

use clap::Parser;

/// Configuration for a dispatch application.
///
/// Defaults describe a local development setup; every value can be set from
/// the command line or the environment when the application parses its own
/// arguments, and overridden per topic at registration time where a
/// per-topic override exists.
#[derive(Debug, Clone, Parser)]
pub struct DispatchConfig {
    /// Kafka bootstrap servers (comma-separated)
    #[clap(long, default_value = "localhost:9092", env = "KAFKA_BOOTSTRAP_SERVERS")]
    pub bootstrap_servers: String,

    /// Consumer group ID used by consumer loops unless overridden per topic
    #[clap(long, default_value = "kafka-dispatch", env = "KAFKA_GROUP_ID")]
    pub group_id: String,

    /// Auto offset reset strategy ("earliest" or "latest")
    ///
    /// "earliest" starts from the beginning of the topic when the consumer
    /// group has no committed offsets yet, which avoids missing messages
    /// published before the first start.
    #[clap(long, default_value = "earliest")]
    pub auto_offset_reset: String,

    /// Session timeout in milliseconds
    #[clap(long, default_value = "6000")]
    pub session_timeout_ms: String,

    /// Maximum number of messages fetched per batch
    ///
    /// Offsets are committed per batch, after every message in the batch has
    /// been handled. Larger batches improve throughput but increase the
    /// amount of reprocessing after a crash.
    #[clap(long, default_value_t = 100)]
    pub max_poll_records: usize,

    /// Maximum number of fetched-but-undispatched messages buffered per loop
    #[clap(long, default_value_t = 10_000)]
    pub max_buffer_size: usize,

    /// Capacity of the background producer queue
    ///
    /// When the queue is full, enqueuing callers block until space frees;
    /// messages are never dropped.
    #[clap(long, default_value_t = 1024)]
    pub producer_queue_capacity: usize,

    /// Root directory for the generated AsyncAPI artifacts
    #[clap(long, default_value = ".")]
    pub root_path: PathBuf,

    /// Topic receiving a record for each handler failure, if set
    #[clap(long)]
    pub error_topic: Option<String>,

    /// Rewrite the AsyncAPI document even when its content is unchanged
    #[clap(long)]
    pub force_spec_rebuild: bool,

    /// Do not invoke the external docs generator after exporting the
    /// document
    #[clap(long)]
    pub skip_docs_generation: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            bootstrap_servers: "localhost:9092".to_string(),
            group_id: "kafka-dispatch".to_string(),
            auto_offset_reset: "earliest".to_string(),
            session_timeout_ms: "6000".to_string(),
            max_poll_records: 100,
            max_buffer_size: 10_000,
            producer_queue_capacity: 1024,
            root_path: PathBuf::from("."),
            error_topic: None,
            force_spec_rebuild: false,
            skip_docs_generation: false,
        }
    }
}
