//! The broker client capability.
//!
//! The runtime depends only on these narrow traits, not on a specific
//! broker implementation. Every consumer loop and producer runtime owns its
//! connection exclusively; connections are never shared across tasks.

use async_trait::async_trait;

use crate::error::Result;

/// A raw message fetched from the broker, not yet decoded.
#[derive(Debug, Clone)]
pub struct FetchedMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<Vec<u8>>,
    pub payload: Vec<u8>,
    /// Milliseconds since the epoch, when the broker provides one.
    pub timestamp: Option<i64>,
}

/// Settings applied when opening a consumer connection.
#[derive(Debug, Clone)]
pub struct ConsumerSettings {
    pub group_id: String,
    pub auto_offset_reset: String,
    pub session_timeout_ms: String,
}

/// Connection factory for a message broker.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Open a consumer connection for the given group.
    async fn consumer(&self, settings: ConsumerSettings) -> Result<Box<dyn BrokerConsumer>>;

    /// Open a producer connection.
    async fn producer(&self) -> Result<Box<dyn BrokerProducer>>;
}

/// Consume side of the broker capability.
#[async_trait]
pub trait BrokerConsumer: Send + Sync {
    /// Fetch the next batch of raw messages for the subscribed topics.
    ///
    /// At most `max_records` messages are returned and at most `max_buffer`
    /// messages are held undelivered inside the connection. An empty batch
    /// means nothing arrived within the poll interval; it is not an error.
    async fn fetch(
        &mut self,
        topics: &[String],
        max_records: usize,
        max_buffer: usize,
    ) -> Result<Vec<FetchedMessage>>;

    /// Acknowledge a fully processed batch.
    async fn commit(&mut self, batch: &[FetchedMessage]) -> Result<()>;

    /// Release the connection.
    async fn stop(&mut self) -> Result<()>;
}

/// Produce side of the broker capability.
#[async_trait]
pub trait BrokerProducer: Send + Sync {
    /// Prepare the connection for sending.
    async fn start(&self) -> Result<()>;

    /// Send one payload; resolves once the broker acknowledges delivery.
    async fn send(&self, topic: &str, payload: Vec<u8>) -> Result<()>;

    /// Flush outstanding deliveries and release the connection.
    async fn stop(&self) -> Result<()>;
}
