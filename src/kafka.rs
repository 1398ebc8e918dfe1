//! rdkafka-backed implementation of the broker capability.
//!
//! Consumer connections wrap a `StreamConsumer` with a bounded buffer
//! filled under short receive timeouts and manual offset commits; producer
//! connections wrap a `FutureProducer` whose sends resolve on delivery.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer as RdConsumer, StreamConsumer};
use rdkafka::message::{BorrowedMessage, Message as RdMessage};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer as RdProducer};
use rdkafka::{Offset, TopicPartitionList};

use crate::broker::{Broker, BrokerConsumer, BrokerProducer, ConsumerSettings, FetchedMessage};
use crate::config::DispatchConfig;
use crate::error::{Error, Result};

/// How long one fetch waits for the first message to arrive.
const POLL_TIMEOUT: Duration = Duration::from_millis(100);
/// How long a fetch keeps topping up an already non-empty batch.
const TOP_UP_TIMEOUT: Duration = Duration::from_millis(10);

/// Connection factory for a real Kafka cluster.
pub struct KafkaConnector {
    config: DispatchConfig,
}

impl KafkaConnector {
    pub fn new(config: DispatchConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Broker for KafkaConnector {
    async fn consumer(&self, settings: ConsumerSettings) -> Result<Box<dyn BrokerConsumer>> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &self.config.bootstrap_servers)
            .set("group.id", &settings.group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", &settings.auto_offset_reset)
            .set("session.timeout.ms", &settings.session_timeout_ms)
            .set("enable.partition.eof", "false")
            .create()?;

        Ok(Box::new(KafkaBatchConsumer {
            consumer,
            buffer: VecDeque::new(),
            subscribed: false,
        }))
    }

    async fn producer(&self) -> Result<Box<dyn BrokerProducer>> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &self.config.bootstrap_servers)
            .set("message.timeout.ms", "5000")
            .create()?;

        Ok(Box::new(KafkaDeliveryProducer { producer }))
    }
}

/// Kafka consumer with a bounded buffer and manual offset commits.
struct KafkaBatchConsumer {
    consumer: StreamConsumer,
    buffer: VecDeque<FetchedMessage>,
    subscribed: bool,
}

impl KafkaBatchConsumer {
    fn to_fetched(msg: &BorrowedMessage<'_>) -> FetchedMessage {
        FetchedMessage {
            topic: msg.topic().to_string(),
            partition: msg.partition(),
            offset: msg.offset(),
            key: msg.key().map(|k| k.to_vec()),
            payload: msg.payload().map(|p| p.to_vec()).unwrap_or_default(),
            timestamp: msg.timestamp().to_millis(),
        }
    }
}

#[async_trait]
impl BrokerConsumer for KafkaBatchConsumer {
    async fn fetch(
        &mut self,
        topics: &[String],
        max_records: usize,
        max_buffer: usize,
    ) -> Result<Vec<FetchedMessage>> {
        if !self.subscribed {
            let names: Vec<&str> = topics.iter().map(String::as_str).collect();
            self.consumer.subscribe(&names)?;
            self.subscribed = true;
        }

        // Fill the buffer up to the fetch bound; the timeout shrinks once at
        // least one message is in hand so a quiet topic does not stall the
        // batch.
        let limit = max_records.min(max_buffer);
        while self.buffer.len() < limit {
            let timeout = if self.buffer.is_empty() {
                POLL_TIMEOUT
            } else {
                TOP_UP_TIMEOUT
            };
            match tokio::time::timeout(timeout, self.consumer.recv()).await {
                Ok(Ok(msg)) => self.buffer.push_back(Self::to_fetched(&msg)),
                Ok(Err(e)) => return Err(Error::Kafka(e)),
                Err(_) => break,
            }
        }

        let count = self.buffer.len().min(max_records);
        Ok(self.buffer.drain(..count).collect())
    }

    async fn commit(&mut self, batch: &[FetchedMessage]) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut tpl = TopicPartitionList::new();
        for message in batch {
            tpl.add_partition_offset(
                &message.topic,
                message.partition,
                Offset::Offset(message.offset + 1),
            )?;
        }
        self.consumer.commit(&tpl, CommitMode::Sync)?;
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        self.consumer.unsubscribe();
        Ok(())
    }
}

/// Kafka producer; sends resolve on delivery acknowledgment.
struct KafkaDeliveryProducer {
    producer: FutureProducer,
}

#[async_trait]
impl BrokerProducer for KafkaDeliveryProducer {
    async fn start(&self) -> Result<()> {
        // librdkafka establishes connections lazily on first send.
        Ok(())
    }

    async fn send(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        let record = FutureRecord::<(), _>::to(topic).payload(&payload);
        self.producer
            .send(record, Duration::from_secs(5))
            .await
            .map_err(|(err, _)| Error::Kafka(err))?;
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.producer.flush(Duration::from_secs(5))?;
        Ok(())
    }
}
