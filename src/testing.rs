//! In-memory broker implementation for tests and demos.
//!
//! [`MemoryBroker`] keeps every topic as an in-process message log with
//! per-group committed offsets, so the full register/start/dispatch/commit
//! cycle can be exercised without a Kafka cluster. Consumer connections
//! each track their own uncommitted read position, mirroring the exclusive
//! cursor ownership of real connections.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::broker::{Broker, BrokerConsumer, BrokerProducer, ConsumerSettings, FetchedMessage};
use crate::error::Result;

#[derive(Default)]
struct BrokerState {
    /// Topic name to append-only payload log.
    topics: HashMap<String, Vec<Vec<u8>>>,
    /// (group, topic) to next uncommitted offset.
    committed: HashMap<(String, String), i64>,
}

/// In-memory [`Broker`].
///
/// Cloning shares the underlying state, so a test can hold one handle for
/// seeding and assertions while the application under test holds another.
#[derive(Clone, Default)]
pub struct MemoryBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a raw payload onto a topic.
    pub async fn publish(&self, topic: &str, payload: Vec<u8>) {
        let mut state = self.state.lock().await;
        state.topics.entry(topic.to_string()).or_default().push(payload);
    }

    /// Every payload published to a topic, in publish order.
    pub async fn published(&self, topic: &str) -> Vec<Vec<u8>> {
        let state = self.state.lock().await;
        state.topics.get(topic).cloned().unwrap_or_default()
    }

    /// Committed offset for a consumer group on a topic, if any.
    pub async fn committed_offset(&self, group_id: &str, topic: &str) -> Option<i64> {
        let state = self.state.lock().await;
        state
            .committed
            .get(&(group_id.to_string(), topic.to_string()))
            .copied()
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn consumer(&self, settings: ConsumerSettings) -> Result<Box<dyn BrokerConsumer>> {
        Ok(Box::new(MemoryConsumer {
            state: Arc::clone(&self.state),
            group_id: settings.group_id,
            positions: HashMap::new(),
        }))
    }

    async fn producer(&self) -> Result<Box<dyn BrokerProducer>> {
        Ok(Box::new(MemoryProducer {
            state: Arc::clone(&self.state),
        }))
    }
}

/// Consumer connection with its own uncommitted read position per topic.
struct MemoryConsumer {
    state: Arc<Mutex<BrokerState>>,
    group_id: String,
    positions: HashMap<String, i64>,
}

#[async_trait]
impl BrokerConsumer for MemoryConsumer {
    async fn fetch(
        &mut self,
        topics: &[String],
        max_records: usize,
        max_buffer: usize,
    ) -> Result<Vec<FetchedMessage>> {
        let limit = max_records.min(max_buffer);
        let state = self.state.lock().await;
        let mut batch = Vec::new();

        for topic in topics {
            let Some(log) = state.topics.get(topic) else {
                continue;
            };
            let committed = state
                .committed
                .get(&(self.group_id.clone(), topic.clone()))
                .copied()
                .unwrap_or(0);
            let position = self.positions.entry(topic.clone()).or_insert(committed);
            while (*position as usize) < log.len() && batch.len() < limit {
                batch.push(FetchedMessage {
                    topic: topic.clone(),
                    partition: 0,
                    offset: *position,
                    key: None,
                    payload: log[*position as usize].clone(),
                    timestamp: None,
                });
                *position += 1;
            }
        }
        drop(state);

        if batch.is_empty() {
            // Mimic the poll interval of a real connection so idle loops
            // yield instead of spinning.
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        Ok(batch)
    }

    async fn commit(&mut self, batch: &[FetchedMessage]) -> Result<()> {
        let mut state = self.state.lock().await;
        for message in batch {
            let key = (self.group_id.clone(), message.topic.clone());
            let next = message.offset + 1;
            let entry = state.committed.entry(key).or_insert(0);
            if *entry < next {
                *entry = next;
            }
        }
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        Ok(())
    }
}

struct MemoryProducer {
    state: Arc<Mutex<BrokerState>>,
}

#[async_trait]
impl BrokerProducer for MemoryProducer {
    async fn start(&self) -> Result<()> {
        Ok(())
    }

    async fn send(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        let mut state = self.state.lock().await;
        state.topics.entry(topic.to_string()).or_default().push(payload);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        Ok(())
    }
}
