//! The producer runtime: a typed send surface over the broker's
//! asynchronous delivery path.
//!
//! Every produce registration is backed by one runtime instance owning its
//! broker connection, and exposes a uniform contract through the
//! [`Producer`] handle: serialize the value against the topic's schema and
//! forward it to the broker. Callers that can suspend await the delivery
//! directly; synchronous callers go through a bounded in-process queue
//! drained by a background task in submission order.

use std::marker::PhantomData;
use std::sync::{Arc, OnceLock};

use dispatch_types::KafkaMessage;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::broker::BrokerProducer;
use crate::error::{Error, Result};

/// Shared state behind a [`Producer`] handle, populated at startup.
pub(crate) struct ProducerSlot {
    pub topic: String,
    pub core: OnceLock<ProducerCore>,
}

pub(crate) struct ProducerCore {
    pub client: Arc<dyn BrokerProducer>,
    pub queue: mpsc::Sender<Vec<u8>>,
}

/// Typed handle bound to one produce topic.
///
/// Handles are cheap to clone and inert until the application starts; a
/// send before startup is a startup-ordering error, not a panic.
pub struct Producer<T: KafkaMessage> {
    slot: Arc<ProducerSlot>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: KafkaMessage> Clone for Producer<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
            _marker: PhantomData,
        }
    }
}

impl<T: KafkaMessage> std::fmt::Debug for Producer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Producer")
            .field("topic", &self.slot.topic)
            .finish()
    }
}

impl<T: KafkaMessage> Producer<T> {
    pub(crate) fn new(slot: Arc<ProducerSlot>) -> Self {
        Self {
            slot,
            _marker: PhantomData,
        }
    }

    /// Topic this handle sends to.
    pub fn topic(&self) -> &str {
        &self.slot.topic
    }

    fn core(&self) -> Result<&ProducerCore> {
        self.slot
            .core
            .get()
            .ok_or_else(|| Error::ProducerNotStarted(self.slot.topic.clone()))
    }

    /// Serialize `value`, await the broker send, and hand the value back.
    ///
    /// Returns only after the broker acknowledges delivery, so sends from
    /// one caller reach the broker in call order.
    pub async fn produce(&self, value: T) -> Result<T> {
        let payload = value.to_payload()?;
        let core = self.core()?;
        core.client.send(&self.slot.topic, payload).await?;
        Ok(value)
    }

    /// Serialize `value` and enqueue it for the background sender.
    ///
    /// For callers that cannot suspend. Payloads are forwarded to the
    /// broker in submission order by a dedicated task. A full queue blocks
    /// the calling thread until space frees; messages are never silently
    /// dropped. Must be called from outside the async runtime (a dedicated
    /// thread or a blocking section).
    pub fn produce_queued(&self, value: T) -> Result<T> {
        let payload = value.to_payload()?;
        let core = self.core()?;
        core.queue
            .blocking_send(payload)
            .map_err(|_| Error::ProducerClosed(self.slot.topic.clone()))?;
        Ok(value)
    }
}

/// Background sender for one produce topic; the unit joined at shutdown.
pub(crate) struct ProducerWorker {
    pub slot: Arc<ProducerSlot>,
    pub shutdown: CancellationToken,
    pub task: JoinHandle<()>,
}

impl ProducerWorker {
    /// Stop accepting sends, drain the queue to completion, then release
    /// the broker connection.
    pub(crate) async fn shutdown(self) {
        self.shutdown.cancel();
        if let Err(e) = self.task.await {
            error!(topic = %self.slot.topic, error = %e, "producer drain task panicked");
        }
        if let Some(core) = self.slot.core.get() {
            if let Err(e) = core.client.stop().await {
                warn!(topic = %self.slot.topic, error = %e, "failed to release producer connection");
            }
        }
    }
}

/// Bind a slot to a live broker connection and spawn its drain task.
pub(crate) async fn start_producer(
    slot: Arc<ProducerSlot>,
    client: Box<dyn BrokerProducer>,
    queue_capacity: usize,
) -> Result<ProducerWorker> {
    client.start().await?;
    let client: Arc<dyn BrokerProducer> = Arc::from(client);
    let (queue, rx) = mpsc::channel(queue_capacity);
    let shutdown = CancellationToken::new();
    let task = tokio::spawn(drain_queue(
        slot.topic.clone(),
        Arc::clone(&client),
        rx,
        shutdown.clone(),
    ));
    slot.core
        .set(ProducerCore { client, queue })
        .map_err(|_| Error::AlreadyStarted)?;
    Ok(ProducerWorker {
        slot,
        shutdown,
        task,
    })
}

/// Forward queued payloads to the broker in submission order. On shutdown
/// the queue is closed first (new sends are rejected), then everything
/// already queued is sent before the task exits.
async fn drain_queue(
    topic: String,
    client: Arc<dyn BrokerProducer>,
    mut rx: mpsc::Receiver<Vec<u8>>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            maybe = rx.recv() => match maybe {
                Some(payload) => send_one(&topic, client.as_ref(), payload).await,
                None => break,
            },
            _ = shutdown.cancelled() => {
                rx.close();
                while let Some(payload) = rx.recv().await {
                    send_one(&topic, client.as_ref(), payload).await;
                }
                break;
            }
        }
    }
    debug!(topic = %topic, "producer queue drained");
}

async fn send_one(topic: &str, client: &dyn BrokerProducer, payload: Vec<u8>) {
    if let Err(e) = client.send(topic, payload).await {
        error!(topic = %topic, error = %e, "failed to send queued message");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::Broker;
    use crate::testing::MemoryBroker;
    use dispatch_types::{FieldSchema, FieldType, MessageSchema};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Tick {
        n: i64,
    }

    impl KafkaMessage for Tick {
        fn schema() -> MessageSchema {
            MessageSchema::new("Tick").field(FieldSchema::required("n", FieldType::Integer))
        }
    }

    fn slot(topic: &str) -> Arc<ProducerSlot> {
        Arc::new(ProducerSlot {
            topic: topic.to_string(),
            core: OnceLock::new(),
        })
    }

    #[tokio::test]
    async fn produce_awaits_delivery_and_returns_the_value() {
        let broker = MemoryBroker::new();
        let slot = slot("ticks");
        let worker = start_producer(Arc::clone(&slot), broker.producer().await.unwrap(), 8)
            .await
            .unwrap();

        let producer = Producer::<Tick>::new(slot);
        let returned = producer.produce(Tick { n: 7 }).await.unwrap();
        assert_eq!(returned, Tick { n: 7 });

        let published = broker.published("ticks").await;
        assert_eq!(published.len(), 1);
        assert_eq!(published[0], b"{\"n\":7}");

        worker.shutdown().await;
    }

    #[tokio::test]
    async fn produce_before_startup_is_an_error() {
        let producer = Producer::<Tick>::new(slot("ticks"));
        assert!(matches!(
            producer.produce(Tick { n: 1 }).await.unwrap_err(),
            Error::ProducerNotStarted(topic) if topic == "ticks"
        ));
    }

    #[tokio::test]
    async fn queued_sends_preserve_submission_order_under_backpressure() {
        let broker = MemoryBroker::new();
        let slot = slot("ticks");
        // A tiny queue so that callers block on a full queue mid-run.
        let worker = start_producer(Arc::clone(&slot), broker.producer().await.unwrap(), 2)
            .await
            .unwrap();

        let producer = Producer::<Tick>::new(Arc::clone(&slot));
        let caller = tokio::task::spawn_blocking(move || {
            for n in 0..50 {
                producer.produce_queued(Tick { n }).unwrap();
            }
        });
        caller.await.unwrap();

        // Draining on shutdown flushes everything still queued.
        worker.shutdown().await;

        let published = broker.published("ticks").await;
        assert_eq!(published.len(), 50);
        for (i, payload) in published.iter().enumerate() {
            let tick: Tick = serde_json::from_slice(payload).unwrap();
            assert_eq!(tick.n, i as i64);
        }
    }

    #[tokio::test]
    async fn queued_send_after_shutdown_is_rejected() {
        let broker = MemoryBroker::new();
        let slot = slot("ticks");
        let worker = start_producer(Arc::clone(&slot), broker.producer().await.unwrap(), 2)
            .await
            .unwrap();
        let producer = Producer::<Tick>::new(Arc::clone(&slot));

        worker.shutdown().await;

        let result = tokio::task::spawn_blocking(move || producer.produce_queued(Tick { n: 1 }))
            .await
            .unwrap();
        assert!(matches!(
            result.unwrap_err(),
            Error::ProducerClosed(topic) if topic == "ticks"
        ));
    }
}
