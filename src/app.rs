//! Application orchestration: the registration surface, startup and
//! shutdown.
//!
//! Startup is deliberately sequential: the contract document is synthesized
//! and exported first (it needs the final registry), then consumer loops
//! are spawned, then producer runtimes are created and started. Shutdown
//! reverses the order: one cancellation is issued, consumer loops drain and
//! are joined, then producer runtimes drain in reverse creation order.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, OnceLock};

use dispatch_asyncapi::{build_document, export_spec, generate_docs, ExportOutcome, SpecPaths};
use dispatch_types::{BrokerDescriptor, KafkaMessage, ServiceInfo};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::broker::{Broker, BrokerProducer, ConsumerSettings};
use crate::config::DispatchConfig;
use crate::consumer::{ConsumerLoop, ErrorSink, LoopState};
use crate::error::{Error, Result};
use crate::kafka::KafkaConnector;
use crate::producer::{start_producer, Producer, ProducerSlot, ProducerWorker};
use crate::registry::{
    topic_for_handler, ConsumerOverrides, ConsumerRegistration, ProducerOverrides,
    ProducerRegistration, TopicRegistry, CONSUME_PREFIX, PRODUCE_PREFIX,
};

/// A combined consume/produce application over one broker.
///
/// # Example
///
/// ```rust,no_run
/// use kafka_dispatch::{
///     App, ConsumerOverrides, DispatchConfig, FieldSchema, FieldType, KafkaMessage,
///     MessageSchema, ProducerOverrides,
/// };
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Serialize, Deserialize)]
/// struct HelloMessage {
///     msg: String,
/// }
///
/// impl KafkaMessage for HelloMessage {
///     fn schema() -> MessageSchema {
///         MessageSchema::new("HelloMessage")
///             .field(FieldSchema::required("msg", FieldType::String).with_example("Hello"))
///     }
/// }
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let mut app = App::new(DispatchConfig::default());
///
///     app.consumes::<HelloMessage, _, _>(
///         "on_hello",
///         ConsumerOverrides::default(),
///         |msg: HelloMessage| async move {
///             println!("Got data, msg={}", msg.msg);
///             Ok(())
///         },
///     )?;
///     let hello = app.produces::<HelloMessage>("to_hello", ProducerOverrides::default())?;
///
///     app.start().await?;
///     hello.produce(HelloMessage { msg: "hi".to_string() }).await?;
///     app.shutdown().await?;
///     Ok(())
/// }
/// ```
pub struct App {
    config: DispatchConfig,
    service_info: ServiceInfo,
    brokers: BTreeMap<String, BrokerDescriptor>,
    broker: Arc<dyn Broker>,
    registry: TopicRegistry,
    /// One slot per produce topic; replaced wholesale when a topic is
    /// re-registered, so exactly one runtime per topic is started.
    producer_slots: BTreeMap<String, Arc<ProducerSlot>>,
    consumer_tasks: Vec<(String, JoinHandle<Result<()>>)>,
    producer_workers: Vec<ProducerWorker>,
    error_producer: Option<Arc<dyn BrokerProducer>>,
    shutdown: CancellationToken,
    started: bool,
}

impl App {
    /// Create an application wired to a Kafka cluster per `config`.
    pub fn new(config: DispatchConfig) -> Self {
        let connector = KafkaConnector::new(config.clone());
        Self::with_broker(config, Arc::new(connector))
    }

    /// Create an application over any broker implementation.
    ///
    /// Tests and demos pass a [`crate::testing::MemoryBroker`] here.
    pub fn with_broker(config: DispatchConfig, broker: Arc<dyn Broker>) -> Self {
        let mut brokers = BTreeMap::new();
        brokers.insert("localhost".to_string(), BrokerDescriptor::local());
        Self {
            config,
            service_info: ServiceInfo::default(),
            brokers,
            broker,
            registry: TopicRegistry::new(),
            producer_slots: BTreeMap::new(),
            consumer_tasks: Vec::new(),
            producer_workers: Vec::new(),
            error_producer: None,
            shutdown: CancellationToken::new(),
            started: false,
        }
    }

    /// Replace the service metadata rendered into the contract.
    pub fn with_service_info(mut self, service_info: ServiceInfo) -> Self {
        self.service_info = service_info;
        self
    }

    /// Replace the advertised broker map.
    pub fn with_brokers(mut self, brokers: BTreeMap<String, BrokerDescriptor>) -> Self {
        self.brokers = brokers;
        self
    }

    pub fn registry(&self) -> &TopicRegistry {
        &self.registry
    }

    fn ensure_not_started(&self) -> Result<()> {
        if self.started {
            return Err(Error::AlreadyStarted);
        }
        Ok(())
    }

    /// Register a consume handler; the topic name is derived from
    /// `handler_name` by stripping the `on_` prefix.
    pub fn consumes<T, F, Fut>(
        &mut self,
        handler_name: &str,
        overrides: ConsumerOverrides,
        handler: F,
    ) -> Result<()>
    where
        T: KafkaMessage,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let topic = topic_for_handler(handler_name, CONSUME_PREFIX)?;
        self.consumes_topic(&topic, overrides, handler)
    }

    /// Register a consume handler on an explicit topic.
    ///
    /// At most one consume registration exists per topic; registering again
    /// replaces the earlier handler (last registration wins).
    pub fn consumes_topic<T, F, Fut>(
        &mut self,
        topic: &str,
        overrides: ConsumerOverrides,
        handler: F,
    ) -> Result<()>
    where
        T: KafkaMessage,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.ensure_not_started()?;

        let handler = Arc::new(handler);
        let erased: crate::registry::ConsumeFn = Arc::new(move |value| {
            let handler = Arc::clone(&handler);
            Box::pin(async move {
                // The payload was already validated against the schema.
                let message: T = serde_json::from_value(value)?;
                handler(message).await
            })
        });

        self.registry.register_consumer(ConsumerRegistration {
            topic: topic.to_string(),
            schema: T::schema(),
            handler: erased,
            overrides,
            description: None,
        })
    }

    /// Register a produce topic; the topic name is derived from
    /// `handler_name` by stripping the `to_` prefix. Returns the typed
    /// handle used to send values.
    pub fn produces<T: KafkaMessage>(
        &mut self,
        handler_name: &str,
        overrides: ProducerOverrides,
    ) -> Result<Producer<T>> {
        let topic = topic_for_handler(handler_name, PRODUCE_PREFIX)?;
        self.produces_topic(&topic, overrides)
    }

    /// Register a produce topic explicitly.
    ///
    /// Re-registering a topic replaces the earlier entry; handles bound to
    /// the replaced registration are never started.
    pub fn produces_topic<T: KafkaMessage>(
        &mut self,
        topic: &str,
        overrides: ProducerOverrides,
    ) -> Result<Producer<T>> {
        self.ensure_not_started()?;

        self.registry.register_producer(ProducerRegistration {
            topic: topic.to_string(),
            schema: T::schema(),
            overrides,
            description: None,
        })?;

        let slot = Arc::new(ProducerSlot {
            topic: topic.to_string(),
            core: OnceLock::new(),
        });
        self.producer_slots.insert(topic.to_string(), Arc::clone(&slot));
        Ok(Producer::new(slot))
    }

    /// Start the application: export the contract, spawn consumer loops,
    /// start producer runtimes. Registration is rejected from here on.
    pub async fn start(&mut self) -> Result<()> {
        self.ensure_not_started()?;
        self.started = true;

        self.export_contract().await?;
        self.spawn_consumers().await?;
        self.start_producers().await?;

        info!(
            consumers = self.consumer_tasks.len(),
            producers = self.producer_workers.len(),
            "application started"
        );
        Ok(())
    }

    /// Synthesize and export the contract document. A render or persist
    /// failure is fatal; a docs-generation failure is reported and the
    /// startup continues.
    async fn export_contract(&self) -> Result<()> {
        let channels = self.registry.channel_specs();
        let document = build_document(&self.service_info, &self.brokers, &channels)?;
        let paths = SpecPaths::under(&self.config.root_path);
        let outcome = export_spec(&document, &paths.spec_path, self.config.force_spec_rebuild)?;

        if self.config.skip_docs_generation {
            return Ok(());
        }

        if outcome == ExportOutcome::Changed || !paths.docs_path.exists() {
            if let Err(e) = generate_docs(&paths.spec_path, &paths.docs_path).await {
                error!(error = %e, "docs generation failed");
            }
        } else {
            info!(docs = %paths.docs_path.display(), "specification unchanged, skipping docs generation");
        }
        Ok(())
    }

    async fn spawn_consumers(&mut self) -> Result<()> {
        // Handler failures are forwarded through one shared producer
        // connection when an error topic is configured.
        let error_sink = match &self.config.error_topic {
            Some(topic) => {
                let client = self.broker.producer().await?;
                client.start().await?;
                let producer: Arc<dyn BrokerProducer> = Arc::from(client);
                self.error_producer = Some(Arc::clone(&producer));
                Some(ErrorSink {
                    topic: topic.clone(),
                    producer,
                })
            }
            None => None,
        };

        let registrations: Vec<_> = self.registry.consumers().cloned().collect();
        for registration in registrations {
            let overrides = &registration.overrides;
            let settings = ConsumerSettings {
                group_id: overrides
                    .group_id
                    .clone()
                    .unwrap_or_else(|| self.config.group_id.clone()),
                auto_offset_reset: overrides
                    .auto_offset_reset
                    .clone()
                    .unwrap_or_else(|| self.config.auto_offset_reset.clone()),
                session_timeout_ms: self.config.session_timeout_ms.clone(),
            };
            let client = self.broker.consumer(settings).await?;

            let consumer_loop = ConsumerLoop {
                topic: registration.topic.clone(),
                schema: registration.schema.clone(),
                handler: Arc::clone(&registration.handler),
                max_poll_records: overrides
                    .max_poll_records
                    .unwrap_or(self.config.max_poll_records),
                max_buffer_size: overrides
                    .max_buffer_size
                    .unwrap_or(self.config.max_buffer_size),
                client,
                shutdown: self.shutdown.clone(),
                error_sink: error_sink.clone(),
                state: LoopState::Created,
            };
            self.consumer_tasks
                .push((registration.topic, tokio::spawn(consumer_loop.run())));
        }
        Ok(())
    }

    async fn start_producers(&mut self) -> Result<()> {
        let slots: Vec<Arc<ProducerSlot>> = self.producer_slots.values().cloned().collect();
        for slot in slots {
            let capacity = self
                .registry
                .producer(&slot.topic)
                .and_then(|r| r.overrides.queue_capacity)
                .unwrap_or(self.config.producer_queue_capacity);
            let client = self.broker.producer().await?;
            let worker = start_producer(Arc::clone(&slot), client, capacity).await?;
            self.producer_workers.push(worker);
        }
        Ok(())
    }

    /// Shut the application down.
    ///
    /// The shared cancellation token is set once; every consumer loop
    /// finishes its in-flight batch and is joined (loop-level faults are
    /// reported here), then producer runtimes drain their queues in reverse
    /// creation order.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.shutdown.cancel();

        for (topic, task) in self.consumer_tasks.drain(..) {
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!(topic = %topic, error = %e, "consumer loop ended with a fault"),
                Err(e) => error!(topic = %topic, error = %e, "consumer task panicked"),
            }
        }

        if let Some(producer) = self.error_producer.take() {
            if let Err(e) = producer.stop().await {
                error!(error = %e, "failed to release error-topic producer");
            }
        }

        for worker in self.producer_workers.drain(..).rev() {
            worker.shutdown().await;
        }

        info!("application stopped");
        Ok(())
    }
}
