//! The consumer execution loop: fetch, decode, dispatch, acknowledge.
//!
//! One loop runs per consume registration, as an independently scheduled
//! task. Loops never share decode or dispatch state; each owns its broker
//! connection and commit cursor exclusively.

use std::sync::Arc;

use dispatch_types::MessageSchema;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::broker::{BrokerConsumer, BrokerProducer, FetchedMessage};
use crate::error::{Error, Result};
use crate::registry::ConsumeFn;

/// Consecutive broker failures tolerated before the loop gives up.
const MAX_CONSECUTIVE_FAILURES: u32 = 5;

/// Lifecycle of a consumer loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Created,
    Running,
    Draining,
    Stopped,
}

/// Forwards handler failures to a configured error topic.
#[derive(Clone)]
pub(crate) struct ErrorSink {
    pub topic: String,
    pub producer: Arc<dyn BrokerProducer>,
}

impl ErrorSink {
    async fn forward(&self, message: &FetchedMessage, reason: &str) {
        let record = serde_json::json!({
            "topic": message.topic,
            "partition": message.partition,
            "offset": message.offset,
            "error": reason,
        });
        if let Err(e) = self
            .producer
            .send(&self.topic, record.to_string().into_bytes())
            .await
        {
            warn!(topic = %self.topic, error = %e, "failed to forward handler error");
        }
    }
}

/// One concurrently scheduled execution unit per consume registration.
pub(crate) struct ConsumerLoop {
    pub topic: String,
    pub schema: MessageSchema,
    pub handler: ConsumeFn,
    pub max_poll_records: usize,
    pub max_buffer_size: usize,
    pub client: Box<dyn BrokerConsumer>,
    pub shutdown: CancellationToken,
    pub error_sink: Option<ErrorSink>,
    pub state: LoopState,
}

impl ConsumerLoop {
    fn transition(&mut self, next: LoopState) {
        debug!(topic = %self.topic, from = ?self.state, to = ?next, "consumer loop state");
        self.state = next;
    }

    /// Drive the loop until the shutdown token fires.
    ///
    /// The token is polled once per batch boundary: an in-flight batch is
    /// always processed and acknowledged before the loop drains and stops.
    /// Offsets are committed only after every message of a batch has been
    /// handled, so a crash mid-batch reprocesses the whole batch.
    pub(crate) async fn run(mut self) -> Result<()> {
        let topics = vec![self.topic.clone()];
        let mut consecutive_failures = 0u32;

        self.transition(LoopState::Running);

        while !self.shutdown.is_cancelled() {
            let batch = match self
                .client
                .fetch(&topics, self.max_poll_records, self.max_buffer_size)
                .await
            {
                Ok(batch) => {
                    consecutive_failures = 0;
                    batch
                }
                Err(e) => {
                    self.broker_failure("fetch", &e, &mut consecutive_failures)
                        .await?;
                    continue;
                }
            };

            if batch.is_empty() {
                continue;
            }

            for message in &batch {
                self.dispatch(message).await;
            }

            if let Err(e) = self.client.commit(&batch).await {
                self.broker_failure("commit", &e, &mut consecutive_failures)
                    .await?;
            }
        }

        self.transition(LoopState::Draining);
        if let Err(e) = self.client.stop().await {
            warn!(topic = %self.topic, error = %e, "failed to release consumer connection");
        }
        self.transition(LoopState::Stopped);
        Ok(())
    }

    /// Count a broker failure. A short run of failures is retried after a
    /// pause; a sustained run is a loop-level fault that stops this loop
    /// only, leaving other loops untouched.
    async fn broker_failure(
        &mut self,
        operation: &str,
        cause: &Error,
        consecutive_failures: &mut u32,
    ) -> Result<()> {
        *consecutive_failures += 1;
        if *consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
            error!(
                topic = %self.topic,
                error = %cause,
                failures = *consecutive_failures,
                "giving up after repeated {operation} failures"
            );
            if let Err(stop_err) = self.client.stop().await {
                warn!(topic = %self.topic, error = %stop_err, "failed to release consumer connection");
            }
            return Err(Error::LoopFault {
                topic: self.topic.clone(),
                reason: cause.to_string(),
            });
        }
        warn!(topic = %self.topic, error = %cause, "{operation} failed, retrying");
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        Ok(())
    }

    /// Decode and dispatch one message. Failures are routed, never fatal to
    /// the loop: a decode error skips the message, a handler error is
    /// logged and optionally forwarded to the error topic, and in both
    /// cases the rest of the batch still runs.
    async fn dispatch(&self, message: &FetchedMessage) {
        let value: Value = match serde_json::from_slice(&message.payload) {
            Ok(value) => value,
            Err(e) => {
                warn!(
                    topic = %message.topic,
                    partition = message.partition,
                    offset = message.offset,
                    error = %e,
                    "skipping undecodable message"
                );
                return;
            }
        };

        if let Err(e) = self.schema.validate(&value) {
            warn!(
                topic = %message.topic,
                partition = message.partition,
                offset = message.offset,
                error = %e,
                "message does not satisfy schema '{}', skipping",
                self.schema.name
            );
            return;
        }

        if let Err(e) = (self.handler)(value).await {
            error!(
                topic = %message.topic,
                partition = message.partition,
                offset = message.offset,
                error = %e,
                "handler failed"
            );
            if let Some(sink) = &self.error_sink {
                sink.forward(message, &e.to_string()).await;
            }
        }
    }
}
