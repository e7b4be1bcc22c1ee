//! Redpanda order feed for Orderhub.
//!
//! [`RedpandaOrderFeed`] is the durable subscriber: a Kafka-compatible
//! consumer that delivers each raw order payload to a
//! [`MessageHandler`] and acknowledges it only when the handler says so.
//! Everything broker-specific lives here; the pipeline sees nothing but
//! bytes and returns nothing but a [`Disposition`].
//!
//! # Delivery Semantics
//!
//! **At-least-once delivery** with manual offset commits:
//!
//! - `enable.auto.commit` is off; an offset is committed only after the
//!   handler returns [`Disposition::Processed`].
//! - [`Disposition::Retry`] leaves the offset uncommitted, so the message
//!   redelivers after a restart or rebalance. The handler must therefore be
//!   idempotent; the pipeline's duplicate-as-success policy is exactly that.
//! - The consumer group is the durable identity: it survives restarts and
//!   resumes from the last committed offset.
//! - A transport frame with no payload is committed and logged; redelivering
//!   it cannot make it decodable.
//!
//! # Example
//!
//! ```no_run
//! use orderhub_core::feed::{Disposition, MessageHandler};
//! use orderhub_redpanda::RedpandaOrderFeed;
//! use std::future::Future;
//! use std::pin::Pin;
//! use std::sync::Arc;
//!
//! struct DropEverything;
//!
//! impl MessageHandler for DropEverything {
//!     fn handle(
//!         &self,
//!         _payload: &[u8],
//!     ) -> Pin<Box<dyn Future<Output = Disposition> + Send + '_>> {
//!         Box::pin(async { Disposition::Processed })
//!     }
//! }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let feed = RedpandaOrderFeed::builder()
//!     .brokers("localhost:9092")
//!     .consumer_group("orderhub-ingest")
//!     .build()?;
//!
//! feed.subscribe()?;
//! feed.run(Arc::new(DropEverything)).await;
//! # Ok(())
//! # }
//! ```

use orderhub_core::feed::{Disposition, FeedError, MessageHandler};
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::{BorrowedMessage, Message};
use std::sync::Arc;

const DEFAULT_TOPIC: &str = "orders";
const DEFAULT_CONSUMER_GROUP: &str = "orderhub-ingest";

/// Durable consumer of the order topic.
///
/// Create via [`builder`](Self::builder), establish the subscription with
/// [`subscribe`](Self::subscribe) (a fatal startup condition if it fails),
/// then drive deliveries with [`run`](Self::run).
pub struct RedpandaOrderFeed {
    consumer: StreamConsumer,
    topic: String,
}

impl std::fmt::Debug for RedpandaOrderFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedpandaOrderFeed")
            .field("topic", &self.topic)
            .finish_non_exhaustive()
    }
}

impl RedpandaOrderFeed {
    /// Create a new builder for configuring the feed.
    #[must_use]
    pub fn builder() -> RedpandaOrderFeedBuilder {
        RedpandaOrderFeedBuilder::default()
    }

    /// The topic this feed consumes.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Establish the durable subscription.
    ///
    /// Called once at startup, before [`run`](Self::run). The consumer group
    /// registration survives restarts; uncommitted messages redeliver.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::SubscriptionFailed`] if the subscription cannot
    /// be established; callers treat this as fatal.
    pub fn subscribe(&self) -> Result<(), FeedError> {
        self.consumer
            .subscribe(&[&self.topic])
            .map_err(|e| FeedError::SubscriptionFailed {
                topic: self.topic.clone(),
                reason: e.to_string(),
            })?;

        tracing::info!(topic = %self.topic, "Durable subscription established");
        Ok(())
    }

    /// Deliver messages to the handler until the stream ends.
    ///
    /// One handler invocation per delivery attempt. The handler's
    /// [`Disposition`] drives acknowledgement: `Processed` commits the
    /// offset, `Retry` leaves it uncommitted for transport-driven
    /// redelivery. Transport errors are logged and the loop keeps running;
    /// per-message trouble never stops consumption.
    pub async fn run(&self, handler: Arc<dyn MessageHandler>) {
        use futures::StreamExt;

        let mut stream = self.consumer.stream();

        while let Some(delivery) = stream.next().await {
            match delivery {
                Ok(message) => {
                    let Some(payload) = message.payload() else {
                        tracing::warn!(
                            topic = message.topic(),
                            partition = message.partition(),
                            offset = message.offset(),
                            "Delivery has no payload; acknowledging without processing"
                        );
                        self.commit(&message);
                        continue;
                    };

                    match handler.handle(payload).await {
                        Disposition::Processed => self.commit(&message),
                        Disposition::Retry => {
                            tracing::warn!(
                                topic = message.topic(),
                                partition = message.partition(),
                                offset = message.offset(),
                                "Handler requested retry; offset left uncommitted"
                            );
                        },
                    }
                },
                Err(e) => {
                    tracing::error!(error = %e, "Transport error while consuming; continuing");
                },
            }
        }

        tracing::debug!(topic = %self.topic, "Feed stream ended");
    }

    fn commit(&self, message: &BorrowedMessage<'_>) {
        if let Err(e) = self.consumer.commit_message(message, CommitMode::Async) {
            tracing::warn!(
                topic = message.topic(),
                partition = message.partition(),
                offset = message.offset(),
                error = %e,
                "Failed to commit offset (message may be redelivered)"
            );
        }
    }
}

/// Builder for configuring a [`RedpandaOrderFeed`].
///
/// # Example
///
/// ```no_run
/// use orderhub_redpanda::RedpandaOrderFeed;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let feed = RedpandaOrderFeed::builder()
///     .brokers("localhost:9092,localhost:9093")
///     .topic("orders")
///     .consumer_group("orderhub-ingest")
///     .auto_offset_reset("earliest")
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct RedpandaOrderFeedBuilder {
    brokers: Option<String>,
    topic: Option<String>,
    consumer_group: Option<String>,
    auto_offset_reset: Option<String>,
    session_timeout_ms: Option<u32>,
}

impl RedpandaOrderFeedBuilder {
    /// Set the broker addresses (comma-separated, e.g. "localhost:9092").
    #[must_use]
    pub fn brokers(mut self, brokers: impl Into<String>) -> Self {
        self.brokers = Some(brokers.into());
        self
    }

    /// Set the topic to consume. Default: `orders`.
    #[must_use]
    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Set the consumer group, the durable identity of this subscriber.
    ///
    /// Default: `orderhub-ingest`. Multiple instances sharing a group split
    /// the partitions between them.
    #[must_use]
    pub fn consumer_group(mut self, consumer_group: impl Into<String>) -> Self {
        self.consumer_group = Some(consumer_group.into());
        self
    }

    /// Set where a new consumer group starts reading: `"earliest"` or
    /// `"latest"`.
    ///
    /// Default: `"earliest"`, so a fresh deployment ingests the topic's
    /// backlog instead of silently skipping it.
    #[must_use]
    pub fn auto_offset_reset(mut self, policy: impl Into<String>) -> Self {
        self.auto_offset_reset = Some(policy.into());
        self
    }

    /// Set the consumer session timeout in milliseconds. Default: 6000.
    #[must_use]
    pub const fn session_timeout_ms(mut self, session_timeout_ms: u32) -> Self {
        self.session_timeout_ms = Some(session_timeout_ms);
        self
    }

    /// Build the [`RedpandaOrderFeed`].
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::ConnectionFailed`] if brokers are not set or the
    /// consumer cannot be created.
    pub fn build(self) -> Result<RedpandaOrderFeed, FeedError> {
        let brokers = self
            .brokers
            .ok_or_else(|| FeedError::ConnectionFailed("Brokers not configured".to_string()))?;
        let topic = self.topic.unwrap_or_else(|| DEFAULT_TOPIC.to_string());
        let consumer_group = self
            .consumer_group
            .unwrap_or_else(|| DEFAULT_CONSUMER_GROUP.to_string());
        let auto_offset_reset = self
            .auto_offset_reset
            .unwrap_or_else(|| "earliest".to_string());
        let session_timeout_ms = self.session_timeout_ms.unwrap_or(6000);

        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &brokers)
            .set("group.id", &consumer_group)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", &auto_offset_reset)
            .set("session.timeout.ms", session_timeout_ms.to_string())
            .set("enable.partition.eof", "false")
            .create()
            .map_err(|e| {
                FeedError::ConnectionFailed(format!("Failed to create consumer: {e}"))
            })?;

        tracing::info!(
            brokers = %brokers,
            topic = %topic,
            consumer_group = %consumer_group,
            auto_offset_reset = %auto_offset_reset,
            manual_commit = true,
            "RedpandaOrderFeed created"
        );

        Ok(RedpandaOrderFeed { consumer, topic })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)] // Test code unwraps for clear failures

    use super::*;

    #[test]
    fn feed_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<RedpandaOrderFeed>();
        assert_sync::<RedpandaOrderFeed>();
    }

    #[test]
    fn build_without_brokers_fails() {
        let err = RedpandaOrderFeed::builder().build().unwrap_err();
        assert!(matches!(err, FeedError::ConnectionFailed(_)));
    }

    #[tokio::test]
    async fn build_applies_topic_default() {
        // Creating a consumer does not contact the brokers, so this is safe
        // without a running cluster.
        let feed = RedpandaOrderFeed::builder()
            .brokers("localhost:9092")
            .build()
            .unwrap();
        assert_eq!(feed.topic(), "orders");
    }
}
