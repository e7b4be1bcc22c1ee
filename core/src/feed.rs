//! Delivery contract between the durable subscriber and the pipeline.
//!
//! The transport (a Kafka-compatible log in production) delivers raw
//! payloads one at a time with at-least-once semantics: a message is
//! redelivered until the consumer acknowledges it. The core consumes only
//! this callback contract; everything broker-specific lives in
//! `orderhub-redpanda`.
//!
//! The handler's [`Disposition`] drives acknowledgement:
//!
//! - [`Disposition::Processed`]: the message reached a terminal state
//!   (committed, or rejected as invalid); the subscriber commits the offset.
//! - [`Disposition::Retry`]: a transient failure (store down, deadline
//!   expired); the offset stays uncommitted and the transport redelivers
//!   the message later.
//!
//! Rejected-as-invalid maps to `Processed`, not `Retry`: an invalid document
//! cannot become valid by being delivered again.

use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// What the subscriber should do with a delivery after the handler returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Terminal outcome; acknowledge the message to the transport.
    Processed,
    /// Transient failure; leave the message unacknowledged for redelivery.
    Retry,
}

/// Errors raised while establishing or running a subscription.
///
/// These are startup/transport-level failures, not per-message outcomes;
/// per-message handling is entirely inside [`MessageHandler::handle`].
#[derive(Error, Debug)]
pub enum FeedError {
    /// Could not connect to the transport.
    #[error("Feed connection failed: {0}")]
    ConnectionFailed(String),

    /// Could not establish the durable subscription.
    #[error("Subscription failed for topic '{topic}': {reason}")]
    SubscriptionFailed {
        /// The topic that failed.
        topic: String,
        /// The reason for failure.
        reason: String,
    },

    /// The transport failed while the subscription was running.
    #[error("Feed transport error: {0}")]
    Transport(String),
}

/// Per-delivery callback implemented by the ingestion pipeline.
///
/// Invoked exactly once per delivery attempt. Implementations must contain
/// every per-message error (nothing a single payload does may escape this
/// call) and must be idempotent, because at-least-once transports deliver
/// duplicates.
///
/// # Dyn Compatibility
///
/// Returns an explicit `Pin<Box<dyn Future>>` so subscribers can hold the
/// handler as `Arc<dyn MessageHandler>`.
pub trait MessageHandler: Send + Sync {
    /// Process one raw delivery and report its disposition.
    fn handle(
        &self,
        payload: &[u8],
    ) -> Pin<Box<dyn Future<Output = Disposition> + Send + '_>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysProcessed;

    impl MessageHandler for AlwaysProcessed {
        fn handle(
            &self,
            _payload: &[u8],
        ) -> Pin<Box<dyn Future<Output = Disposition> + Send + '_>> {
            Box::pin(async { Disposition::Processed })
        }
    }

    #[test]
    fn handler_is_object_safe() {
        let handler: std::sync::Arc<dyn MessageHandler> = std::sync::Arc::new(AlwaysProcessed);
        let fut = handler.handle(b"{}");
        assert_eq!(tokio_test::block_on(fut), Disposition::Processed);
    }

    #[test]
    fn feed_errors_render_topic() {
        let err = FeedError::SubscriptionFailed {
            topic: "orders".to_string(),
            reason: "no brokers".to_string(),
        };
        assert!(err.to_string().contains("orders"));
    }
}
