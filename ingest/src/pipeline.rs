//! The ingestion pipeline: validate → parse → persist → cache.
//!
//! One [`ingest`](IngestionPipeline::ingest) call handles one delivery.
//! Each step is a hard gate; the first gate a payload fails decides its
//! outcome, and nothing a single payload does can escape the call: the
//! process-level contract is that ingestion never crashes the consumer.
//!
//! # Idempotency
//!
//! The transport is at-least-once, so redeliveries are expected. A store
//! insert that reports [`InsertOutcome::Duplicate`] is a successful no-op:
//! the row already exists, the cache is refreshed with the identical
//! canonical form, and the message is acknowledged like any other commit.
//!
//! # Write serialization
//!
//! Persistence runs under a [`WriteGate`], a single async mutex owned by the
//! pipeline: only one delivery may be inside the store write at a time, so
//! the aggregate's four-table write never interleaves with another. The gate
//! is global rather than per-key (cheap, and correct at the feed's
//! one-message-at-a-time pace) and injectable so tests can share or observe
//! it.

use crate::schema::SchemaValidator;
use orderhub_cache::OrderCache;
use orderhub_core::feed::{Disposition, MessageHandler};
use orderhub_core::order::{Order, OrderError};
use orderhub_core::store::{InsertOutcome, OrderStore, StoreError};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};

/// Errors behind [`IngestOutcome::Failed`].
///
/// These are transient, retryable conditions: the message that hit one
/// stays unacknowledged and redelivers.
#[derive(Error, Debug)]
pub enum IngestError {
    /// The store rejected or never completed the write.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The aggregate could not be rendered to its canonical form.
    #[error(transparent)]
    Canonical(#[from] OrderError),
}

/// Terminal verdict for one delivery.
#[derive(Debug)]
pub enum IngestOutcome {
    /// The aggregate is durably stored (new row or recognized duplicate)
    /// and the cache holds its canonical form.
    Committed {
        /// Identity of the committed aggregate.
        order_uid: String,
    },
    /// The payload failed validation or structural parsing; dropped with no
    /// side effects.
    Rejected {
        /// Why the payload was rejected.
        reason: String,
    },
    /// A transient failure; the delivery should be retried by the transport.
    Failed(IngestError),
}

/// Serializes persistence writes to one in-flight insert at a time.
///
/// Owned by the pipeline by default; inject a shared gate via
/// [`IngestionPipeline::with_write_gate`] when several pipelines (or a test)
/// must serialize against each other.
#[derive(Debug, Default)]
pub struct WriteGate {
    inner: Mutex<()>,
}

impl WriteGate {
    /// Create a new gate.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            inner: Mutex::const_new(()),
        }
    }

    /// Acquire the gate; the write permit lives as long as the guard.
    pub async fn acquire(&self) -> MutexGuard<'_, ()> {
        self.inner.lock().await
    }
}

/// Orchestrates validate → parse → persist → cache for one message.
///
/// # Example
///
/// ```
/// use orderhub_cache::OrderCache;
/// use orderhub_ingest::{IngestOutcome, IngestionPipeline, SchemaValidator};
/// use orderhub_testing::{sample_order_json, InMemoryOrderStore};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pipeline = IngestionPipeline::new(
///     SchemaValidator::embedded()?,
///     Arc::new(InMemoryOrderStore::new()),
///     OrderCache::new(),
/// );
///
/// let outcome = pipeline.ingest(&sample_order_json("order-1")).await;
/// assert!(matches!(outcome, IngestOutcome::Committed { .. }));
/// # Ok(())
/// # }
/// ```
pub struct IngestionPipeline {
    validator: SchemaValidator,
    store: Arc<dyn OrderStore>,
    cache: OrderCache,
    write_gate: Arc<WriteGate>,
}

impl IngestionPipeline {
    /// Create a pipeline with its own private write gate.
    #[must_use]
    pub fn new(
        validator: SchemaValidator,
        store: Arc<dyn OrderStore>,
        cache: OrderCache,
    ) -> Self {
        Self {
            validator,
            store,
            cache,
            write_gate: Arc::new(WriteGate::new()),
        }
    }

    /// Replace the write gate with a shared one.
    #[must_use]
    pub fn with_write_gate(mut self, write_gate: Arc<WriteGate>) -> Self {
        self.write_gate = write_gate;
        self
    }

    /// Process one raw delivery through every gate.
    ///
    /// Gate order is load-bearing: rejection before parsing, parsing before
    /// any side effect, persistence before the cache write. A rejected
    /// payload leaves no trace, and the cache only ever reflects committed
    /// rows.
    pub async fn ingest(&self, raw: &[u8]) -> IngestOutcome {
        if let Err(failure) = self.validator.validate(raw) {
            tracing::warn!(reason = %failure, "Rejected payload: schema validation failed");
            return IngestOutcome::Rejected {
                reason: failure.to_string(),
            };
        }

        let order = match Order::from_payload(raw) {
            Ok(order) => order,
            Err(e) => {
                tracing::warn!(error = %e, "Rejected payload: structural parse failed");
                return IngestOutcome::Rejected {
                    reason: e.to_string(),
                };
            },
        };

        // Rendered before the write so a (theoretical) serialization failure
        // cannot leave a committed row with no cache entry.
        let canonical = match order.canonical_json() {
            Ok(canonical) => canonical,
            Err(e) => {
                tracing::error!(order_uid = %order.order_uid, error = %e, "Canonical rendering failed");
                return IngestOutcome::Failed(e.into());
            },
        };

        let inserted = {
            let _permit = self.write_gate.acquire().await;
            self.store.insert(&order).await
        };

        match inserted {
            Ok(InsertOutcome::Inserted) => {
                tracing::info!(order_uid = %order.order_uid, "Order committed");
            },
            Ok(InsertOutcome::Duplicate) => {
                tracing::debug!(
                    order_uid = %order.order_uid,
                    "Duplicate delivery; treating as committed"
                );
            },
            Err(e) => {
                tracing::error!(
                    order_uid = %order.order_uid,
                    error = %e,
                    "Store write failed; leaving message for redelivery"
                );
                return IngestOutcome::Failed(e.into());
            },
        }

        self.cache.set(&order.order_uid, canonical).await;

        IngestOutcome::Committed {
            order_uid: order.order_uid,
        }
    }
}

impl MessageHandler for IngestionPipeline {
    fn handle(
        &self,
        payload: &[u8],
    ) -> Pin<Box<dyn Future<Output = Disposition> + Send + '_>> {
        let payload = payload.to_vec();
        Box::pin(async move {
            match self.ingest(&payload).await {
                IngestOutcome::Committed { .. } | IngestOutcome::Rejected { .. } => {
                    Disposition::Processed
                },
                IngestOutcome::Failed(_) => Disposition::Retry,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)] // Test code unwraps for clear failures

    use super::*;
    use orderhub_testing::{sample_order_json, InMemoryOrderStore};

    fn pipeline_with(store: Arc<InMemoryOrderStore>) -> IngestionPipeline {
        IngestionPipeline::new(
            SchemaValidator::embedded().unwrap(),
            store,
            OrderCache::new(),
        )
    }

    #[tokio::test]
    async fn valid_payload_commits_and_caches() {
        let store = Arc::new(InMemoryOrderStore::new());
        let pipeline = pipeline_with(Arc::clone(&store));

        let outcome = pipeline.ingest(&sample_order_json("uid-1")).await;

        assert!(matches!(
            outcome,
            IngestOutcome::Committed { ref order_uid } if order_uid == "uid-1"
        ));
        assert_eq!(store.row_count(), 1);
        assert!(pipeline.cache.contains("uid-1").await);
    }

    #[tokio::test]
    async fn redelivery_is_a_silent_success() {
        let store = Arc::new(InMemoryOrderStore::new());
        let pipeline = pipeline_with(Arc::clone(&store));
        let payload = sample_order_json("uid-1");

        let first = pipeline.ingest(&payload).await;
        let second = pipeline.ingest(&payload).await;

        assert!(matches!(first, IngestOutcome::Committed { .. }));
        assert!(matches!(second, IngestOutcome::Committed { .. }));
        assert_eq!(store.row_count(), 1);
    }

    #[tokio::test]
    async fn schema_rejection_leaves_no_trace() {
        let store = Arc::new(InMemoryOrderStore::new());
        let pipeline = pipeline_with(Arc::clone(&store));

        let outcome = pipeline.ingest(b"{\"order_uid\": \"uid-9\"}").await;

        assert!(matches!(outcome, IngestOutcome::Rejected { .. }));
        assert_eq!(store.row_count(), 0);
        assert!(!pipeline.cache.contains("uid-9").await);
    }

    #[tokio::test]
    async fn store_failure_is_retryable() {
        let store = Arc::new(InMemoryOrderStore::new());
        store.fail_next_calls(true);
        let pipeline = pipeline_with(Arc::clone(&store));

        let outcome = pipeline.ingest(&sample_order_json("uid-1")).await;
        assert!(matches!(outcome, IngestOutcome::Failed(_)));
        assert!(!pipeline.cache.contains("uid-1").await);

        // Once the store recovers, the redelivered message commits.
        store.fail_next_calls(false);
        let outcome = pipeline.ingest(&sample_order_json("uid-1")).await;
        assert!(matches!(outcome, IngestOutcome::Committed { .. }));
    }

    #[tokio::test]
    async fn dispositions_follow_outcomes() {
        let store = Arc::new(InMemoryOrderStore::new());
        let pipeline = pipeline_with(Arc::clone(&store));

        assert_eq!(
            pipeline.handle(&sample_order_json("uid-1")).await,
            Disposition::Processed
        );
        assert_eq!(pipeline.handle(b"not json").await, Disposition::Processed);

        store.fail_next_calls(true);
        assert_eq!(
            pipeline.handle(&sample_order_json("uid-2")).await,
            Disposition::Retry
        );
    }
}
