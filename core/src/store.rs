//! Persistence contract consumed by the ingestion and read paths.
//!
//! The core depends on exactly three operations (insert, point lookup, and
//! full scan) plus the guarantee that a duplicate-key insert is
//! *distinguishable from every failure*. That distinction is what lets the
//! pipeline treat a redelivered document as a successful no-op instead of an
//! error (at-least-once transports redeliver; the store must not turn that
//! into a fault).
//!
//! Implementations:
//!
//! - `PgOrderStore` in `orderhub-postgres`: production, sqlx over
//!   `PostgreSQL`
//! - `InMemoryOrderStore` in `orderhub-testing`: fast, deterministic tests

use crate::order::Order;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;

/// Result of an insert attempt.
///
/// `Duplicate` is a success, not an error: the aggregate is append-only, so
/// a row that already exists under the same `order_uid` is the same order,
/// observed again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// A new row (and its sub-entity rows) was committed.
    Inserted,
    /// A row with this `order_uid` already exists; nothing was written.
    Duplicate,
}

/// Errors surfaced by store implementations.
///
/// Duplicate keys are deliberately *not* represented here; see
/// [`InsertOutcome::Duplicate`].
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store could not be reached.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A call exceeded its deadline.
    ///
    /// Callers treat this as recoverable: the message stays unacknowledged
    /// and the transport redelivers it later.
    #[error("Store call timed out after {0:?}")]
    Timeout(Duration),

    /// A query or statement failed for a reason other than connectivity.
    #[error("Store query failed: {0}")]
    Query(String),

    /// A stored row could not be decoded back into an aggregate.
    #[error("Stored row could not be decoded: {0}")]
    Corrupt(String),
}

/// The persistence contract for order aggregates.
///
/// An aggregate and its sub-entities are written as a single logical write
/// and read back as a single joined document. The contract is append-only:
/// there is no update and no delete.
///
/// # Dyn Compatibility
///
/// Methods return explicit `Pin<Box<dyn Future>>` instead of `async fn` so
/// the trait can be used as a trait object (`Arc<dyn OrderStore>`), which is
/// how the pipeline, the query service and the cache warm-up receive their
/// store.
pub trait OrderStore: Send + Sync {
    /// Persist an aggregate and its sub-entities as one logical write.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] for connectivity, deadline or statement
    /// failures. An existing row with the same `order_uid` is **not** an
    /// error; it reports as [`InsertOutcome::Duplicate`] with no data
    /// written.
    fn insert(
        &self,
        order: &Order,
    ) -> Pin<Box<dyn Future<Output = Result<InsertOutcome, StoreError>> + Send + '_>>;

    /// Fetch the full aggregate (all sub-entities joined) by `order_uid`.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on store failure; an unknown identifier is
    /// `Ok(None)`.
    fn find(
        &self,
        order_uid: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Order>, StoreError>> + Send + '_>>;

    /// Read every persisted aggregate; used by the cache warm rebuild.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on store failure.
    fn scan_all(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Order>, StoreError>> + Send + '_>>;
}
