//! # Orderhub Core
//!
//! Domain model and contracts for the Orderhub ingestion service.
//!
//! This crate defines the [`Order`] aggregate and the two seams the rest of
//! the workspace plugs into:
//!
//! - [`store::OrderStore`]: the persistence contract (insert / find / scan)
//!   with duplicate-key recognition, implemented by `orderhub-postgres` for
//!   production and `orderhub-testing` for tests.
//! - [`feed::MessageHandler`]: the per-delivery callback contract consumed by
//!   the durable subscriber in `orderhub-redpanda`, implemented by the
//!   ingestion pipeline.
//!
//! ## Core Principles
//!
//! - **Append-only aggregates**: an order is created exactly once and never
//!   mutated or removed; a redelivered document is a duplicate observation,
//!   not a new entity.
//! - **Canonical serialized form**: one pretty-printed JSON rendering of the
//!   aggregate is used everywhere a document crosses a boundary (cache
//!   values, HTTP responses), so concurrent writers for the same key can
//!   never diverge.
//! - **No I/O here**: this crate holds types and trait contracts only.

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};

pub mod feed;
pub mod order;
pub mod store;

pub use feed::{Disposition, FeedError, MessageHandler};
pub use order::{Delivery, Item, Order, OrderError, Payment};
pub use store::{InsertOutcome, OrderStore, StoreError};
