//! Consistent in-memory order index for Orderhub.
//!
//! [`OrderCache`] maps `order_uid` to the canonical serialized form of the
//! aggregate. It is the only shared mutable state in the subsystem besides
//! the store connection, and it is deliberately unbounded: cardinality
//! equals total order count, and aggregates are append-only, so there is no
//! eviction policy.
//!
//! # Consistency
//!
//! The whole map sits behind one `tokio::sync::RwLock`:
//!
//! - readers run concurrently and are blocked only for the instant of a map
//!   mutation;
//! - a [`set`](OrderCache::set) replaces the whole value under the write
//!   lock, so a reader can never observe a torn entry;
//! - no cross-key atomicity is promised (none is required; entries are
//!   independent).
//!
//! Writers for the same key may race (pipeline write-through vs. read-through
//! fill); last-writer-wins is correct because both produce the identical
//! canonical form for a committed `order_uid`.
//!
//! # Warm Rebuild
//!
//! [`warm`](OrderCache::warm) scans the persistent store at startup and
//! populates the map. Callers may spawn it and serve immediately: a miss
//! before completion simply falls back to the store through the read path.

use orderhub_core::store::{OrderStore, StoreError};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Concurrent map from `order_uid` to canonical order JSON.
///
/// Cheap to clone; clones share the same underlying map.
///
/// # Example
///
/// ```
/// use orderhub_cache::OrderCache;
///
/// # async fn example() {
/// let cache = OrderCache::new();
/// cache.set("order-1", "{\"order_uid\":\"order-1\"}".to_string()).await;
///
/// assert!(cache.get("order-1").await.is_some());
/// assert!(cache.get("order-2").await.is_none());
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct OrderCache {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl OrderCache {
    /// Create a new empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the canonical document for `order_uid`, overwriting any stale
    /// entry. Never fails.
    pub async fn set(&self, order_uid: &str, canonical_json: String) {
        self.entries
            .write()
            .await
            .insert(order_uid.to_string(), canonical_json);
    }

    /// Fetch the canonical document for `order_uid`, if cached.
    pub async fn get(&self, order_uid: &str) -> Option<String> {
        self.entries.read().await.get(order_uid).cloned()
    }

    /// Number of cached documents.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Check whether the cache is empty.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Check whether a document is cached under `order_uid`.
    pub async fn contains(&self, order_uid: &str) -> bool {
        self.entries.read().await.contains_key(order_uid)
    }

    /// Rebuild the cache from the persistent store.
    ///
    /// Scans every aggregate and inserts its canonical form. Intended to run
    /// once at startup, typically spawned so reads can begin immediately;
    /// entries are independent, so population order does not matter and
    /// misses during the rebuild fall back to the store.
    ///
    /// Returns the number of documents cached. An aggregate that cannot be
    /// rendered is skipped with a warning rather than aborting the rebuild.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the scan itself fails; the cache is left
    /// with whatever was populated before the failure.
    pub async fn warm(&self, store: &dyn OrderStore) -> Result<usize, StoreError> {
        let orders = store.scan_all().await?;
        let mut cached = 0usize;

        for order in orders {
            match order.canonical_json() {
                Ok(canonical) => {
                    self.set(&order.order_uid, canonical).await;
                    cached += 1;
                },
                Err(e) => {
                    tracing::warn!(
                        order_uid = %order.order_uid,
                        error = %e,
                        "Skipping aggregate that failed canonical rendering"
                    );
                },
            }
        }

        tracing::info!(cached, "Cache warm rebuild complete");
        Ok(cached)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)] // Test code unwraps for clear failures

    use super::*;
    use orderhub_testing::{sample_order, InMemoryOrderStore};
    use orderhub_core::OrderStore as _;

    #[tokio::test]
    async fn set_then_get_returns_the_value() {
        let cache = OrderCache::new();
        cache.set("k", "v".to_string()).await;

        assert_eq!(cache.get("k").await.as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn get_missing_key_returns_none() {
        let cache = OrderCache::new();
        assert!(cache.get("absent").await.is_none());
    }

    #[tokio::test]
    async fn set_overwrites_stale_entries() {
        let cache = OrderCache::new();
        cache.set("k", "old".to_string()).await;
        cache.set("k", "new".to_string()).await;

        assert_eq!(cache.get("k").await.as_deref(), Some("new"));
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn parallel_writers_and_readers_lose_nothing() {
        let cache = OrderCache::new();
        let keys = 1000usize;

        let mut tasks = Vec::with_capacity(keys);
        for i in 0..keys {
            let cache = cache.clone();
            tasks.push(tokio::spawn(async move {
                let key = format!("key-{i}");
                let value = format!("value-{i}");
                cache.set(&key, value.clone()).await;
                // Read back through the shared map while other writers run.
                assert_eq!(cache.get(&key).await, Some(value));
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(cache.len().await, keys);
        for i in 0..keys {
            assert_eq!(
                cache.get(&format!("key-{i}")).await,
                Some(format!("value-{i}")),
            );
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn last_writer_wins_per_key() {
        let cache = OrderCache::new();

        let mut tasks = Vec::new();
        for round in 0..100 {
            let cache = cache.clone();
            tasks.push(tokio::spawn(async move {
                cache.set("contended", format!("round-{round}")).await;
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        // Whichever writer landed last, the value must be one of the writes,
        // never a torn mixture.
        let value = cache.get("contended").await.unwrap();
        assert!(value.starts_with("round-"));
    }

    #[tokio::test]
    async fn warm_populates_every_persisted_aggregate() {
        let store = InMemoryOrderStore::new();
        for i in 0..10 {
            store
                .insert(&sample_order(&format!("uid-{i}")))
                .await
                .unwrap();
        }

        let cache = OrderCache::new();
        let cached = cache.warm(&store).await.unwrap();
        assert_eq!(cached, 10);

        for i in 0..10 {
            let uid = format!("uid-{i}");
            let cached = cache.get(&uid).await.unwrap();
            let direct = store
                .find(&uid)
                .await
                .unwrap()
                .unwrap()
                .canonical_json()
                .unwrap();
            assert_eq!(cached, direct);
        }
    }

    #[tokio::test]
    async fn warm_surfaces_scan_failures() {
        let store = InMemoryOrderStore::new();
        store.fail_next_calls(true);

        let cache = OrderCache::new();
        assert!(cache.warm(&store).await.is_err());
        assert!(cache.is_empty().await);
    }
}
