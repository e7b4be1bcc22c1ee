//! Read path for Orderhub: cache first, store on miss, read-through fill.
//!
//! [`QueryService`] is the one consumer-facing lookup surface. A hit serves
//! straight from [`OrderCache`] with no store access, the read-mostly fast
//! path. A miss queries the store, and a found aggregate populates the cache
//! before returning, so the next lookup for the same key is guaranteed a
//! hit.
//!
//! The read-through `set` may race the pipeline's write-through `set` for
//! the same key. Both render the same canonical form for a committed
//! `order_uid` (aggregates are append-only), so last-writer-wins cannot
//! diverge.

use orderhub_cache::OrderCache;
use orderhub_core::store::{OrderStore, StoreError};
use std::sync::Arc;

/// Point lookups by `order_uid`, combining the cache and the store.
///
/// # Example
///
/// ```
/// use orderhub_cache::OrderCache;
/// use orderhub_query::QueryService;
/// use orderhub_testing::InMemoryOrderStore;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let service = QueryService::new(OrderCache::new(), Arc::new(InMemoryOrderStore::new()));
///
/// assert!(service.lookup("never-ingested").await?.is_none());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct QueryService {
    cache: OrderCache,
    store: Arc<dyn OrderStore>,
}

impl QueryService {
    /// Create a query service over a cache and its backing store.
    #[must_use]
    pub fn new(cache: OrderCache, store: Arc<dyn OrderStore>) -> Self {
        Self { cache, store }
    }

    /// Look up the canonical document for `order_uid`.
    ///
    /// Returns `Ok(None)` for identifiers never ingested.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] only when the cache missed *and* the store
    /// call failed; cache hits never touch the store.
    pub async fn lookup(&self, order_uid: &str) -> Result<Option<String>, StoreError> {
        if let Some(document) = self.cache.get(order_uid).await {
            tracing::debug!(order_uid, "Lookup served from cache");
            return Ok(Some(document));
        }

        let Some(order) = self.store.find(order_uid).await? else {
            tracing::debug!(order_uid, "Lookup missed cache and store");
            return Ok(None);
        };

        let canonical = order
            .canonical_json()
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;

        // Read-through fill: the next lookup for this key is a cache hit.
        self.cache.set(order_uid, canonical.clone()).await;
        tracing::debug!(order_uid, "Lookup filled cache from store");

        Ok(Some(canonical))
    }
}
