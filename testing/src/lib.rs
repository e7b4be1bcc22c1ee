//! # Orderhub Testing
//!
//! In-memory fakes and fixtures shared by the workspace's tests:
//!
//! - [`InMemoryOrderStore`]: `HashMap`-backed [`OrderStore`] with duplicate
//!   recognition and failure injection
//! - [`sample_order`] / [`sample_order_json`]: the reference order document
//!   as a typed aggregate and as a raw payload
//!
//! ## Example
//!
//! ```
//! use orderhub_testing::{sample_order, InMemoryOrderStore};
//! use orderhub_core::{InsertOutcome, OrderStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = InMemoryOrderStore::new();
//! let order = sample_order("order-1");
//!
//! assert_eq!(store.insert(&order).await?, InsertOutcome::Inserted);
//! assert_eq!(store.insert(&order).await?, InsertOutcome::Duplicate);
//! assert_eq!(store.row_count(), 1);
//! # Ok(())
//! # }
//! ```

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Test utilities document panics where critical

use chrono::{TimeZone, Utc};
use orderhub_core::order::{Delivery, Item, Order, Payment};
use orderhub_core::store::{InsertOutcome, OrderStore, StoreError};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

/// In-memory order store for fast, deterministic testing.
///
/// Keeps aggregates in a `HashMap` keyed by `order_uid`, mirroring the
/// production contract: inserting an existing key is a no-op reporting
/// [`InsertOutcome::Duplicate`], never an error.
///
/// # Failure Injection
///
/// [`fail_next_calls`](Self::fail_next_calls) makes subsequent store calls
/// return [`StoreError::Unavailable`], for exercising the pipeline's
/// transient-failure path.
#[derive(Clone, Debug, Default)]
pub struct InMemoryOrderStore {
    orders: Arc<RwLock<HashMap<String, Order>>>,
    failing: Arc<AtomicBool>,
}

impl InMemoryOrderStore {
    /// Create a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle failure injection: while `true`, every call fails with
    /// [`StoreError::Unavailable`].
    pub fn fail_next_calls(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of stored aggregates; useful for exactly-one-row assertions.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.orders.read().unwrap().len()
    }

    /// Check whether an aggregate is stored under `order_uid`.
    #[must_use]
    pub fn contains(&self, order_uid: &str) -> bool {
        self.orders.read().unwrap().contains_key(order_uid)
    }

    /// Clear all stored aggregates (for test isolation).
    pub fn clear(&self) {
        self.orders.write().unwrap().clear();
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "injected failure".to_string(),
            ));
        }
        Ok(())
    }
}

impl OrderStore for InMemoryOrderStore {
    fn insert(
        &self,
        order: &Order,
    ) -> Pin<Box<dyn Future<Output = Result<InsertOutcome, StoreError>> + Send + '_>> {
        let order = order.clone();
        Box::pin(async move {
            self.check_available()?;

            let mut orders = self.orders.write().unwrap();
            if orders.contains_key(&order.order_uid) {
                return Ok(InsertOutcome::Duplicate);
            }
            orders.insert(order.order_uid.clone(), order);
            Ok(InsertOutcome::Inserted)
        })
    }

    fn find(
        &self,
        order_uid: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Order>, StoreError>> + Send + '_>> {
        let order_uid = order_uid.to_string();
        Box::pin(async move {
            self.check_available()?;
            Ok(self.orders.read().unwrap().get(&order_uid).cloned())
        })
    }

    fn scan_all(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Order>, StoreError>> + Send + '_>> {
        Box::pin(async move {
            self.check_available()?;
            Ok(self.orders.read().unwrap().values().cloned().collect())
        })
    }
}

/// Build the reference order aggregate under a caller-chosen `order_uid`.
///
/// Field values follow the reference document the original upstream system
/// emits, so tests exercise realistic shapes without hand-rolling documents.
#[must_use]
pub fn sample_order(order_uid: &str) -> Order {
    Order {
        order_uid: order_uid.to_string(),
        track_number: "WBILMTESTTRACK".to_string(),
        entry: "WBIL".to_string(),
        delivery: Delivery {
            name: "Test Testov".to_string(),
            phone: "+9720000000".to_string(),
            zip: "2639809".to_string(),
            city: "Kiryat Mozkin".to_string(),
            address: "Ploshad Mira 15".to_string(),
            region: "Kraiot".to_string(),
            email: "test@gmail.com".to_string(),
        },
        payment: Payment {
            transaction: order_uid.to_string(),
            request_id: String::new(),
            currency: "USD".to_string(),
            provider: "wbpay".to_string(),
            amount: 1817,
            payment_dt: 1_637_907_727,
            bank: "alpha".to_string(),
            delivery_cost: 1500,
            goods_total: 317,
            custom_fee: 0,
        },
        items: vec![Item {
            chrt_id: 9_934_930,
            track_number: "WBILMTESTTRACK".to_string(),
            price: 453,
            rid: "ab4219087a764ae0btest".to_string(),
            name: "Mascaras".to_string(),
            sale: 30,
            size: "0".to_string(),
            total_price: 317,
            nm_id: 2_389_212,
            brand: "Vivienne Sabo".to_string(),
            status: 202,
        }],
        locale: "en".to_string(),
        internal_signature: String::new(),
        customer_id: "test".to_string(),
        delivery_service: "meest".to_string(),
        shardkey: "9".to_string(),
        sm_id: 99,
        date_created: Utc.with_ymd_and_hms(2021, 11, 26, 6, 22, 19).unwrap(),
        oof_shard: "1".to_string(),
    }
}

/// The reference order document as a raw JSON payload.
#[must_use]
pub fn sample_order_json(order_uid: &str) -> Vec<u8> {
    serde_json::to_vec(&sample_order(order_uid)).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn insert_then_find_round_trips() {
        let store = InMemoryOrderStore::new();
        let order = sample_order("uid-1");

        assert_eq!(store.insert(&order).await.unwrap(), InsertOutcome::Inserted);

        let found = store.find("uid-1").await.unwrap().unwrap();
        assert_eq!(found, order);
    }

    #[tokio::test]
    async fn duplicate_insert_is_a_noop() {
        let store = InMemoryOrderStore::new();
        let order = sample_order("uid-1");

        store.insert(&order).await.unwrap();
        assert_eq!(
            store.insert(&order).await.unwrap(),
            InsertOutcome::Duplicate
        );
        assert_eq!(store.row_count(), 1);
    }

    #[tokio::test]
    async fn injected_failure_surfaces_as_unavailable() {
        let store = InMemoryOrderStore::new();
        store.fail_next_calls(true);

        let err = store.find("uid-1").await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));

        store.fail_next_calls(false);
        assert!(store.find("uid-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn scan_all_returns_every_aggregate() {
        let store = InMemoryOrderStore::new();
        for i in 0..5 {
            store.insert(&sample_order(&format!("uid-{i}"))).await.unwrap();
        }

        let all = store.scan_all().await.unwrap();
        assert_eq!(all.len(), 5);
    }

    #[test]
    fn sample_payload_parses_back() {
        let payload = sample_order_json("uid-42");
        let order = Order::from_payload(&payload).unwrap();
        assert_eq!(order.order_uid, "uid-42");
    }
}
