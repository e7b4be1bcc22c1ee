//! `PostgreSQL` order store for Orderhub.
//!
//! [`PgOrderStore`] implements the [`OrderStore`] contract with sqlx over a
//! pooled `PostgreSQL` connection. An aggregate spans four tables (`orders`,
//! `deliveries`, `payments`, `order_items`), written in one transaction and
//! read back as one joined document.
//!
//! # Idempotency
//!
//! `orders.order_uid` is the primary key. An insert that trips its unique
//! constraint (SQLSTATE 23505) rolls back and reports
//! [`InsertOutcome::Duplicate`], a success rather than an error, which is what
//! lets the pipeline absorb at-least-once redelivery without corrupting the
//! store.
//!
//! # Deadlines
//!
//! Every store call runs under a configurable deadline (default 5 seconds);
//! expiry surfaces as [`StoreError::Timeout`] so a hung database stalls one
//! message, not the process.
//!
//! # Example
//!
//! ```no_run
//! use orderhub_postgres::PgOrderStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = PgOrderStore::connect("postgres://localhost/orderhub").await?;
//! store.migrate().await?;
//! # Ok(())
//! # }
//! ```

use chrono::{DateTime, Utc};
use orderhub_core::order::{Delivery, Item, Order, Payment};
use orderhub_core::store::{InsertOutcome, OrderStore, StoreError};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(5);
const UNIQUE_VIOLATION: &str = "23505";

/// PostgreSQL-backed order store.
///
/// Cheap to clone; clones share the underlying pool.
#[derive(Clone)]
pub struct PgOrderStore {
    pool: PgPool,
    call_timeout: Duration,
}

impl PgOrderStore {
    /// Connect a new pooled store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if no connection can be
    /// established, a fatal startup condition for the service.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(DEFAULT_CALL_TIMEOUT)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Ok(Self::from_pool(pool))
    }

    /// Wrap an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self {
            pool,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    /// Override the per-call deadline.
    #[must_use]
    pub const fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Apply the embedded migrations (idempotent).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Query`] if a migration fails to apply.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Query(format!("migration failed: {e}")))?;

        tracing::info!("Order store migrations applied");
        Ok(())
    }

    /// Get the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn with_deadline<T>(
        &self,
        call: impl Future<Output = Result<T, StoreError>> + Send,
    ) -> Result<T, StoreError> {
        match tokio::time::timeout(self.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(self.call_timeout)),
        }
    }

    async fn insert_inner(&self, order: &Order) -> Result<InsertOutcome, StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        // The aggregate root goes first; its primary key is the duplicate
        // detector for the whole logical write.
        let root = sqlx::query(
            "INSERT INTO orders (order_uid, track_number, entry, locale,
                 internal_signature, customer_id, delivery_service, shardkey,
                 sm_id, date_created, oof_shard)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(&order.order_uid)
        .bind(&order.track_number)
        .bind(&order.entry)
        .bind(&order.locale)
        .bind(&order.internal_signature)
        .bind(&order.customer_id)
        .bind(&order.delivery_service)
        .bind(&order.shardkey)
        .bind(order.sm_id)
        .bind(order.date_created)
        .bind(&order.oof_shard)
        .execute(&mut *tx)
        .await;

        match root {
            Ok(_) => {},
            Err(e) if is_unique_violation(&e) => {
                tx.rollback().await.map_err(map_sqlx_error)?;
                return Ok(InsertOutcome::Duplicate);
            },
            Err(e) => return Err(map_sqlx_error(e)),
        }

        sqlx::query(
            "INSERT INTO deliveries (order_uid, name, phone, zip, city, address, region, email)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(&order.order_uid)
        .bind(&order.delivery.name)
        .bind(&order.delivery.phone)
        .bind(&order.delivery.zip)
        .bind(&order.delivery.city)
        .bind(&order.delivery.address)
        .bind(&order.delivery.region)
        .bind(&order.delivery.email)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        sqlx::query(
            "INSERT INTO payments (order_uid, transaction, request_id, currency,
                 provider, amount, payment_dt, bank, delivery_cost, goods_total, custom_fee)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(&order.order_uid)
        .bind(&order.payment.transaction)
        .bind(&order.payment.request_id)
        .bind(&order.payment.currency)
        .bind(&order.payment.provider)
        .bind(order.payment.amount)
        .bind(order.payment.payment_dt)
        .bind(&order.payment.bank)
        .bind(order.payment.delivery_cost)
        .bind(order.payment.goods_total)
        .bind(order.payment.custom_fee)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        for item in &order.items {
            sqlx::query(
                "INSERT INTO order_items (order_uid, chrt_id, track_number, price,
                     rid, name, sale, size, total_price, nm_id, brand, status)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
            )
            .bind(&order.order_uid)
            .bind(item.chrt_id)
            .bind(&item.track_number)
            .bind(item.price)
            .bind(&item.rid)
            .bind(&item.name)
            .bind(item.sale)
            .bind(&item.size)
            .bind(item.total_price)
            .bind(item.nm_id)
            .bind(&item.brand)
            .bind(item.status)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(InsertOutcome::Inserted)
    }

    async fn find_inner(&self, order_uid: &str) -> Result<Option<Order>, StoreError> {
        let Some(root) = sqlx::query_as::<_, OrderRow>(
            "SELECT order_uid, track_number, entry, locale, internal_signature,
                    customer_id, delivery_service, shardkey, sm_id, date_created, oof_shard
             FROM orders WHERE order_uid = $1",
        )
        .bind(order_uid)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?
        else {
            return Ok(None);
        };

        let delivery = sqlx::query_as::<_, DeliveryRow>(
            "SELECT order_uid, name, phone, zip, city, address, region, email
             FROM deliveries WHERE order_uid = $1",
        )
        .bind(order_uid)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?
        .ok_or_else(|| missing_sub_entity(order_uid, "delivery"))?;

        let payment = sqlx::query_as::<_, PaymentRow>(
            "SELECT order_uid, transaction, request_id, currency, provider, amount,
                    payment_dt, bank, delivery_cost, goods_total, custom_fee
             FROM payments WHERE order_uid = $1",
        )
        .bind(order_uid)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?
        .ok_or_else(|| missing_sub_entity(order_uid, "payment"))?;

        let items = sqlx::query_as::<_, ItemRow>(
            "SELECT order_uid, chrt_id, track_number, price, rid, name, sale,
                    size, total_price, nm_id, brand, status
             FROM order_items WHERE order_uid = $1 ORDER BY id",
        )
        .bind(order_uid)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(Some(assemble(root, delivery, payment, items)))
    }

    async fn scan_all_inner(&self) -> Result<Vec<Order>, StoreError> {
        let roots = sqlx::query_as::<_, OrderRow>(
            "SELECT order_uid, track_number, entry, locale, internal_signature,
                    customer_id, delivery_service, shardkey, sm_id, date_created, oof_shard
             FROM orders",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        // One pass per table instead of one round-trip per aggregate.
        let mut deliveries: HashMap<String, DeliveryRow> = sqlx::query_as::<_, DeliveryRow>(
            "SELECT order_uid, name, phone, zip, city, address, region, email FROM deliveries",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?
        .into_iter()
        .map(|row| (row.order_uid.clone(), row))
        .collect();

        let mut payments: HashMap<String, PaymentRow> = sqlx::query_as::<_, PaymentRow>(
            "SELECT order_uid, transaction, request_id, currency, provider, amount,
                    payment_dt, bank, delivery_cost, goods_total, custom_fee
             FROM payments",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?
        .into_iter()
        .map(|row| (row.order_uid.clone(), row))
        .collect();

        let mut items: HashMap<String, Vec<ItemRow>> = HashMap::new();
        for row in sqlx::query_as::<_, ItemRow>(
            "SELECT order_uid, chrt_id, track_number, price, rid, name, sale,
                    size, total_price, nm_id, brand, status
             FROM order_items ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?
        {
            items.entry(row.order_uid.clone()).or_default().push(row);
        }

        let mut orders = Vec::with_capacity(roots.len());
        for root in roots {
            let delivery = deliveries
                .remove(&root.order_uid)
                .ok_or_else(|| missing_sub_entity(&root.order_uid, "delivery"))?;
            let payment = payments
                .remove(&root.order_uid)
                .ok_or_else(|| missing_sub_entity(&root.order_uid, "payment"))?;
            let item_rows = items.remove(&root.order_uid).unwrap_or_default();
            orders.push(assemble(root, delivery, payment, item_rows));
        }

        Ok(orders)
    }
}

impl OrderStore for PgOrderStore {
    fn insert(
        &self,
        order: &Order,
    ) -> Pin<Box<dyn Future<Output = Result<InsertOutcome, StoreError>> + Send + '_>> {
        let order = order.clone();
        Box::pin(async move { self.with_deadline(self.insert_inner(&order)).await })
    }

    fn find(
        &self,
        order_uid: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Order>, StoreError>> + Send + '_>> {
        let order_uid = order_uid.to_string();
        Box::pin(async move { self.with_deadline(self.find_inner(&order_uid)).await })
    }

    fn scan_all(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Order>, StoreError>> + Send + '_>> {
        Box::pin(async move { self.with_deadline(self.scan_all_inner()).await })
    }
}

fn map_sqlx_error(e: sqlx::Error) -> StoreError {
    match e {
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
            StoreError::Unavailable(e.to_string())
        },
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            StoreError::Corrupt(e.to_string())
        },
        other => StoreError::Query(other.to_string()),
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .and_then(sqlx::error::DatabaseError::code)
        .is_some_and(|code| code == UNIQUE_VIOLATION)
}

fn missing_sub_entity(order_uid: &str, entity: &str) -> StoreError {
    StoreError::Corrupt(format!("order {order_uid} has no {entity} row"))
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    order_uid: String,
    track_number: String,
    entry: String,
    locale: String,
    internal_signature: String,
    customer_id: String,
    delivery_service: String,
    shardkey: String,
    sm_id: i64,
    date_created: DateTime<Utc>,
    oof_shard: String,
}

#[derive(sqlx::FromRow)]
struct DeliveryRow {
    order_uid: String,
    name: String,
    phone: String,
    zip: String,
    city: String,
    address: String,
    region: String,
    email: String,
}

#[derive(sqlx::FromRow)]
struct PaymentRow {
    order_uid: String,
    transaction: String,
    request_id: String,
    currency: String,
    provider: String,
    amount: i64,
    payment_dt: i64,
    bank: String,
    delivery_cost: i64,
    goods_total: i64,
    custom_fee: i64,
}

#[derive(sqlx::FromRow)]
struct ItemRow {
    order_uid: String,
    chrt_id: i64,
    track_number: String,
    price: i64,
    rid: String,
    name: String,
    sale: i64,
    size: String,
    total_price: i64,
    nm_id: i64,
    brand: String,
    status: i64,
}

fn assemble(
    root: OrderRow,
    delivery: DeliveryRow,
    payment: PaymentRow,
    items: Vec<ItemRow>,
) -> Order {
    Order {
        order_uid: root.order_uid,
        track_number: root.track_number,
        entry: root.entry,
        delivery: Delivery {
            name: delivery.name,
            phone: delivery.phone,
            zip: delivery.zip,
            city: delivery.city,
            address: delivery.address,
            region: delivery.region,
            email: delivery.email,
        },
        payment: Payment {
            transaction: payment.transaction,
            request_id: payment.request_id,
            currency: payment.currency,
            provider: payment.provider,
            amount: payment.amount,
            payment_dt: payment.payment_dt,
            bank: payment.bank,
            delivery_cost: payment.delivery_cost,
            goods_total: payment.goods_total,
            custom_fee: payment.custom_fee,
        },
        items: items
            .into_iter()
            .map(|row| Item {
                chrt_id: row.chrt_id,
                track_number: row.track_number,
                price: row.price,
                rid: row.rid,
                name: row.name,
                sale: row.sale,
                size: row.size,
                total_price: row.total_price,
                nm_id: row.nm_id,
                brand: row.brand,
                status: row.status,
            })
            .collect(),
        locale: root.locale,
        internal_signature: root.internal_signature,
        customer_id: root.customer_id,
        delivery_service: root.delivery_service,
        shardkey: root.shardkey,
        sm_id: root.sm_id,
        date_created: root.date_created,
        oof_shard: root.oof_shard,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pg_order_store_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<PgOrderStore>();
        assert_sync::<PgOrderStore>();
    }

    #[test]
    fn io_errors_map_to_unavailable() {
        let err = map_sqlx_error(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, StoreError::Unavailable(_)));
    }

    #[test]
    fn other_errors_map_to_query() {
        let err = map_sqlx_error(sqlx::Error::RowNotFound);
        assert!(matches!(err, StoreError::Query(_)));
    }
}
