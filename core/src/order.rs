//! The order aggregate and its canonical serialized form.
//!
//! An [`Order`] is identified by `order_uid` and owns its sub-entities
//! exclusively: one [`Delivery`], one [`Payment`], and an ordered sequence of
//! [`Item`]s. Sub-entities have no identity outside the aggregate; they are
//! created with it and live exactly as long as it does.
//!
//! Field names mirror the wire format of the inbound documents, so the same
//! structs serve as the parse target for raw payloads and as the source of
//! the canonical JSON used for cache values and HTTP responses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced while parsing or serializing an order document.
#[derive(Error, Debug)]
pub enum OrderError {
    /// The payload was not a structurally valid order document.
    #[error("Malformed order payload: {0}")]
    Malformed(String),

    /// The document parsed but carries an empty `order_uid`.
    #[error("Order document has an empty order_uid")]
    MissingIdentity,

    /// The aggregate could not be rendered to canonical JSON.
    #[error("Failed to serialize order: {0}")]
    Serialization(String),
}

/// The order aggregate.
///
/// Identified solely by `order_uid`; append-only (there is no update or
/// delete operation anywhere in the system). Two documents with the same
/// `order_uid` are observations of the same order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Globally unique order identifier, immutable once created.
    pub order_uid: String,
    /// Carrier tracking number.
    pub track_number: String,
    /// Ingestion entry point tag.
    pub entry: String,
    /// Recipient and destination details.
    pub delivery: Delivery,
    /// Payment details.
    pub payment: Payment,
    /// Line items; order of the sequence is preserved but not significant.
    pub items: Vec<Item>,
    /// Customer locale.
    pub locale: String,
    /// Opaque signature field from the upstream system.
    pub internal_signature: String,
    /// Customer identifier.
    pub customer_id: String,
    /// Delivery service name.
    pub delivery_service: String,
    /// Shard key assigned by the upstream system.
    pub shardkey: String,
    /// Numeric "sm" identifier.
    pub sm_id: i64,
    /// Creation timestamp.
    pub date_created: DateTime<Utc>,
    /// "Oof" shard assigned by the upstream system.
    pub oof_shard: String,
}

/// Recipient name, phone and address fields, owned 1:1 by the aggregate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Delivery {
    /// Recipient name.
    pub name: String,
    /// Recipient phone number.
    pub phone: String,
    /// Postal code.
    pub zip: String,
    /// City.
    pub city: String,
    /// Street address.
    pub address: String,
    /// Region or state.
    pub region: String,
    /// Contact email.
    pub email: String,
}

/// Payment details, owned 1:1 by the aggregate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    /// Payment transaction identifier.
    pub transaction: String,
    /// Upstream request identifier, may be empty.
    pub request_id: String,
    /// ISO currency code.
    pub currency: String,
    /// Payment provider name.
    pub provider: String,
    /// Total amount charged.
    pub amount: i64,
    /// Payment timestamp (unix seconds).
    pub payment_dt: i64,
    /// Issuing bank.
    pub bank: String,
    /// Delivery cost component.
    pub delivery_cost: i64,
    /// Goods total component.
    pub goods_total: i64,
    /// Custom fee component.
    pub custom_fee: i64,
}

/// A single line item of the aggregate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Product variant identifier.
    pub chrt_id: i64,
    /// Tracking number the item ships under.
    pub track_number: String,
    /// Unit price.
    pub price: i64,
    /// Item receipt identifier.
    pub rid: String,
    /// Product name.
    pub name: String,
    /// Sale percentage applied.
    pub sale: i64,
    /// Size label.
    pub size: String,
    /// Price after sale, affecting totals.
    pub total_price: i64,
    /// Product card identifier.
    pub nm_id: i64,
    /// Product brand.
    pub brand: String,
    /// Item status code.
    pub status: i64,
}

impl Order {
    /// Parse an order aggregate out of a raw message payload.
    ///
    /// This is the structural gate of the pipeline: the payload has already
    /// passed schema validation, but serde is the authority on field types,
    /// and the aggregate's one cross-field invariant (non-empty identity) is
    /// checked here.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::Malformed`] when the payload does not decode
    /// into the aggregate shape, and [`OrderError::MissingIdentity`] when it
    /// decodes but `order_uid` is empty.
    pub fn from_payload(raw: &[u8]) -> Result<Self, OrderError> {
        let order: Self =
            serde_json::from_slice(raw).map_err(|e| OrderError::Malformed(e.to_string()))?;

        if order.order_uid.is_empty() {
            return Err(OrderError::MissingIdentity);
        }

        Ok(order)
    }

    /// Render the canonical serialized form of this aggregate.
    ///
    /// Every place a document crosses a boundary (cache value, warm rebuild,
    /// read-through fill, HTTP body) uses this rendering, so two writers
    /// racing on the same key always write identical bytes.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::Serialization`] if the aggregate cannot be
    /// rendered; with this data model that indicates a bug rather than bad
    /// input.
    pub fn canonical_json(&self) -> Result<String, OrderError> {
        serde_json::to_string_pretty(self).map_err(|e| OrderError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)] // Test code unwraps for clear failures

    use super::*;
    use proptest::prelude::*;

    fn sample_document() -> &'static str {
        r#"{
            "order_uid": "b563feb7b2b84b6test",
            "track_number": "WBILMTESTTRACK",
            "entry": "WBIL",
            "delivery": {
                "name": "Test Testov",
                "phone": "+9720000000",
                "zip": "2639809",
                "city": "Kiryat Mozkin",
                "address": "Ploshad Mira 15",
                "region": "Kraiot",
                "email": "test@gmail.com"
            },
            "payment": {
                "transaction": "b563feb7b2b84b6test",
                "request_id": "",
                "currency": "USD",
                "provider": "wbpay",
                "amount": 1817,
                "payment_dt": 1637907727,
                "bank": "alpha",
                "delivery_cost": 1500,
                "goods_total": 317,
                "custom_fee": 0
            },
            "items": [
                {
                    "chrt_id": 9934930,
                    "track_number": "WBILMTESTTRACK",
                    "price": 453,
                    "rid": "ab4219087a764ae0btest",
                    "name": "Mascaras",
                    "sale": 30,
                    "size": "0",
                    "total_price": 317,
                    "nm_id": 2389212,
                    "brand": "Vivienne Sabo",
                    "status": 202
                }
            ],
            "locale": "en",
            "internal_signature": "",
            "customer_id": "test",
            "delivery_service": "meest",
            "shardkey": "9",
            "sm_id": 99,
            "date_created": "2021-11-26T06:22:19Z",
            "oof_shard": "1"
        }"#
    }

    #[test]
    fn parses_reference_document() {
        let order = Order::from_payload(sample_document().as_bytes()).unwrap();

        assert_eq!(order.order_uid, "b563feb7b2b84b6test");
        assert_eq!(order.delivery.city, "Kiryat Mozkin");
        assert_eq!(order.payment.amount, 1817);
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.items[0].chrt_id, 9_934_930);
    }

    #[test]
    fn canonical_form_round_trips() {
        let order = Order::from_payload(sample_document().as_bytes()).unwrap();
        let canonical = order.canonical_json().unwrap();
        let reparsed = Order::from_payload(canonical.as_bytes()).unwrap();

        assert_eq!(order, reparsed);
    }

    #[test]
    fn canonical_form_is_stable() {
        let order = Order::from_payload(sample_document().as_bytes()).unwrap();

        assert_eq!(
            order.canonical_json().unwrap(),
            order.canonical_json().unwrap()
        );
    }

    #[test]
    fn rejects_non_json_payload() {
        let err = Order::from_payload(b"not json at all").unwrap_err();
        assert!(matches!(err, OrderError::Malformed(_)));
    }

    #[test]
    fn rejects_wrong_field_types() {
        // Schema-shaped but sm_id is a string, which serde must refuse.
        let doc = sample_document().replace("\"sm_id\": 99", "\"sm_id\": \"99\"");
        let err = Order::from_payload(doc.as_bytes()).unwrap_err();
        assert!(matches!(err, OrderError::Malformed(_)));
    }

    #[test]
    fn rejects_empty_identity() {
        let doc = sample_document().replace("b563feb7b2b84b6test", "");
        let err = Order::from_payload(doc.as_bytes()).unwrap_err();
        assert!(matches!(err, OrderError::MissingIdentity));
    }

    proptest! {
        #[test]
        fn canonical_json_round_trips_any_field_values(
            uid in "[a-z0-9]{1,32}",
            track in "[A-Z]{4,16}",
            amount in 0i64..10_000_000,
            sm_id in 0i64..100_000,
        ) {
            let mut order = Order::from_payload(sample_document().as_bytes()).unwrap();
            order.order_uid = uid;
            order.track_number = track;
            order.payment.amount = amount;
            order.sm_id = sm_id;

            let canonical = order.canonical_json().unwrap();
            let reparsed = Order::from_payload(canonical.as_bytes()).unwrap();
            prop_assert_eq!(order, reparsed);
        }
    }
}
