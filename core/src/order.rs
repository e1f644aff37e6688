//! The order record shared by the ingestion pipeline, the durable store,
//! the cache and the read endpoint.
//!
//! Orders arrive as JSON on the queue. Missing scalar fields decode to their
//! defaults, so the only hard requirements are the ones enforced by
//! [`Order::validate`]: a non-empty `order_uid`, a non-empty `customer_id`
//! and at least one item.
//!
//! `created_at`, `updated_at` and `version` are assigned by the store and are
//! absent on ingestion.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reasons an order is rejected before it reaches the store.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    /// `order_uid` is empty.
    #[error("empty order_uid")]
    EmptyOrderUid,

    /// `customer_id` is empty.
    #[error("empty customer_id")]
    EmptyCustomerId,

    /// `items` has no entries.
    #[error("empty items")]
    EmptyItems,
}

/// An order as published on the queue and persisted in the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Order {
    /// Primary key across the store and the cache.
    pub order_uid: String,
    /// Shipment tracking number.
    pub track_number: String,
    /// Entry point code.
    pub entry: String,
    /// Recipient and address.
    pub delivery: Delivery,
    /// Payment transaction.
    pub payment: Payment,
    /// Ordered line items.
    pub items: Vec<Item>,
    /// Customer locale.
    pub locale: String,
    /// Internal signature.
    pub internal_signature: String,
    /// Customer identifier.
    pub customer_id: String,
    /// Delivery service name.
    pub delivery_service: String,
    /// Shard key.
    #[serde(rename = "shardkey")]
    pub shard_key: String,
    /// Service marker id.
    pub sm_id: i32,
    /// When the publisher created the order.
    pub date_created: DateTime<Utc>,
    /// Out-of-frame shard.
    pub oof_shard: String,
    /// First insert time, assigned by the store.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Last update time, assigned by the store.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Write counter: 1 on first insert, +1 for every later upsert.
    pub version: i32,
}

/// Recipient of an order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Delivery {
    /// Recipient name.
    pub name: String,
    /// Contact phone.
    pub phone: String,
    /// Postal code.
    pub zip: String,
    /// City.
    pub city: String,
    /// Street address.
    pub address: String,
    /// Region.
    pub region: String,
    /// Contact email.
    pub email: String,
}

/// Payment attached to an order. Amounts are in minor currency units.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Payment {
    /// Transaction id.
    pub transaction: String,
    /// Upstream request id.
    pub request_id: String,
    /// ISO currency code.
    pub currency: String,
    /// Payment provider.
    pub provider: String,
    /// Charged amount.
    pub amount: i64,
    /// Delivery cost.
    pub deliver_cost: i64,
    /// Goods total.
    pub goods_total: i64,
    /// Custom fee.
    pub custom_fee: i64,
    /// Payment timestamp (unix seconds).
    pub payment_dt: i64,
    /// Bank.
    pub bank: String,
}

/// A single line item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Item {
    /// Chart id.
    pub chrt_id: i64,
    /// Tracking number of the parcel carrying this item.
    pub track_number: String,
    /// Unit price.
    pub price: i64,
    /// Item reference id.
    pub rid: String,
    /// Product name.
    pub name: String,
    /// Discount percentage.
    pub sale: i32,
    /// Size label.
    pub size: String,
    /// Price after discount.
    pub total_price: i64,
    /// Nomenclature id.
    pub nm_id: i64,
    /// Brand.
    pub brand: String,
    /// Item status code.
    pub status: i32,
}

impl Order {
    /// Decode an order from a raw JSON queue payload.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error when the payload is not a JSON object
    /// with the expected field types.
    pub fn from_json(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }

    /// Check the invariants that gate persistence.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] found, checking `order_uid`,
    /// then `customer_id`, then `items`.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.order_uid.is_empty() {
            return Err(ValidationError::EmptyOrderUid);
        }
        if self.customer_id.is_empty() {
            return Err(ValidationError::EmptyCustomerId);
        }
        if self.items.is_empty() {
            return Err(ValidationError::EmptyItems);
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SAMPLE: &str = r#"{
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
    }"#;

    #[test]
    fn decodes_published_payload() {
        let order = Order::from_json(SAMPLE.as_bytes()).unwrap();
        assert_eq!(order.order_uid, "b563feb7b2b84b6test");
        assert_eq!(order.shard_key, "9");
        assert_eq!(order.sm_id, 99);
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.items[0].brand, "Vivienne Sabo");
        assert_eq!(order.payment.amount, 1817);
        assert_eq!(order.delivery.city, "Kiryat Mozkin");
        assert!(order.created_at.is_none());
        assert_eq!(order.version, 0);
        assert!(order.validate().is_ok());
    }

    #[test]
    fn store_fields_are_omitted_until_assigned() {
        let order = Order::from_json(SAMPLE.as_bytes()).unwrap();
        let json = serde_json::to_value(&order).unwrap();
        assert!(json.get("created_at").is_none());
        assert!(json.get("updated_at").is_none());
        assert_eq!(json["shardkey"], "9");
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(Order::from_json(b"{not json").is_err());
        assert!(Order::from_json(br#"{"order_uid": 42}"#).is_err());
    }

    #[test]
    fn validation_order_of_checks() {
        let order = Order::default();
        assert_eq!(order.validate(), Err(ValidationError::EmptyOrderUid));

        let order = Order {
            order_uid: "o-1".to_string(),
            ..Order::default()
        };
        assert_eq!(order.validate(), Err(ValidationError::EmptyCustomerId));

        let order = Order {
            order_uid: "o-1".to_string(),
            customer_id: "c-1".to_string(),
            ..Order::default()
        };
        assert_eq!(order.validate(), Err(ValidationError::EmptyItems));
    }

    proptest! {
        #[test]
        fn validation_accepts_exactly_complete_orders(
            uid in "[a-z0-9]{0,8}",
            customer in "[a-z0-9]{0,8}",
            item_count in 0usize..4,
        ) {
            let order = Order {
                order_uid: uid.clone(),
                customer_id: customer.clone(),
                items: vec![Item::default(); item_count],
                ..Order::default()
            };
            let expected = !uid.is_empty() && !customer.is_empty() && item_count > 0;
            prop_assert_eq!(order.validate().is_ok(), expected);
        }
    }
}
