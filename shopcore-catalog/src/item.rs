use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shopcore_domain::Fiat;
use uuid::Uuid;

use crate::error::ItemError;

/// A single stock row. `private_data` is the digital payload delivered to
/// the buyer on payment. `order_id` present means the row is reserved for
/// that order; invariant: `order_id.is_some() => !is_sold`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: Uuid,
    pub category_id: Uuid,
    pub subcategory_id: Uuid,
    pub description: String,
    pub price: Fiat,
    pub is_physical: bool,
    pub shipping_cost: Fiat,
    pub is_sold: bool,
    pub is_new: bool,
    pub private_data: Option<String>,
    pub order_id: Option<Uuid>,
    pub reserved_at: Option<DateTime<Utc>>,
}

impl Item {
    pub fn is_reserved(&self) -> bool {
        self.order_id.is_some()
    }
}

/// Implementations must provide `SELECT ... FOR UPDATE` semantics for
/// `reserve`: a row-level exclusive lock acquired atomically with the read,
/// so that two concurrent callers requesting overlapping rows never both
/// succeed on the same row (the central concurrency contract of §4.2).
#[async_trait]
pub trait ItemRepository: Send + Sync {
    /// Reserves up to `requested_qty` unsold, unreserved rows for
    /// `subcategory_id` against `order_id`. Returns the rows actually
    /// reserved — fewer than requested is legal (partial fill).
    async fn reserve(
        &self,
        subcategory_id: Uuid,
        requested_qty: i32,
        order_id: Uuid,
    ) -> Result<Vec<Item>, ItemError>;

    /// Clears `order_id`/`reserved_at` on every row currently reserved for
    /// `order_id`.
    async fn release(&self, order_id: Uuid) -> Result<(), ItemError>;

    /// Sets `is_sold = false` on up to `qty` rows that are `is_sold = true
    /// AND order_id IS NULL` matching `(subcategory_id, category_id,
    /// price)`. Returns the number of rows actually restocked; a shortfall
    /// is logged by the caller, never manufactured.
    async fn restock_for_refund(
        &self,
        subcategory_id: Uuid,
        category_id: Uuid,
        price: Fiat,
        qty: i32,
    ) -> Result<i32, ItemError>;

    /// Sets `is_sold = true` on the given rows at order completion.
    /// `order_id` is left intact until the buy-history record is written.
    async fn mark_sold(&self, item_ids: &[Uuid]) -> Result<(), ItemError>;

    /// Clears `order_id` on rows once order completion's history record has
    /// been written, so a sold row doesn't carry a stale order reference
    /// forever — it stays identifiable as consumed stock via `is_sold`.
    async fn clear_order_id(&self, item_ids: &[Uuid]) -> Result<(), ItemError>;

    async fn find_by_order(&self, order_id: Uuid) -> Result<Vec<Item>, ItemError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_item(subcategory_id: Uuid, is_physical: bool) -> Item {
        Item {
            id: Uuid::new_v4(),
            category_id: Uuid::new_v4(),
            subcategory_id,
            description: "test item".to_string(),
            price: Fiat::new(rust_decimal::Decimal::from(10)),
            is_physical,
            shipping_cost: Fiat::ZERO,
            is_sold: false,
            is_new: true,
            private_data: Some("CODE-1".to_string()),
            order_id: None,
            reserved_at: None,
        }
    }

    #[test]
    fn unreserved_item_is_not_reserved() {
        let item = sample_item(Uuid::new_v4(), false);
        assert!(!item.is_reserved());
    }
}
