use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    error::OrderError,
    models::{BuyHistoryRecord, Order},
};

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn insert(&self, order: &Order) -> Result<(), OrderError>;
    async fn find_by_id(&self, order_id: Uuid) -> Result<Option<Order>, OrderError>;
    async fn save(&self, order: &Order) -> Result<(), OrderError>;
    /// Orders in a pending state whose `expires_at` has passed — feeds the
    /// scheduler sweep.
    async fn find_expired_pending(&self) -> Result<Vec<Order>, OrderError>;
}

#[async_trait]
pub trait BuyHistoryRepository: Send + Sync {
    /// Returns `false` without inserting if a record for `order_id` already
    /// exists — guards `complete_order` against recording the same delivery
    /// twice on a redelivered webhook.
    async fn insert_if_absent(&self, record: &BuyHistoryRecord) -> Result<bool, OrderError>;
}
