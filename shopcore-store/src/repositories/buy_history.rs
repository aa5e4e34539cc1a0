use async_trait::async_trait;
use shopcore_order::{BuyHistoryRecord, BuyHistoryRepository, OrderError};

use crate::database::DbClient;

#[derive(Clone)]
pub struct PostgresBuyHistoryRepository {
    db: DbClient,
}

impl PostgresBuyHistoryRepository {
    pub fn new(db: DbClient) -> Self {
        Self { db }
    }
}

#[async_trait]
impl BuyHistoryRepository for PostgresBuyHistoryRepository {
    /// Relies on the `order_id` uniqueness constraint: `ON CONFLICT DO
    /// NOTHING` makes the insert itself idempotent, and the row count tells
    /// the caller whether a record was actually written.
    async fn insert_if_absent(&self, record: &BuyHistoryRecord) -> Result<bool, OrderError> {
        let result = sqlx::query!(
            r#"
            INSERT INTO buy_history (id, order_id, user_id, item_count, total_price, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (order_id) DO NOTHING
            "#,
            record.id,
            record.order_id,
            record.user_id,
            record.item_count,
            record.total_price.as_decimal(),
            record.created_at,
        )
        .execute(&self.db.pool)
        .await
        .map_err(|e| OrderError::Repository(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }
}
