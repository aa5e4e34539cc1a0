use async_trait::async_trait;
use shopcore_catalog::{Item, ItemError, ItemRepository};
use shopcore_domain::Fiat;
use uuid::Uuid;

use crate::database::DbClient;

#[derive(Clone)]
pub struct PostgresItemRepository {
    db: DbClient,
}

impl PostgresItemRepository {
    pub fn new(db: DbClient) -> Self {
        Self { db }
    }
}

fn row_to_item(row: ItemRow) -> Item {
    Item {
        id: row.id,
        category_id: row.category_id,
        subcategory_id: row.subcategory_id,
        description: row.description,
        price: Fiat::new(row.price),
        is_physical: row.is_physical,
        shipping_cost: Fiat::new(row.shipping_cost),
        is_sold: row.is_sold,
        is_new: row.is_new,
        private_data: row.private_data,
        order_id: row.order_id,
        reserved_at: row.reserved_at,
    }
}

struct ItemRow {
    id: Uuid,
    category_id: Uuid,
    subcategory_id: Uuid,
    description: String,
    price: rust_decimal::Decimal,
    is_physical: bool,
    shipping_cost: rust_decimal::Decimal,
    is_sold: bool,
    is_new: bool,
    private_data: Option<String>,
    order_id: Option<Uuid>,
    reserved_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[async_trait]
impl ItemRepository for PostgresItemRepository {
    /// Reserves rows one at a time inside a single transaction using
    /// `SELECT ... FOR UPDATE SKIP LOCKED`, so two concurrent callers
    /// competing for the same subcategory never block on each other's
    /// locked rows — they simply race for whatever is still unlocked.
    async fn reserve(&self, subcategory_id: Uuid, requested_qty: i32, order_id: Uuid) -> Result<Vec<Item>, ItemError> {
        let mut tx = self.db.pool.begin().await.map_err(|e| ItemError::Repository(e.to_string()))?;

        let candidates = sqlx::query_as!(
            ItemRow,
            r#"
            SELECT id, category_id, subcategory_id, description, price, is_physical,
                   shipping_cost, is_sold, is_new, private_data, order_id, reserved_at
            FROM items
            WHERE subcategory_id = $1 AND order_id IS NULL AND NOT is_sold
            ORDER BY id
            LIMIT $2
            FOR UPDATE SKIP LOCKED
            "#,
            subcategory_id,
            requested_qty as i64,
        )
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| ItemError::Repository(e.to_string()))?;

        let mut reserved = Vec::with_capacity(candidates.len());
        for row in candidates {
            sqlx::query!("UPDATE items SET order_id = $1, reserved_at = now() WHERE id = $2", order_id, row.id)
                .execute(&mut *tx)
                .await
                .map_err(|e| ItemError::Repository(e.to_string()))?;
            reserved.push(row_to_item(row));
        }

        tx.commit().await.map_err(|e| ItemError::Repository(e.to_string()))?;
        Ok(reserved)
    }

    async fn release(&self, order_id: Uuid) -> Result<(), ItemError> {
        sqlx::query!("UPDATE items SET order_id = NULL, reserved_at = NULL WHERE order_id = $1", order_id)
            .execute(&self.db.pool)
            .await
            .map_err(|e| ItemError::Repository(e.to_string()))?;
        Ok(())
    }

    async fn restock_for_refund(
        &self,
        subcategory_id: Uuid,
        category_id: Uuid,
        price: Fiat,
        qty: i32,
    ) -> Result<i32, ItemError> {
        let result = sqlx::query!(
            r#"
            UPDATE items SET is_sold = FALSE
            WHERE id IN (
                SELECT id FROM items
                WHERE subcategory_id = $1 AND category_id = $2 AND price = $3
                  AND is_sold AND order_id IS NULL
                LIMIT $4
            )
            "#,
            subcategory_id,
            category_id,
            price.as_decimal(),
            qty as i64,
        )
        .execute(&self.db.pool)
        .await
        .map_err(|e| ItemError::Repository(e.to_string()))?;
        Ok(result.rows_affected() as i32)
    }

    async fn mark_sold(&self, item_ids: &[Uuid]) -> Result<(), ItemError> {
        sqlx::query!("UPDATE items SET is_sold = TRUE WHERE id = ANY($1)", item_ids)
            .execute(&self.db.pool)
            .await
            .map_err(|e| ItemError::Repository(e.to_string()))?;
        Ok(())
    }

    async fn clear_order_id(&self, item_ids: &[Uuid]) -> Result<(), ItemError> {
        sqlx::query!("UPDATE items SET order_id = NULL WHERE id = ANY($1)", item_ids)
            .execute(&self.db.pool)
            .await
            .map_err(|e| ItemError::Repository(e.to_string()))?;
        Ok(())
    }

    async fn find_by_order(&self, order_id: Uuid) -> Result<Vec<Item>, ItemError> {
        let rows = sqlx::query_as!(
            ItemRow,
            r#"
            SELECT id, category_id, subcategory_id, description, price, is_physical,
                   shipping_cost, is_sold, is_new, private_data, order_id, reserved_at
            FROM items WHERE order_id = $1
            "#,
            order_id,
        )
        .fetch_all(&self.db.pool)
        .await
        .map_err(|e| ItemError::Repository(e.to_string()))?;
        Ok(rows.into_iter().map(row_to_item).collect())
    }
}
