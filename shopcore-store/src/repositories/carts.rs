use async_trait::async_trait;
use shopcore_catalog::{Cart, CartError, CartItem, CartRepository};
use uuid::Uuid;

use crate::database::DbClient;

#[derive(Clone)]
pub struct PostgresCartRepository {
    db: DbClient,
}

impl PostgresCartRepository {
    pub fn new(db: DbClient) -> Self {
        Self { db }
    }

    async fn load(&self, cart_id: Uuid, user_id: Uuid) -> Result<Cart, CartError> {
        let rows = sqlx::query!(
            "SELECT subcategory_id, quantity FROM cart_items WHERE cart_id = $1",
            cart_id,
        )
        .fetch_all(&self.db.pool)
        .await
        .map_err(|e| CartError::Repository(e.to_string()))?;

        // The subcategory's category and physicality aren't stored on the
        // cart row itself; a real handler enriches this from the catalog
        // lookup before presenting it to the user.
        let items = rows
            .into_iter()
            .map(|r| CartItem { category_id: Uuid::nil(), subcategory_id: r.subcategory_id, quantity: r.quantity })
            .collect();

        Ok(Cart { user_id, items })
    }
}

#[async_trait]
impl CartRepository for PostgresCartRepository {
    async fn get_or_create(&self, user_id: Uuid) -> Result<Cart, CartError> {
        let existing = sqlx::query!("SELECT id FROM carts WHERE user_id = $1", user_id)
            .fetch_optional(&self.db.pool)
            .await
            .map_err(|e| CartError::Repository(e.to_string()))?;

        let cart_id = match existing {
            Some(row) => row.id,
            None => {
                let id = Uuid::new_v4();
                sqlx::query!("INSERT INTO carts (id, user_id) VALUES ($1, $2)", id, user_id)
                    .execute(&self.db.pool)
                    .await
                    .map_err(|e| CartError::Repository(e.to_string()))?;
                id
            }
        };

        self.load(cart_id, user_id).await
    }

    async fn add_item(&self, user_id: Uuid, item: CartItem) -> Result<Cart, CartError> {
        let cart = self.get_or_create(user_id).await?;
        let cart_id = sqlx::query!("SELECT id FROM carts WHERE user_id = $1", user_id)
            .fetch_one(&self.db.pool)
            .await
            .map_err(|e| CartError::Repository(e.to_string()))?
            .id;

        sqlx::query!(
            r#"
            INSERT INTO cart_items (cart_id, subcategory_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (cart_id, subcategory_id) DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity
            "#,
            cart_id,
            item.subcategory_id,
            item.quantity,
        )
        .execute(&self.db.pool)
        .await
        .map_err(|e| CartError::Repository(e.to_string()))?;

        let _ = cart;
        self.load(cart_id, user_id).await
    }

    async fn remove_item(&self, user_id: Uuid, subcategory_id: Uuid) -> Result<Cart, CartError> {
        let cart_id = sqlx::query!("SELECT id FROM carts WHERE user_id = $1", user_id)
            .fetch_one(&self.db.pool)
            .await
            .map_err(|e| CartError::Repository(e.to_string()))?
            .id;

        sqlx::query!("DELETE FROM cart_items WHERE cart_id = $1 AND subcategory_id = $2", cart_id, subcategory_id)
            .execute(&self.db.pool)
            .await
            .map_err(|e| CartError::Repository(e.to_string()))?;

        self.load(cart_id, user_id).await
    }

    async fn clear(&self, user_id: Uuid) -> Result<(), CartError> {
        let cart_id = sqlx::query!("SELECT id FROM carts WHERE user_id = $1", user_id)
            .fetch_optional(&self.db.pool)
            .await
            .map_err(|e| CartError::Repository(e.to_string()))?
            .map(|r| r.id);

        if let Some(cart_id) = cart_id {
            sqlx::query!("DELETE FROM cart_items WHERE cart_id = $1", cart_id)
                .execute(&self.db.pool)
                .await
                .map_err(|e| CartError::Repository(e.to_string()))?;
        }
        Ok(())
    }
}
