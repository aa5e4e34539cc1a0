use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CartError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItem {
    pub category_id: Uuid,
    pub subcategory_id: Uuid,
    pub quantity: i32,
}

/// One cart per user, created lazily on first interaction. Destroyed on
/// successful checkout or explicit deletion. This is the single,
/// authoritative cart service for the core — the source's second,
/// overlapping cart implementation is not carried forward (see DESIGN.md).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cart {
    pub user_id: Uuid,
    pub items: Vec<CartItem>,
}

impl Cart {
    pub fn empty(user_id: Uuid) -> Self {
        Self { user_id, items: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[async_trait]
pub trait CartRepository: Send + Sync {
    async fn get_or_create(&self, user_id: Uuid) -> Result<Cart, CartError>;
    async fn add_item(&self, user_id: Uuid, item: CartItem) -> Result<Cart, CartError>;
    async fn remove_item(&self, user_id: Uuid, subcategory_id: Uuid) -> Result<Cart, CartError>;
    async fn clear(&self, user_id: Uuid) -> Result<(), CartError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_cart_is_empty() {
        let cart = Cart::empty(Uuid::new_v4());
        assert!(cart.is_empty());
    }
}
