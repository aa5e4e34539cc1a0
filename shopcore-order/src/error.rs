use uuid::Uuid;

use crate::models::OrderStatus;

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("order not found: {0}")]
    NotFound(Uuid),
    #[error("order expired: {0}")]
    Expired(Uuid),
    #[error("order already cancelled: {0}")]
    AlreadyCancelled(Uuid),
    #[error("invalid order state: current={current_state:?}, required={required_state:?}")]
    InvalidState { current_state: OrderStatus, required_state: &'static str },
    #[error("insufficient stock for order {0}")]
    InsufficientStock(Uuid),
    #[error("order {order_id} does not belong to user {user_id}")]
    OwnershipViolation { order_id: Uuid, user_id: Uuid },
    #[error("catalog error: {0}")]
    Catalog(#[from] shopcore_catalog::ItemError),
    #[error("accounts error: {0}")]
    Accounts(#[from] shopcore_core::AccountsError),
    #[error("repository error: {0}")]
    Repository(String),
}
