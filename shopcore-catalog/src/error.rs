use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum ItemError {
    #[error("item not found: {0}")]
    NotFound(Uuid),
    #[error("item already sold: {0}")]
    AlreadySold(Uuid),
    #[error("invalid item data: {0}")]
    InvalidData(String),
    #[error("tier pricing failed for subcategory {0}")]
    TierPricingFailure(Uuid),
    #[error("repository error: {0}")]
    Repository(String),
}

#[derive(Debug, thiserror::Error)]
pub enum CartError {
    #[error("cart is empty")]
    Empty,
    #[error("cart item not found: subcategory {0}")]
    ItemNotFound(Uuid),
    #[error("invalid cart state: {0}")]
    InvalidState(String),
    #[error("repository error: {0}")]
    Repository(String),
}
