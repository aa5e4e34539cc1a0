use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("order not found: {0}")]
    OrderNotFound(Uuid),
    #[error("invoice not found for order {0}")]
    InvoiceNotFound(Uuid),
    #[error("no cryptocurrency selected for order {0}")]
    CryptoCurrencyNotSelected(Uuid),
    #[error("could not generate a unique invoice number after 10 attempts")]
    InvoiceNumberExhausted,
    #[error("processor call failed: {0}")]
    Processor(String),
    #[error("order error: {0}")]
    Order(#[from] shopcore_order::OrderError),
    #[error("catalog error: {0}")]
    Catalog(#[from] shopcore_catalog::ItemError),
    #[error("accounts error: {0}")]
    Accounts(#[from] shopcore_core::AccountsError),
    #[error("repository error: {0}")]
    Repository(String),
}
