pub mod accounts;
pub mod payment_adapter;

pub use accounts::{
    AccountsError, ApprovalStatus, Strike, StrikeEnforcer, StrikeRepository, StrikeType, User,
    UserRepository,
};
pub use payment_adapter::{HttpPaymentProcessorClient, PaymentProcessorClient, ProcessorInvoice};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("accounts error: {0}")]
    Accounts(#[from] AccountsError),
}

pub type CoreResult<T> = Result<T, CoreError>;
