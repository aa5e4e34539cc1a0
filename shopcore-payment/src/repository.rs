use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    error::PaymentError,
    models::{Deposit, Invoice, PaymentTransaction},
};

#[async_trait]
pub trait InvoiceRepository: Send + Sync {
    async fn insert(&self, invoice: &Invoice) -> Result<(), PaymentError>;
    async fn exists_with_number(&self, invoice_number: &str) -> Result<bool, PaymentError>;
    /// First active invoice for an order, ordered by creation — callers
    /// needing the full history for refund display use
    /// `find_all_by_order` instead.
    async fn find_active_by_order(&self, order_id: Uuid) -> Result<Option<Invoice>, PaymentError>;
    async fn find_all_by_order(&self, order_id: Uuid) -> Result<Vec<Invoice>, PaymentError>;
    async fn find_by_processing_id(&self, processing_id: &str) -> Result<Option<Invoice>, PaymentError>;
    async fn mark_inactive(&self, invoice_id: Uuid) -> Result<(), PaymentError>;
}

#[async_trait]
pub trait PaymentTransactionRepository: Send + Sync {
    async fn insert(&self, transaction: &PaymentTransaction) -> Result<(), PaymentError>;
    async fn find_all_by_order(&self, order_id: Uuid) -> Result<Vec<PaymentTransaction>, PaymentError>;
}

#[async_trait]
pub trait DepositRepository: Send + Sync {
    async fn insert(&self, deposit: &Deposit) -> Result<(), PaymentError>;
    async fn find_by_processing_id(&self, processing_id: &str) -> Result<Option<Deposit>, PaymentError>;
    async fn mark_paid(&self, deposit_id: Uuid) -> Result<(), PaymentError>;
}
