pub mod classify;
pub mod error;
pub mod invoice;
pub mod models;
pub mod reconciliation;
pub mod repository;

pub use classify::classify_payment;
pub use error::PaymentError;
pub use invoice::generate_invoice_number;
pub use models::{ConfirmedPayment, Deposit, Invoice, PaymentTransaction, PaymentVerdict};
pub use reconciliation::{PaymentService, PaymentServiceConfig};
pub use repository::{DepositRepository, InvoiceRepository, PaymentTransactionRepository};
