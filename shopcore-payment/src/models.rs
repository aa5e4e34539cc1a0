use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shopcore_domain::{CryptoAmount, CryptoCurrency, Fiat};
use uuid::Uuid;

/// A quoted order-payment request, crypto-backed or wallet-only. `is_active`
/// false means the invoice was superseded (e.g. by an underpayment retry)
/// but is retained for the payment history view. Deposits (wallet top-ups)
/// are never represented as an `Invoice` — they have their own `Deposit`
/// model and lookup path, since they stem from a different webhook branch
/// and carry no `order_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: Uuid,
    pub order_id: Option<Uuid>,
    pub user_id: Uuid,
    pub invoice_number: String,
    pub payment_processing_id: Option<String>,
    pub payment_address: Option<String>,
    pub fiat_amount: Fiat,
    pub fiat_currency: String,
    pub crypto_currency: CryptoCurrency,
    pub payment_amount_crypto: Option<rust_decimal::Decimal>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
}

/// A standalone wallet top-up ledger entry. `is_paid` guards the webhook
/// handler against crediting the same top-up twice on a redelivered event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deposit {
    pub id: Uuid,
    pub user_id: Uuid,
    pub crypto_currency: CryptoCurrency,
    pub crypto_amount: Option<rust_decimal::Decimal>,
    pub fiat_amount: Fiat,
    pub payment_address: Option<String>,
    pub processing_id: String,
    pub received_at: DateTime<Utc>,
    pub is_paid: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentTransaction {
    pub id: Uuid,
    pub order_id: Option<Uuid>,
    pub user_id: Uuid,
    pub invoice_id: Option<Uuid>,
    pub processor_transaction_id: String,
    pub crypto_currency: CryptoCurrency,
    pub crypto_amount: rust_decimal::Decimal,
    pub fiat_amount: Fiat,
    pub is_overpayment: bool,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentVerdict {
    CurrencyMismatch,
    LatePayment,
    ExactMatch,
    MinorOverpayment,
    Overpayment,
    Underpayment,
}

/// The normalized payload the classifier and reconciliation engine work
/// from, already converted out of raw wire decimals.
#[derive(Debug, Clone, Copy)]
pub struct ConfirmedPayment {
    pub paid: CryptoAmount,
    pub required: CryptoAmount,
    pub paid_currency: CryptoCurrency,
    pub required_currency: CryptoCurrency,
    pub now: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
}
