use async_trait::async_trait;
use shopcore_domain::{CryptoCurrency, Fiat};
use shopcore_payment::{Invoice, InvoiceRepository, PaymentError};
use uuid::Uuid;

use crate::database::DbClient;

#[derive(Clone)]
pub struct PostgresInvoiceRepository {
    db: DbClient,
}

impl PostgresInvoiceRepository {
    pub fn new(db: DbClient) -> Self {
        Self { db }
    }
}

pub(crate) fn crypto_to_str(c: CryptoCurrency) -> &'static str {
    match c {
        CryptoCurrency::Btc => "BTC",
        CryptoCurrency::Ltc => "LTC",
        CryptoCurrency::Eth => "ETH",
        CryptoCurrency::Sol => "SOL",
        CryptoCurrency::Bnb => "BNB",
        CryptoCurrency::UsdtTrc20 => "USDT_TRC20",
        CryptoCurrency::UsdtErc20 => "USDT_ERC20",
        CryptoCurrency::UsdcErc20 => "USDC_ERC20",
    }
}

pub(crate) fn crypto_from_str(value: &str) -> Result<CryptoCurrency, PaymentError> {
    Ok(match value {
        "BTC" => CryptoCurrency::Btc,
        "LTC" => CryptoCurrency::Ltc,
        "ETH" => CryptoCurrency::Eth,
        "SOL" => CryptoCurrency::Sol,
        "BNB" => CryptoCurrency::Bnb,
        "USDT_TRC20" => CryptoCurrency::UsdtTrc20,
        "USDT_ERC20" => CryptoCurrency::UsdtErc20,
        "USDC_ERC20" => CryptoCurrency::UsdcErc20,
        other => return Err(PaymentError::Repository(format!("unknown crypto currency {other}"))),
    })
}

struct InvoiceRow {
    id: Uuid,
    order_id: Option<Uuid>,
    user_id: Uuid,
    invoice_number: String,
    payment_processing_id: Option<String>,
    payment_address: Option<String>,
    fiat_amount: rust_decimal::Decimal,
    fiat_currency: String,
    crypto_currency: String,
    payment_amount_crypto: Option<rust_decimal::Decimal>,
    created_at: chrono::DateTime<chrono::Utc>,
    expires_at: chrono::DateTime<chrono::Utc>,
    is_active: bool,
}

fn row_to_invoice(row: InvoiceRow) -> Result<Invoice, PaymentError> {
    Ok(Invoice {
        id: row.id,
        order_id: row.order_id,
        user_id: row.user_id,
        invoice_number: row.invoice_number,
        payment_processing_id: row.payment_processing_id,
        payment_address: row.payment_address,
        fiat_amount: Fiat::new(row.fiat_amount),
        fiat_currency: row.fiat_currency,
        crypto_currency: crypto_from_str(&row.crypto_currency)?,
        payment_amount_crypto: row.payment_amount_crypto,
        created_at: row.created_at,
        expires_at: row.expires_at,
        is_active: row.is_active,
    })
}

#[async_trait]
impl InvoiceRepository for PostgresInvoiceRepository {
    async fn insert(&self, invoice: &Invoice) -> Result<(), PaymentError> {
        sqlx::query!(
            r#"
            INSERT INTO invoices (id, order_id, user_id, invoice_number, payment_processing_id,
                                   payment_address, fiat_amount, fiat_currency, crypto_currency,
                                   payment_amount_crypto, created_at, expires_at, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
            invoice.id,
            invoice.order_id,
            invoice.user_id,
            invoice.invoice_number,
            invoice.payment_processing_id,
            invoice.payment_address,
            invoice.fiat_amount.as_decimal(),
            invoice.fiat_currency,
            crypto_to_str(invoice.crypto_currency),
            invoice.payment_amount_crypto,
            invoice.created_at,
            invoice.expires_at,
            invoice.is_active,
        )
        .execute(&self.db.pool)
        .await
        .map_err(|e| PaymentError::Repository(e.to_string()))?;
        Ok(())
    }

    async fn exists_with_number(&self, invoice_number: &str) -> Result<bool, PaymentError> {
        let row = sqlx::query!("SELECT id FROM invoices WHERE invoice_number = $1", invoice_number)
            .fetch_optional(&self.db.pool)
            .await
            .map_err(|e| PaymentError::Repository(e.to_string()))?;
        Ok(row.is_some())
    }

    async fn find_active_by_order(&self, order_id: Uuid) -> Result<Option<Invoice>, PaymentError> {
        let row = sqlx::query_as!(
            InvoiceRow,
            r#"
            SELECT id, order_id, user_id, invoice_number, payment_processing_id, payment_address,
                   fiat_amount, fiat_currency, crypto_currency, payment_amount_crypto, created_at, expires_at, is_active
            FROM invoices WHERE order_id = $1 AND is_active ORDER BY created_at LIMIT 1
            "#,
            order_id,
        )
        .fetch_optional(&self.db.pool)
        .await
        .map_err(|e| PaymentError::Repository(e.to_string()))?;
        row.map(row_to_invoice).transpose()
    }

    async fn find_all_by_order(&self, order_id: Uuid) -> Result<Vec<Invoice>, PaymentError> {
        let rows = sqlx::query_as!(
            InvoiceRow,
            r#"
            SELECT id, order_id, user_id, invoice_number, payment_processing_id, payment_address,
                   fiat_amount, fiat_currency, crypto_currency, payment_amount_crypto, created_at, expires_at, is_active
            FROM invoices WHERE order_id = $1 ORDER BY created_at
            "#,
            order_id,
        )
        .fetch_all(&self.db.pool)
        .await
        .map_err(|e| PaymentError::Repository(e.to_string()))?;
        rows.into_iter().map(row_to_invoice).collect()
    }

    async fn find_by_processing_id(&self, processing_id: &str) -> Result<Option<Invoice>, PaymentError> {
        let row = sqlx::query_as!(
            InvoiceRow,
            r#"
            SELECT id, order_id, user_id, invoice_number, payment_processing_id, payment_address,
                   fiat_amount, fiat_currency, crypto_currency, payment_amount_crypto, created_at, expires_at, is_active
            FROM invoices WHERE payment_processing_id = $1
            "#,
            processing_id,
        )
        .fetch_optional(&self.db.pool)
        .await
        .map_err(|e| PaymentError::Repository(e.to_string()))?;
        row.map(row_to_invoice).transpose()
    }

    async fn mark_inactive(&self, invoice_id: Uuid) -> Result<(), PaymentError> {
        sqlx::query!("UPDATE invoices SET is_active = FALSE WHERE id = $1", invoice_id)
            .execute(&self.db.pool)
            .await
            .map_err(|e| PaymentError::Repository(e.to_string()))?;
        Ok(())
    }
}
