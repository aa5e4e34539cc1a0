use async_trait::async_trait;
use shopcore_domain::Fiat;
use shopcore_payment::{PaymentError, PaymentTransaction, PaymentTransactionRepository};
use uuid::Uuid;

use crate::database::DbClient;

#[derive(Clone)]
pub struct PostgresPaymentTransactionRepository {
    db: DbClient,
}

impl PostgresPaymentTransactionRepository {
    pub fn new(db: DbClient) -> Self {
        Self { db }
    }
}

struct TransactionRow {
    id: Uuid,
    order_id: Option<Uuid>,
    user_id: Uuid,
    invoice_id: Option<Uuid>,
    processor_transaction_id: String,
    crypto_currency: String,
    crypto_amount: rust_decimal::Decimal,
    fiat_amount: rust_decimal::Decimal,
    is_overpayment: bool,
    received_at: chrono::DateTime<chrono::Utc>,
}

fn row_to_transaction(row: TransactionRow) -> Result<PaymentTransaction, PaymentError> {
    Ok(PaymentTransaction {
        id: row.id,
        order_id: row.order_id,
        user_id: row.user_id,
        invoice_id: row.invoice_id,
        processor_transaction_id: row.processor_transaction_id,
        crypto_currency: crate::repositories::invoices::crypto_from_str(&row.crypto_currency)?,
        crypto_amount: row.crypto_amount,
        fiat_amount: Fiat::new(row.fiat_amount),
        is_overpayment: row.is_overpayment,
        received_at: row.received_at,
    })
}

#[async_trait]
impl PaymentTransactionRepository for PostgresPaymentTransactionRepository {
    async fn insert(&self, transaction: &PaymentTransaction) -> Result<(), PaymentError> {
        sqlx::query!(
            r#"
            INSERT INTO payment_transactions (id, order_id, user_id, invoice_id, processor_transaction_id,
                                               crypto_currency, crypto_amount, fiat_amount, is_overpayment, received_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (processor_transaction_id) DO NOTHING
            "#,
            transaction.id,
            transaction.order_id,
            transaction.user_id,
            transaction.invoice_id,
            transaction.processor_transaction_id,
            crate::repositories::invoices::crypto_to_str(transaction.crypto_currency),
            transaction.crypto_amount,
            transaction.fiat_amount.as_decimal(),
            transaction.is_overpayment,
            transaction.received_at,
        )
        .execute(&self.db.pool)
        .await
        .map_err(|e| PaymentError::Repository(e.to_string()))?;
        Ok(())
    }

    async fn find_all_by_order(&self, order_id: Uuid) -> Result<Vec<PaymentTransaction>, PaymentError> {
        let rows = sqlx::query_as!(
            TransactionRow,
            r#"
            SELECT id, order_id, user_id, invoice_id, processor_transaction_id, crypto_currency,
                   crypto_amount, fiat_amount, is_overpayment, received_at
            FROM payment_transactions WHERE order_id = $1 ORDER BY received_at
            "#,
            order_id,
        )
        .fetch_all(&self.db.pool)
        .await
        .map_err(|e| PaymentError::Repository(e.to_string()))?;
        rows.into_iter().map(row_to_transaction).collect()
    }
}
