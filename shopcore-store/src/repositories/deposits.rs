use async_trait::async_trait;
use shopcore_domain::Fiat;
use shopcore_payment::{Deposit, DepositRepository, PaymentError};
use uuid::Uuid;

use crate::database::DbClient;

#[derive(Clone)]
pub struct PostgresDepositRepository {
    db: DbClient,
}

impl PostgresDepositRepository {
    pub fn new(db: DbClient) -> Self {
        Self { db }
    }
}

struct DepositRow {
    id: Uuid,
    user_id: Uuid,
    crypto_currency: String,
    crypto_amount: Option<rust_decimal::Decimal>,
    fiat_amount: rust_decimal::Decimal,
    payment_address: Option<String>,
    processing_id: String,
    received_at: chrono::DateTime<chrono::Utc>,
    is_paid: bool,
}

fn row_to_deposit(row: DepositRow) -> Result<Deposit, PaymentError> {
    Ok(Deposit {
        id: row.id,
        user_id: row.user_id,
        crypto_currency: crate::repositories::invoices::crypto_from_str(&row.crypto_currency)?,
        crypto_amount: row.crypto_amount,
        fiat_amount: Fiat::new(row.fiat_amount),
        payment_address: row.payment_address,
        processing_id: row.processing_id,
        received_at: row.received_at,
        is_paid: row.is_paid,
    })
}

#[async_trait]
impl DepositRepository for PostgresDepositRepository {
    async fn insert(&self, deposit: &Deposit) -> Result<(), PaymentError> {
        sqlx::query!(
            r#"
            INSERT INTO deposits (id, user_id, crypto_currency, crypto_amount, fiat_amount,
                                   payment_address, processing_id, received_at, is_paid)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
            deposit.id,
            deposit.user_id,
            crate::repositories::invoices::crypto_to_str(deposit.crypto_currency),
            deposit.crypto_amount,
            deposit.fiat_amount.as_decimal(),
            deposit.payment_address,
            deposit.processing_id,
            deposit.received_at,
            deposit.is_paid,
        )
        .execute(&self.db.pool)
        .await
        .map_err(|e| PaymentError::Repository(e.to_string()))?;
        Ok(())
    }

    async fn find_by_processing_id(&self, processing_id: &str) -> Result<Option<Deposit>, PaymentError> {
        let row = sqlx::query_as!(
            DepositRow,
            r#"
            SELECT id, user_id, crypto_currency, crypto_amount, fiat_amount, payment_address,
                   processing_id, received_at, is_paid
            FROM deposits WHERE processing_id = $1
            "#,
            processing_id,
        )
        .fetch_optional(&self.db.pool)
        .await
        .map_err(|e| PaymentError::Repository(e.to_string()))?;
        row.map(row_to_deposit).transpose()
    }

    /// `ON CONFLICT` is unnecessary here — the row already exists from
    /// `insert`; this only ever flips the one flag.
    async fn mark_paid(&self, deposit_id: Uuid) -> Result<(), PaymentError> {
        sqlx::query!("UPDATE deposits SET is_paid = TRUE WHERE id = $1", deposit_id)
            .execute(&self.db.pool)
            .await
            .map_err(|e| PaymentError::Repository(e.to_string()))?;
        Ok(())
    }
}
