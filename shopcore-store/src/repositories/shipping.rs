use async_trait::async_trait;
use shopcore_order::{EncryptionMode, ShippingAddress, ShippingAddressRepository, ShippingError};
use uuid::Uuid;

use crate::database::DbClient;

#[derive(Clone)]
pub struct PostgresShippingAddressRepository {
    db: DbClient,
}

impl PostgresShippingAddressRepository {
    pub fn new(db: DbClient) -> Self {
        Self { db }
    }
}

fn mode_to_str(mode: EncryptionMode) -> &'static str {
    match mode {
        EncryptionMode::Aes => "AES",
        EncryptionMode::Pgp => "PGP",
    }
}

fn mode_from_str(value: &str) -> Result<EncryptionMode, ShippingError> {
    Ok(match value {
        "AES" => EncryptionMode::Aes,
        "PGP" => EncryptionMode::Pgp,
        _ => return Err(ShippingError::InvalidAddress),
    })
}

#[async_trait]
impl ShippingAddressRepository for PostgresShippingAddressRepository {
    async fn save(&self, address: &ShippingAddress) -> Result<(), ShippingError> {
        sqlx::query!(
            r#"
            INSERT INTO shipping_addresses (order_id, ciphertext, encryption_mode)
            VALUES ($1, $2, $3)
            ON CONFLICT (order_id) DO UPDATE SET ciphertext = EXCLUDED.ciphertext, encryption_mode = EXCLUDED.encryption_mode
            "#,
            address.order_id,
            address.ciphertext,
            mode_to_str(address.encryption_mode),
        )
        .execute(&self.db.pool)
        .await
        .map_err(|e| ShippingError::Repository(e.to_string()))?;
        Ok(())
    }

    async fn find_by_order(&self, order_id: Uuid) -> Result<Option<ShippingAddress>, ShippingError> {
        let row = sqlx::query!(
            "SELECT order_id, ciphertext, encryption_mode FROM shipping_addresses WHERE order_id = $1",
            order_id,
        )
        .fetch_optional(&self.db.pool)
        .await
        .map_err(|e| ShippingError::Repository(e.to_string()))?;

        row.map(|r| {
            Ok(ShippingAddress { order_id: r.order_id, ciphertext: r.ciphertext, encryption_mode: mode_from_str(&r.encryption_mode)? })
        })
        .transpose()
    }
}
