use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use async_trait::async_trait;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EncryptionMode {
    Aes,
    Pgp,
}

/// Plaintext is never persisted; only the ciphertext and the mode used to
/// produce it. PGP is carried as a data-model option but this core never
/// performs PGP encryption itself — see `encrypt_address`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub order_id: Uuid,
    pub ciphertext: Vec<u8>,
    pub encryption_mode: EncryptionMode,
}

#[derive(Debug, thiserror::Error)]
pub enum ShippingError {
    #[error("no shipping address on file for order {0}")]
    MissingAddress(Uuid),
    #[error("shipping address payload is invalid")]
    InvalidAddress,
    #[error("PGP key not configured for this deployment")]
    PgpKeyNotConfigured,
    #[error("shipping address encryption is not configured")]
    DomainNotConfigured,
    #[error("encryption failure: {0}")]
    Encryption(String),
    #[error("repository error: {0}")]
    Repository(String),
}

#[async_trait]
pub trait ShippingAddressRepository: Send + Sync {
    async fn save(&self, address: &ShippingAddress) -> Result<(), ShippingError>;
    async fn find_by_order(&self, order_id: Uuid) -> Result<Option<ShippingAddress>, ShippingError>;
}

/// Encrypts a plaintext shipping address with AES-256-GCM under the
/// configured key. The nonce is generated fresh per call and prefixed to
/// the returned ciphertext. PGP mode is rejected here — no keyring is
/// managed by this core (see the module's Non-goal).
pub fn encrypt_address(plaintext: &str, key: &[u8; 32], mode: EncryptionMode) -> Result<Vec<u8>, ShippingError> {
    if mode == EncryptionMode::Pgp {
        return Err(ShippingError::PgpKeyNotConfigured);
    }
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|e| ShippingError::Encryption(e.to_string()))?;

    let mut nonce_bytes = [0u8; 12];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let mut ciphertext =
        cipher.encrypt(nonce, plaintext.as_bytes()).map_err(|e| ShippingError::Encryption(e.to_string()))?;
    let mut out = nonce_bytes.to_vec();
    out.append(&mut ciphertext);
    Ok(out)
}

pub fn decrypt_address(ciphertext: &[u8], key: &[u8; 32]) -> Result<String, ShippingError> {
    if ciphertext.len() < 12 {
        return Err(ShippingError::InvalidAddress);
    }
    let (nonce_bytes, body) = ciphertext.split_at(12);
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|e| ShippingError::Encryption(e.to_string()))?;
    let nonce = Nonce::from_slice(nonce_bytes);
    let plaintext = cipher.decrypt(nonce, body).map_err(|e| ShippingError::Encryption(e.to_string()))?;
    String::from_utf8(plaintext).map_err(|_| ShippingError::InvalidAddress)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_encrypt_decrypt() {
        let key = [7u8; 32];
        let ciphertext = encrypt_address("123 Main St", &key, EncryptionMode::Aes).unwrap();
        let plaintext = decrypt_address(&ciphertext, &key).unwrap();
        assert_eq!(plaintext, "123 Main St");
    }

    #[test]
    fn pgp_mode_is_rejected() {
        let key = [7u8; 32];
        let err = encrypt_address("123 Main St", &key, EncryptionMode::Pgp).unwrap_err();
        assert!(matches!(err, ShippingError::PgpKeyNotConfigured));
    }

    #[test]
    fn wrong_key_fails_to_decrypt() {
        let key = [7u8; 32];
        let other_key = [9u8; 32];
        let ciphertext = encrypt_address("123 Main St", &key, EncryptionMode::Aes).unwrap();
        assert!(decrypt_address(&ciphertext, &other_key).is_err());
    }
}
