use std::path::{Path, PathBuf};
use std::time::Duration;

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use chrono::Utc;
use rand::RngCore;
use sha2::{Digest, Sha256};
use shopcore_domain::NotificationPort;
use tracing::{error, info, warn};

use crate::database::DbClient;

#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    #[error("backup key must decode to 32 bytes, got {0}")]
    InvalidKeyLength(usize),
    #[error("encryption failure: {0}")]
    Encryption(String),
    #[error("database dump failed: {0}")]
    Dump(#[from] sqlx::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("checksum mismatch for {path}")]
    ChecksumMismatch { path: PathBuf },
}

/// Periodically snapshots the full persisted state to an encrypted, checksummed
/// file on disk. Grounded in the original backup job's create → verify → cleanup
/// cycle; the SQLite `.backup()` API and GPG step have no Postgres/AES analogue,
/// so the dump is a plain `COPY`-style text export encrypted with AES-256-GCM
/// instead of SQLCipher, and verification is a SHA-256 digest check rather than
/// restoring into a scratch database.
pub struct BackupWorker<N: NotificationPort> {
    db: DbClient,
    dir: PathBuf,
    cipher: Aes256Gcm,
    retention_days: i64,
    notifier: N,
}

struct UserRow {
    id: uuid::Uuid,
    external_id: String,
    wallet_balance: rust_decimal::Decimal,
    strike_count: i32,
    is_blocked: bool,
    created_at: chrono::DateTime<chrono::Utc>,
}

struct StrikeRow {
    id: uuid::Uuid,
    user_id: uuid::Uuid,
    order_id: uuid::Uuid,
    strike_type: String,
    created_at: chrono::DateTime<chrono::Utc>,
}

struct ItemRow {
    id: uuid::Uuid,
    subcategory_id: uuid::Uuid,
    price: rust_decimal::Decimal,
    is_sold: bool,
    order_id: Option<uuid::Uuid>,
}

struct CartRow {
    id: uuid::Uuid,
    user_id: uuid::Uuid,
    created_at: chrono::DateTime<chrono::Utc>,
}

struct CartItemRow {
    cart_id: uuid::Uuid,
    subcategory_id: uuid::Uuid,
    quantity: i32,
}

struct OrderDumpRow {
    id: uuid::Uuid,
    user_id: uuid::Uuid,
    status: String,
    total_price: rust_decimal::Decimal,
    created_at: chrono::DateTime<chrono::Utc>,
}

struct InvoiceRow {
    id: uuid::Uuid,
    order_id: Option<uuid::Uuid>,
    user_id: uuid::Uuid,
    fiat_amount: rust_decimal::Decimal,
    is_active: bool,
}

struct TransactionRow {
    id: uuid::Uuid,
    order_id: Option<uuid::Uuid>,
    processor_transaction_id: String,
    fiat_amount: rust_decimal::Decimal,
}

struct ShippingAddressRow {
    order_id: uuid::Uuid,
    encryption_mode: String,
    created_at: chrono::DateTime<chrono::Utc>,
}

struct BuyHistoryRow {
    id: uuid::Uuid,
    order_id: uuid::Uuid,
    user_id: uuid::Uuid,
    item_count: i32,
    total_price: rust_decimal::Decimal,
}

struct DepositRow {
    id: uuid::Uuid,
    user_id: uuid::Uuid,
    fiat_amount: rust_decimal::Decimal,
    is_paid: bool,
}

impl<N: NotificationPort> BackupWorker<N> {
    pub fn new(
        db: DbClient,
        dir: impl Into<PathBuf>,
        encryption_key_hex: &str,
        retention_days: i64,
        notifier: N,
    ) -> Result<Self, BackupError> {
        let key_bytes = hex::decode(encryption_key_hex).map_err(|_| BackupError::InvalidKeyLength(0))?;
        if key_bytes.len() != 32 {
            return Err(BackupError::InvalidKeyLength(key_bytes.len()));
        }
        let cipher = Aes256Gcm::new_from_slice(&key_bytes).map_err(|e| BackupError::Encryption(e.to_string()))?;
        Ok(Self { db, dir: dir.into(), cipher, retention_days, notifier })
    }

    /// Runs forever, firing a backup-and-cleanup cycle on `interval`. Intended
    /// to be spawned as a background task alongside the payment-timeout sweep.
    pub async fn run_forever(self, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            self.run_cycle().await;
        }
    }

    pub async fn run_cycle(&self) {
        info!("starting scheduled backup cycle");
        match self.create_backup().await {
            Ok(path) => match self.verify_backup(&path) {
                Ok(true) => info!(path = %path.display(), "backup created and verified"),
                Ok(false) => {
                    error!(path = %path.display(), "backup checksum verification failed");
                    self.notifier
                        .notify_admins(format!("backup verification failed for {}", path.display()))
                        .await;
                }
                Err(e) => {
                    error!(error = %e, "backup verification errored");
                    self.notifier.notify_admins(format!("backup verification errored: {e}")).await;
                }
            },
            Err(e) => error!(error = %e, "backup creation failed"),
        }

        match self.cleanup_old_backups() {
            Ok(removed) => info!(removed, "backup cleanup complete"),
            Err(e) => warn!(error = %e, "backup cleanup failed"),
        }
    }

    /// Dumps every persisted table as a tab-separated section, one per
    /// table, so a restore can be done by hand if the structured replay
    /// tooling is unavailable.
    async fn create_backup(&self) -> Result<PathBuf, BackupError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let mut plaintext = String::new();

        let users = sqlx::query_as!(
            UserRow,
            "SELECT id, external_id, wallet_balance, strike_count, is_blocked, created_at FROM users ORDER BY created_at"
        )
        .fetch_all(&self.db.pool)
        .await?;
        plaintext.push_str("# users\n");
        for row in users {
            plaintext.push_str(&format!(
                "{}\t{}\t{}\t{}\t{}\t{}\n",
                row.id, row.external_id, row.wallet_balance, row.strike_count, row.is_blocked, row.created_at.to_rfc3339()
            ));
        }

        let strikes = sqlx::query_as!(
            StrikeRow,
            "SELECT id, user_id, order_id, strike_type, created_at FROM strikes ORDER BY created_at"
        )
        .fetch_all(&self.db.pool)
        .await?;
        plaintext.push_str("# strikes\n");
        for row in strikes {
            plaintext.push_str(&format!(
                "{}\t{}\t{}\t{}\t{}\n",
                row.id, row.user_id, row.order_id, row.strike_type, row.created_at.to_rfc3339()
            ));
        }

        let items = sqlx::query_as!(ItemRow, "SELECT id, subcategory_id, price, is_sold, order_id FROM items ORDER BY id")
            .fetch_all(&self.db.pool)
            .await?;
        plaintext.push_str("# items\n");
        for row in items {
            plaintext.push_str(&format!(
                "{}\t{}\t{}\t{}\t{}\n",
                row.id,
                row.subcategory_id,
                row.price,
                row.is_sold,
                row.order_id.map(|id| id.to_string()).unwrap_or_default()
            ));
        }

        let carts = sqlx::query_as!(CartRow, "SELECT id, user_id, created_at FROM carts ORDER BY created_at")
            .fetch_all(&self.db.pool)
            .await?;
        plaintext.push_str("# carts\n");
        for row in carts {
            plaintext.push_str(&format!("{}\t{}\t{}\n", row.id, row.user_id, row.created_at.to_rfc3339()));
        }

        let cart_items = sqlx::query_as!(CartItemRow, "SELECT cart_id, subcategory_id, quantity FROM cart_items ORDER BY cart_id")
            .fetch_all(&self.db.pool)
            .await?;
        plaintext.push_str("# cart_items\n");
        for row in cart_items {
            plaintext.push_str(&format!("{}\t{}\t{}\n", row.cart_id, row.subcategory_id, row.quantity));
        }

        let orders = sqlx::query_as!(
            OrderDumpRow,
            "SELECT id, user_id, status, total_price, created_at FROM orders ORDER BY created_at"
        )
        .fetch_all(&self.db.pool)
        .await?;
        plaintext.push_str("# orders\n");
        for row in orders {
            plaintext.push_str(&format!(
                "{}\t{}\t{}\t{}\t{}\n",
                row.id, row.user_id, row.status, row.total_price, row.created_at.to_rfc3339()
            ));
        }

        let invoices = sqlx::query_as!(
            InvoiceRow,
            "SELECT id, order_id, user_id, fiat_amount, is_active FROM invoices ORDER BY created_at"
        )
        .fetch_all(&self.db.pool)
        .await?;
        plaintext.push_str("# invoices\n");
        for row in invoices {
            plaintext.push_str(&format!(
                "{}\t{}\t{}\t{}\t{}\n",
                row.id,
                row.order_id.map(|id| id.to_string()).unwrap_or_default(),
                row.user_id,
                row.fiat_amount,
                row.is_active
            ));
        }

        let transactions = sqlx::query_as!(
            TransactionRow,
            "SELECT id, order_id, processor_transaction_id, fiat_amount FROM payment_transactions ORDER BY received_at"
        )
        .fetch_all(&self.db.pool)
        .await?;
        plaintext.push_str("# payment_transactions\n");
        for row in transactions {
            plaintext.push_str(&format!(
                "{}\t{}\t{}\t{}\n",
                row.id,
                row.order_id.map(|id| id.to_string()).unwrap_or_default(),
                row.processor_transaction_id,
                row.fiat_amount
            ));
        }

        let shipping_addresses = sqlx::query_as!(
            ShippingAddressRow,
            "SELECT order_id, encryption_mode, created_at FROM shipping_addresses ORDER BY created_at"
        )
        .fetch_all(&self.db.pool)
        .await?;
        plaintext.push_str("# shipping_addresses\n");
        for row in shipping_addresses {
            plaintext.push_str(&format!("{}\t{}\t{}\n", row.order_id, row.encryption_mode, row.created_at.to_rfc3339()));
        }

        let buy_history = sqlx::query_as!(
            BuyHistoryRow,
            "SELECT id, order_id, user_id, item_count, total_price FROM buy_history ORDER BY created_at"
        )
        .fetch_all(&self.db.pool)
        .await?;
        plaintext.push_str("# buy_history\n");
        for row in buy_history {
            plaintext.push_str(&format!(
                "{}\t{}\t{}\t{}\t{}\n",
                row.id, row.order_id, row.user_id, row.item_count, row.total_price
            ));
        }

        let deposits = sqlx::query_as!(DepositRow, "SELECT id, user_id, fiat_amount, is_paid FROM deposits ORDER BY received_at")
            .fetch_all(&self.db.pool)
            .await?;
        plaintext.push_str("# deposits\n");
        for row in deposits {
            plaintext.push_str(&format!("{}\t{}\t{}\t{}\n", row.id, row.user_id, row.fiat_amount, row.is_paid));
        }

        let ciphertext = self.encrypt(plaintext.as_bytes())?;

        let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
        let backup_path = self.dir.join(format!("shopcore_backup_{timestamp}.bin"));
        tokio::fs::write(&backup_path, &ciphertext).await?;
        self.write_checksum(&backup_path, &ciphertext)?;

        Ok(backup_path)
    }

    /// Nonce is generated fresh per call and prefixed to the ciphertext; AES-GCM
    /// never reuses a nonce under the same key.
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, BackupError> {
        let mut nonce_bytes = [0u8; 12];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let mut ciphertext = self.cipher.encrypt(nonce, plaintext).map_err(|e| BackupError::Encryption(e.to_string()))?;
        let mut out = nonce_bytes.to_vec();
        out.append(&mut ciphertext);
        Ok(out)
    }

    fn write_checksum(&self, backup_path: &Path, ciphertext: &[u8]) -> Result<(), BackupError> {
        let digest = Sha256::digest(ciphertext);
        let checksum_path = backup_path.with_extension("bin.sha256");
        let file_name = backup_path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        std::fs::write(checksum_path, format!("{:x}  {}\n", digest, file_name))?;
        Ok(())
    }

    fn verify_backup(&self, backup_path: &Path) -> Result<bool, BackupError> {
        let checksum_path = backup_path.with_extension("bin.sha256");
        let recorded = std::fs::read_to_string(&checksum_path)?;
        let expected = recorded.split_whitespace().next().unwrap_or_default();

        let ciphertext = std::fs::read(backup_path)?;
        let actual = format!("{:x}", Sha256::digest(&ciphertext));

        Ok(actual == expected)
    }

    fn cleanup_old_backups(&self) -> Result<usize, BackupError> {
        let cutoff = Utc::now() - chrono::Duration::days(self.retention_days);
        let mut removed = 0;

        for entry in std::fs::read_dir(&self.dir)?.flatten() {
            let path = entry.path();
            let is_backup_artifact = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with("shopcore_backup_"))
                .unwrap_or(false);
            if !is_backup_artifact {
                continue;
            }

            let modified: chrono::DateTime<Utc> = entry.metadata()?.modified()?.into();
            if modified < cutoff {
                std::fs::remove_file(&path)?;
                if path.extension().and_then(|e| e.to_str()) == Some("bin") {
                    removed += 1;
                }
            }
        }

        Ok(removed)
    }
}
