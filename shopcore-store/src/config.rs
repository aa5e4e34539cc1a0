use std::collections::HashMap;

use serde::Deserialize;

const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderConfig {
    pub timeout_minutes: i64,
    pub cancel_grace_period_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    pub tolerance_overpayment_percent: rust_decimal::Decimal,
    pub underpayment_retry_enabled: bool,
    pub underpayment_retry_timeout_minutes: i64,
    pub underpayment_penalty_percent: rust_decimal::Decimal,
    pub late_penalty_percent: rust_decimal::Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountsConfig {
    pub max_strikes_before_ban: i32,
    pub exempt_admins_from_ban: bool,
    pub unban_top_up_amount: rust_decimal::Decimal,
    pub admin_id_list: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackupConfig {
    pub enabled: bool,
    pub interval_hours: i64,
    pub retention_days: i64,
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecretsConfig {
    pub chat_webhook_secret: String,
    pub payment_webhook_secret: String,
    pub shipping_address_encryption_key: String,
    pub backup_encryption_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    pub interval_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhooksConfig {
    pub chat_path: String,
    pub payment_path: String,
    pub bot_api_base: String,
    pub bot_token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentProcessorConfig {
    pub base_url: String,
    pub api_key: String,
}

/// Top-level process configuration, assembled from a base file layered with
/// an environment-specific override and finally environment variables under
/// the `SHOPCORE_` prefix — a three-tier precedence built with the `config`
/// crate.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub currency: String,
    pub server: ServerConfig,
    pub order: OrderConfig,
    pub payment: PaymentConfig,
    pub accounts: AccountsConfig,
    pub backup: BackupConfig,
    pub secrets: SecretsConfig,
    pub scheduler: SchedulerConfig,
    pub webhooks: WebhooksConfig,
    pub payment_processor: PaymentProcessorConfig,
    pub crypto_decimal_places: HashMap<String, u32>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("configuration load failed: {0}")]
    Load(#[from] config::ConfigError),
    #[error("{key} must be at least {min} characters, got {actual}")]
    SecretTooShort { key: &'static str, min: usize, actual: usize },
}

impl Config {
    /// `RUN_MODE` selects the environment-specific override file (e.g.
    /// `config/production.toml`); unset defaults to `development`.
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let raw = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("SHOPCORE").separator("__"))
            .build()?;

        let cfg: Config = raw.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        check_secret("chat webhook secret", &self.secrets.chat_webhook_secret)?;
        check_secret("payment webhook secret", &self.secrets.payment_webhook_secret)?;
        check_secret("shipping address encryption key", &self.secrets.shipping_address_encryption_key)?;
        if self.backup.enabled {
            check_secret("backup encryption key", &self.secrets.backup_encryption_key)?;
        }
        Ok(())
    }
}

fn check_secret(key: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.len() < MIN_SECRET_LEN {
        return Err(ConfigError::SecretTooShort { key, min: MIN_SECRET_LEN, actual: value.len() });
    }
    Ok(())
}
