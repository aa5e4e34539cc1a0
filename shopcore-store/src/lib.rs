pub mod backup;
pub mod config;
pub mod database;
pub mod redis_repo;
pub mod repositories;

pub use backup::{BackupError, BackupWorker};
pub use config::{Config, ConfigError};
pub use database::{DbClient, DbError};
pub use redis_repo::RedisClient;
pub use repositories::{
    PostgresBuyHistoryRepository, PostgresCartRepository, PostgresDepositRepository, PostgresInvoiceRepository,
    PostgresItemRepository, PostgresOrderRepository, PostgresPaymentTransactionRepository,
    PostgresShippingAddressRepository, PostgresStrikeRepository, PostgresUserRepository,
};
