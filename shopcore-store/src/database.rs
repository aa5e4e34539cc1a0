use sqlx::postgres::{PgPool, PgPoolOptions};

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("database connection failed: {0}")]
    Connect(#[source] sqlx::Error),
    #[error("migration failed: {0}")]
    Migrate(#[source] sqlx::migrate::MigrateError),
}

/// Thin wrapper around the shared connection pool — a single pool handed to
/// every repository implementation rather than opening a connection per
/// call.
#[derive(Clone)]
pub struct DbClient {
    pub pool: PgPool,
}

impl DbClient {
    pub async fn new(database_url: &str) -> Result<Self, DbError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(DbError::Connect)?;
        Ok(Self { pool })
    }

    /// Runs the workspace-level `migrations/` directory against the pool at
    /// startup, before anything else touches the database.
    pub async fn migrate(&self) -> Result<(), DbError> {
        sqlx::migrate!("../migrations").run(&self.pool).await.map_err(DbError::Migrate)
    }
}
