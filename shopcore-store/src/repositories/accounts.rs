use async_trait::async_trait;
use shopcore_core::{AccountsError, ApprovalStatus, Strike, StrikeRepository, StrikeType, User, UserRepository};
use shopcore_domain::Fiat;
use uuid::Uuid;

use crate::database::DbClient;

#[derive(Clone)]
pub struct PostgresUserRepository {
    db: DbClient,
}

impl PostgresUserRepository {
    pub fn new(db: DbClient) -> Self {
        Self { db }
    }
}

fn approval_to_str(s: ApprovalStatus) -> &'static str {
    match s {
        ApprovalStatus::Approved => "APPROVED",
        ApprovalStatus::Pending => "PENDING",
        ApprovalStatus::ClosedRegistration => "CLOSED_REGISTRATION",
        ApprovalStatus::Rejected => "REJECTED",
    }
}

fn approval_from_str(value: &str) -> Result<ApprovalStatus, AccountsError> {
    Ok(match value {
        "APPROVED" => ApprovalStatus::Approved,
        "PENDING" => ApprovalStatus::Pending,
        "CLOSED_REGISTRATION" => ApprovalStatus::ClosedRegistration,
        "REJECTED" => ApprovalStatus::Rejected,
        other => return Err(AccountsError::Repository(format!("unknown approval status {other}"))),
    })
}

struct UserRow {
    id: Uuid,
    external_id: String,
    display_handle: Option<String>,
    wallet_balance: rust_decimal::Decimal,
    strike_count: i32,
    is_blocked: bool,
    blocked_at: Option<chrono::DateTime<chrono::Utc>>,
    blocked_reason: Option<String>,
    approval_status: String,
    is_admin: bool,
    referrer_id: Option<Uuid>,
    referral_code: Option<String>,
    created_at: chrono::DateTime<chrono::Utc>,
}

fn row_to_user(row: UserRow) -> Result<User, AccountsError> {
    Ok(User {
        id: row.id,
        external_id: row.external_id,
        display_handle: row.display_handle,
        wallet_balance: Fiat::new(row.wallet_balance),
        strike_count: row.strike_count,
        is_blocked: row.is_blocked,
        blocked_at: row.blocked_at,
        blocked_reason: row.blocked_reason,
        approval_status: approval_from_str(&row.approval_status)?,
        is_admin: row.is_admin,
        referrer_id: row.referrer_id,
        referral_code: row.referral_code,
        created_at: row.created_at,
    })
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>, AccountsError> {
        let row = sqlx::query_as!(
            UserRow,
            r#"
            SELECT id, external_id, display_handle, wallet_balance, strike_count, is_blocked, blocked_at,
                   blocked_reason, approval_status, is_admin, referrer_id, referral_code, created_at
            FROM users WHERE id = $1
            "#,
            user_id,
        )
        .fetch_optional(&self.db.pool)
        .await
        .map_err(|e| AccountsError::Repository(e.to_string()))?;
        row.map(row_to_user).transpose()
    }

    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<User>, AccountsError> {
        let row = sqlx::query_as!(
            UserRow,
            r#"
            SELECT id, external_id, display_handle, wallet_balance, strike_count, is_blocked, blocked_at,
                   blocked_reason, approval_status, is_admin, referrer_id, referral_code, created_at
            FROM users WHERE external_id = $1
            "#,
            external_id,
        )
        .fetch_optional(&self.db.pool)
        .await
        .map_err(|e| AccountsError::Repository(e.to_string()))?;
        row.map(row_to_user).transpose()
    }

    async fn save(&self, user: &User) -> Result<(), AccountsError> {
        sqlx::query!(
            r#"
            INSERT INTO users (id, external_id, display_handle, wallet_balance, strike_count, is_blocked,
                                blocked_at, blocked_reason, approval_status, is_admin, referrer_id, referral_code, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (id) DO UPDATE SET
                display_handle = EXCLUDED.display_handle,
                wallet_balance = EXCLUDED.wallet_balance,
                strike_count = EXCLUDED.strike_count,
                is_blocked = EXCLUDED.is_blocked,
                blocked_at = EXCLUDED.blocked_at,
                blocked_reason = EXCLUDED.blocked_reason,
                approval_status = EXCLUDED.approval_status
            "#,
            user.id,
            user.external_id,
            user.display_handle,
            user.wallet_balance.as_decimal(),
            user.strike_count,
            user.is_blocked,
            user.blocked_at,
            user.blocked_reason,
            approval_to_str(user.approval_status),
            user.is_admin,
            user.referrer_id,
            user.referral_code,
            user.created_at,
        )
        .execute(&self.db.pool)
        .await
        .map_err(|e| AccountsError::Repository(e.to_string()))?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct PostgresStrikeRepository {
    db: DbClient,
}

impl PostgresStrikeRepository {
    pub fn new(db: DbClient) -> Self {
        Self { db }
    }
}

fn strike_type_to_str(t: StrikeType) -> &'static str {
    match t {
        StrikeType::Timeout => "TIMEOUT",
        StrikeType::LateCancel => "LATE_CANCEL",
    }
}

#[async_trait]
impl StrikeRepository for PostgresStrikeRepository {
    /// Relies on the `(order_id, strike_type)` uniqueness constraint:
    /// `ON CONFLICT DO NOTHING` makes the insert itself idempotent, and the
    /// row count tells the caller whether a strike was actually recorded.
    async fn insert_if_absent(&self, strike: &Strike) -> Result<bool, AccountsError> {
        let result = sqlx::query!(
            r#"
            INSERT INTO strikes (id, user_id, order_id, strike_type, reason, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (order_id, strike_type) DO NOTHING
            "#,
            Uuid::new_v4(),
            strike.user_id,
            strike.order_id,
            strike_type_to_str(strike.strike_type),
            strike.reason,
            strike.created_at,
        )
        .execute(&self.db.pool)
        .await
        .map_err(|e| AccountsError::Repository(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_for_user(&self, user_id: Uuid) -> Result<i32, AccountsError> {
        let row = sqlx::query!("SELECT COUNT(*) AS count FROM strikes WHERE user_id = $1", user_id)
            .fetch_one(&self.db.pool)
            .await
            .map_err(|e| AccountsError::Repository(e.to_string()))?;
        Ok(row.count.unwrap_or(0) as i32)
    }
}
