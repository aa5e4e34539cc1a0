use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shopcore_domain::{Fiat, NotificationPort};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
    Approved,
    Pending,
    ClosedRegistration,
    Rejected,
}

/// A buyer, identified by the chat platform's own id. Referral fields are
/// carried for downstream reporting but never interpreted by this core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub external_id: String,
    pub display_handle: Option<String>,
    pub wallet_balance: Fiat,
    pub strike_count: i32,
    pub is_blocked: bool,
    pub blocked_at: Option<DateTime<Utc>>,
    pub blocked_reason: Option<String>,
    pub approval_status: ApprovalStatus,
    pub is_admin: bool,
    pub referrer_id: Option<Uuid>,
    pub referral_code: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(external_id: String, is_admin: bool) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            external_id,
            display_handle: None,
            wallet_balance: Fiat::ZERO,
            strike_count: 0,
            is_blocked: false,
            blocked_at: None,
            blocked_reason: None,
            approval_status: ApprovalStatus::Approved,
            is_admin,
            referrer_id: None,
            referral_code: None,
            created_at: now,
        }
    }

    /// Admins accrue strikes like anyone else (for audit visibility) but are
    /// never flipped to blocked by the ban check when exempt.
    pub fn is_exempt_from_ban(&self, exempt_admins_from_ban: bool) -> bool {
        self.is_admin && exempt_admins_from_ban
    }

    pub fn credit_wallet(&mut self, amount: Fiat) {
        self.wallet_balance = self.wallet_balance.checked_add(amount).unwrap_or(self.wallet_balance);
    }

    /// Debits at most the available balance; never drives the balance
    /// negative (universal invariant 5).
    pub fn debit_wallet_capped(&mut self, amount: Fiat) -> Fiat {
        let debited = self.wallet_balance.min(amount);
        self.wallet_balance = self.wallet_balance.checked_sub(debited).unwrap_or(Fiat::ZERO);
        debited
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StrikeType {
    Timeout,
    LateCancel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Strike {
    pub user_id: Uuid,
    pub order_id: Uuid,
    pub strike_type: StrikeType,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum AccountsError {
    #[error("user not found: {0}")]
    NotFound(Uuid),
    #[error("user is banned: {reason}")]
    Banned { reason: String },
    #[error("insufficient wallet balance: have {have}, need {need}")]
    InsufficientBalance { have: Fiat, need: Fiat },
    #[error("repository error: {0}")]
    Repository(String),
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>, AccountsError>;
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<User>, AccountsError>;
    async fn save(&self, user: &User) -> Result<(), AccountsError>;
}

#[async_trait]
pub trait StrikeRepository: Send + Sync {
    /// Returns `false` without inserting if a strike already exists for
    /// `(order_id, strike_type)` — the idempotency contract in §4.5.
    async fn insert_if_absent(&self, strike: &Strike) -> Result<bool, AccountsError>;
    async fn count_for_user(&self, user_id: Uuid) -> Result<i32, AccountsError>;
}

/// Coordinates strike accrual and the ban/unban threshold. Grounded in the
/// original `_add_strike_and_check_ban` flow: insert is idempotent per
/// order+type, the cache is always recomputed from the ledger rather than
/// incremented in place, and admin exemption is checked before flipping
/// `is_blocked`.
pub struct StrikeEnforcer<N: NotificationPort> {
    max_strikes_before_ban: i32,
    exempt_admins_from_ban: bool,
    notifier: N,
}

impl<N: NotificationPort> StrikeEnforcer<N> {
    pub fn new(max_strikes_before_ban: i32, exempt_admins_from_ban: bool, notifier: N) -> Self {
        Self { max_strikes_before_ban, exempt_admins_from_ban, notifier }
    }

    /// Records a strike (idempotent per order+type), recounts from the
    /// ledger, and bans the user if the threshold is crossed and they are
    /// not admin-exempt. Returns the user's up-to-date strike count.
    pub async fn record_strike<S: StrikeRepository, U: UserRepository>(
        &self,
        strikes: &S,
        users: &U,
        mut user: User,
        order_id: Uuid,
        strike_type: StrikeType,
        reason: String,
    ) -> Result<User, AccountsError> {
        let strike = Strike { user_id: user.id, order_id, strike_type, reason, created_at: Utc::now() };
        let inserted = strikes.insert_if_absent(&strike).await?;
        if !inserted {
            return Ok(user);
        }

        let recounted = strikes.count_for_user(user.id).await?;
        user.strike_count = recounted;

        if recounted >= self.max_strikes_before_ban
            && !user.is_blocked
            && !user.is_exempt_from_ban(self.exempt_admins_from_ban)
        {
            user.is_blocked = true;
            user.blocked_at = Some(Utc::now());
            user.blocked_reason = Some(format!("reached {} strikes", recounted));
            users.save(&user).await?;
            self.notifier
                .notify_user(user.id, "Your account has been blocked for repeated policy violations.".to_string())
                .await;
            self.notifier
                .notify_admins(format!("user {} auto-banned at {} strikes", user.external_id, recounted))
                .await;
        } else {
            users.save(&user).await?;
        }

        Ok(user)
    }

    /// Unban happens exclusively through a confirmed deposit of at least
    /// `unban_top_up_amount`. Strike count is preserved.
    pub async fn maybe_unban<U: UserRepository>(
        &self,
        users: &U,
        mut user: User,
        deposit_fiat: Fiat,
        unban_top_up_amount: Fiat,
    ) -> Result<User, AccountsError> {
        if user.is_blocked && deposit_fiat >= unban_top_up_amount {
            user.is_blocked = false;
            user.blocked_reason = Some("unbanned via wallet top-up".to_string());
            users.save(&user).await?;
            self.notifier
                .notify_user(user.id, "Your account has been unblocked after your top-up.".to_string())
                .await;
        }
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shopcore_domain::NoopNotifier;
    use std::sync::Mutex;

    struct InMemoryStrikes {
        rows: Mutex<Vec<Strike>>,
    }

    #[async_trait]
    impl StrikeRepository for InMemoryStrikes {
        async fn insert_if_absent(&self, strike: &Strike) -> Result<bool, AccountsError> {
            let mut rows = self.rows.lock().unwrap();
            if rows
                .iter()
                .any(|s| s.order_id == strike.order_id && s.strike_type == strike.strike_type)
            {
                return Ok(false);
            }
            rows.push(strike.clone());
            Ok(true)
        }

        async fn count_for_user(&self, user_id: Uuid) -> Result<i32, AccountsError> {
            let rows = self.rows.lock().unwrap();
            Ok(rows.iter().filter(|s| s.user_id == user_id).count() as i32)
        }
    }

    struct InMemoryUsers {
        saved: Mutex<Vec<User>>,
    }

    #[async_trait]
    impl UserRepository for InMemoryUsers {
        async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>, AccountsError> {
            Ok(self.saved.lock().unwrap().iter().find(|u| u.id == user_id).cloned())
        }
        async fn find_by_external_id(&self, _external_id: &str) -> Result<Option<User>, AccountsError> {
            Ok(None)
        }
        async fn save(&self, user: &User) -> Result<(), AccountsError> {
            let mut saved = self.saved.lock().unwrap();
            saved.retain(|u| u.id != user.id);
            saved.push(user.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn duplicate_strike_for_same_order_is_noop() {
        let strikes = InMemoryStrikes { rows: Mutex::new(vec![]) };
        let users = InMemoryUsers { saved: Mutex::new(vec![]) };
        let enforcer = StrikeEnforcer::new(3, false, NoopNotifier);
        let user = User::new("buyer-1".to_string(), false);
        let order_id = Uuid::new_v4();

        let user = enforcer
            .record_strike(&strikes, &users, user, order_id, StrikeType::Timeout, "late".to_string())
            .await
            .unwrap();
        assert_eq!(user.strike_count, 1);

        let user = enforcer
            .record_strike(&strikes, &users, user, order_id, StrikeType::Timeout, "late again".to_string())
            .await
            .unwrap();
        assert_eq!(user.strike_count, 1);
    }

    #[tokio::test]
    async fn reaching_threshold_bans_unless_exempt() {
        let strikes = InMemoryStrikes { rows: Mutex::new(vec![]) };
        let users = InMemoryUsers { saved: Mutex::new(vec![]) };
        let enforcer = StrikeEnforcer::new(2, false, NoopNotifier);
        let mut user = User::new("buyer-2".to_string(), false);
        user.strike_count = 1;

        let user = enforcer
            .record_strike(&strikes, &users, user, Uuid::new_v4(), StrikeType::LateCancel, "r".to_string())
            .await
            .unwrap();

        assert_eq!(user.strike_count, 2);
        assert!(user.is_blocked);
    }

    #[derive(Debug, Clone, Default)]
    struct RecordingNotifier {
        user_messages: std::sync::Arc<Mutex<Vec<(Uuid, String)>>>,
        admin_messages: std::sync::Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl NotificationPort for RecordingNotifier {
        async fn notify_user(&self, target_id: Uuid, message: String) {
            self.user_messages.lock().unwrap().push((target_id, message));
        }
        async fn notify_admins(&self, message: String) {
            self.admin_messages.lock().unwrap().push(message);
        }
    }

    #[tokio::test]
    async fn reaching_ban_threshold_notifies_user_and_admins() {
        let strikes = InMemoryStrikes { rows: Mutex::new(vec![]) };
        let users = InMemoryUsers { saved: Mutex::new(vec![]) };
        let notifier = RecordingNotifier::default();
        let enforcer = StrikeEnforcer::new(1, false, notifier.clone());
        let user = User::new("buyer-4".to_string(), false);

        let user = enforcer
            .record_strike(&strikes, &users, user, Uuid::new_v4(), StrikeType::Timeout, "expired".to_string())
            .await
            .unwrap();

        assert!(user.is_blocked);
        assert_eq!(notifier.user_messages.lock().unwrap().len(), 1);
        assert_eq!(notifier.admin_messages.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn exempt_admin_accrues_but_never_banned() {
        let strikes = InMemoryStrikes { rows: Mutex::new(vec![]) };
        let users = InMemoryUsers { saved: Mutex::new(vec![]) };
        let enforcer = StrikeEnforcer::new(1, true, NoopNotifier);
        let admin = User::new("admin-1".to_string(), true);

        let admin = enforcer
            .record_strike(&strikes, &users, admin, Uuid::new_v4(), StrikeType::Timeout, "r".to_string())
            .await
            .unwrap();

        assert_eq!(admin.strike_count, 1);
        assert!(!admin.is_blocked);
    }

    #[tokio::test]
    async fn unban_preserves_strike_count() {
        let users = InMemoryUsers { saved: Mutex::new(vec![]) };
        let notifier = RecordingNotifier::default();
        let enforcer = StrikeEnforcer::new(3, false, notifier.clone());
        let mut user = User::new("buyer-3".to_string(), false);
        user.strike_count = 3;
        user.is_blocked = true;

        let user = enforcer
            .maybe_unban(
                &users,
                user,
                Fiat::new(rust_decimal::Decimal::from(25)),
                Fiat::new(rust_decimal::Decimal::from(20)),
            )
            .await
            .unwrap();

        assert!(!user.is_blocked);
        assert_eq!(user.strike_count, 3);
        assert_eq!(user.blocked_reason.as_deref(), Some("unbanned via wallet top-up"));
        assert_eq!(notifier.user_messages.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn top_up_below_threshold_leaves_user_blocked() {
        let users = InMemoryUsers { saved: Mutex::new(vec![]) };
        let enforcer = StrikeEnforcer::new(3, false, NoopNotifier);
        let mut user = User::new("buyer-5".to_string(), false);
        user.is_blocked = true;
        user.blocked_reason = Some("reached 3 strikes".to_string());

        let user = enforcer
            .maybe_unban(
                &users,
                user,
                Fiat::new(rust_decimal::Decimal::from(5)),
                Fiat::new(rust_decimal::Decimal::from(20)),
            )
            .await
            .unwrap();

        assert!(user.is_blocked);
        assert_eq!(user.blocked_reason.as_deref(), Some("reached 3 strikes"));
    }
}
