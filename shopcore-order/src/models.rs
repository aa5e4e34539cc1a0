use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shopcore_domain::Fiat;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    PendingPayment,
    PendingPaymentAndAddress,
    PendingPaymentPartial,
    Paid,
    PaidAwaitingShipment,
    Shipped,
    CancelledByUser,
    CancelledByAdmin,
    CancelledBySystem,
    Timeout,
}

impl OrderStatus {
    /// `PAID` is only terminal for digital-only orders; orders with a
    /// physical component continue on to `PAID_AWAITING_SHIPMENT`.
    pub fn is_terminal(self, has_physical: bool) -> bool {
        match self {
            OrderStatus::Shipped
            | OrderStatus::CancelledByUser
            | OrderStatus::CancelledByAdmin
            | OrderStatus::CancelledBySystem
            | OrderStatus::Timeout => true,
            OrderStatus::Paid => !has_physical,
            _ => false,
        }
    }

    pub fn is_cancellable_by_user(self) -> bool {
        matches!(
            self,
            OrderStatus::PendingPayment
                | OrderStatus::PendingPaymentAndAddress
                | OrderStatus::PendingPaymentPartial
                | OrderStatus::Paid
        )
    }

    /// Admins may additionally cancel orders already awaiting shipment.
    pub fn is_cancellable_by_admin(self) -> bool {
        self.is_cancellable_by_user() || self == OrderStatus::PaidAwaitingShipment
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CancellationReason {
    User,
    Timeout,
    Admin,
}

impl CancellationReason {
    pub fn terminal_status(self) -> OrderStatus {
        match self {
            CancellationReason::User => OrderStatus::CancelledByUser,
            CancellationReason::Timeout => OrderStatus::Timeout,
            CancellationReason::Admin => OrderStatus::CancelledByAdmin,
        }
    }

    /// TIMEOUT cancellations are always penalty-bearing; ADMIN
    /// cancellations are always penalty-free. USER cancellations depend on
    /// the grace period, evaluated separately by the caller.
    pub fn always_penalty_bearing(self) -> bool {
        self == CancellationReason::Timeout
    }

    pub fn always_penalty_free(self) -> bool {
        self == CancellationReason::Admin
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItemSnapshot {
    pub item_id: Uuid,
    pub description: String,
    pub price: Fiat,
    pub is_physical: bool,
    pub shipping_cost: Fiat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundBreakdown {
    pub total_paid: Fiat,
    pub refundable_base: Fiat,
    pub penalty_percent: Option<rust_decimal::Decimal>,
    pub penalty_amount: Fiat,
    pub final_refund: Fiat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: OrderStatus,
    pub total_price: Fiat,
    pub shipping_cost: Fiat,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub wallet_used: Fiat,
    pub retry_count: i32,
    pub cancellation_reason: Option<String>,
    pub items_snapshot: Option<Vec<OrderItemSnapshot>>,
    pub refund_breakdown: Option<RefundBreakdown>,
}

impl Order {
    pub fn new(user_id: Uuid, currency: String, order_timeout_minutes: i64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            status: OrderStatus::PendingPayment,
            total_price: Fiat::ZERO,
            shipping_cost: Fiat::ZERO,
            currency,
            created_at: now,
            expires_at: now + chrono::Duration::minutes(order_timeout_minutes),
            paid_at: None,
            shipped_at: None,
            cancelled_at: None,
            wallet_used: Fiat::ZERO,
            retry_count: 0,
            cancellation_reason: None,
            items_snapshot: None,
            refund_breakdown: None,
        }
    }

    pub fn within_grace_period(&self, grace_period_minutes: i64) -> bool {
        Utc::now() - self.created_at <= chrono::Duration::minutes(grace_period_minutes)
    }
}

/// One row per completed order, written once items are marked sold.
/// Uniqueness on `order_id` is what makes the write idempotent against a
/// redelivered payment-confirmation webhook completing the same order twice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuyHistoryRecord {
    pub id: Uuid,
    pub order_id: Uuid,
    pub user_id: Uuid,
    pub item_count: i32,
    pub total_price: Fiat,
    pub created_at: DateTime<Utc>,
}
