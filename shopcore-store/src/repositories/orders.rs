use async_trait::async_trait;
use shopcore_domain::Fiat;
use shopcore_order::{Order, OrderError, OrderRepository, OrderStatus};
use uuid::Uuid;

use crate::database::DbClient;

#[derive(Clone)]
pub struct PostgresOrderRepository {
    db: DbClient,
}

impl PostgresOrderRepository {
    pub fn new(db: DbClient) -> Self {
        Self { db }
    }
}

fn status_to_str(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::PendingPayment => "PENDING_PAYMENT",
        OrderStatus::PendingPaymentAndAddress => "PENDING_PAYMENT_AND_ADDRESS",
        OrderStatus::PendingPaymentPartial => "PENDING_PAYMENT_PARTIAL",
        OrderStatus::Paid => "PAID",
        OrderStatus::PaidAwaitingShipment => "PAID_AWAITING_SHIPMENT",
        OrderStatus::Shipped => "SHIPPED",
        OrderStatus::CancelledByUser => "CANCELLED_BY_USER",
        OrderStatus::CancelledByAdmin => "CANCELLED_BY_ADMIN",
        OrderStatus::CancelledBySystem => "CANCELLED_BY_SYSTEM",
        OrderStatus::Timeout => "TIMEOUT",
    }
}

fn status_from_str(value: &str) -> Result<OrderStatus, OrderError> {
    Ok(match value {
        "PENDING_PAYMENT" => OrderStatus::PendingPayment,
        "PENDING_PAYMENT_AND_ADDRESS" => OrderStatus::PendingPaymentAndAddress,
        "PENDING_PAYMENT_PARTIAL" => OrderStatus::PendingPaymentPartial,
        "PAID" => OrderStatus::Paid,
        "PAID_AWAITING_SHIPMENT" => OrderStatus::PaidAwaitingShipment,
        "SHIPPED" => OrderStatus::Shipped,
        "CANCELLED_BY_USER" => OrderStatus::CancelledByUser,
        "CANCELLED_BY_ADMIN" => OrderStatus::CancelledByAdmin,
        "CANCELLED_BY_SYSTEM" => OrderStatus::CancelledBySystem,
        "TIMEOUT" => OrderStatus::Timeout,
        other => return Err(OrderError::Repository(format!("unknown order status {other}"))),
    })
}

struct OrderRow {
    id: Uuid,
    user_id: Uuid,
    status: String,
    total_price: rust_decimal::Decimal,
    shipping_cost: rust_decimal::Decimal,
    currency: String,
    created_at: chrono::DateTime<chrono::Utc>,
    expires_at: chrono::DateTime<chrono::Utc>,
    paid_at: Option<chrono::DateTime<chrono::Utc>>,
    shipped_at: Option<chrono::DateTime<chrono::Utc>>,
    cancelled_at: Option<chrono::DateTime<chrono::Utc>>,
    wallet_used: rust_decimal::Decimal,
    retry_count: i32,
    cancellation_reason: Option<String>,
    items_snapshot: Option<serde_json::Value>,
    refund_breakdown: Option<serde_json::Value>,
}

fn row_to_order(row: OrderRow) -> Result<Order, OrderError> {
    Ok(Order {
        id: row.id,
        user_id: row.user_id,
        status: status_from_str(&row.status)?,
        total_price: Fiat::new(row.total_price),
        shipping_cost: Fiat::new(row.shipping_cost),
        currency: row.currency,
        created_at: row.created_at,
        expires_at: row.expires_at,
        paid_at: row.paid_at,
        shipped_at: row.shipped_at,
        cancelled_at: row.cancelled_at,
        wallet_used: Fiat::new(row.wallet_used),
        retry_count: row.retry_count,
        cancellation_reason: row.cancellation_reason,
        items_snapshot: row
            .items_snapshot
            .map(|v| serde_json::from_value(v).map_err(|e| OrderError::Repository(e.to_string())))
            .transpose()?,
        refund_breakdown: row
            .refund_breakdown
            .map(|v| serde_json::from_value(v).map_err(|e| OrderError::Repository(e.to_string())))
            .transpose()?,
    })
}

#[async_trait]
impl OrderRepository for PostgresOrderRepository {
    async fn insert(&self, order: &Order) -> Result<(), OrderError> {
        sqlx::query!(
            r#"
            INSERT INTO orders (id, user_id, status, total_price, shipping_cost, currency, created_at, expires_at, wallet_used, retry_count)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
            order.id,
            order.user_id,
            status_to_str(order.status),
            order.total_price.as_decimal(),
            order.shipping_cost.as_decimal(),
            order.currency,
            order.created_at,
            order.expires_at,
            order.wallet_used.as_decimal(),
            order.retry_count,
        )
        .execute(&self.db.pool)
        .await
        .map_err(|e| OrderError::Repository(e.to_string()))?;
        Ok(())
    }

    async fn find_by_id(&self, order_id: Uuid) -> Result<Option<Order>, OrderError> {
        let row = sqlx::query_as!(
            OrderRow,
            r#"
            SELECT id, user_id, status, total_price, shipping_cost, currency, created_at, expires_at,
                   paid_at, shipped_at, cancelled_at, wallet_used, retry_count, cancellation_reason,
                   items_snapshot, refund_breakdown
            FROM orders WHERE id = $1
            "#,
            order_id,
        )
        .fetch_optional(&self.db.pool)
        .await
        .map_err(|e| OrderError::Repository(e.to_string()))?;

        row.map(row_to_order).transpose()
    }

    async fn save(&self, order: &Order) -> Result<(), OrderError> {
        let items_snapshot = order
            .items_snapshot
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| OrderError::Repository(e.to_string()))?;
        let refund_breakdown = order
            .refund_breakdown
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| OrderError::Repository(e.to_string()))?;

        sqlx::query!(
            r#"
            UPDATE orders SET
                status = $2, total_price = $3, shipping_cost = $4, paid_at = $5, shipped_at = $6,
                cancelled_at = $7, wallet_used = $8, retry_count = $9, cancellation_reason = $10,
                items_snapshot = $11, refund_breakdown = $12
            WHERE id = $1
            "#,
            order.id,
            status_to_str(order.status),
            order.total_price.as_decimal(),
            order.shipping_cost.as_decimal(),
            order.paid_at,
            order.shipped_at,
            order.cancelled_at,
            order.wallet_used.as_decimal(),
            order.retry_count,
            order.cancellation_reason,
            items_snapshot,
            refund_breakdown,
        )
        .execute(&self.db.pool)
        .await
        .map_err(|e| OrderError::Repository(e.to_string()))?;
        Ok(())
    }

    async fn find_expired_pending(&self) -> Result<Vec<Order>, OrderError> {
        let rows = sqlx::query_as!(
            OrderRow,
            r#"
            SELECT id, user_id, status, total_price, shipping_cost, currency, created_at, expires_at,
                   paid_at, shipped_at, cancelled_at, wallet_used, retry_count, cancellation_reason,
                   items_snapshot, refund_breakdown
            FROM orders
            WHERE status IN ('PENDING_PAYMENT', 'PENDING_PAYMENT_AND_ADDRESS', 'PENDING_PAYMENT_PARTIAL')
              AND expires_at <= now()
            "#,
        )
        .fetch_all(&self.db.pool)
        .await
        .map_err(|e| OrderError::Repository(e.to_string()))?;

        rows.into_iter().map(row_to_order).collect()
    }
}
