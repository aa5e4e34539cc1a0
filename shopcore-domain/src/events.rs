use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct OrderCreatedEvent {
    pub order_id: Uuid,
    pub user_id: Uuid,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct OrderPaidEvent {
    pub order_id: Uuid,
    pub user_id: Uuid,
    pub total_fiat: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct OrderCancelledEvent {
    pub order_id: Uuid,
    pub user_id: Uuid,
    pub reason: String,
    pub refund_amount: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct StrikeRecordedEvent {
    pub user_id: Uuid,
    pub order_id: Uuid,
    pub strike_type: String,
    pub total_strikes: i32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct UserBlockedEvent {
    pub user_id: Uuid,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct UserUnblockedEvent {
    pub user_id: Uuid,
    pub timestamp: DateTime<Utc>,
}
