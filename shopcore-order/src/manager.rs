use rust_decimal::Decimal;
use shopcore_catalog::{Item, ItemRepository};
use shopcore_core::{AccountsError, StrikeEnforcer, StrikeRepository, StrikeType, User, UserRepository};
use shopcore_domain::{Fiat, NotificationPort};
use uuid::Uuid;

use crate::{
    error::OrderError,
    models::{BuyHistoryRecord, CancellationReason, Order, OrderItemSnapshot, OrderStatus},
    refund::{compute_refund_breakdown, compute_reservation_fee},
    repository::{BuyHistoryRepository, OrderRepository},
};

#[derive(Debug, Clone)]
pub struct CartLine {
    pub category_id: Uuid,
    pub subcategory_id: Uuid,
    pub requested_qty: i32,
    /// Quoted at add-to-cart time; the authoritative price is whatever the
    /// reserved rows actually carry once reservation completes.
    pub quoted_unit_price: Fiat,
    pub quoted_shipping_cost: Fiat,
    pub is_physical: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct StockAdjustment {
    pub subcategory_id: Uuid,
    pub requested_qty: i32,
    pub reserved_qty: i32,
}

#[derive(Debug, Clone)]
pub struct OrderServiceConfig {
    pub order_timeout_minutes: i64,
    pub order_cancel_grace_period_minutes: i64,
    pub payment_late_penalty_percent: Decimal,
    pub max_strikes_before_ban: i32,
    pub exempt_admins_from_ban: bool,
}

/// Orchestrates order creation, cancellation, and completion. Generic over
/// the repositories it needs rather than boxed trait objects, so a single
/// instance can be built once per process and handed to every handler.
pub struct OrderService<N: NotificationPort> {
    config: OrderServiceConfig,
    strikes: StrikeEnforcer<N>,
    notifier: N,
}

impl<N: NotificationPort> OrderService<N> {
    pub fn new(config: OrderServiceConfig, notifier: N) -> Self {
        let strikes = StrikeEnforcer::new(
            config.max_strikes_before_ban,
            config.exempt_admins_from_ban,
            notifier.clone(),
        );
        Self { config, strikes, notifier }
    }

    /// `orchestrate_creation`: reserves rows for every cart line, adjusts
    /// the quoted total against what was actually reserved, and routes to
    /// `PENDING_PAYMENT_AND_ADDRESS` when any reserved row is physical.
    pub async fn orchestrate_creation<I: ItemRepository, O: OrderRepository>(
        &self,
        items_repo: &I,
        orders_repo: &O,
        user_id: Uuid,
        currency: String,
        cart_lines: &[CartLine],
    ) -> Result<(Order, Vec<StockAdjustment>, bool), OrderError> {
        let mut order = Order::new(user_id, currency, self.config.order_timeout_minutes);

        let quoted_total: Fiat = cart_lines.iter().fold(Fiat::ZERO, |acc, line| {
            let line_total = (0..line.requested_qty).fold(Fiat::ZERO, |a, _| {
                a.checked_add(line.quoted_unit_price).unwrap_or(a)
            });
            acc.checked_add(line_total).unwrap_or(acc)
        });
        let quoted_shipping = cart_lines
            .iter()
            .filter(|l| l.is_physical)
            .map(|l| l.quoted_shipping_cost)
            .fold(Fiat::ZERO, |acc, c| acc.max(c));
        order.total_price = quoted_total.checked_add(quoted_shipping).unwrap_or(quoted_total);
        order.shipping_cost = quoted_shipping;

        orders_repo.insert(&order).await?;

        let mut reserved_rows: Vec<Item> = Vec::new();
        let mut adjustments = Vec::new();
        for line in cart_lines {
            let reserved = items_repo
                .reserve(line.subcategory_id, line.requested_qty, order.id)
                .await?;
            adjustments.push(StockAdjustment {
                subcategory_id: line.subcategory_id,
                requested_qty: line.requested_qty,
                reserved_qty: reserved.len() as i32,
            });
            reserved_rows.extend(reserved);
        }

        if reserved_rows.is_empty() && !cart_lines.is_empty() {
            order.status = OrderStatus::CancelledBySystem;
            order.cancelled_at = Some(chrono::Utc::now());
            orders_repo.save(&order).await?;
            return Err(OrderError::InsufficientStock(order.id));
        }

        let any_partial = adjustments.iter().any(|a| a.reserved_qty < a.requested_qty);
        let has_physical = reserved_rows.iter().any(|i| i.is_physical);

        if any_partial {
            let actual_items_total = reserved_rows
                .iter()
                .fold(Fiat::ZERO, |acc, i| acc.checked_add(i.price).unwrap_or(acc));
            let actual_shipping = reserved_rows
                .iter()
                .filter(|i| i.is_physical)
                .map(|i| i.shipping_cost)
                .fold(Fiat::ZERO, |acc, c| acc.max(c));
            order.total_price = actual_items_total.checked_add(actual_shipping).unwrap_or(actual_items_total);
            order.shipping_cost = actual_shipping;
        }

        if has_physical {
            order.status = OrderStatus::PendingPaymentAndAddress;
        }

        orders_repo.save(&order).await?;

        Ok((order, adjustments, has_physical))
    }

    /// Writes the shipping ciphertext and transitions
    /// `PENDING_PAYMENT_AND_ADDRESS -> PENDING_PAYMENT`. The ciphertext
    /// write itself is a persistence-layer concern handled by the caller;
    /// this method only owns the status transition.
    pub async fn confirm_address<O: OrderRepository>(
        &self,
        orders_repo: &O,
        order_id: Uuid,
    ) -> Result<Order, OrderError> {
        let mut order = orders_repo.find_by_id(order_id).await?.ok_or(OrderError::NotFound(order_id))?;
        if order.status != OrderStatus::PendingPaymentAndAddress {
            return Err(OrderError::InvalidState {
                current_state: order.status,
                required_state: "PENDING_PAYMENT_AND_ADDRESS",
            });
        }
        order.status = OrderStatus::PendingPayment;
        orders_repo.save(&order).await?;
        Ok(order)
    }

    /// `cancel_order`. `total_paid` is the caller-computed
    /// `wallet_used + Σ PaymentTransaction.fiat_amount` for this order —
    /// the order service does not reach into the payment ledger directly
    /// to avoid a dependency cycle between the order and payment crates.
    #[allow(clippy::too_many_arguments)]
    pub async fn cancel_order<I: ItemRepository, O: OrderRepository, U: UserRepository, S: StrikeRepository>(
        &self,
        items_repo: &I,
        orders_repo: &O,
        users_repo: &U,
        strikes_repo: &S,
        order_id: Uuid,
        reason: CancellationReason,
        total_paid: Fiat,
        mut user: User,
        is_mixed_order: bool,
        physical_items_total: Fiat,
        custom_reason: Option<String>,
        skip_strike: bool,
        penalty_percent_override: Option<Decimal>,
    ) -> Result<(Order, User), OrderError> {
        let mut order = orders_repo.find_by_id(order_id).await?.ok_or(OrderError::NotFound(order_id))?;

        let cancellable = match reason {
            CancellationReason::Admin => order.status.is_cancellable_by_admin(),
            _ => order.status.is_cancellable_by_user(),
        };
        if !cancellable {
            return Err(OrderError::AlreadyCancelled(order_id));
        }

        let penalty_applies = if reason.always_penalty_bearing() {
            true
        } else if reason.always_penalty_free() {
            false
        } else {
            !order.within_grace_period(self.config.order_cancel_grace_period_minutes)
        };

        let penalty_percent = penalty_percent_override.unwrap_or(self.config.payment_late_penalty_percent);
        let payment_made = !total_paid.is_zero();

        let breakdown = compute_refund_breakdown(
            total_paid,
            is_mixed_order,
            physical_items_total,
            order.shipping_cost,
            penalty_applies,
            penalty_percent,
        );

        if payment_made {
            user.credit_wallet(breakdown.final_refund);
        } else if penalty_applies {
            let fee = compute_reservation_fee(order.total_price, user.wallet_balance, penalty_percent);
            user.debit_wallet_capped(fee);
        }

        // Build the notification-facing snapshot before releasing rows so
        // the snapshot matches what the user is shown.
        let reserved_rows = items_repo.find_by_order(order_id).await?;
        order.items_snapshot = Some(
            reserved_rows
                .iter()
                .map(|i| OrderItemSnapshot {
                    item_id: i.id,
                    description: i.description.clone(),
                    price: i.price,
                    is_physical: i.is_physical,
                    shipping_cost: i.shipping_cost,
                })
                .collect(),
        );
        order.refund_breakdown = Some(breakdown);
        order.status = reason.terminal_status();
        order.cancelled_at = Some(chrono::Utc::now());
        order.cancellation_reason = Some(custom_reason.unwrap_or_else(|| format!("{:?}", reason)));

        orders_repo.save(&order).await?;

        let strike_type = if skip_strike {
            None
        } else {
            match reason {
                CancellationReason::Timeout => Some(StrikeType::Timeout),
                CancellationReason::User if penalty_applies => Some(StrikeType::LateCancel),
                _ => None,
            }
        };
        if let Some(strike_type) = strike_type {
            user = self
                .strikes
                .record_strike(
                    strikes_repo,
                    users_repo,
                    user,
                    order_id,
                    strike_type,
                    format!("order {order_id} cancelled ({reason:?})"),
                )
                .await?;
        } else {
            users_repo.save(&user).await?;
        }

        items_repo.release(order_id).await?;
        for row in &reserved_rows {
            if row.is_sold {
                let _ =
                    items_repo.restock_for_refund(row.subcategory_id, row.category_id, row.price, 1).await;
            }
        }

        self.notifier
            .notify_user(user.id, format!("Your order {order_id} has been cancelled."))
            .await;

        Ok((order, user))
    }

    /// Admin-only: valid only from `PAID_AWAITING_SHIPMENT`.
    pub async fn mark_shipped<O: OrderRepository>(&self, orders_repo: &O, order_id: Uuid) -> Result<Order, OrderError> {
        let mut order = orders_repo.find_by_id(order_id).await?.ok_or(OrderError::NotFound(order_id))?;
        if order.status != OrderStatus::PaidAwaitingShipment {
            return Err(OrderError::InvalidState {
                current_state: order.status,
                required_state: "PAID_AWAITING_SHIPMENT",
            });
        }
        order.shipped_at = Some(chrono::Utc::now());
        order.status = OrderStatus::Shipped;
        orders_repo.save(&order).await?;
        Ok(order)
    }

    /// Order completion on full payment: status first, then mark items
    /// sold, then write the buy-history record (guarded against a
    /// redelivered webhook completing the same order twice), then clear
    /// `order_id` off the sold rows, then deliver digital payloads.
    /// Idempotent — a second call against an already-completed order is a
    /// no-op because the status guard rejects it.
    pub async fn complete_order<I: ItemRepository, O: OrderRepository, B: BuyHistoryRepository>(
        &self,
        items_repo: &I,
        orders_repo: &O,
        buy_history_repo: &B,
        order_id: Uuid,
        has_physical: bool,
    ) -> Result<Order, OrderError> {
        let mut order = orders_repo.find_by_id(order_id).await?.ok_or(OrderError::NotFound(order_id))?;
        if !matches!(
            order.status,
            OrderStatus::PendingPayment | OrderStatus::PendingPaymentPartial
        ) {
            return Err(OrderError::InvalidState {
                current_state: order.status,
                required_state: "PENDING_PAYMENT or PENDING_PAYMENT_PARTIAL",
            });
        }

        order.status = if has_physical { OrderStatus::PaidAwaitingShipment } else { OrderStatus::Paid };
        order.paid_at = Some(chrono::Utc::now());
        orders_repo.save(&order).await?;

        let rows = items_repo.find_by_order(order_id).await?;
        let ids: Vec<Uuid> = rows.iter().map(|i| i.id).collect();
        items_repo.mark_sold(&ids).await?;

        let total_price = rows.iter().fold(Fiat::ZERO, |acc, i| acc.checked_add(i.price).unwrap_or(acc));
        buy_history_repo
            .insert_if_absent(&BuyHistoryRecord {
                id: Uuid::new_v4(),
                order_id,
                user_id: order.user_id,
                item_count: rows.len() as i32,
                total_price,
                created_at: chrono::Utc::now(),
            })
            .await?;

        items_repo.clear_order_id(&ids).await?;

        for row in rows.iter().filter(|r| !r.is_physical) {
            if let Some(payload) = &row.private_data {
                self.notifier.notify_user(order.user_id, payload.clone()).await;
            }
        }

        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use shopcore_catalog::ItemError;
    use std::sync::Mutex;

    fn config() -> OrderServiceConfig {
        OrderServiceConfig {
            order_timeout_minutes: 30,
            order_cancel_grace_period_minutes: 15,
            payment_late_penalty_percent: Decimal::from(10),
            max_strikes_before_ban: 3,
            exempt_admins_from_ban: false,
        }
    }

    struct FakeItems {
        rows: Mutex<Vec<Item>>,
    }

    #[async_trait]
    impl ItemRepository for FakeItems {
        async fn reserve(&self, subcategory_id: Uuid, requested_qty: i32, order_id: Uuid) -> Result<Vec<Item>, ItemError> {
            let mut rows = self.rows.lock().unwrap();
            let mut reserved = Vec::new();
            for row in rows.iter_mut() {
                if reserved.len() as i32 >= requested_qty {
                    break;
                }
                if row.subcategory_id == subcategory_id && !row.is_sold && row.order_id.is_none() {
                    row.order_id = Some(order_id);
                    row.reserved_at = Some(chrono::Utc::now());
                    reserved.push(row.clone());
                }
            }
            Ok(reserved)
        }

        async fn release(&self, order_id: Uuid) -> Result<(), ItemError> {
            let mut rows = self.rows.lock().unwrap();
            for row in rows.iter_mut().filter(|r| r.order_id == Some(order_id)) {
                row.order_id = None;
                row.reserved_at = None;
            }
            Ok(())
        }

        async fn restock_for_refund(&self, _subcategory_id: Uuid, _category_id: Uuid, _price: Fiat, _qty: i32) -> Result<i32, ItemError> {
            Ok(0)
        }

        async fn mark_sold(&self, item_ids: &[Uuid]) -> Result<(), ItemError> {
            let mut rows = self.rows.lock().unwrap();
            for row in rows.iter_mut().filter(|r| item_ids.contains(&r.id)) {
                row.is_sold = true;
            }
            Ok(())
        }

        async fn clear_order_id(&self, item_ids: &[Uuid]) -> Result<(), ItemError> {
            let mut rows = self.rows.lock().unwrap();
            for row in rows.iter_mut().filter(|r| item_ids.contains(&r.id)) {
                row.order_id = None;
            }
            Ok(())
        }

        async fn find_by_order(&self, order_id: Uuid) -> Result<Vec<Item>, ItemError> {
            let rows = self.rows.lock().unwrap();
            Ok(rows.iter().filter(|r| r.order_id == Some(order_id)).cloned().collect())
        }
    }

    struct FakeOrders {
        rows: Mutex<Vec<Order>>,
    }

    #[async_trait]
    impl OrderRepository for FakeOrders {
        async fn insert(&self, order: &Order) -> Result<(), OrderError> {
            self.rows.lock().unwrap().push(order.clone());
            Ok(())
        }
        async fn find_by_id(&self, order_id: Uuid) -> Result<Option<Order>, OrderError> {
            Ok(self.rows.lock().unwrap().iter().find(|o| o.id == order_id).cloned())
        }
        async fn save(&self, order: &Order) -> Result<(), OrderError> {
            let mut rows = self.rows.lock().unwrap();
            rows.retain(|o| o.id != order.id);
            rows.push(order.clone());
            Ok(())
        }
        async fn find_expired_pending(&self) -> Result<Vec<Order>, OrderError> {
            Ok(vec![])
        }
    }

    struct FakeBuyHistory {
        rows: Mutex<Vec<BuyHistoryRecord>>,
    }

    #[async_trait]
    impl BuyHistoryRepository for FakeBuyHistory {
        async fn insert_if_absent(&self, record: &BuyHistoryRecord) -> Result<bool, OrderError> {
            let mut rows = self.rows.lock().unwrap();
            if rows.iter().any(|r| r.order_id == record.order_id) {
                return Ok(false);
            }
            rows.push(record.clone());
            Ok(true)
        }
    }

    fn item(subcategory_id: Uuid, is_physical: bool) -> Item {
        Item {
            id: Uuid::new_v4(),
            category_id: Uuid::new_v4(),
            subcategory_id,
            description: "widget".to_string(),
            price: Fiat::new(Decimal::from(10)),
            is_physical,
            shipping_cost: if is_physical { Fiat::new(Decimal::from(3)) } else { Fiat::ZERO },
            is_sold: false,
            is_new: true,
            private_data: Some("CODE".to_string()),
            order_id: None,
            reserved_at: None,
        }
    }

    #[tokio::test]
    async fn partial_reservation_recomputes_total() {
        let subcat = Uuid::new_v4();
        let items = FakeItems { rows: Mutex::new(vec![item(subcat, false), item(subcat, false), item(subcat, false)]) };
        let orders = FakeOrders { rows: Mutex::new(vec![]) };
        let svc = OrderService::new(config(), shopcore_domain::NoopNotifier);

        let line = CartLine {
            category_id: Uuid::new_v4(),
            subcategory_id: subcat,
            requested_qty: 5,
            quoted_unit_price: Fiat::new(Decimal::from(10)),
            quoted_shipping_cost: Fiat::ZERO,
            is_physical: false,
        };

        let (order, adjustments, has_physical) = svc
            .orchestrate_creation(&items, &orders, Uuid::new_v4(), "EUR".to_string(), &[line])
            .await
            .unwrap();

        assert!(!has_physical);
        assert_eq!(adjustments[0].reserved_qty, 3);
        assert_eq!(order.total_price, Fiat::new(Decimal::from(30)));
    }

    #[tokio::test]
    async fn zero_reservation_cancels_as_system() {
        let subcat = Uuid::new_v4();
        let items = FakeItems { rows: Mutex::new(vec![]) };
        let orders = FakeOrders { rows: Mutex::new(vec![]) };
        let svc = OrderService::new(config(), shopcore_domain::NoopNotifier);

        let line = CartLine {
            category_id: Uuid::new_v4(),
            subcategory_id: subcat,
            requested_qty: 1,
            quoted_unit_price: Fiat::new(Decimal::from(10)),
            quoted_shipping_cost: Fiat::ZERO,
            is_physical: false,
        };

        let result = svc
            .orchestrate_creation(&items, &orders, Uuid::new_v4(), "EUR".to_string(), &[line])
            .await;
        assert!(matches!(result, Err(OrderError::InsufficientStock(_))));
    }

    #[tokio::test]
    async fn cancelling_already_cancelled_order_is_rejected() {
        let items = FakeItems { rows: Mutex::new(vec![]) };
        let orders = FakeOrders { rows: Mutex::new(vec![]) };
        let svc = OrderService::new(config(), shopcore_domain::NoopNotifier);

        struct NoopStrikes;
        #[async_trait]
        impl StrikeRepository for NoopStrikes {
            async fn insert_if_absent(&self, _strike: &shopcore_core::Strike) -> Result<bool, AccountsError> {
                Ok(true)
            }
            async fn count_for_user(&self, _user_id: Uuid) -> Result<i32, AccountsError> {
                Ok(0)
            }
        }
        struct NoopUsers;
        #[async_trait]
        impl UserRepository for NoopUsers {
            async fn find_by_id(&self, _user_id: Uuid) -> Result<Option<User>, AccountsError> {
                Ok(None)
            }
            async fn find_by_external_id(&self, _external_id: &str) -> Result<Option<User>, AccountsError> {
                Ok(None)
            }
            async fn save(&self, _user: &User) -> Result<(), AccountsError> {
                Ok(())
            }
        }

        let mut order = Order::new(Uuid::new_v4(), "EUR".to_string(), 30);
        order.status = OrderStatus::CancelledByUser;
        orders.rows.lock().unwrap().push(order.clone());

        let user = User::new("buyer".to_string(), false);
        let result = svc
            .cancel_order(
                &items,
                &orders,
                &NoopUsers,
                &NoopStrikes,
                order.id,
                CancellationReason::User,
                Fiat::ZERO,
                user,
                false,
                Fiat::ZERO,
                None,
                false,
                None,
            )
            .await;

        assert!(matches!(result, Err(OrderError::AlreadyCancelled(_))));
    }

    #[tokio::test]
    async fn completing_an_order_records_history_once_and_clears_order_id() {
        let subcat = Uuid::new_v4();
        let mut order = Order::new(Uuid::new_v4(), "EUR".to_string(), 30);
        order.status = OrderStatus::PendingPayment;

        let mut sold_item = item(subcat, false);
        sold_item.order_id = Some(order.id);

        let items = FakeItems { rows: Mutex::new(vec![sold_item.clone()]) };
        let orders = FakeOrders { rows: Mutex::new(vec![order.clone()]) };
        let history = FakeBuyHistory { rows: Mutex::new(vec![]) };
        let svc = OrderService::new(config(), shopcore_domain::NoopNotifier);

        svc.complete_order(&items, &orders, &history, order.id, false).await.unwrap();
        svc.complete_order(&items, &orders, &history, order.id, false).await.unwrap_err();

        assert_eq!(history.rows.lock().unwrap().len(), 1);
        let stored = items.rows.lock().unwrap()[0].clone();
        assert!(stored.is_sold);
        assert_eq!(stored.order_id, None);
    }
}
