use chrono::{DateTime, Datelike, Utc};
use rust_decimal::Decimal;
use shopcore_catalog::ItemRepository;
use shopcore_core::{PaymentProcessorClient, StrikeRepository, UserRepository};
use shopcore_domain::{CryptoAmount, CryptoCurrency, Fiat, NotificationPort};
use shopcore_order::{BuyHistoryRepository, CancellationReason, OrderRepository, OrderService};
use uuid::Uuid;

use crate::{
    error::PaymentError,
    invoice::generate_invoice_number,
    models::{ConfirmedPayment, Deposit, Invoice, PaymentTransaction, PaymentVerdict},
    repository::{DepositRepository, InvoiceRepository, PaymentTransactionRepository},
};

#[derive(Debug, Clone)]
pub struct PaymentServiceConfig {
    pub tolerance_overpayment_percent: Decimal,
    pub underpayment_retry_enabled: bool,
    pub underpayment_retry_timeout_minutes: i64,
    pub underpayment_penalty_percent: Decimal,
    pub late_payment_penalty_percent: Decimal,
    pub unban_top_up_amount: Fiat,
    pub order_timeout_minutes: i64,
}

pub struct PaymentService<N: NotificationPort> {
    config: PaymentServiceConfig,
    notifier: N,
}

impl<N: NotificationPort> PaymentService<N> {
    pub fn new(config: PaymentServiceConfig, notifier: N) -> Self {
        Self { config, notifier }
    }

    /// Issues a crypto invoice via the processor, or a wallet-only tracking
    /// invoice with no outbound call, when `requires_crypto` is false.
    /// `expires_override` lets a caller pin a non-default deadline (e.g. the
    /// underpayment-retry window) instead of the order-timeout default.
    #[allow(clippy::too_many_arguments)]
    pub async fn create_invoice<P: PaymentProcessorClient, IR: InvoiceRepository>(
        &self,
        processor: &P,
        invoices: &IR,
        order_id: Option<Uuid>,
        user_id: Uuid,
        amount: Fiat,
        fiat_currency: &str,
        crypto_currency: CryptoCurrency,
        requires_crypto: bool,
        expires_override: Option<DateTime<Utc>>,
    ) -> Result<Invoice, PaymentError> {
        let year = chrono::Utc::now().year();
        let invoice_number = generate_invoice_number(year, |candidate| async {
            invoices.exists_with_number(&candidate).await
        })
        .await?;

        let (processing_id, address, amount_crypto, default_expires_at) = if requires_crypto {
            let processor_invoice = processor
                .issue_invoice(order_id.unwrap_or_else(Uuid::new_v4), amount.as_decimal(), fiat_currency, crypto_currency)
                .await
                .map_err(|e| PaymentError::Processor(e.to_string()))?;
            (
                Some(processor_invoice.payment_processing_id),
                Some(processor_invoice.payment_address),
                Some(processor_invoice.payment_amount_crypto),
                processor_invoice.expires_at,
            )
        } else {
            (None, None, None, chrono::Utc::now() + chrono::Duration::minutes(self.config.order_timeout_minutes))
        };

        let invoice = Invoice {
            id: Uuid::new_v4(),
            order_id,
            user_id,
            invoice_number,
            payment_processing_id: processing_id,
            payment_address: address,
            fiat_amount: amount,
            fiat_currency: fiat_currency.to_string(),
            crypto_currency,
            payment_amount_crypto: amount_crypto,
            created_at: chrono::Utc::now(),
            expires_at: expires_override.unwrap_or(default_expires_at),
            is_active: true,
        };
        invoices.insert(&invoice).await?;
        Ok(invoice)
    }

    /// Issues a standalone wallet top-up request. Unlike `create_invoice`
    /// this never carries an `order_id` and is looked up on the webhook path
    /// independently of `InvoiceRepository`.
    pub async fn create_deposit_request<P: PaymentProcessorClient, DR: DepositRepository>(
        &self,
        processor: &P,
        deposits: &DR,
        user_id: Uuid,
        amount: Fiat,
        fiat_currency: &str,
        crypto_currency: CryptoCurrency,
    ) -> Result<Deposit, PaymentError> {
        let processor_invoice = processor
            .issue_invoice(Uuid::new_v4(), amount.as_decimal(), fiat_currency, crypto_currency)
            .await
            .map_err(|e| PaymentError::Processor(e.to_string()))?;

        let deposit = Deposit {
            id: Uuid::new_v4(),
            user_id,
            crypto_currency,
            crypto_amount: Some(processor_invoice.payment_amount_crypto),
            fiat_amount: amount,
            payment_address: Some(processor_invoice.payment_address),
            processing_id: processor_invoice.payment_processing_id,
            received_at: chrono::Utc::now(),
            is_paid: false,
        };
        deposits.insert(&deposit).await?;
        Ok(deposit)
    }

    /// Runs the wallet-then-crypto checkout split for an order that has
    /// just finished address confirmation (or skipped it, digital-only).
    /// Returns the created invoice and whether a crypto payment is still
    /// outstanding.
    #[allow(clippy::too_many_arguments)]
    pub async fn orchestrate_checkout<
        P: PaymentProcessorClient,
        IR: InvoiceRepository,
        O: OrderRepository,
        I: ItemRepository,
        U: UserRepository,
        B: BuyHistoryRepository,
    >(
        &self,
        processor: &P,
        invoices: &IR,
        orders: &O,
        items: &I,
        users: &U,
        buy_history: &B,
        order_service: &OrderService<N>,
        order_id: Uuid,
        crypto_currency: Option<CryptoCurrency>,
        has_physical: bool,
    ) -> Result<(Invoice, bool), PaymentError> {
        let mut order = orders.find_by_id(order_id).await?.ok_or(PaymentError::OrderNotFound(order_id))?;
        let mut user = users
            .find_by_id(order.user_id)
            .await?
            .ok_or(shopcore_core::AccountsError::NotFound(order.user_id))?;

        let wallet_used = user.wallet_balance.min(order.total_price);
        let remaining = order.total_price.checked_sub(wallet_used).unwrap_or(Fiat::ZERO);

        if !wallet_used.is_zero() {
            user.debit_wallet_capped(wallet_used);
            users.save(&user).await?;
        }
        order.wallet_used = wallet_used;
        orders.save(&order).await?;

        if remaining.is_zero() {
            let invoice = self
                .create_invoice(
                    processor,
                    invoices,
                    Some(order_id),
                    user.id,
                    order.total_price,
                    &order.currency,
                    crypto_currency.unwrap_or(CryptoCurrency::Btc),
                    false,
                    None,
                )
                .await?;
            order_service.complete_order(items, orders, buy_history, order_id, has_physical).await?;
            Ok((invoice, false))
        } else {
            let crypto_currency = crypto_currency.ok_or(PaymentError::CryptoCurrencyNotSelected(order_id))?;
            let invoice = self
                .create_invoice(
                    processor,
                    invoices,
                    Some(order_id),
                    user.id,
                    remaining,
                    &order.currency,
                    crypto_currency,
                    true,
                    None,
                )
                .await?;
            Ok((invoice, true))
        }
    }

    /// Dispatches a confirmed `isPaid=true` payment-webhook event against
    /// the matching order, by verdict.
    #[allow(clippy::too_many_arguments)]
    pub async fn handle_confirmed_payment<
        P: PaymentProcessorClient,
        IR: InvoiceRepository,
        TR: PaymentTransactionRepository,
        O: OrderRepository,
        I: ItemRepository,
        U: UserRepository,
        S: StrikeRepository,
        B: BuyHistoryRepository,
    >(
        &self,
        processor: &P,
        invoices: &IR,
        transactions: &TR,
        orders: &O,
        items: &I,
        users: &U,
        strikes: &S,
        buy_history: &B,
        order_service: &OrderService<N>,
        invoice: &Invoice,
        processor_transaction_id: String,
        paid_crypto: Decimal,
        paid_crypto_currency: CryptoCurrency,
        paid_fiat: Fiat,
        has_physical: bool,
        is_mixed_order: bool,
        physical_items_total: Fiat,
    ) -> Result<PaymentVerdict, PaymentError> {
        let order_id = invoice.order_id.ok_or(PaymentError::InvoiceNotFound(Uuid::nil()))?;
        let order = orders.find_by_id(order_id).await?.ok_or(PaymentError::OrderNotFound(order_id))?;

        let already_recorded = transactions
            .find_all_by_order(order_id)
            .await?
            .iter()
            .any(|t| t.processor_transaction_id == processor_transaction_id);
        if already_recorded {
            tracing::info!(order_id = %order_id, processor_transaction_id, "payment already recorded, ignoring redelivery");
            return Ok(PaymentVerdict::ExactMatch);
        }

        let decimal_places = paid_crypto_currency.default_decimal_places();
        let required_crypto = invoice
            .payment_amount_crypto
            .map(|d| CryptoAmount::normalize(d, decimal_places))
            .unwrap_or_else(|| CryptoAmount::normalize(Decimal::ZERO, decimal_places));

        let confirmed = ConfirmedPayment {
            paid: CryptoAmount::normalize(paid_crypto, decimal_places),
            required: required_crypto,
            paid_currency: paid_crypto_currency,
            required_currency: invoice.crypto_currency,
            now: chrono::Utc::now(),
            deadline: invoice.expires_at,
        };
        let verdict = crate::classify::classify_payment(confirmed, self.config.tolerance_overpayment_percent);

        let already_terminal = matches!(
            order.status,
            shopcore_order::OrderStatus::Paid
                | shopcore_order::OrderStatus::PaidAwaitingShipment
                | shopcore_order::OrderStatus::Shipped
                | shopcore_order::OrderStatus::CancelledByUser
                | shopcore_order::OrderStatus::CancelledByAdmin
                | shopcore_order::OrderStatus::CancelledBySystem
                | shopcore_order::OrderStatus::Timeout
        );

        if already_terminal && verdict != PaymentVerdict::CurrencyMismatch {
            // Double payment: credit the full fiat value, notify, stop.
            let mut user = users
                .find_by_id(order.user_id)
                .await?
                .ok_or(shopcore_core::AccountsError::NotFound(order.user_id))?;
            user.credit_wallet(paid_fiat);
            users.save(&user).await?;
            self.record_transaction(transactions, invoice, &order, processor_transaction_id, paid_crypto, paid_crypto_currency, paid_fiat, false)
                .await?;
            self.notifier
                .notify_user(order.user_id, format!("A late payment of {paid_fiat} for order {order_id} was credited to your wallet."))
                .await;
            return Ok(verdict);
        }

        match verdict {
            PaymentVerdict::ExactMatch | PaymentVerdict::MinorOverpayment => {
                self.record_transaction(transactions, invoice, &order, processor_transaction_id, paid_crypto, paid_crypto_currency, paid_fiat, false)
                    .await?;
                invoices.mark_inactive(invoice.id).await?;
                order_service.complete_order(items, orders, buy_history, order_id, has_physical).await?;
            }
            PaymentVerdict::Overpayment => {
                self.record_transaction(transactions, invoice, &order, processor_transaction_id, paid_crypto, paid_crypto_currency, paid_fiat, true)
                    .await?;
                invoices.mark_inactive(invoice.id).await?;
                let excess = paid_fiat.checked_sub(invoice.fiat_amount).unwrap_or(Fiat::ZERO);
                if !excess.is_zero() {
                    let mut user = users
                        .find_by_id(order.user_id)
                        .await?
                        .ok_or(shopcore_core::AccountsError::NotFound(order.user_id))?;
                    user.credit_wallet(excess);
                    users.save(&user).await?;
                }
                order_service.complete_order(items, orders, buy_history, order_id, has_physical).await?;
            }
            PaymentVerdict::Underpayment => {
                self.record_transaction(transactions, invoice, &order, processor_transaction_id, paid_crypto, paid_crypto_currency, paid_fiat, false)
                    .await?;
                if self.config.underpayment_retry_enabled && order.retry_count == 0 {
                    invoices.mark_inactive(invoice.id).await?;
                    let mut order = order;
                    order.status = shopcore_order::OrderStatus::PendingPaymentPartial;
                    order.retry_count += 1;
                    orders.save(&order).await?;

                    let remaining = invoice.fiat_amount.checked_sub(paid_fiat).unwrap_or(Fiat::ZERO);
                    self.create_invoice(
                        processor,
                        invoices,
                        Some(order_id),
                        order.user_id,
                        remaining,
                        &order.currency,
                        invoice.crypto_currency,
                        true,
                        Some(chrono::Utc::now() + chrono::Duration::minutes(self.config.underpayment_retry_timeout_minutes)),
                    )
                    .await?;
                } else {
                    let total_paid = self.total_paid_for_order(transactions, order_id).await?;
                    let user = users
                        .find_by_id(order.user_id)
                        .await?
                        .ok_or(shopcore_core::AccountsError::NotFound(order.user_id))?;
                    order_service
                        .cancel_order(
                            items,
                            orders,
                            users,
                            strikes,
                            order_id,
                            CancellationReason::Timeout,
                            total_paid,
                            user,
                            is_mixed_order,
                            physical_items_total,
                            Some("underpayment retry exhausted".to_string()),
                            false,
                            Some(self.config.underpayment_penalty_percent),
                        )
                        .await?;
                }
            }
            PaymentVerdict::LatePayment => {
                let total_paid = self.total_paid_for_order(transactions, order_id).await?;
                let user = users
                    .find_by_id(order.user_id)
                    .await?
                    .ok_or(shopcore_core::AccountsError::NotFound(order.user_id))?;
                order_service
                    .cancel_order(
                        items,
                        orders,
                        users,
                        strikes,
                        order_id,
                        CancellationReason::Timeout,
                        total_paid,
                        user,
                        is_mixed_order,
                        physical_items_total,
                        Some("payment arrived after deadline".to_string()),
                        true,
                        None,
                    )
                    .await?;
            }
            PaymentVerdict::CurrencyMismatch => {
                self.notifier
                    .notify_admins(format!("currency mismatch on order {order_id}: expected {:?}, received {:?}", invoice.crypto_currency, paid_crypto_currency))
                    .await;
            }
        }

        Ok(verdict)
    }

    /// A confirmed deposit credits the wallet unconditionally and then runs
    /// the unban check. `is_paid` on the stored `Deposit` guards against
    /// crediting the same webhook redelivery twice.
    pub async fn handle_deposit<U: UserRepository, D: DepositRepository>(
        &self,
        users: &U,
        deposits: &D,
        deposit: &Deposit,
        strike_enforcer: &shopcore_core::StrikeEnforcer<N>,
    ) -> Result<(), PaymentError> {
        if deposit.is_paid {
            tracing::info!(deposit_id = %deposit.id, "deposit already credited, ignoring redelivery");
            return Ok(());
        }

        let mut user = users.find_by_id(deposit.user_id).await?.ok_or(shopcore_core::AccountsError::NotFound(deposit.user_id))?;
        user.credit_wallet(deposit.fiat_amount);
        users.save(&user).await?;
        strike_enforcer
            .maybe_unban(users, user, deposit.fiat_amount, self.config.unban_top_up_amount)
            .await?;
        deposits.mark_paid(deposit.id).await?;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn record_transaction<TR: PaymentTransactionRepository>(
        &self,
        transactions: &TR,
        invoice: &Invoice,
        order: &shopcore_order::Order,
        processor_transaction_id: String,
        paid_crypto: Decimal,
        paid_crypto_currency: CryptoCurrency,
        paid_fiat: Fiat,
        is_overpayment: bool,
    ) -> Result<(), PaymentError> {
        transactions
            .insert(&PaymentTransaction {
                id: Uuid::new_v4(),
                order_id: invoice.order_id,
                user_id: order.user_id,
                invoice_id: Some(invoice.id),
                processor_transaction_id,
                crypto_currency: paid_crypto_currency,
                crypto_amount: paid_crypto,
                fiat_amount: paid_fiat,
                is_overpayment,
                received_at: chrono::Utc::now(),
            })
            .await
    }

    async fn total_paid_for_order<TR: PaymentTransactionRepository>(
        &self,
        transactions: &TR,
        order_id: Uuid,
    ) -> Result<Fiat, PaymentError> {
        let rows = transactions.find_all_by_order(order_id).await?;
        Ok(rows.iter().fold(Fiat::ZERO, |acc, t| acc.checked_add(t.fiat_amount).unwrap_or(acc)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use shopcore_catalog::{Item, ItemError};
    use shopcore_core::{AccountsError, ProcessorInvoice, Strike, User};
    use shopcore_domain::NoopNotifier;
    use shopcore_order::{BuyHistoryRecord, Order, OrderError, OrderStatus};
    use std::sync::Mutex;

    fn config() -> PaymentServiceConfig {
        PaymentServiceConfig {
            tolerance_overpayment_percent: dec!(0.1),
            underpayment_retry_enabled: true,
            underpayment_retry_timeout_minutes: 30,
            underpayment_penalty_percent: dec!(10),
            late_payment_penalty_percent: dec!(10),
            unban_top_up_amount: Fiat::new(dec!(20)),
            order_timeout_minutes: 30,
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

    struct FakeUsers {
        rows: Mutex<Vec<User>>,
    }
    #[async_trait]
    impl UserRepository for FakeUsers {
        async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>, AccountsError> {
            Ok(self.rows.lock().unwrap().iter().find(|u| u.id == user_id).cloned())
        }
        async fn find_by_external_id(&self, _external_id: &str) -> Result<Option<User>, AccountsError> {
            Ok(None)
        }
        async fn save(&self, user: &User) -> Result<(), AccountsError> {
            let mut rows = self.rows.lock().unwrap();
            rows.retain(|u| u.id != user.id);
            rows.push(user.clone());
            Ok(())
        }
    }

    struct FakeStrikes;
    #[async_trait]
    impl StrikeRepository for FakeStrikes {
        async fn insert_if_absent(&self, _strike: &Strike) -> Result<bool, AccountsError> {
            Ok(true)
        }
        async fn count_for_user(&self, _user_id: Uuid) -> Result<i32, AccountsError> {
            Ok(1)
        }
    }

    struct FakeItems {
        rows: Mutex<Vec<Item>>,
    }
    #[async_trait]
    impl ItemRepository for FakeItems {
        async fn reserve(&self, _subcategory_id: Uuid, _requested_qty: i32, _order_id: Uuid) -> Result<Vec<Item>, ItemError> {
            Ok(vec![])
        }
        async fn release(&self, order_id: Uuid) -> Result<(), ItemError> {
            let mut rows = self.rows.lock().unwrap();
            for row in rows.iter_mut().filter(|r| r.order_id == Some(order_id)) {
                row.order_id = None;
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
            Ok(self.rows.lock().unwrap().iter().filter(|r| r.order_id == Some(order_id)).cloned().collect())
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

    struct FakeInvoices {
        rows: Mutex<Vec<Invoice>>,
    }
    #[async_trait]
    impl InvoiceRepository for FakeInvoices {
        async fn insert(&self, invoice: &Invoice) -> Result<(), PaymentError> {
            self.rows.lock().unwrap().push(invoice.clone());
            Ok(())
        }
        async fn exists_with_number(&self, invoice_number: &str) -> Result<bool, PaymentError> {
            Ok(self.rows.lock().unwrap().iter().any(|i| i.invoice_number == invoice_number))
        }
        async fn find_active_by_order(&self, order_id: Uuid) -> Result<Option<Invoice>, PaymentError> {
            Ok(self.rows.lock().unwrap().iter().find(|i| i.order_id == Some(order_id) && i.is_active).cloned())
        }
        async fn find_all_by_order(&self, order_id: Uuid) -> Result<Vec<Invoice>, PaymentError> {
            Ok(self.rows.lock().unwrap().iter().filter(|i| i.order_id == Some(order_id)).cloned().collect())
        }
        async fn find_by_processing_id(&self, processing_id: &str) -> Result<Option<Invoice>, PaymentError> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .find(|i| i.payment_processing_id.as_deref() == Some(processing_id))
                .cloned())
        }
        async fn mark_inactive(&self, invoice_id: Uuid) -> Result<(), PaymentError> {
            let mut rows = self.rows.lock().unwrap();
            if let Some(row) = rows.iter_mut().find(|i| i.id == invoice_id) {
                row.is_active = false;
            }
            Ok(())
        }
    }

    struct FakeTransactions {
        rows: Mutex<Vec<PaymentTransaction>>,
    }
    #[async_trait]
    impl PaymentTransactionRepository for FakeTransactions {
        async fn insert(&self, transaction: &PaymentTransaction) -> Result<(), PaymentError> {
            self.rows.lock().unwrap().push(transaction.clone());
            Ok(())
        }
        async fn find_all_by_order(&self, order_id: Uuid) -> Result<Vec<PaymentTransaction>, PaymentError> {
            Ok(self.rows.lock().unwrap().iter().filter(|t| t.order_id == Some(order_id)).cloned().collect())
        }
    }

    struct FakeDeposits {
        rows: Mutex<Vec<Deposit>>,
    }
    #[async_trait]
    impl DepositRepository for FakeDeposits {
        async fn insert(&self, deposit: &Deposit) -> Result<(), PaymentError> {
            self.rows.lock().unwrap().push(deposit.clone());
            Ok(())
        }
        async fn find_by_processing_id(&self, processing_id: &str) -> Result<Option<Deposit>, PaymentError> {
            Ok(self.rows.lock().unwrap().iter().find(|d| d.processing_id == processing_id).cloned())
        }
        async fn mark_paid(&self, deposit_id: Uuid) -> Result<(), PaymentError> {
            let mut rows = self.rows.lock().unwrap();
            if let Some(row) = rows.iter_mut().find(|d| d.id == deposit_id) {
                row.is_paid = true;
            }
            Ok(())
        }
    }

    struct FakeProcessor;
    #[async_trait]
    impl PaymentProcessorClient for FakeProcessor {
        async fn issue_invoice(
            &self,
            _order_id: Uuid,
            fiat_amount: Decimal,
            _fiat_currency: &str,
            _crypto_currency: CryptoCurrency,
        ) -> Result<ProcessorInvoice, Box<dyn std::error::Error + Send + Sync>> {
            Ok(ProcessorInvoice {
                payment_processing_id: format!("proc-{}", Uuid::new_v4()),
                payment_address: "addr-1".to_string(),
                payment_amount_crypto: fiat_amount / dec!(50000),
                expires_at: chrono::Utc::now() + chrono::Duration::minutes(30),
            })
        }
    }

    fn invoice_for(order_id: Uuid, user_id: Uuid, crypto_amount: Decimal) -> Invoice {
        Invoice {
            id: Uuid::new_v4(),
            order_id: Some(order_id),
            user_id,
            invoice_number: "INV-2026-TEST01".to_string(),
            payment_processing_id: Some("proc-1".to_string()),
            payment_address: Some("addr-1".to_string()),
            fiat_amount: Fiat::new(dec!(30)),
            fiat_currency: "EUR".to_string(),
            crypto_currency: CryptoCurrency::Btc,
            payment_amount_crypto: Some(crypto_amount),
            created_at: chrono::Utc::now(),
            expires_at: chrono::Utc::now() + chrono::Duration::minutes(30),
            is_active: true,
        }
    }

    fn order_service() -> OrderService<NoopNotifier> {
        OrderService::new(
            shopcore_order::OrderServiceConfig {
                order_timeout_minutes: 30,
                order_cancel_grace_period_minutes: 15,
                payment_late_penalty_percent: dec!(10),
                max_strikes_before_ban: 3,
                exempt_admins_from_ban: false,
            },
            NoopNotifier,
        )
    }

    #[tokio::test]
    async fn exact_match_completes_order() {
        let svc = PaymentService::new(config(), NoopNotifier);
        let order_service = order_service();

        let user = User::new("buyer".to_string(), false);
        let mut order = Order::new(user.id, "EUR".to_string(), 30);
        order.status = OrderStatus::PendingPayment;
        order.total_price = Fiat::new(dec!(0.0006) * dec!(50000));

        let items = FakeItems { rows: Mutex::new(vec![]) };
        let orders = FakeOrders { rows: Mutex::new(vec![order.clone()]) };
        let users = FakeUsers { rows: Mutex::new(vec![user.clone()]) };
        let strikes = FakeStrikes;
        let invoices = FakeInvoices { rows: Mutex::new(vec![]) };
        let transactions = FakeTransactions { rows: Mutex::new(vec![]) };
        let buy_history = FakeBuyHistory { rows: Mutex::new(vec![]) };
        let processor = FakeProcessor;

        let invoice = invoice_for(order.id, user.id, dec!(0.0006));
        invoices.insert(&invoice).await.unwrap();

        let verdict = svc
            .handle_confirmed_payment(
                &processor,
                &invoices,
                &transactions,
                &orders,
                &items,
                &users,
                &strikes,
                &buy_history,
                &order_service,
                &invoice,
                "tx-1".to_string(),
                dec!(0.0006),
                CryptoCurrency::Btc,
                Fiat::new(dec!(30)),
                false,
                false,
                Fiat::ZERO,
            )
            .await
            .unwrap();

        assert_eq!(verdict, PaymentVerdict::ExactMatch);
        let saved = orders.rows.lock().unwrap()[0].clone();
        assert_eq!(saved.status, OrderStatus::Paid);
        assert_eq!(buy_history.rows.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn redelivered_webhook_for_same_transaction_is_a_noop() {
        let svc = PaymentService::new(config(), NoopNotifier);
        let order_service = order_service();

        let user = User::new("buyer".to_string(), false);
        let mut order = Order::new(user.id, "EUR".to_string(), 30);
        order.status = OrderStatus::PendingPayment;
        order.total_price = Fiat::new(dec!(0.0006) * dec!(50000));

        let items = FakeItems { rows: Mutex::new(vec![]) };
        let orders = FakeOrders { rows: Mutex::new(vec![order.clone()]) };
        let users = FakeUsers { rows: Mutex::new(vec![user.clone()]) };
        let strikes = FakeStrikes;
        let invoices = FakeInvoices { rows: Mutex::new(vec![]) };
        let transactions = FakeTransactions { rows: Mutex::new(vec![]) };
        let buy_history = FakeBuyHistory { rows: Mutex::new(vec![]) };
        let processor = FakeProcessor;

        let invoice = invoice_for(order.id, user.id, dec!(0.0006));
        invoices.insert(&invoice).await.unwrap();

        for _ in 0..2 {
            svc.handle_confirmed_payment(
                &processor,
                &invoices,
                &transactions,
                &orders,
                &items,
                &users,
                &strikes,
                &buy_history,
                &order_service,
                &invoice,
                "tx-replayed".to_string(),
                dec!(0.0006),
                CryptoCurrency::Btc,
                Fiat::new(dec!(30)),
                false,
                false,
                Fiat::ZERO,
            )
            .await
            .unwrap();
        }

        let saved = orders.rows.lock().unwrap()[0].clone();
        assert_eq!(saved.status, OrderStatus::Paid);
        assert_eq!(transactions.rows.lock().unwrap().len(), 1);
        assert_eq!(users.rows.lock().unwrap()[0].wallet_balance, Fiat::ZERO);
    }

    #[tokio::test]
    async fn overpayment_credits_excess_to_wallet() {
        let svc = PaymentService::new(config(), NoopNotifier);
        let order_service = order_service();

        let user = User::new("buyer".to_string(), false);
        let mut order = Order::new(user.id, "EUR".to_string(), 30);
        order.status = OrderStatus::PendingPayment;
        order.total_price = Fiat::new(dec!(10));

        let items = FakeItems { rows: Mutex::new(vec![]) };
        let orders = FakeOrders { rows: Mutex::new(vec![order.clone()]) };
        let users = FakeUsers { rows: Mutex::new(vec![user.clone()]) };
        let strikes = FakeStrikes;
        let invoices = FakeInvoices { rows: Mutex::new(vec![]) };
        let transactions = FakeTransactions { rows: Mutex::new(vec![]) };
        let buy_history = FakeBuyHistory { rows: Mutex::new(vec![]) };
        let processor = FakeProcessor;

        let mut invoice = invoice_for(order.id, user.id, dec!(0.0002));
        invoice.fiat_amount = Fiat::new(dec!(10));
        invoices.insert(&invoice).await.unwrap();

        let verdict = svc
            .handle_confirmed_payment(
                &processor,
                &invoices,
                &transactions,
                &orders,
                &items,
                &users,
                &strikes,
                &buy_history,
                &order_service,
                &invoice,
                "tx-2".to_string(),
                dec!(0.00021000),
                CryptoCurrency::Btc,
                Fiat::new(dec!(10.50)),
                false,
                false,
                Fiat::ZERO,
            )
            .await
            .unwrap();

        assert_eq!(verdict, PaymentVerdict::Overpayment);
        let saved_user = users.rows.lock().unwrap()[0].clone();
        assert_eq!(saved_user.wallet_balance, Fiat::new(dec!(0.50)));
    }

    #[tokio::test]
    async fn first_underpayment_transitions_to_partial_and_issues_retry_invoice() {
        let svc = PaymentService::new(config(), NoopNotifier);
        let order_service = order_service();

        let user = User::new("buyer".to_string(), false);
        let mut order = Order::new(user.id, "EUR".to_string(), 30);
        order.status = OrderStatus::PendingPayment;
        order.total_price = Fiat::new(dec!(30));

        let items = FakeItems { rows: Mutex::new(vec![]) };
        let orders = FakeOrders { rows: Mutex::new(vec![order.clone()]) };
        let users = FakeUsers { rows: Mutex::new(vec![user.clone()]) };
        let strikes = FakeStrikes;
        let invoices = FakeInvoices { rows: Mutex::new(vec![]) };
        let transactions = FakeTransactions { rows: Mutex::new(vec![]) };
        let buy_history = FakeBuyHistory { rows: Mutex::new(vec![]) };
        let processor = FakeProcessor;

        let invoice = invoice_for(order.id, user.id, dec!(0.0006));
        invoices.insert(&invoice).await.unwrap();

        let verdict = svc
            .handle_confirmed_payment(
                &processor,
                &invoices,
                &transactions,
                &orders,
                &items,
                &users,
                &strikes,
                &buy_history,
                &order_service,
                &invoice,
                "tx-3".to_string(),
                dec!(0.0004),
                CryptoCurrency::Btc,
                Fiat::new(dec!(20)),
                false,
                false,
                Fiat::ZERO,
            )
            .await
            .unwrap();

        assert_eq!(verdict, PaymentVerdict::Underpayment);
        let saved = orders.rows.lock().unwrap()[0].clone();
        assert_eq!(saved.status, OrderStatus::PendingPaymentPartial);
        assert_eq!(saved.retry_count, 1);

        let all_invoices = invoices.rows.lock().unwrap().clone();
        assert_eq!(all_invoices.len(), 2);
        let original = all_invoices.iter().find(|i| i.id == invoice.id).unwrap();
        assert!(!original.is_active);
        let retry = all_invoices.iter().find(|i| i.id != invoice.id).unwrap();
        assert!(retry.is_active);
        assert_eq!(retry.fiat_amount, Fiat::new(dec!(10)));
        assert!(retry.expires_at <= chrono::Utc::now() + chrono::Duration::minutes(31));
    }

    #[tokio::test]
    async fn second_underpayment_cancels_with_underpayment_penalty() {
        let svc = PaymentService::new(config(), NoopNotifier);
        let order_service = order_service();

        let user = User::new("buyer".to_string(), false);
        let mut order = Order::new(user.id, "EUR".to_string(), 30);
        order.status = OrderStatus::PendingPaymentPartial;
        order.retry_count = 1;
        order.total_price = Fiat::new(dec!(30));

        let items = FakeItems { rows: Mutex::new(vec![]) };
        let orders = FakeOrders { rows: Mutex::new(vec![order.clone()]) };
        let users = FakeUsers { rows: Mutex::new(vec![user.clone()]) };
        let strikes = FakeStrikes;
        let invoices = FakeInvoices { rows: Mutex::new(vec![]) };
        let transactions = FakeTransactions { rows: Mutex::new(vec![]) };
        let buy_history = FakeBuyHistory { rows: Mutex::new(vec![]) };
        let processor = FakeProcessor;

        let invoice = invoice_for(order.id, user.id, dec!(0.0002));
        invoices.insert(&invoice).await.unwrap();

        svc.handle_confirmed_payment(
            &processor,
            &invoices,
            &transactions,
            &orders,
            &items,
            &users,
            &strikes,
            &buy_history,
            &order_service,
            &invoice,
            "tx-4".to_string(),
            dec!(0.0001),
            CryptoCurrency::Btc,
            Fiat::new(dec!(5)),
            false,
            false,
            Fiat::ZERO,
        )
        .await
        .unwrap();

        let saved = orders.rows.lock().unwrap()[0].clone();
        assert_eq!(saved.status, OrderStatus::Timeout);
        // Penalty applies against the paid amount: 10% of 5 = 0.5, refund 4.50.
        let saved_user = users.rows.lock().unwrap()[0].clone();
        assert_eq!(saved_user.wallet_balance, Fiat::new(dec!(4.50)));
    }

    #[tokio::test]
    async fn deposit_credits_wallet_and_is_idempotent_on_redelivery() {
        let svc = PaymentService::new(config(), NoopNotifier);
        let strike_enforcer = shopcore_core::StrikeEnforcer::new(3, false, NoopNotifier);

        let user = User::new("buyer".to_string(), false);
        let users = FakeUsers { rows: Mutex::new(vec![user.clone()]) };
        let deposits = FakeDeposits { rows: Mutex::new(vec![]) };

        let deposit = Deposit {
            id: Uuid::new_v4(),
            user_id: user.id,
            crypto_currency: CryptoCurrency::Btc,
            crypto_amount: Some(dec!(0.0002)),
            fiat_amount: Fiat::new(dec!(10)),
            payment_address: Some("addr-2".to_string()),
            processing_id: "proc-deposit-1".to_string(),
            received_at: chrono::Utc::now(),
            is_paid: false,
        };
        deposits.insert(&deposit).await.unwrap();

        svc.handle_deposit(&users, &deposits, &deposit, &strike_enforcer).await.unwrap();
        let credited = users.rows.lock().unwrap()[0].clone();
        assert_eq!(credited.wallet_balance, Fiat::new(dec!(10)));

        let mut paid_deposit = deposit.clone();
        paid_deposit.is_paid = true;
        svc.handle_deposit(&users, &deposits, &paid_deposit, &strike_enforcer).await.unwrap();
        let after_redelivery = users.rows.lock().unwrap()[0].clone();
        assert_eq!(after_redelivery.wallet_balance, Fiat::new(dec!(10)));
    }
}
