use std::sync::Arc;

use shopcore_core::{HttpPaymentProcessorClient, StrikeEnforcer};
use shopcore_order::OrderService;
use shopcore_payment::PaymentService;
use shopcore_store::{
    Config, DbClient, PostgresBuyHistoryRepository, PostgresCartRepository, PostgresDepositRepository,
    PostgresInvoiceRepository, PostgresItemRepository, PostgresOrderRepository, PostgresPaymentTransactionRepository,
    PostgresShippingAddressRepository, PostgresStrikeRepository, PostgresUserRepository, RedisClient,
};

use crate::notifier::ChatNotifier;

pub type Notifier = ChatNotifier<PostgresUserRepository>;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: DbClient,
    pub redis: RedisClient,
    pub processor: Arc<HttpPaymentProcessorClient>,
    pub users: PostgresUserRepository,
    pub strikes_repo: PostgresStrikeRepository,
    pub items: PostgresItemRepository,
    pub carts: PostgresCartRepository,
    pub orders: PostgresOrderRepository,
    pub invoices: PostgresInvoiceRepository,
    pub transactions: PostgresPaymentTransactionRepository,
    pub shipping_addresses: PostgresShippingAddressRepository,
    pub deposits: PostgresDepositRepository,
    pub buy_history: PostgresBuyHistoryRepository,
    pub order_service: Arc<OrderService<Notifier>>,
    pub payment_service: Arc<PaymentService<Notifier>>,
    pub strike_enforcer: Arc<StrikeEnforcer<Notifier>>,
    pub notifier: Notifier,
}
