pub mod accounts;
pub mod buy_history;
pub mod carts;
pub mod deposits;
pub mod invoices;
pub mod items;
pub mod orders;
pub mod shipping;
pub mod transactions;

pub use accounts::{PostgresStrikeRepository, PostgresUserRepository};
pub use buy_history::PostgresBuyHistoryRepository;
pub use carts::PostgresCartRepository;
pub use deposits::PostgresDepositRepository;
pub use invoices::PostgresInvoiceRepository;
pub use items::PostgresItemRepository;
pub use orders::PostgresOrderRepository;
pub use shipping::PostgresShippingAddressRepository;
pub use transactions::PostgresPaymentTransactionRepository;
