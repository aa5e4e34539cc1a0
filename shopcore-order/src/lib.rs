pub mod error;
pub mod manager;
pub mod models;
pub mod refund;
pub mod repository;
pub mod shipping;

pub use error::OrderError;
pub use manager::{CartLine, OrderService, OrderServiceConfig, StockAdjustment};
pub use models::{BuyHistoryRecord, CancellationReason, Order, OrderItemSnapshot, OrderStatus, RefundBreakdown};
pub use refund::{compute_refund_breakdown, compute_reservation_fee};
pub use repository::{BuyHistoryRepository, OrderRepository};
pub use shipping::{decrypt_address, encrypt_address, EncryptionMode, ShippingAddress, ShippingAddressRepository, ShippingError};
