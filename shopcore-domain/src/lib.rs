pub mod events;
pub mod money;
pub mod notify;
pub mod pii;

pub use money::{CryptoAmount, CryptoCurrency, Fiat};
pub use notify::NotificationPort;
pub use pii::Masked;
