pub mod cart;
pub mod error;
pub mod item;

pub use cart::{Cart, CartItem, CartRepository};
pub use error::{CartError, ItemError};
pub use item::{Item, ItemRepository};
