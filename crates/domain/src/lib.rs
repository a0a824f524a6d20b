//! Domain layer for the storefront pipeline.
//!
//! - Order placement with validation against the catalog and an atomic,
//!   stock-debiting commit
//! - The order status machine and who may drive it
//! - Server-side operations on bound carts

pub mod cart;
pub mod error;
pub mod order;

pub use cart::{CartError, CartService};
pub use error::DomainError;
pub use order::{
    OrderError, OrderService, PlaceOrder, PlaceOrderItem, ValidatedOrder,
    authorize_status_change,
};
