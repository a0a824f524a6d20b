use common::{LineId, OrderId, OrderStatus, ProductId};
use thiserror::Error;

/// Errors that can occur when interacting with the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A conditional stock debit found less stock than requested.
    #[error(
        "Insufficient stock for product {product_id}: available {available}, requested {requested}"
    )]
    InsufficientStock {
        product_id: ProductId,
        available: i64,
        requested: u32,
    },

    /// A product referenced by a write does not exist.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// The order was not found.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The order status changed between read and write.
    #[error("Status conflict for order {order_id}: expected {expected}, found {actual}")]
    StatusConflict {
        order_id: OrderId,
        expected: OrderStatus,
        actual: OrderStatus,
    },

    /// The cart line was not found in the user's cart.
    #[error("Cart line not found: {0}")]
    LineNotFound(LineId),

    /// The order handed to a commit is malformed.
    #[error("Invalid order commit: {0}")]
    InvalidCommit(String),

    /// A write failed for a reason other than the ones above.
    #[error("Write failed: {0}")]
    WriteFailed(String),

    /// A stored row could not be decoded.
    #[error("Invalid row: {0}")]
    InvalidRow(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
