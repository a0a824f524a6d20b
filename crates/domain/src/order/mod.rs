//! Order placement and the order status machine.

mod placement;
mod service;
mod status;

pub use placement::{PlaceOrder, PlaceOrderItem, ValidatedOrder};
pub use service::OrderService;
pub use status::authorize_status_change;

use common::{OrderId, OrderStatus, ProductId};
use thiserror::Error;

/// Errors that can occur during order operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    /// One or more required order fields are absent.
    #[error("Missing required fields: {}", fields.join(", "))]
    MissingFields { fields: Vec<&'static str> },

    /// Bank transfers must carry a proof-of-transfer image.
    #[error("Proof of transfer is required for bank transfers")]
    ProofRequired,

    /// An item asks for zero units.
    #[error("Invalid quantity {quantity} for product {product_id}")]
    InvalidQuantity { product_id: ProductId, quantity: u32 },

    /// An item references a product missing from the catalog.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// Not enough stock to satisfy an item.
    #[error(
        "Insufficient stock for product {product_id}: available {available}, requested {requested}"
    )]
    InsufficientStock {
        product_id: ProductId,
        available: i64,
        requested: u32,
    },

    /// The order does not exist.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The status table does not allow this change.
    #[error("Invalid status transition: cannot move from {from} to {to}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },

    /// A customer acted on someone else's order.
    #[error("Order {0} belongs to another user")]
    NotOrderOwner(OrderId),

    /// A customer tried to cancel an order that is no longer pending.
    #[error("Order cannot be cancelled in {status} state")]
    NotCancellable { status: OrderStatus },
}

impl OrderError {
    /// Machine-readable code used in API error bodies and metric labels.
    pub fn code(&self) -> &'static str {
        match self {
            OrderError::MissingFields { .. } => "missing_fields",
            OrderError::ProofRequired => "proof_required",
            OrderError::InvalidQuantity { .. } => "invalid_quantity",
            OrderError::ProductNotFound(_) => "product_not_found",
            OrderError::InsufficientStock { .. } => "insufficient_stock",
            OrderError::OrderNotFound(_) => "order_not_found",
            OrderError::InvalidStatusTransition { .. } => "invalid_status_transition",
            OrderError::NotOrderOwner(_) => "not_order_owner",
            OrderError::NotCancellable { .. } => "not_cancellable",
        }
    }
}
