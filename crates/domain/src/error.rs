//! Domain error types.

use store::StoreError;
use thiserror::Error;

use crate::cart::CartError;
use crate::order::OrderError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A persistence operation failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Order placement or a status change was rejected.
    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    /// A bound-cart operation was rejected.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// The session may not act on the requested resource.
    #[error("Forbidden: {0}")]
    Forbidden(String),
}

impl DomainError {
    /// Machine-readable code used in API error bodies and metric labels.
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::Store(StoreError::StatusConflict { .. }) => "status_conflict",
            DomainError::Store(_) => "persistence_failure",
            DomainError::Order(e) => e.code(),
            DomainError::Cart(e) => e.code(),
            DomainError::Forbidden(_) => "forbidden",
        }
    }
}
