//! Cart and checkout error types.

use common::ProductId;
use serde::Deserialize;
use thiserror::Error;

use crate::config::InvalidBaseUrl;

/// Errors surfaced by the cart store and its backends.
#[derive(Debug, Error)]
pub enum CartError {
    /// The server could not be reached or did not answer in time.
    #[error("Transport failure: {0}")]
    Transport(String),

    /// The server answered with an error status.
    #[error("Server rejected cart update ({status}): {message}")]
    Server {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// Device storage could not be read or written.
    #[error("Device storage error: {0}")]
    Storage(String),

    /// No line holds this product and color.
    #[error("Product {product_id} is not in the cart")]
    ItemNotInCart {
        product_id: ProductId,
        selected_color: Option<String>,
    },

    /// Cart contents could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Config(#[from] InvalidBaseUrl),
}

impl CartError {
    /// True when the server refused a line because its product left the catalog.
    pub fn is_product_not_found(&self) -> bool {
        matches!(
            self,
            CartError::Server { status: 404, code: Some(code), .. } if code == "product_not_found"
        )
    }
}

impl From<reqwest::Error> for CartError {
    fn from(err: reqwest::Error) -> Self {
        CartError::Transport(err.to_string())
    }
}

impl From<std::io::Error> for CartError {
    fn from(err: std::io::Error) -> Self {
        CartError::Storage(err.to_string())
    }
}

/// Errors surfaced by checkout.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("Sign in to place an order")]
    NotSignedIn,

    #[error("Cart is empty")]
    EmptyCart,

    #[error("Invalid quantity {quantity} for product {product_id}")]
    InvalidQuantity { product_id: ProductId, quantity: i32 },

    #[error("Missing required fields: {}", fields.join(", "))]
    MissingFields { fields: Vec<String> },

    #[error("Proof of transfer is required for bank transfers")]
    ProofRequired,

    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    #[error(
        "Insufficient stock for product {product_id}: available {available}, requested {requested}"
    )]
    InsufficientStock {
        product_id: ProductId,
        available: i64,
        requested: u32,
    },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The order could not be stored.
    #[error("Persistence failure: {0}")]
    Persistence(String),

    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Invalid proof image: {0}")]
    InvalidProof(String),

    #[error("Unexpected response ({status}): {message}")]
    Unexpected { status: u16, message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Config(#[from] InvalidBaseUrl),
}

impl From<reqwest::Error> for CheckoutError {
    fn from(err: reqwest::Error) -> Self {
        CheckoutError::Transport(err.to_string())
    }
}

/// Error body sent by the server: `{"error", "code", ...details}`.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default)]
    pub product_id: Option<ProductId>,
    #[serde(default)]
    pub available: Option<i64>,
    #[serde(default)]
    pub requested: Option<u32>,
}

impl ErrorBody {
    /// Parses an error body, keeping the raw text when it is not JSON.
    pub fn parse(text: &str) -> Self {
        serde_json::from_str(text).unwrap_or_else(|_| ErrorBody {
            error: text.to_string(),
            ..ErrorBody::default()
        })
    }

    pub fn into_cart_error(self, status: u16) -> CartError {
        CartError::Server {
            status,
            code: self.code,
            message: self.error,
        }
    }

    pub fn into_checkout_error(self, status: u16) -> CheckoutError {
        match (self.code.as_deref(), self.product_id) {
            (Some("missing_fields"), _) => CheckoutError::MissingFields {
                fields: self.fields,
            },
            (Some("proof_required"), _) => CheckoutError::ProofRequired,
            (Some("product_not_found"), Some(product_id)) => {
                CheckoutError::ProductNotFound(product_id)
            }
            (Some("insufficient_stock"), Some(product_id)) => CheckoutError::InsufficientStock {
                product_id,
                available: self.available.unwrap_or_default(),
                requested: self.requested.unwrap_or_default(),
            },
            (Some("forbidden" | "not_order_owner"), _) => CheckoutError::Forbidden(self.error),
            (Some("persistence_failure"), _) => CheckoutError::Persistence(self.error),
            _ if status >= 500 => CheckoutError::Persistence(self.error),
            _ => CheckoutError::Unexpected {
                status,
                message: self.error,
            },
        }
    }
}
