//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{CartError, DomainError, OrderError};
use serde_json::{Map, Value, json};
use store::StoreError;

/// API-level error type that maps to HTTP responses.
///
/// Bodies read `{"error": message, "code": machine_code, ...details}`.
#[derive(Debug)]
pub enum ApiError {
    /// Malformed request from the client.
    BadRequest(String),
    /// An upload exceeded the configured limit.
    PayloadTooLarge(String),
    /// Domain logic error.
    Domain(DomainError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg, Map::new()),
            ApiError::PayloadTooLarge(msg) => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "payload_too_large",
                msg,
                Map::new(),
            ),
            ApiError::Domain(err) => {
                let status = domain_status(&err);
                (status, err.code(), err.to_string(), domain_details(&err))
            }
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                msg,
                Map::new(),
            ),
        };

        if status.is_server_error() {
            tracing::error!(error = %message, code, "request failed");
        }

        let mut body = details;
        body.insert("error".to_string(), Value::String(message));
        body.insert("code".to_string(), Value::String(code.to_string()));
        (status, axum::Json(Value::Object(body))).into_response()
    }
}

fn domain_status(err: &DomainError) -> StatusCode {
    match err {
        DomainError::Order(order_err) => match order_err {
            OrderError::MissingFields { .. }
            | OrderError::ProofRequired
            | OrderError::InvalidQuantity { .. }
            | OrderError::InsufficientStock { .. } => StatusCode::BAD_REQUEST,
            OrderError::ProductNotFound(_) | OrderError::OrderNotFound(_) => StatusCode::NOT_FOUND,
            OrderError::NotOrderOwner(_) => StatusCode::FORBIDDEN,
            OrderError::InvalidStatusTransition { .. } | OrderError::NotCancellable { .. } => {
                StatusCode::CONFLICT
            }
        },
        DomainError::Cart(cart_err) => match cart_err {
            CartError::InvalidQuantity { .. } => StatusCode::BAD_REQUEST,
            CartError::ProductNotFound(_) | CartError::LineNotFound(_) => StatusCode::NOT_FOUND,
        },
        DomainError::Forbidden(_) => StatusCode::FORBIDDEN,
        DomainError::Store(StoreError::StatusConflict { .. }) => StatusCode::CONFLICT,
        DomainError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn domain_details(err: &DomainError) -> Map<String, Value> {
    let details = match err {
        DomainError::Order(OrderError::MissingFields { fields }) => json!({ "fields": fields }),
        DomainError::Order(OrderError::InvalidQuantity {
            product_id,
            quantity,
        }) => json!({ "product_id": product_id, "quantity": quantity }),
        DomainError::Order(OrderError::ProductNotFound(product_id))
        | DomainError::Cart(CartError::ProductNotFound(product_id)) => {
            json!({ "product_id": product_id })
        }
        DomainError::Order(OrderError::InsufficientStock {
            product_id,
            available,
            requested,
        }) => json!({
            "product_id": product_id,
            "available": available,
            "requested": requested,
        }),
        DomainError::Order(OrderError::InvalidStatusTransition { from, to }) => {
            json!({ "from": from, "to": to })
        }
        DomainError::Order(OrderError::NotCancellable { status }) => json!({ "status": status }),
        DomainError::Cart(CartError::InvalidQuantity { quantity }) => {
            json!({ "quantity": quantity })
        }
        _ => return Map::new(),
    };

    match details {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

impl From<OrderError> for ApiError {
    fn from(err: OrderError) -> Self {
        ApiError::Domain(err.into())
    }
}
