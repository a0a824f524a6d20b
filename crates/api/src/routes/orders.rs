//! Order placement, status and query endpoints.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{FromRequest, Multipart, Path, Request, State};
use axum::http::{StatusCode, header};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use common::{OrderId, OrderStatus, OrderView, ProofImage, Session};
use domain::{DomainError, PlaceOrder};
use serde::Deserialize;
use serde_json::Value;

use super::parse_user_id;
use crate::error::ApiError;
use crate::session::CurrentSession;
use crate::{AppState, StorefrontStore};

const DEFAULT_PROOF_TYPE: &str = "application/octet-stream";

/// JSON form of `POST /orders`.
#[derive(Deserialize)]
pub struct PlaceOrderBody {
    /// The order as an object or as a JSON-encoded string.
    #[serde(rename = "orderData")]
    pub order_data: Option<Value>,
    pub slip: Option<SlipUpload>,
}

/// Base64 proof-of-transfer upload.
#[derive(Deserialize)]
pub struct SlipUpload {
    #[serde(default)]
    pub content_type: Option<String>,
    pub data: String,
}

#[derive(Deserialize)]
pub struct StatusUpdate {
    pub status: String,
}

/// POST /orders, either `multipart/form-data` with an `orderData` field and
/// an optional `slip` file, or JSON `{orderData, slip?}`.
#[tracing::instrument(skip(state, session, request))]
pub async fn place<S: StorefrontStore>(
    State(state): State<Arc<AppState<S>>>,
    CurrentSession(session): CurrentSession,
    request: Request,
) -> Result<(StatusCode, Json<OrderView>), ApiError> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));

    let cmd = if is_multipart {
        let multipart = Multipart::from_request(request, &())
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        read_multipart(multipart, state.max_proof_bytes).await?
    } else {
        let body = Bytes::from_request(request, &())
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        read_json(&body, state.max_proof_bytes)?
    };

    authorize_placement(&session, &cmd)?;
    let order = state.orders.place_order(cmd).await?;
    Ok((StatusCode::CREATED, Json(OrderView::from(&order))))
}

/// PATCH /orders/{id}/status
#[tracing::instrument(skip(state, session, body))]
pub async fn set_status<S: StorefrontStore>(
    State(state): State<Arc<AppState<S>>>,
    CurrentSession(session): CurrentSession,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<OrderView>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let update: StatusUpdate = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid status update: {e}")))?;
    let status: OrderStatus = update.status.parse().map_err(ApiError::BadRequest)?;

    let order = state.orders.set_status(&session, order_id, status).await?;
    Ok(Json(OrderView::from(&order)))
}

/// GET /orders/{id}
#[tracing::instrument(skip(state, session))]
pub async fn get<S: StorefrontStore>(
    State(state): State<Arc<AppState<S>>>,
    CurrentSession(session): CurrentSession,
    Path(id): Path<String>,
) -> Result<Json<OrderView>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let order = state.orders.get_order(&session, order_id).await?;
    Ok(Json(OrderView::from(&order)))
}

/// GET /users/{user_id}/orders, newest first.
#[tracing::instrument(skip(state, session))]
pub async fn for_user<S: StorefrontStore>(
    State(state): State<Arc<AppState<S>>>,
    CurrentSession(session): CurrentSession,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<OrderView>>, ApiError> {
    let user_id = parse_user_id(&user_id)?;
    let orders = state.orders.orders_for_user(&session, user_id).await?;
    Ok(Json(orders.iter().map(OrderView::from).collect()))
}

async fn read_multipart(mut multipart: Multipart, max_proof_bytes: usize) -> Result<PlaceOrder, ApiError> {
    let mut order_data: Option<String> = None;
    let mut proof: Option<ProofImage> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?
    {
        match field.name() {
            Some("orderData") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.body_text()))?;
                order_data = Some(text);
            }
            Some("slip") => {
                let content_type = field
                    .content_type()
                    .unwrap_or(DEFAULT_PROOF_TYPE)
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.body_text()))?;
                proof = Some(checked_proof(content_type, bytes.to_vec(), max_proof_bytes)?);
            }
            other => {
                tracing::debug!(field = ?other, "ignoring unknown multipart field");
            }
        }
    }

    let mut cmd = match order_data {
        Some(text) => parse_order_data(Value::String(text))?,
        None => PlaceOrder::default(),
    };
    cmd.proof = proof;
    Ok(cmd)
}

fn read_json(body: &[u8], max_proof_bytes: usize) -> Result<PlaceOrder, ApiError> {
    let body: PlaceOrderBody = serde_json::from_slice(body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid order body: {e}")))?;

    let mut cmd = match body.order_data {
        Some(value) => parse_order_data(value)?,
        None => PlaceOrder::default(),
    };
    if let Some(slip) = body.slip {
        let bytes = STANDARD
            .decode(slip.data.trim())
            .map_err(|e| ApiError::BadRequest(format!("Invalid slip encoding: {e}")))?;
        let content_type = slip
            .content_type
            .unwrap_or_else(|| DEFAULT_PROOF_TYPE.to_string());
        cmd.proof = Some(checked_proof(content_type, bytes, max_proof_bytes)?);
    }
    Ok(cmd)
}

/// Accepts `orderData` as an object or as a JSON-encoded string.
fn parse_order_data(value: Value) -> Result<PlaceOrder, ApiError> {
    let parsed = match value {
        Value::String(text) => serde_json::from_str(&text),
        other => serde_json::from_value(other),
    };
    parsed.map_err(|e| ApiError::BadRequest(format!("Invalid orderData: {e}")))
}

fn checked_proof(
    content_type: String,
    bytes: Vec<u8>,
    max_proof_bytes: usize,
) -> Result<ProofImage, ApiError> {
    if bytes.len() > max_proof_bytes {
        return Err(ApiError::PayloadTooLarge(format!(
            "Proof image is {} bytes, limit is {max_proof_bytes}",
            bytes.len()
        )));
    }
    Ok(ProofImage {
        content_type,
        bytes,
    })
}

/// A signed-in caller may place orders for themselves; admins for anyone.
///
/// Requests without a user id fall through to field validation.
fn authorize_placement(session: &Session, cmd: &PlaceOrder) -> Result<(), ApiError> {
    match cmd.user_id {
        Some(user_id) if !session.can_act_for(user_id) => Err(ApiError::Domain(
            DomainError::Forbidden(format!("cannot place orders for user {user_id}")),
        )),
        _ => Ok(()),
    }
}

fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    OrderId::parse(id).map_err(|e| ApiError::BadRequest(format!("Invalid order id: {e}")))
}
