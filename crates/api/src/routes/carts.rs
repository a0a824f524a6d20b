//! Bound-cart endpoints under `/carts/{user_id}`.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{
    AddItemRequest, CartResponse, LineId, ProductId, RemoveItemRequest, UpdateQuantityRequest,
};

use super::{parse_body, parse_user_id};
use crate::error::ApiError;
use crate::session::CurrentSession;
use crate::{AppState, StorefrontStore};

/// GET /carts/{user_id}, creating an empty cart on first access.
#[tracing::instrument(skip(state, session))]
pub async fn get<S: StorefrontStore>(
    State(state): State<Arc<AppState<S>>>,
    CurrentSession(session): CurrentSession,
    Path(user_id): Path<String>,
) -> Result<Json<CartResponse>, ApiError> {
    let user_id = parse_user_id(&user_id)?;
    let items = state.carts.get_cart(&session, user_id).await?;
    Ok(Json(CartResponse { items }))
}

/// POST /carts/{user_id}/items
#[tracing::instrument(skip(state, session, body))]
pub async fn add_item<S: StorefrontStore>(
    State(state): State<Arc<AppState<S>>>,
    CurrentSession(session): CurrentSession,
    Path(user_id): Path<String>,
    body: Bytes,
) -> Result<Json<CartResponse>, ApiError> {
    let user_id = parse_user_id(&user_id)?;
    let req: AddItemRequest = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid cart item: {e}")))?;
    let items = state.carts.add_item(&session, user_id, req).await?;
    Ok(Json(CartResponse { items }))
}

/// PUT /carts/{user_id}/items/{line_id}
#[tracing::instrument(skip(state, session, body))]
pub async fn update_quantity<S: StorefrontStore>(
    State(state): State<Arc<AppState<S>>>,
    CurrentSession(session): CurrentSession,
    Path((user_id, line_id)): Path<(String, String)>,
    body: Bytes,
) -> Result<Json<CartResponse>, ApiError> {
    let user_id = parse_user_id(&user_id)?;
    let line_id = LineId::parse(&line_id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid line id: {e}")))?;
    let req: UpdateQuantityRequest = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid quantity update: {e}")))?;
    let items = state
        .carts
        .update_quantity(&session, user_id, line_id, req.quantity)
        .await?;
    Ok(Json(CartResponse { items }))
}

/// DELETE /carts/{user_id}/items/{product_id}, body `{selected_color?, line_id?}`.
#[tracing::instrument(skip(state, session, body))]
pub async fn remove_item<S: StorefrontStore>(
    State(state): State<Arc<AppState<S>>>,
    CurrentSession(session): CurrentSession,
    Path((user_id, product_id)): Path<(String, String)>,
    body: Bytes,
) -> Result<Json<CartResponse>, ApiError> {
    let user_id = parse_user_id(&user_id)?;
    let req: RemoveItemRequest = parse_body(&body)?;
    let items = state
        .carts
        .remove_item(&session, user_id, ProductId::new(product_id), req)
        .await?;
    Ok(Json(CartResponse { items }))
}

/// DELETE /carts/{user_id}
#[tracing::instrument(skip(state, session))]
pub async fn clear<S: StorefrontStore>(
    State(state): State<Arc<AppState<S>>>,
    CurrentSession(session): CurrentSession,
    Path(user_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let user_id = parse_user_id(&user_id)?;
    state.carts.clear(&session, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
