//! Route handlers.

pub mod carts;
pub mod ops;
pub mod orders;

use common::UserId;
use serde::de::DeserializeOwned;

use crate::error::ApiError;

/// Parses a JSON body; an empty body decodes as `T::default()`.
pub(crate) fn parse_body<T: DeserializeOwned + Default>(body: &[u8]) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(format!("Invalid JSON body: {e}")))
}

pub(crate) fn parse_user_id(id: &str) -> Result<UserId, ApiError> {
    UserId::parse(id).map_err(|e| ApiError::BadRequest(format!("Invalid user id: {e}")))
}
