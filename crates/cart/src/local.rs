//! Anonymous carts kept in device storage.

use std::sync::Arc;

use async_trait::async_trait;
use common::{CartLine, CartResponse};

use crate::backend::{CartBackend, CartMode, CartMutation};
use crate::error::CartError;
use crate::storage::DeviceStorage;

/// Backend that round-trips the whole line list through device storage.
pub struct LocalCartBackend {
    storage: Arc<dyn DeviceStorage>,
    key: String,
}

impl LocalCartBackend {
    pub fn new(storage: Arc<dyn DeviceStorage>, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
        }
    }

    /// Deletes the stored cart.
    pub async fn discard(&self) -> Result<(), CartError> {
        self.storage.remove(&self.key).await
    }

    async fn save(&self, lines: &[CartLine]) -> Result<(), CartError> {
        let body = CartResponse {
            items: lines.to_vec(),
        };
        let bytes = serde_json::to_vec(&body)?;
        self.storage.write(&self.key, &bytes).await
    }
}

#[async_trait]
impl CartBackend for LocalCartBackend {
    fn mode(&self) -> CartMode {
        CartMode::Anonymous
    }

    async fn load(&self) -> Result<Vec<CartLine>, CartError> {
        let Some(bytes) = self.storage.read(&self.key).await? else {
            return Ok(Vec::new());
        };
        match serde_json::from_slice::<CartResponse>(&bytes) {
            Ok(cart) => Ok(cart.items),
            Err(err) => {
                tracing::warn!(key = %self.key, error = %err, "unreadable local cart, starting empty");
                Ok(Vec::new())
            }
        }
    }

    async fn commit(
        &self,
        _mutation: &CartMutation,
        optimistic: &[CartLine],
    ) -> Result<Vec<CartLine>, CartError> {
        self.save(optimistic).await?;
        Ok(optimistic.to_vec())
    }
}
