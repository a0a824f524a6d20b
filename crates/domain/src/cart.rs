//! Server side of bound carts.
//!
//! Lines are stored without product data; every response is materialized
//! against the catalog, and lines whose product left the catalog are dropped
//! from the view while staying in storage.

use common::{
    AddItemRequest, CartLine, LineId, ProductId, RemoveItemRequest, Session, UserId,
};
use store::{CartRepository, Catalog, StoreError};
use thiserror::Error;

use crate::error::DomainError;

/// Errors specific to bound-cart operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    /// Quantities written to a bound cart must be positive.
    #[error("Invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: i32 },

    /// The product to add is not in the catalog.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// The line is not in this user's cart.
    #[error("Cart line not found: {0}")]
    LineNotFound(LineId),
}

impl CartError {
    /// Machine-readable code used in API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            CartError::InvalidQuantity { .. } => "invalid_quantity",
            CartError::ProductNotFound(_) => "product_not_found",
            CartError::LineNotFound(_) => "line_not_found",
        }
    }
}

/// Service backing the `/carts/{user_id}` endpoints.
pub struct CartService<S> {
    store: S,
}

impl<S> CartService<S>
where
    S: Catalog + CartRepository,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns the materialized cart, creating an empty one on first access.
    #[tracing::instrument(skip(self, session))]
    pub async fn get_cart(
        &self,
        session: &Session,
        user_id: UserId,
    ) -> Result<Vec<CartLine>, DomainError> {
        authorize(session, user_id)?;
        let lines = self.store.get_or_create(user_id).await?;
        self.materialize(lines).await
    }

    /// Adds quantity to the `(product_id, selected_color)` line.
    #[tracing::instrument(skip(self, session))]
    pub async fn add_item(
        &self,
        session: &Session,
        user_id: UserId,
        req: AddItemRequest,
    ) -> Result<Vec<CartLine>, DomainError> {
        authorize(session, user_id)?;
        let req = req.normalized();
        if req.quantity <= 0 {
            return Err(CartError::InvalidQuantity {
                quantity: req.quantity,
            }
            .into());
        }
        if self.store.get_product(&req.product_id).await?.is_none() {
            return Err(CartError::ProductNotFound(req.product_id).into());
        }

        let lines = self
            .store
            .add_line(
                user_id,
                &req.product_id,
                req.quantity,
                req.selected_color.as_deref(),
            )
            .await?;
        tracing::debug!(%user_id, product_id = %req.product_id, "cart line added");
        self.materialize(lines).await
    }

    /// Overwrites the quantity of one line.
    #[tracing::instrument(skip(self, session))]
    pub async fn update_quantity(
        &self,
        session: &Session,
        user_id: UserId,
        line_id: LineId,
        quantity: i32,
    ) -> Result<Vec<CartLine>, DomainError> {
        authorize(session, user_id)?;
        if quantity <= 0 {
            return Err(CartError::InvalidQuantity { quantity }.into());
        }

        let lines = self
            .store
            .update_quantity(user_id, line_id, quantity)
            .await
            .map_err(|err| match err {
                StoreError::LineNotFound(id) => CartError::LineNotFound(id).into(),
                other => DomainError::from(other),
            })?;
        self.materialize(lines).await
    }

    /// Removes a line by id, or every line keyed by product and color.
    ///
    /// Removing a line that is not there succeeds.
    #[tracing::instrument(skip(self, session))]
    pub async fn remove_item(
        &self,
        session: &Session,
        user_id: UserId,
        product_id: ProductId,
        req: RemoveItemRequest,
    ) -> Result<Vec<CartLine>, DomainError> {
        authorize(session, user_id)?;
        let req = req.normalized();
        let lines = self
            .store
            .remove_line(
                user_id,
                &product_id,
                req.selected_color.as_deref(),
                req.line_id,
            )
            .await?;
        self.materialize(lines).await
    }

    /// Empties the cart.
    #[tracing::instrument(skip(self, session))]
    pub async fn clear(&self, session: &Session, user_id: UserId) -> Result<(), DomainError> {
        authorize(session, user_id)?;
        self.store.clear(user_id).await?;
        Ok(())
    }

    async fn materialize(&self, lines: Vec<CartLine>) -> Result<Vec<CartLine>, DomainError> {
        let mut ids: Vec<ProductId> = lines.iter().map(|l| l.product_id.clone()).collect();
        ids.sort();
        ids.dedup();
        let products = self.store.get_products(&ids).await?;

        Ok(lines
            .into_iter()
            .filter_map(|mut line| {
                let product = products.get(&line.product_id)?;
                line.product = Some(product.summary());
                Some(line)
            })
            .collect())
    }
}

fn authorize(session: &Session, user_id: UserId) -> Result<(), DomainError> {
    if session.can_act_for(user_id) {
        Ok(())
    } else {
        Err(DomainError::Forbidden(format!(
            "cannot access the cart of user {user_id}"
        )))
    }
}
