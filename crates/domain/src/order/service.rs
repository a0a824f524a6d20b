//! Order service: placement, status changes and order queries.

use std::time::Instant;

use chrono::Utc;
use common::{Order, OrderId, OrderStatus, Session, UserId};
use store::{Catalog, OrderStore, StoreError};

use super::{OrderError, PlaceOrder, authorize_status_change};
use crate::error::DomainError;

/// How many times a status write is retried after losing a race.
const STATUS_WRITE_ATTEMPTS: u32 = 3;

/// Service for placing orders and moving them through their lifecycle.
pub struct OrderService<S> {
    store: S,
}

impl<S> OrderService<S>
where
    S: Catalog + OrderStore,
{
    /// Creates a new order service backed by the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Validates and commits a new order, debiting stock for every line.
    ///
    /// Checks run in this order: required fields, proof for bank transfers,
    /// item quantities, product existence, stock. Stock is checked again by
    /// the commit itself, so a concurrent placement can still turn a passing
    /// pre-check into `InsufficientStock`.
    #[tracing::instrument(skip(self, cmd), fields(user_id = ?cmd.user_id, items = cmd.items.len()))]
    pub async fn place_order(&self, cmd: PlaceOrder) -> Result<Order, DomainError> {
        let start = Instant::now();
        let result = self.try_place_order(cmd).await;
        metrics::histogram!("order_placement_duration_seconds")
            .record(start.elapsed().as_secs_f64());

        match &result {
            Ok(order) => {
                metrics::counter!("orders_placed_total").increment(1);
                metrics::counter!("stock_units_debited_total").increment(order.total_quantity());
                tracing::info!(
                    order_id = %order.order_id,
                    lines = order.items.len(),
                    total_cents = order.total_amount.cents(),
                    "order placed"
                );
            }
            Err(err) => {
                metrics::counter!("orders_rejected_total", "reason" => err.code()).increment(1);
                tracing::warn!(error = %err, reason = err.code(), "order rejected");
            }
        }

        result
    }

    async fn try_place_order(&self, cmd: PlaceOrder) -> Result<Order, DomainError> {
        cmd.check_preconditions()?;

        let products = self.store.get_products(&cmd.product_ids()).await?;
        let validated = cmd.into_order(&products, Utc::now())?;

        self.store
            .commit_order(&validated.order, &validated.debits)
            .await
            .map_err(commit_error)?;

        Ok(validated.order)
    }

    /// Writes a new status on behalf of `session`.
    ///
    /// Writing the current status again succeeds and only bumps `updated_at`.
    #[tracing::instrument(skip(self, session))]
    pub async fn set_status(
        &self,
        session: &Session,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, DomainError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let current = self.load(order_id).await?;
            authorize_status_change(session, &current, status)?;

            match self
                .store
                .update_status(order_id, current.status, status, Utc::now())
                .await
            {
                Ok(updated) => {
                    metrics::counter!(
                        "order_status_changes_total",
                        "from" => current.status.as_str(),
                        "to" => status.as_str()
                    )
                    .increment(1);
                    tracing::info!(%order_id, from = %current.status, to = %status, "order status changed");
                    return Ok(updated);
                }
                Err(StoreError::StatusConflict { .. }) if attempt < STATUS_WRITE_ATTEMPTS => {
                    tracing::debug!(%order_id, attempt, "status changed concurrently, retrying");
                }
                Err(StoreError::OrderNotFound(id)) => {
                    return Err(OrderError::OrderNotFound(id).into());
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Loads an order visible to `session` (its owner or an admin).
    #[tracing::instrument(skip(self, session))]
    pub async fn get_order(
        &self,
        session: &Session,
        order_id: OrderId,
    ) -> Result<Order, DomainError> {
        let order = self.load(order_id).await?;
        if !session.can_act_for(order.user_id) {
            return Err(OrderError::NotOrderOwner(order_id).into());
        }
        Ok(order)
    }

    /// Lists a user's orders, newest first.
    #[tracing::instrument(skip(self, session))]
    pub async fn orders_for_user(
        &self,
        session: &Session,
        user_id: UserId,
    ) -> Result<Vec<Order>, DomainError> {
        if !session.can_act_for(user_id) {
            return Err(DomainError::Forbidden(format!(
                "cannot list orders of user {user_id}"
            )));
        }
        Ok(self.store.orders_for_user(user_id).await?)
    }

    async fn load(&self, order_id: OrderId) -> Result<Order, DomainError> {
        self.store
            .get_order(order_id)
            .await?
            .ok_or_else(|| OrderError::OrderNotFound(order_id).into())
    }
}

/// Store failures that describe the order itself surface as order errors.
fn commit_error(err: StoreError) -> DomainError {
    match err {
        StoreError::InsufficientStock {
            product_id,
            available,
            requested,
        } => OrderError::InsufficientStock {
            product_id,
            available,
            requested,
        }
        .into(),
        StoreError::ProductNotFound(product_id) => OrderError::ProductNotFound(product_id).into(),
        other => other.into(),
    }
}
