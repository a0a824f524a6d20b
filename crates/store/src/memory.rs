use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{CartLine, LineId, Order, OrderId, OrderStatus, ProductId, UserId};
use tokio::sync::RwLock;

use crate::{
    Result, StoreError,
    store::{
        CartRepository, Catalog, OrderStore, Product, StockDebit, validate_order_for_commit,
    },
};

#[derive(Default)]
struct StoreState {
    products: HashMap<ProductId, Product>,
    orders: HashMap<OrderId, Order>,
    carts: HashMap<UserId, Vec<CartLine>>,
    fail_on_commit: bool,
}

/// In-memory store implementing the catalog, order and cart traits.
///
/// A single lock guards every table, so an order commit (stock debits plus
/// order insert) is atomic with respect to all other operations.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<StoreState>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-loaded with products.
    pub fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        let state = StoreState {
            products: products.into_iter().map(|p| (p.id.clone(), p)).collect(),
            ..StoreState::default()
        };
        Self {
            state: Arc::new(RwLock::new(state)),
        }
    }

    /// Makes every subsequent order commit fail with `WriteFailed`.
    pub async fn set_fail_on_commit(&self, fail: bool) {
        self.state.write().await.fail_on_commit = fail;
    }

    /// Returns the total number of stored orders.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }

    /// Returns the total number of stored order lines across all orders.
    pub async fn order_line_count(&self) -> usize {
        self.state
            .read()
            .await
            .orders
            .values()
            .map(|o| o.items.len())
            .sum()
    }

    /// Removes a product from the catalog.
    pub async fn remove_product(&self, id: &ProductId) -> bool {
        self.state.write().await.products.remove(id).is_some()
    }
}

#[async_trait]
impl Catalog for InMemoryStore {
    async fn get_product(&self, id: &ProductId) -> Result<Option<Product>> {
        Ok(self.state.read().await.products.get(id).cloned())
    }

    async fn get_products(&self, ids: &[ProductId]) -> Result<HashMap<ProductId, Product>> {
        let state = self.state.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.products.get(id).map(|p| (id.clone(), p.clone())))
            .collect())
    }

    async fn set_stock(&self, id: &ProductId, new_stock: i64) -> Result<bool> {
        if new_stock < 0 {
            return Ok(false);
        }
        let mut state = self.state.write().await;
        match state.products.get_mut(id) {
            Some(product) => {
                product.stock = new_stock;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn upsert_product(&self, product: Product) -> Result<()> {
        self.state
            .write()
            .await
            .products
            .insert(product.id.clone(), product);
        Ok(())
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn commit_order(&self, order: &Order, debits: &[StockDebit]) -> Result<()> {
        validate_order_for_commit(order, debits)?;

        let mut state = self.state.write().await;

        if state.fail_on_commit {
            return Err(StoreError::WriteFailed(
                "order commit rejected by store".to_string(),
            ));
        }

        if state.orders.contains_key(&order.order_id) {
            return Err(StoreError::InvalidCommit(format!(
                "order {} already exists",
                order.order_id
            )));
        }

        // Check every debit before touching anything.
        for debit in debits {
            let product = state
                .products
                .get(&debit.product_id)
                .ok_or_else(|| StoreError::ProductNotFound(debit.product_id.clone()))?;
            if product.stock < i64::from(debit.quantity) {
                tracing::debug!(
                    order_id = %order.order_id,
                    product_id = %debit.product_id,
                    available = product.stock,
                    requested = debit.quantity,
                    "stock debit missed, order not committed"
                );
                return Err(StoreError::InsufficientStock {
                    product_id: debit.product_id.clone(),
                    available: product.stock,
                    requested: debit.quantity,
                });
            }
        }

        for debit in debits {
            if let Some(product) = state.products.get_mut(&debit.product_id) {
                product.stock -= i64::from(debit.quantity);
            }
        }
        state.orders.insert(order.order_id, order.clone());

        Ok(())
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>> {
        Ok(self.state.read().await.orders.get(&order_id).cloned())
    }

    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        let mut orders: Vec<_> = state
            .orders
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn update_status(
        &self,
        order_id: OrderId,
        expected: OrderStatus,
        status: OrderStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<Order> {
        let mut state = self.state.write().await;
        let order = state
            .orders
            .get_mut(&order_id)
            .ok_or(StoreError::OrderNotFound(order_id))?;

        if order.status != expected {
            return Err(StoreError::StatusConflict {
                order_id,
                expected,
                actual: order.status,
            });
        }

        order.status = status;
        order.updated_at = updated_at;
        Ok(order.clone())
    }
}

#[async_trait]
impl CartRepository for InMemoryStore {
    async fn get_or_create(&self, user_id: UserId) -> Result<Vec<CartLine>> {
        let mut state = self.state.write().await;
        Ok(state.carts.entry(user_id).or_default().clone())
    }

    async fn add_line(
        &self,
        user_id: UserId,
        product_id: &ProductId,
        quantity: i32,
        selected_color: Option<&str>,
    ) -> Result<Vec<CartLine>> {
        let mut state = self.state.write().await;
        let lines = state.carts.entry(user_id).or_default();
        common::merge_add(lines, product_id, quantity, selected_color, None);
        Ok(lines.clone())
    }

    async fn update_quantity(
        &self,
        user_id: UserId,
        line_id: LineId,
        quantity: i32,
    ) -> Result<Vec<CartLine>> {
        let mut state = self.state.write().await;
        let lines = state.carts.entry(user_id).or_default();
        if !common::set_quantity(lines, line_id, quantity) {
            return Err(StoreError::LineNotFound(line_id));
        }
        Ok(lines.clone())
    }

    async fn remove_line(
        &self,
        user_id: UserId,
        product_id: &ProductId,
        selected_color: Option<&str>,
        line_id: Option<LineId>,
    ) -> Result<Vec<CartLine>> {
        let mut state = self.state.write().await;
        let lines = state.carts.entry(user_id).or_default();
        common::remove_matching(lines, product_id, selected_color, line_id);
        Ok(lines.clone())
    }

    async fn clear(&self, user_id: UserId) -> Result<()> {
        let mut state = self.state.write().await;
        state.carts.entry(user_id).or_default().clear();
        Ok(())
    }
}
