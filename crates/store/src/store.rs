use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    CartLine, LineId, Money, Order, OrderId, OrderStatus, ProductId, ProductSummary, UserId,
};
use serde::{Deserialize, Serialize};

use crate::{Result, StoreError};

/// The stock-relevant slice of a catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    pub stock: i64,
}

impl Product {
    /// Creates a new product record.
    pub fn new(id: impl Into<ProductId>, name: impl Into<String>, price: Money, stock: i64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price,
            stock,
        }
    }

    /// Returns the snapshot embedded in cart lines.
    pub fn summary(&self) -> ProductSummary {
        ProductSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            price_cents: self.price,
            stock: self.stock,
        }
    }
}

/// A conditional decrement: take `quantity` units only if that many remain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockDebit {
    pub product_id: ProductId,
    pub quantity: u32,
}

impl StockDebit {
    pub fn new(product_id: impl Into<ProductId>, quantity: u32) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
        }
    }

    /// Builds one debit per product from an order's lines.
    ///
    /// Lines that name the same product (different colors) are summed so the
    /// floor check sees the full demand.
    pub fn for_order(order: &Order) -> Vec<StockDebit> {
        let mut totals: BTreeMap<&ProductId, u32> = BTreeMap::new();
        for line in &order.items {
            let entry = totals.entry(&line.product_id).or_default();
            *entry = entry.saturating_add(line.quantity);
        }
        totals
            .into_iter()
            .map(|(product_id, quantity)| StockDebit::new(product_id.clone(), quantity))
            .collect()
    }
}

/// Read and write access to catalog products.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Looks up a single product.
    async fn get_product(&self, id: &ProductId) -> Result<Option<Product>>;

    /// Looks up several products at once. Unknown ids are absent from the map.
    async fn get_products(&self, ids: &[ProductId]) -> Result<HashMap<ProductId, Product>>;

    /// Overwrites a product's stock.
    ///
    /// Returns false when the product does not exist or `new_stock` is
    /// negative.
    async fn set_stock(&self, id: &ProductId, new_stock: i64) -> Result<bool>;

    /// Inserts or replaces a product.
    async fn upsert_product(&self, product: Product) -> Result<()>;
}

/// Persistence for placed orders.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Debits stock and persists the order with all of its lines as one unit.
    ///
    /// Every debit is conditional on the product holding at least the debited
    /// quantity at commit time. If any debit fails nothing is written and the
    /// error names the first failing product.
    async fn commit_order(&self, order: &Order, debits: &[StockDebit]) -> Result<()>;

    /// Loads an order with its lines.
    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>>;

    /// Lists a user's orders, newest first.
    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>>;

    /// Writes a new status if the stored one still equals `expected`.
    ///
    /// Fails with `OrderNotFound` or `StatusConflict`; returns the updated
    /// order otherwise.
    async fn update_status(
        &self,
        order_id: OrderId,
        expected: OrderStatus,
        status: OrderStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<Order>;
}

/// Persistence for bound (server-side) carts.
///
/// Lines come back without product snapshots; materialization against the
/// catalog happens above this layer.
#[async_trait]
pub trait CartRepository: Send + Sync {
    /// Returns the user's cart lines, creating an empty cart if none exists.
    async fn get_or_create(&self, user_id: UserId) -> Result<Vec<CartLine>>;

    /// Adds quantity to the `(product_id, selected_color)` line or appends one.
    async fn add_line(
        &self,
        user_id: UserId,
        product_id: &ProductId,
        quantity: i32,
        selected_color: Option<&str>,
    ) -> Result<Vec<CartLine>>;

    /// Overwrites the quantity of a line; fails with `LineNotFound`.
    async fn update_quantity(
        &self,
        user_id: UserId,
        line_id: LineId,
        quantity: i32,
    ) -> Result<Vec<CartLine>>;

    /// Removes by `line_id` when given, otherwise by `(product_id, selected_color)`.
    /// Removing nothing is not an error.
    async fn remove_line(
        &self,
        user_id: UserId,
        product_id: &ProductId,
        selected_color: Option<&str>,
        line_id: Option<LineId>,
    ) -> Result<Vec<CartLine>>;

    /// Empties the user's cart.
    async fn clear(&self, user_id: UserId) -> Result<()>;
}

/// Checks an order and its debits before any write happens.
pub fn validate_order_for_commit(order: &Order, debits: &[StockDebit]) -> Result<()> {
    if order.items.is_empty() {
        return Err(StoreError::InvalidCommit("order has no lines".to_string()));
    }

    if let Some(line) = order.items.iter().find(|l| l.quantity == 0) {
        return Err(StoreError::InvalidCommit(format!(
            "line for product {} has zero quantity",
            line.product_id
        )));
    }

    for line in &order.items {
        if !debits.iter().any(|d| d.product_id == line.product_id) {
            return Err(StoreError::InvalidCommit(format!(
                "no stock debit for product {}",
                line.product_id
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{OrderLine, PaymentMethod, ShippingDetails};

    fn line(product: &str, quantity: u32, color: Option<&str>) -> OrderLine {
        let now = Utc::now();
        OrderLine {
            line_id: LineId::new(),
            product_id: ProductId::new(product),
            product_name: product.to_string(),
            quantity,
            unit_price: Money::from_cents(100),
            selected_color: color.map(str::to_string),
            created_at: now,
            updated_at: now,
        }
    }

    fn order(items: Vec<OrderLine>) -> Order {
        let now = Utc::now();
        Order {
            order_id: OrderId::new(),
            user_id: UserId::new(),
            total_amount: Money::from_cents(1000),
            shipping: ShippingDetails::default(),
            payment_method: PaymentMethod::CreditCard,
            proof: None,
            status: OrderStatus::Pending,
            items,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn debits_sum_lines_of_the_same_product() {
        let order = order(vec![
            line("P1", 2, Some("red")),
            line("P1", 1, Some("blue")),
            line("P2", 4, None),
        ]);

        let debits = StockDebit::for_order(&order);
        assert_eq!(
            debits,
            vec![StockDebit::new("P1", 3), StockDebit::new("P2", 4)]
        );
    }

    #[test]
    fn validation_rejects_empty_orders() {
        let err = validate_order_for_commit(&order(vec![]), &[]).unwrap_err();
        assert!(matches!(err, StoreError::InvalidCommit(_)));
    }

    #[test]
    fn validation_requires_a_debit_per_line() {
        let order = order(vec![line("P1", 1, None), line("P2", 1, None)]);
        let err = validate_order_for_commit(&order, &[StockDebit::new("P1", 1)]).unwrap_err();
        assert!(err.to_string().contains("P2"));

        let debits = StockDebit::for_order(&order);
        assert!(validate_order_for_commit(&order, &debits).is_ok());
    }

    #[test]
    fn product_summary_copies_price_and_stock() {
        let product = Product::new("P1", "Widget", Money::from_cents(1999), 7);
        let summary = product.summary();
        assert_eq!(summary.price_cents.cents(), 1999);
        assert_eq!(summary.stock, 7);
        assert_eq!(summary.id.as_str(), "P1");
    }
}
