//! Validation of an incoming order and construction of the record to commit.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use common::{
    LineId, Money, Order, OrderId, OrderLine, OrderStatus, PaymentMethod, ProductId, ProofImage,
    ShippingDetails, UserId,
};
use serde::{Deserialize, Serialize};
use store::{Product, StockDebit};

use super::OrderError;

/// One requested line of a new order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceOrderItem {
    pub product_id: ProductId,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_color: Option<String>,
}

/// Request to place an order, as sent in the `orderData` field.
///
/// Every field is optional on the wire so that absent fields can be reported
/// together as `MissingFields` instead of failing deserialization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaceOrder {
    pub user_id: Option<UserId>,
    pub total_amount_cents: Option<Money>,
    /// Kept loose so non-string scalars can be coerced.
    pub shipping_details: Option<serde_json::Value>,
    pub items: Vec<PlaceOrderItem>,
    pub payment_method: Option<PaymentMethod>,
    /// Travels outside `orderData` (multipart `slip` or base64 field).
    #[serde(skip)]
    pub proof: Option<ProofImage>,
}

/// An order ready to commit, with the stock debits it needs.
#[derive(Debug, Clone)]
pub struct ValidatedOrder {
    pub order: Order,
    pub debits: Vec<StockDebit>,
}

impl PlaceOrder {
    /// Starts a request with every required field set.
    pub fn new(
        user_id: UserId,
        total_amount: Money,
        shipping: &ShippingDetails,
        payment_method: PaymentMethod,
    ) -> Self {
        Self {
            user_id: Some(user_id),
            total_amount_cents: Some(total_amount),
            shipping_details: serde_json::to_value(shipping).ok(),
            items: Vec::new(),
            payment_method: Some(payment_method),
            proof: None,
        }
    }

    pub fn with_item(
        mut self,
        product_id: impl Into<ProductId>,
        quantity: u32,
        selected_color: Option<&str>,
    ) -> Self {
        self.items.push(PlaceOrderItem {
            product_id: product_id.into(),
            quantity,
            selected_color: selected_color.map(str::to_string),
        });
        self
    }

    pub fn with_proof(mut self, proof: ProofImage) -> Self {
        self.proof = Some(proof);
        self
    }

    /// Runs the checks that need no catalog access: required fields, proof
    /// for bank transfers, then item quantities.
    pub fn check_preconditions(&self) -> Result<(), OrderError> {
        let mut missing = Vec::new();
        if self.user_id.is_none() {
            missing.push("user_id");
        }
        if self.total_amount_cents.is_none() {
            missing.push("total_amount_cents");
        }
        if self.shipping().is_none() {
            missing.push("shipping_details");
        }
        if self.items.is_empty() {
            missing.push("items");
        }
        if self.payment_method.is_none() {
            missing.push("payment_method");
        }
        if !missing.is_empty() {
            return Err(OrderError::MissingFields { fields: missing });
        }

        let has_proof = self.proof.as_ref().is_some_and(|p| !p.bytes.is_empty());
        if self.payment_method.is_some_and(|m| m.requires_proof()) && !has_proof {
            return Err(OrderError::ProofRequired);
        }

        if let Some(item) = self.items.iter().find(|i| i.quantity == 0) {
            return Err(OrderError::InvalidQuantity {
                product_id: item.product_id.clone(),
                quantity: item.quantity,
            });
        }

        Ok(())
    }

    /// Distinct product ids in first-seen order.
    pub fn product_ids(&self) -> Vec<ProductId> {
        let mut ids: Vec<ProductId> = Vec::with_capacity(self.items.len());
        for item in &self.items {
            if !ids.contains(&item.product_id) {
                ids.push(item.product_id.clone());
            }
        }
        ids
    }

    /// Validates the request against catalog products read by the caller and
    /// builds the order to commit.
    ///
    /// Unit prices and names are copied from `products`. Demand for a product
    /// listed on several lines is summed before the stock check.
    pub fn into_order(
        self,
        products: &HashMap<ProductId, Product>,
        now: DateTime<Utc>,
    ) -> Result<ValidatedOrder, OrderError> {
        self.check_preconditions()?;

        let shipping = self.shipping().unwrap_or_default();
        let (Some(user_id), Some(total_amount), Some(payment_method)) =
            (self.user_id, self.total_amount_cents, self.payment_method)
        else {
            return Err(OrderError::MissingFields {
                fields: vec!["user_id", "total_amount_cents", "payment_method"],
            });
        };

        if let Some(item) = self
            .items
            .iter()
            .find(|i| !products.contains_key(&i.product_id))
        {
            return Err(OrderError::ProductNotFound(item.product_id.clone()));
        }

        let mut demand: Vec<(&ProductId, u32)> = Vec::new();
        for item in &self.items {
            match demand.iter_mut().find(|(id, _)| *id == &item.product_id) {
                Some((_, total)) => *total = total.saturating_add(item.quantity),
                None => demand.push((&item.product_id, item.quantity)),
            }
        }
        for (product_id, requested) in demand {
            let product = &products[product_id];
            if product.stock < i64::from(requested) {
                return Err(OrderError::InsufficientStock {
                    product_id: product_id.clone(),
                    available: product.stock,
                    requested,
                });
            }
        }

        let items = self
            .items
            .iter()
            .map(|item| {
                let product = &products[&item.product_id];
                OrderLine {
                    line_id: LineId::new(),
                    product_id: item.product_id.clone(),
                    product_name: product.name.clone(),
                    quantity: item.quantity,
                    unit_price: product.price,
                    selected_color: item.selected_color.clone(),
                    created_at: now,
                    updated_at: now,
                }
            })
            .collect();

        let order = Order {
            order_id: OrderId::new(),
            user_id,
            total_amount,
            shipping,
            payment_method,
            proof: self.proof,
            status: OrderStatus::Pending,
            items,
            created_at: now,
            updated_at: now,
        };
        let debits = StockDebit::for_order(&order);

        Ok(ValidatedOrder { order, debits })
    }

    fn shipping(&self) -> Option<ShippingDetails> {
        self.shipping_details
            .as_ref()
            .and_then(ShippingDetails::from_json)
    }
}
