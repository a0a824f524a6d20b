//! Cart data contracts shared by the client Cart Store and the server.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{LineId, Money, ProductId};

/// Product fields a cart line needs for rendering and totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSummary {
    pub id: ProductId,
    pub name: String,
    pub price_cents: Money,
    pub stock: i64,
}

/// A single cart entry.
///
/// Quantity is signed: the store forwards whatever the caller asks for and
/// leaves floor enforcement to the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub line_id: LineId,
    pub product_id: ProductId,
    pub quantity: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_color: Option<String>,
    /// Snapshot of the product; `None` once the product left the catalog.
    #[serde(default)]
    pub product: Option<ProductSummary>,
    pub updated_at: DateTime<Utc>,
}

impl CartLine {
    /// Creates a new line with a fresh id for the given product.
    pub fn new(product: ProductSummary, quantity: i32, selected_color: Option<String>) -> Self {
        Self {
            line_id: LineId::new(),
            product_id: product.id.clone(),
            quantity,
            selected_color,
            product: Some(product),
            updated_at: Utc::now(),
        }
    }

    /// Returns true if this line holds the given product and color variant.
    pub fn matches(&self, product_id: &ProductId, selected_color: Option<&str>) -> bool {
        &self.product_id == product_id && self.selected_color.as_deref() == selected_color
    }

    /// Returns true if the line still references a catalog product.
    pub fn is_available(&self) -> bool {
        self.product.is_some()
    }

    /// Quantity times the snapshot price, zero when the product is gone.
    pub fn line_total(&self) -> Money {
        self.product
            .as_ref()
            .map(|p| p.price_cents.multiply(i64::from(self.quantity)))
            .unwrap_or_default()
    }
}

/// Server representation of a bound cart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartResponse {
    pub items: Vec<CartLine>,
}

/// Body of `POST /carts/{user_id}/items`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddItemRequest {
    pub product_id: ProductId,
    pub quantity: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_color: Option<String>,
}

impl AddItemRequest {
    /// Returns the request with an empty color treated as no color.
    pub fn normalized(mut self) -> Self {
        self.selected_color = normalize_color(self.selected_color);
        self
    }
}

/// Body of `PUT /carts/{user_id}/items/{line_id}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: i32,
}

/// Body of `DELETE /carts/{user_id}/items/{product_id}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveItemRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_id: Option<LineId>,
}

impl RemoveItemRequest {
    /// Returns the request with an empty color treated as no color.
    pub fn normalized(mut self) -> Self {
        self.selected_color = normalize_color(self.selected_color);
        self
    }
}

/// Maps an empty color to `None`, so `""` and no color key the same line.
pub fn normalize_color(color: Option<String>) -> Option<String> {
    color.filter(|c| !c.is_empty())
}

/// Adds `quantity` to the line keyed by `(product_id, selected_color)`, or
/// appends a new line when no such line exists.
///
/// A provided `product` snapshot replaces the stored one. Returns the id of
/// the line that received the quantity.
pub fn merge_add(
    lines: &mut Vec<CartLine>,
    product_id: &ProductId,
    quantity: i32,
    selected_color: Option<&str>,
    product: Option<&ProductSummary>,
) -> LineId {
    let now = Utc::now();
    if let Some(line) = lines
        .iter_mut()
        .find(|l| l.matches(product_id, selected_color))
    {
        line.quantity = line.quantity.saturating_add(quantity);
        line.updated_at = now;
        if let Some(product) = product {
            line.product = Some(product.clone());
        }
        return line.line_id;
    }

    let line = CartLine {
        line_id: LineId::new(),
        product_id: product_id.clone(),
        quantity,
        selected_color: selected_color.map(str::to_string),
        product: product.cloned(),
        updated_at: now,
    };
    let line_id = line.line_id;
    lines.push(line);
    line_id
}

/// Overwrites the quantity of one line. Returns false if the line is absent.
pub fn set_quantity(lines: &mut [CartLine], line_id: LineId, quantity: i32) -> bool {
    match lines.iter_mut().find(|l| l.line_id == line_id) {
        Some(line) => {
            line.quantity = quantity;
            line.updated_at = Utc::now();
            true
        }
        None => false,
    }
}

/// Removes lines and returns how many were dropped.
///
/// `line_id`, when given, is the only criterion; otherwise every line keyed
/// by `(product_id, selected_color)` goes.
pub fn remove_matching(
    lines: &mut Vec<CartLine>,
    product_id: &ProductId,
    selected_color: Option<&str>,
    line_id: Option<LineId>,
) -> usize {
    let before = lines.len();
    match line_id {
        Some(id) => lines.retain(|l| l.line_id != id),
        None => lines.retain(|l| !l.matches(product_id, selected_color)),
    }
    before - lines.len()
}
