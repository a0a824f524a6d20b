//! Storage backends behind the cart store.

use async_trait::async_trait;
use common::{CartLine, LineId, ProductId, ProductSummary};

use crate::error::CartError;

/// Where a cart lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartMode {
    /// Device storage only; never sent to the server.
    Anonymous,
    /// Server-side cart keyed by the signed-in user.
    Bound,
}

impl CartMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CartMode::Anonymous => "anonymous",
            CartMode::Bound => "bound",
        }
    }
}

/// One change to a cart's line list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartMutation {
    Add {
        product: ProductSummary,
        quantity: i32,
        selected_color: Option<String>,
    },
    UpdateQuantity {
        line_id: LineId,
        quantity: i32,
    },
    Remove {
        product_id: ProductId,
        selected_color: Option<String>,
        line_id: Option<LineId>,
    },
    Clear,
}

impl CartMutation {
    /// Applies the mutation to a local copy of the lines.
    pub fn apply_to(&self, lines: &mut Vec<CartLine>) {
        match self {
            CartMutation::Add {
                product,
                quantity,
                selected_color,
            } => {
                common::merge_add(
                    lines,
                    &product.id,
                    *quantity,
                    selected_color.as_deref(),
                    Some(product),
                );
            }
            CartMutation::UpdateQuantity { line_id, quantity } => {
                common::set_quantity(lines, *line_id, *quantity);
            }
            CartMutation::Remove {
                product_id,
                selected_color,
                line_id,
            } => {
                common::remove_matching(lines, product_id, selected_color.as_deref(), *line_id);
            }
            CartMutation::Clear => lines.clear(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            CartMutation::Add { .. } => "add",
            CartMutation::UpdateQuantity { .. } => "update_quantity",
            CartMutation::Remove { .. } => "remove",
            CartMutation::Clear => "clear",
        }
    }
}

/// Durable home of a cart.
#[async_trait]
pub trait CartBackend: Send + Sync {
    fn mode(&self) -> CartMode;

    /// Loads the current lines.
    async fn load(&self) -> Result<Vec<CartLine>, CartError>;

    /// Makes `mutation` durable.
    ///
    /// `optimistic` is the caller's line list with the mutation already
    /// applied. Returns the authoritative list afterwards.
    async fn commit(
        &self,
        mutation: &CartMutation,
        optimistic: &[CartLine],
    ) -> Result<Vec<CartLine>, CartError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Money;

    fn lamp() -> ProductSummary {
        ProductSummary {
            id: ProductId::new("P1"),
            name: "Lamp".to_string(),
            price_cents: Money::from_cents(1500),
            stock: 3,
        }
    }

    #[test]
    fn add_then_remove_by_key() {
        let mut lines = Vec::new();
        let add = CartMutation::Add {
            product: lamp(),
            quantity: 2,
            selected_color: Some("red".to_string()),
        };
        add.apply_to(&mut lines);
        add.apply_to(&mut lines);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].quantity, 4);

        CartMutation::Remove {
            product_id: ProductId::new("P1"),
            selected_color: Some("blue".to_string()),
            line_id: None,
        }
        .apply_to(&mut lines);
        assert_eq!(lines.len(), 1);

        CartMutation::Remove {
            product_id: ProductId::new("P1"),
            selected_color: Some("red".to_string()),
            line_id: None,
        }
        .apply_to(&mut lines);
        assert!(lines.is_empty());
    }

    #[test]
    fn update_quantity_forwards_zero() {
        let mut lines = Vec::new();
        CartMutation::Add {
            product: lamp(),
            quantity: 1,
            selected_color: None,
        }
        .apply_to(&mut lines);

        CartMutation::UpdateQuantity {
            line_id: lines[0].line_id,
            quantity: 0,
        }
        .apply_to(&mut lines);
        assert_eq!(lines[0].quantity, 0);
    }
}
