//! Order representation returned over HTTP.
//!
//! The proof image is not echoed as raw bytes; it travels as a `data:` URL.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    LineId, Money, Order, OrderId, OrderLine, OrderStatus, PaymentMethod, ProductId, ProofImage,
    ShippingDetails, UserId,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineView {
    pub line_id: LineId,
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price_cents: Money,
    pub total_price_cents: Money,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_color: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderView {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub total_amount_cents: Money,
    pub shipping_details: ShippingDetails,
    pub payment_method: PaymentMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof_url: Option<String>,
    pub status: OrderStatus,
    pub items: Vec<OrderLineView>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Encodes a proof image as `data:{content_type};base64,{payload}`.
pub fn proof_data_url(proof: &ProofImage) -> String {
    format!(
        "data:{};base64,{}",
        proof.content_type,
        STANDARD.encode(&proof.bytes)
    )
}

impl From<&OrderLine> for OrderLineView {
    fn from(line: &OrderLine) -> Self {
        Self {
            line_id: line.line_id,
            product_id: line.product_id.clone(),
            product_name: line.product_name.clone(),
            quantity: line.quantity,
            unit_price_cents: line.unit_price,
            total_price_cents: line.total_price(),
            selected_color: line.selected_color.clone(),
            created_at: line.created_at,
            updated_at: line.updated_at,
        }
    }
}

impl From<&Order> for OrderView {
    fn from(order: &Order) -> Self {
        Self {
            order_id: order.order_id,
            user_id: order.user_id,
            total_amount_cents: order.total_amount,
            shipping_details: order.shipping.clone(),
            payment_method: order.payment_method,
            proof_url: order.proof.as_ref().map(proof_data_url),
            status: order.status,
            items: order.items.iter().map(OrderLineView::from).collect(),
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proof_url_carries_content_type() {
        let proof = ProofImage {
            content_type: "image/png".to_string(),
            bytes: b"hello".to_vec(),
        };
        assert_eq!(proof_data_url(&proof), "data:image/png;base64,aGVsbG8=");
    }

    #[test]
    fn view_hides_raw_proof_and_totals_lines() {
        let now = Utc::now();
        let order = Order {
            order_id: OrderId::new(),
            user_id: UserId::new(),
            total_amount: Money::from_cents(2600),
            shipping: ShippingDetails::default(),
            payment_method: PaymentMethod::BankTransfer,
            proof: Some(ProofImage {
                content_type: "image/jpeg".to_string(),
                bytes: vec![1, 2, 3],
            }),
            status: OrderStatus::Pending,
            items: vec![OrderLine {
                line_id: LineId::new(),
                product_id: ProductId::new("P1"),
                product_name: "Lamp".to_string(),
                quantity: 3,
                unit_price: Money::from_cents(700),
                selected_color: None,
                created_at: now,
                updated_at: now,
            }],
            created_at: now,
            updated_at: now,
        };

        let view = OrderView::from(&order);
        assert_eq!(view.items[0].total_price_cents.cents(), 2100);
        assert_eq!(view.proof_url.as_deref(), Some("data:image/jpeg;base64,AQID"));

        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("proof").is_none());
        assert_eq!(json["shipping_details"]["full_name"], "");
        assert_eq!(json["payment_method"], "bank_transfer");
    }
}
