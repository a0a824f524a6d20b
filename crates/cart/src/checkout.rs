//! Turns the visible cart into an order on the server.

use common::{
    OrderView, PaymentMethod, ProofImage, ROLE_HEADER, Session, ShippingDetails, USER_ID_HEADER,
};
use domain::PlaceOrder;
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde_json::json;

use crate::config::ClientConfig;
use crate::error::{CheckoutError, ErrorBody};
use crate::store::CartStore;

/// What the shopper fills in at checkout.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub shipping: ShippingDetails,
    pub payment_method: PaymentMethod,
    pub proof: Option<ProofImage>,
}

/// Client for `POST /orders`.
pub struct Checkout {
    client: reqwest::Client,
    config: ClientConfig,
}

impl Checkout {
    pub fn new(config: &ClientConfig) -> Result<Self, CheckoutError> {
        Ok(Self {
            client: config.http_client()?,
            config: config.clone(),
        })
    }

    /// Builds the order request from the cart's visible lines.
    ///
    /// The total is the cart's price plus the flat shipping fee.
    pub fn build_order(
        &self,
        cart: &CartStore,
        request: &CheckoutRequest,
    ) -> Result<PlaceOrder, CheckoutError> {
        let user_id = cart.session().user_id().ok_or(CheckoutError::NotSignedIn)?;
        let lines = cart.lines();
        if lines.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let total = cart.total_price() + self.config.shipping_fee;
        let mut order = PlaceOrder::new(user_id, total, &request.shipping, request.payment_method);
        for line in lines {
            let quantity = u32::try_from(line.quantity)
                .ok()
                .filter(|q| *q > 0)
                .ok_or_else(|| CheckoutError::InvalidQuantity {
                    product_id: line.product_id.clone(),
                    quantity: line.quantity,
                })?;
            order = order.with_item(
                line.product_id.clone(),
                quantity,
                line.selected_color.as_deref(),
            );
        }
        if let Some(proof) = &request.proof {
            order = order.with_proof(proof.clone());
        }
        Ok(order)
    }

    /// Places the order and clears the cart once the server accepts it.
    ///
    /// A failed clear after a successful placement is logged, not returned;
    /// the order already exists.
    #[tracing::instrument(skip(self, cart, request), fields(payment_method = %request.payment_method))]
    pub async fn place_order(
        &self,
        cart: &mut CartStore,
        request: CheckoutRequest,
    ) -> Result<OrderView, CheckoutError> {
        let order = self.build_order(cart, &request)?;
        let builder = self.authorized(cart.session())?;

        let response = match &order.proof {
            Some(proof) => {
                let slip = Part::bytes(proof.bytes.clone())
                    .file_name("slip")
                    .mime_str(&proof.content_type)
                    .map_err(|e| CheckoutError::InvalidProof(e.to_string()))?;
                let form = Form::new()
                    .text("orderData", serde_json::to_string(&order)?)
                    .part("slip", slip);
                builder.multipart(form).send().await?
            }
            None => builder.json(&json!({ "orderData": order })).send().await?,
        };

        let placed = Self::read_order(response).await?;
        tracing::info!(order_id = %placed.order_id, items = placed.items.len(), "order placed");

        if let Err(err) = cart.clear_cart().await {
            tracing::warn!(order_id = %placed.order_id, error = %err, "order placed but cart not cleared");
        }
        Ok(placed)
    }

    fn authorized(&self, session: &Session) -> Result<RequestBuilder, CheckoutError> {
        let mut builder = self.client.post(self.config.url(&["orders"])?);
        if let Session::Authenticated { user_id, role } = session {
            builder = builder
                .header(USER_ID_HEADER, user_id.to_string())
                .header(ROLE_HEADER, role.as_str());
        }
        Ok(builder)
    }

    async fn read_order(response: Response) -> Result<OrderView, CheckoutError> {
        let status = response.status();
        if status == StatusCode::CREATED {
            return Ok(response.json().await?);
        }
        let text = response.text().await.unwrap_or_default();
        let err = ErrorBody::parse(&text).into_checkout_error(status.as_u16());
        tracing::warn!(status = status.as_u16(), error = %err, "order rejected");
        Err(err)
    }
}
