//! Bound carts stored on the server.

use async_trait::async_trait;
use common::{
    AddItemRequest, CartLine, CartResponse, ROLE_HEADER, RemoveItemRequest, Role, USER_ID_HEADER,
    UpdateQuantityRequest, UserId,
};
use reqwest::{Method, RequestBuilder, Response};

use crate::backend::{CartBackend, CartMode, CartMutation};
use crate::config::ClientConfig;
use crate::error::{CartError, ErrorBody};

/// Backend that forwards every mutation to `/carts/{user_id}`.
pub struct RemoteCartBackend {
    client: reqwest::Client,
    config: ClientConfig,
    user_id: UserId,
    role: Role,
}

impl RemoteCartBackend {
    pub fn new(config: &ClientConfig, user_id: UserId, role: Role) -> Result<Self, CartError> {
        Ok(Self {
            client: config.http_client()?,
            config: config.clone(),
            user_id,
            role,
        })
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Request under `/carts/{user_id}`, one encoded segment per `path` entry.
    fn request(&self, method: Method, path: &[&str]) -> Result<RequestBuilder, CartError> {
        let user_id = self.user_id.to_string();
        let mut segments = vec!["carts", user_id.as_str()];
        segments.extend_from_slice(path);
        let url = self.config.url(&segments)?;
        Ok(self
            .client
            .request(method, url)
            .header(USER_ID_HEADER, user_id)
            .header(ROLE_HEADER, self.role.as_str()))
    }

    async fn read_cart(response: Response) -> Result<Vec<CartLine>, CartError> {
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ErrorBody::parse(&text).into_cart_error(status.as_u16()));
        }
        let cart: CartResponse = response.json().await?;
        Ok(cart.items)
    }
}

#[async_trait]
impl CartBackend for RemoteCartBackend {
    fn mode(&self) -> CartMode {
        CartMode::Bound
    }

    #[tracing::instrument(skip(self), fields(user_id = %self.user_id))]
    async fn load(&self) -> Result<Vec<CartLine>, CartError> {
        let response = self.request(Method::GET, &[])?.send().await?;
        Self::read_cart(response).await
    }

    // The server applies the mutation itself; the optimistic list is unused.
    #[tracing::instrument(skip(self, _optimistic), fields(user_id = %self.user_id, kind = mutation.kind()))]
    async fn commit(
        &self,
        mutation: &CartMutation,
        _optimistic: &[CartLine],
    ) -> Result<Vec<CartLine>, CartError> {
        let response = match mutation {
            CartMutation::Add {
                product,
                quantity,
                selected_color,
            } => {
                let body = AddItemRequest {
                    product_id: product.id.clone(),
                    quantity: *quantity,
                    selected_color: selected_color.clone(),
                };
                self.request(Method::POST, &["items"])?
                    .json(&body)
                    .send()
                    .await?
            }
            CartMutation::UpdateQuantity { line_id, quantity } => {
                let body = UpdateQuantityRequest {
                    quantity: *quantity,
                };
                self.request(Method::PUT, &["items", line_id.to_string().as_str()])?
                    .json(&body)
                    .send()
                    .await?
            }
            CartMutation::Remove {
                product_id,
                selected_color,
                line_id,
            } => {
                let body = RemoveItemRequest {
                    selected_color: selected_color.clone(),
                    line_id: *line_id,
                };
                self.request(Method::DELETE, &["items", product_id.as_str()])?
                    .json(&body)
                    .send()
                    .await?
            }
            CartMutation::Clear => {
                let response = self.request(Method::DELETE, &[])?.send().await?;
                let status = response.status();
                if !status.is_success() {
                    let text = response.text().await.unwrap_or_default();
                    return Err(ErrorBody::parse(&text).into_cart_error(status.as_u16()));
                }
                return Ok(Vec::new());
            }
        };

        Self::read_cart(response).await
    }
}
