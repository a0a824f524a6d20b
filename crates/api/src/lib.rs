//! HTTP API server for storefront carts and orders.
//!
//! Provides REST endpoints for bound carts, order placement and order status
//! changes, with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;
pub mod seed;
pub mod session;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, patch, post, put};
use domain::{CartService, OrderService};
use metrics_exporter_prometheus::PrometheusHandle;
use store::{CartRepository, Catalog, OrderStore};
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use config::Config;

/// Everything a store backend must provide to serve the API.
pub trait StorefrontStore: Catalog + OrderStore + CartRepository + Clone + 'static {}

impl<T> StorefrontStore for T where T: Catalog + OrderStore + CartRepository + Clone + 'static {}

/// Shared application state accessible from all handlers.
pub struct AppState<S> {
    pub orders: OrderService<S>,
    pub carts: CartService<S>,
    pub max_proof_bytes: usize,
    pub body_limit: usize,
}

/// Creates the application state over `store`.
pub fn create_state<S: StorefrontStore>(store: S, config: &Config) -> Arc<AppState<S>> {
    Arc::new(AppState {
        orders: OrderService::new(store.clone()),
        carts: CartService::new(store),
        max_proof_bytes: config.max_proof_bytes,
        body_limit: config.body_limit(),
    })
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: StorefrontStore>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let body_limit = state.body_limit;

    let metrics_router = Router::new()
        .route("/metrics", get(routes::ops::metrics))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::ops::health))
        .route(
            "/carts/{user_id}",
            get(routes::carts::get::<S>).delete(routes::carts::clear::<S>),
        )
        .route("/carts/{user_id}/items", post(routes::carts::add_item::<S>))
        .route(
            "/carts/{user_id}/items/{item_id}",
            put(routes::carts::update_quantity::<S>).delete(routes::carts::remove_item::<S>),
        )
        .route("/orders", post(routes::orders::place::<S>))
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route("/orders/{id}/status", patch(routes::orders::set_status::<S>))
        .route("/users/{user_id}/orders", get(routes::orders::for_user::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
