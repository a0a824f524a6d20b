//! Integration tests for the API server.

use std::sync::OnceLock;

use api::config::Config;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use common::{Money, ProductId, ROLE_HEADER, USER_ID_HEADER, UserId};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use store::{Catalog, InMemoryStore, Product};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn catalog() -> InMemoryStore {
    InMemoryStore::with_products([
        Product::new("P1", "Desk Lamp", Money::from_cents(1000), 5),
        Product::new("P2", "Wool Rug", Money::from_cents(4500), 1),
    ])
}

fn setup() -> (axum::Router, InMemoryStore) {
    setup_with_config(&Config::default())
}

fn setup_with_config(config: &Config) -> (axum::Router, InMemoryStore) {
    let store = catalog();
    let state = api::create_state(store.clone(), config);
    (api::create_app(state, get_metrics_handle()), store)
}

#[derive(Clone, Copy)]
enum As {
    Anonymous,
    Customer(UserId),
    Admin(UserId),
}

fn request(method: &str, uri: &str, who: As) -> axum::http::request::Builder {
    let builder = Request::builder().method(method).uri(uri);
    match who {
        As::Anonymous => builder,
        As::Customer(id) => builder
            .header(USER_ID_HEADER, id.to_string())
            .header(ROLE_HEADER, "customer"),
        As::Admin(id) => builder
            .header(USER_ID_HEADER, id.to_string())
            .header(ROLE_HEADER, "admin"),
    }
}

fn json_request(method: &str, uri: &str, who: As, body: Value) -> Request<Body> {
    request(method, uri, who)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

async fn send(app: &axum::Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or(Value::String(
            String::from_utf8_lossy(&body).into_owned(),
        ))
    };
    (status, json)
}

fn shipping() -> Value {
    json!({
        "full_name": "Ada Lovelace",
        "address": "12 Engine Row",
        "city": "London",
        "postal_code": "N1 9GU",
        "country": "UK",
        "phone": 5550100
    })
}

fn order_data(user: UserId, items: Value, payment_method: &str) -> Value {
    json!({
        "user_id": user,
        "total_amount_cents": 2500,
        "shipping_details": shipping(),
        "items": items,
        "payment_method": payment_method
    })
}

async fn place(app: &axum::Router, user: UserId, items: Value) -> (StatusCode, Value) {
    send(
        app,
        json_request(
            "POST",
            "/orders",
            As::Customer(user),
            json!({ "orderData": order_data(user, items, "credit_card") }),
        ),
    )
    .await
}

async fn stock_of(store: &InMemoryStore, id: &str) -> i64 {
    store
        .get_product(&ProductId::new(id))
        .await
        .unwrap()
        .unwrap()
        .stock
}

#[tokio::test]
async fn test_health_check() {
    let (app, _) = setup();

    let (status, json) = send(
        &app,
        Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_cart_lifecycle() {
    let (app, _) = setup();
    let user = UserId::new();
    let cart_uri = format!("/carts/{user}");

    let (status, json) = send(
        &app,
        request("GET", &cart_uri, As::Customer(user))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["items"], json!([]));

    let add = json!({ "product_id": "P1", "quantity": 2, "selected_color": "red" });
    send(
        &app,
        json_request("POST", &format!("{cart_uri}/items"), As::Customer(user), add.clone()),
    )
    .await;
    let (status, json) = send(
        &app,
        json_request("POST", &format!("{cart_uri}/items"), As::Customer(user), add),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let items = json["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["quantity"], 4);
    assert_eq!(items[0]["product"]["name"], "Desk Lamp");
    assert_eq!(items[0]["product"]["price_cents"], 1000);

    let line_id = items[0]["line_id"].as_str().unwrap().to_string();
    let (status, json) = send(
        &app,
        json_request(
            "PUT",
            &format!("{cart_uri}/items/{line_id}"),
            As::Customer(user),
            json!({ "quantity": 1 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["items"][0]["quantity"], 1);

    let (status, json) = send(
        &app,
        json_request(
            "DELETE",
            &format!("{cart_uri}/items/P1"),
            As::Customer(user),
            json!({ "selected_color": "red" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["items"], json!([]));
}

#[tokio::test]
async fn test_cart_delete_without_body_and_clear() {
    let (app, _) = setup();
    let user = UserId::new();
    let cart_uri = format!("/carts/{user}");

    send(
        &app,
        json_request(
            "POST",
            &format!("{cart_uri}/items"),
            As::Customer(user),
            json!({ "product_id": "P1", "quantity": 1 }),
        ),
    )
    .await;
    send(
        &app,
        json_request(
            "POST",
            &format!("{cart_uri}/items"),
            As::Customer(user),
            json!({ "product_id": "P2", "quantity": 1 }),
        ),
    )
    .await;

    let (status, json) = send(
        &app,
        request("DELETE", &format!("{cart_uri}/items/P1"), As::Customer(user))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["items"].as_array().unwrap().len(), 1);

    let (status, _) = send(
        &app,
        request("DELETE", &cart_uri, As::Customer(user))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, json) = send(
        &app,
        request("GET", &cart_uri, As::Customer(user))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(json["items"], json!([]));
}

#[tokio::test]
async fn test_cart_rejections() {
    let (app, _) = setup();
    let user = UserId::new();
    let items_uri = format!("/carts/{user}/items");

    let (status, json) = send(
        &app,
        json_request(
            "POST",
            &items_uri,
            As::Customer(user),
            json!({ "product_id": "P1", "quantity": 0 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "invalid_quantity");

    let (status, json) = send(
        &app,
        json_request(
            "POST",
            &items_uri,
            As::Customer(user),
            json!({ "product_id": "NOPE", "quantity": 1 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "product_not_found");

    let (status, json) = send(
        &app,
        request("GET", &format!("/carts/{user}"), As::Anonymous)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["code"], "forbidden");

    let (status, _) = send(
        &app,
        request("GET", &format!("/carts/{user}"), As::Customer(UserId::new()))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        request("GET", &format!("/carts/{user}"), As::Admin(UserId::new()))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_place_order_debits_stock() {
    let (app, store) = setup();
    let user = UserId::new();

    let (status, json) = place(&app, user, json!([{ "product_id": "P1", "quantity": 2 }])).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["status"], "pending");
    assert_eq!(json["user_id"], user.to_string());
    assert_eq!(json["total_amount_cents"], 2500);
    assert_eq!(json["shipping_details"]["phone"], "5550100");
    assert!(json.get("proof_url").is_none());
    let items = json["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["product_name"], "Desk Lamp");
    assert_eq!(items[0]["unit_price_cents"], 1000);
    assert_eq!(items[0]["total_price_cents"], 2000);

    assert_eq!(stock_of(&store, "P1").await, 3);
}

#[tokio::test]
async fn test_place_order_insufficient_stock() {
    let (app, store) = setup();
    let user = UserId::new();

    let (status, json) = place(&app, user, json!([{ "product_id": "P2", "quantity": 3 }])).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "insufficient_stock");
    assert_eq!(json["product_id"], "P2");
    assert_eq!(json["available"], 1);
    assert_eq!(json["requested"], 3);
    assert_eq!(store.order_count().await, 0);
    assert_eq!(store.order_line_count().await, 0);
    assert_eq!(stock_of(&store, "P2").await, 1);
}

#[tokio::test]
async fn test_place_order_unknown_product() {
    let (app, _) = setup();
    let user = UserId::new();

    let (status, json) = place(&app, user, json!([{ "product_id": "GHOST", "quantity": 1 }])).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "product_not_found");
    assert_eq!(json["product_id"], "GHOST");
}

#[tokio::test]
async fn test_place_order_missing_fields() {
    let (app, _) = setup();
    let user = UserId::new();

    let (status, json) = send(
        &app,
        json_request(
            "POST",
            "/orders",
            As::Customer(user),
            json!({ "orderData": { "user_id": user, "items": [] } }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "missing_fields");
    assert_eq!(
        json["fields"],
        json!(["total_amount_cents", "shipping_details", "items", "payment_method"])
    );
}

#[tokio::test]
async fn test_bank_transfer_requires_proof() {
    let (app, store) = setup();
    let user = UserId::new();

    let (status, json) = send(
        &app,
        json_request(
            "POST",
            "/orders",
            As::Customer(user),
            json!({
                "orderData": order_data(user, json!([{ "product_id": "GHOST", "quantity": 1 }]), "bank_transfer")
            }),
        ),
    )
    .await;

    // The proof check runs before any product lookup.
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "proof_required");
    assert_eq!(store.order_count().await, 0);
}

#[tokio::test]
async fn test_bank_transfer_with_base64_slip() {
    let (app, _) = setup();
    let user = UserId::new();
    let slip = b"\x89PNG fake image";

    let (status, json) = send(
        &app,
        json_request(
            "POST",
            "/orders",
            As::Customer(user),
            json!({
                "orderData": order_data(user, json!([{ "product_id": "P1", "quantity": 1 }]), "bank_transfer"),
                "slip": { "content_type": "image/png", "data": STANDARD.encode(slip) }
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["payment_method"], "bank_transfer");
    assert_eq!(
        json["proof_url"],
        format!("data:image/png;base64,{}", STANDARD.encode(slip))
    );
}

#[tokio::test]
async fn test_bank_transfer_with_multipart_slip() {
    let (app, store) = setup();
    let user = UserId::new();
    let boundary = "storefront-boundary";
    let data = order_data(
        user,
        json!([{ "product_id": "P1", "quantity": 2, "selected_color": "black" }]),
        "bank_transfer",
    );

    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"orderData\"\r\n\r\n{data}\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"slip\"; filename=\"slip.jpg\"\r\nContent-Type: image/jpeg\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"jpeg-bytes");
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    let req = request("POST", "/orders", As::Customer(user))
        .header(
            "content-type",
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap();
    let (status, json) = send(&app, req).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(
        json["proof_url"],
        format!("data:image/jpeg;base64,{}", STANDARD.encode(b"jpeg-bytes"))
    );
    assert_eq!(json["items"][0]["selected_color"], "black");
    assert_eq!(stock_of(&store, "P1").await, 3);
}

#[tokio::test]
async fn test_oversized_slip_is_rejected() {
    let config = Config {
        max_proof_bytes: 8,
        ..Config::default()
    };
    let (app, store) = setup_with_config(&config);
    let user = UserId::new();

    let (status, json) = send(
        &app,
        json_request(
            "POST",
            "/orders",
            As::Customer(user),
            json!({
                "orderData": order_data(user, json!([{ "product_id": "P1", "quantity": 1 }]), "bank_transfer"),
                "slip": { "content_type": "image/png", "data": STANDARD.encode([0u8; 32]) }
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(json["code"], "payload_too_large");
    assert_eq!(store.order_count().await, 0);
}

#[tokio::test]
async fn test_cannot_place_order_for_another_user() {
    let (app, _) = setup();
    let owner = UserId::new();

    let (status, json) = send(
        &app,
        json_request(
            "POST",
            "/orders",
            As::Customer(UserId::new()),
            json!({ "orderData": order_data(owner, json!([{ "product_id": "P1", "quantity": 1 }]), "credit_card") }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["code"], "forbidden");
}

#[tokio::test]
async fn test_customer_cancels_own_pending_order() {
    let (app, _) = setup();
    let user = UserId::new();
    let (_, created) = place(&app, user, json!([{ "product_id": "P1", "quantity": 1 }])).await;
    let order_id = created["order_id"].as_str().unwrap();
    let status_uri = format!("/orders/{order_id}/status");

    let (status, json) = send(
        &app,
        json_request(
            "PATCH",
            &status_uri,
            As::Customer(UserId::new()),
            json!({ "status": "cancelled" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["code"], "not_order_owner");

    let (status, json) = send(
        &app,
        json_request(
            "PATCH",
            &status_uri,
            As::Customer(user),
            json!({ "status": "processing" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["code"], "forbidden");

    let (status, json) = send(
        &app,
        json_request(
            "PATCH",
            &status_uri,
            As::Customer(user),
            json!({ "status": "cancelled" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "cancelled");
}

#[tokio::test]
async fn test_admin_walks_status_table() {
    let (app, _) = setup();
    let user = UserId::new();
    let admin = As::Admin(UserId::new());
    let (_, created) = place(&app, user, json!([{ "product_id": "P1", "quantity": 1 }])).await;
    let order_id = created["order_id"].as_str().unwrap();
    let status_uri = format!("/orders/{order_id}/status");

    for next in ["processing", "shipped", "shipped", "delivered", "completed"] {
        let (status, json) = send(
            &app,
            json_request("PATCH", &status_uri, admin, json!({ "status": next })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "moving to {next}");
        assert_eq!(json["status"], next);
    }

    let (status, json) = send(
        &app,
        json_request("PATCH", &status_uri, admin, json!({ "status": "pending" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "invalid_status_transition");
    assert_eq!(json["from"], "completed");
    assert_eq!(json["to"], "pending");

    let (status, json) = send(
        &app,
        json_request("PATCH", &status_uri, admin, json!({ "status": "lost" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "bad_request");
}

#[tokio::test]
async fn test_status_of_unknown_order() {
    let (app, _) = setup();

    let (status, json) = send(
        &app,
        json_request(
            "PATCH",
            &format!("/orders/{}/status", UserId::new()),
            As::Admin(UserId::new()),
            json!({ "status": "processing" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "order_not_found");
}

#[tokio::test]
async fn test_order_queries() {
    let (app, _) = setup();
    let user = UserId::new();
    let (_, first) = place(&app, user, json!([{ "product_id": "P1", "quantity": 1 }])).await;
    let (_, second) = place(&app, user, json!([{ "product_id": "P2", "quantity": 1 }])).await;

    let (status, json) = send(
        &app,
        request("GET", &format!("/users/{user}/orders"), As::Customer(user))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let orders = json.as_array().unwrap();
    assert_eq!(orders.len(), 2);
    assert_eq!(orders[0]["order_id"], second["order_id"]);
    assert_eq!(orders[1]["order_id"], first["order_id"]);

    let order_uri = format!("/orders/{}", first["order_id"].as_str().unwrap());
    let (status, json) = send(
        &app,
        request("GET", &order_uri, As::Customer(user))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["items"][0]["product_id"], "P1");

    let (status, _) = send(
        &app,
        request("GET", &order_uri, As::Customer(UserId::new()))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        request("GET", &format!("/users/{user}/orders"), As::Anonymous)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_metrics_endpoint_reports_orders() {
    let (app, _) = setup();
    place(&app, UserId::new(), json!([{ "product_id": "P1", "quantity": 1 }])).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("orders_placed_total"));
}

#[tokio::test]
async fn test_malformed_ids_are_bad_requests() {
    let (app, _) = setup();
    let admin = As::Admin(UserId::new());

    let (status, _) = send(
        &app,
        request("GET", "/orders/not-a-uuid", admin)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        request("GET", "/carts/not-a-uuid", admin)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_sequential_orders_exhaust_stock() {
    let (app, store) = setup();
    let user = UserId::new();

    place(&app, user, json!([{ "product_id": "P1", "quantity": 2 }])).await;
    place(&app, user, json!([{ "product_id": "P1", "quantity": 2 }])).await;
    let (status, json) = place(&app, user, json!([{ "product_id": "P1", "quantity": 2 }])).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["available"], 1);
    assert_eq!(store.order_count().await, 2);
}
