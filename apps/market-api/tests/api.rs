//! Router-level tests: requests go through the full axum stack against an
//! in-memory database.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::routing::get;
use axum::Router;
use market_api::{router, AppState, MarketConfig};
use market_core::{ContactInput, NewUser, UserKind};
use market_db::{Database, DbConfig};
use serde_json::{json, Value};
use tower::ServiceExt;

const PRICE_LIST: &str = r#"
shop: Svyaznoy
categories:
  - id: 224
    name: Смартфоны
  - id: 15
    name: Аксессуары
goods:
  - id: 4216292
    category: 224
    model: apple/iphone/xs-max
    name: Смартфон Apple iPhone XS Max 512GB (золотистый)
    price: 110000
    price_rrc: 116990
    quantity: 14
    parameters:
      "Диагональ (дюйм)": 6.5
      "Цвет": золотистый
  - id: 4216313
    category: 224
    model: apple/iphone/xr
    name: Смартфон Apple iPhone XR 256GB (красный)
    price: 65000
    price_rrc: 69990
    quantity: 9
    parameters:
      "Цвет": красный
  - id: 77
    category: 15
    model: apple/airpods
    name: Наушники Apple AirPods 2
    price: 12000
    price_rrc: 13990
    quantity: 20
    parameters: {}
"#;

// =============================================================================
// Fixtures
// =============================================================================

struct TestApp {
    app: Router,
    db: Database,
    supplier: String,
    buyer: String,
}

async fn account(db: &Database, email: &str, kind: UserKind) -> (i64, String) {
    let user = db
        .users()
        .create(&NewUser {
            email: email.to_string(),
            first_name: "Test".to_string(),
            kind,
            ..Default::default()
        })
        .await
        .unwrap();
    let token = db.users().create_token(user.id).await.unwrap();
    (user.id, token)
}

async fn setup() -> TestApp {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    let (_, supplier) = account(&db, "partner@example.com", UserKind::Shop).await;
    let (_, buyer) = account(&db, "buyer@example.com", UserKind::Buyer).await;

    let state = AppState::new(db.clone(), MarketConfig::default()).unwrap();
    TestApp {
        app: router(state),
        db,
        supplier,
        buyer,
    }
}

/// Serves the price list on an ephemeral local port; returns its URL.
async fn serve_price_list(document: &'static str) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new().route("/shop.yaml", get(move || async move { document }));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/shop.yaml")
}

async fn call(app: &Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Token {token}"));
    }
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn add_contact(app: &TestApp) -> i64 {
    let (status, body) = call(
        &app.app,
        Method::POST,
        "/api/v1/user/contact",
        Some(&app.buyer),
        Some(json!({
            "city": "Moscow",
            "street": "Gogolya",
            "house": "58",
            "phone": "+79424238142"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body["id"].as_i64().unwrap()
}

async fn ingest(app: &TestApp) {
    let url = serve_price_list(PRICE_LIST).await;
    let (status, body) = call(
        &app.app,
        Method::POST,
        "/api/v1/partner/update",
        Some(&app.supplier),
        Some(json!({ "url": url })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["Status"], true);
    assert_eq!(body["listings"], 3);
}

// =============================================================================
// Identity
// =============================================================================

#[tokio::test]
async fn test_health() {
    let app = setup().await;
    let (status, body) = call(&app.app, Method::GET, "/api/v1/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["database"], "ok");
}

#[tokio::test]
async fn test_missing_or_unknown_token_is_unauthorized() {
    let app = setup().await;

    let (status, body) = call(&app.app, Method::GET, "/api/v1/basket", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["Status"], false);

    let (status, _) = call(&app.app, Method::GET, "/api/v1/basket", Some("nope"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_buyers_cannot_use_partner_endpoints() {
    let app = setup().await;
    let (status, body) = call(&app.app, Method::GET, "/api/v1/partner/orders", Some(&app.buyer), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["Status"], false);
}

// =============================================================================
// Price lists and catalog
// =============================================================================

#[tokio::test]
async fn test_ingest_and_browse() {
    let app = setup().await;
    ingest(&app).await;
    // A second upload replaces, it does not add.
    ingest(&app).await;

    let (status, body) = call(&app.app, Method::GET, "/api/v1/products", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 3);
    assert!(body["results"]
        .as_array()
        .unwrap()
        .iter()
        .all(|listing| listing["shop"] == "Svyaznoy"));

    let (_, phones) = call(&app.app, Method::GET, "/api/v1/products?category_id=224", None, None).await;
    assert_eq!(phones["count"], 2);

    let (status, body) = call(&app.app, Method::GET, "/api/v1/products?category_id=abc", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["Errors"]["category_id"].is_array());

    let (_, categories) = call(&app.app, Method::GET, "/api/v1/categories", None, None).await;
    assert_eq!(categories["count"], 2);
    let (_, shops) = call(&app.app, Method::GET, "/api/v1/shops", None, None).await;
    assert_eq!(shops["results"][0]["name"], "Svyaznoy");
    assert_eq!(shops["results"][0]["state"], true);
}

#[tokio::test]
async fn test_partner_state_hides_listings() {
    let app = setup().await;
    ingest(&app).await;

    let (status, body) = call(
        &app.app,
        Method::POST,
        "/api/v1/partner/state",
        Some(&app.supplier),
        Some(json!({ "state": "off" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["updated"], 1);

    let (_, state) = call(&app.app, Method::GET, "/api/v1/partner/state", Some(&app.supplier), None).await;
    assert_eq!(state["results"][0]["state"], false);

    let (_, products) = call(&app.app, Method::GET, "/api/v1/products", None, None).await;
    assert_eq!(products["count"], 0);

    let (status, _) = call(
        &app.app,
        Method::POST,
        "/api/v1/partner/state",
        Some(&app.supplier),
        Some(json!({ "state": "maybe" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_partner_update_rejects_bad_urls() {
    let app = setup().await;

    let (status, body) = call(
        &app.app,
        Method::POST,
        "/api/v1/partner/update",
        Some(&app.supplier),
        Some(json!({ "url": "not a url" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["Status"], false);

    let (status, _) = call(
        &app.app,
        Method::POST,
        "/api/v1/partner/update",
        Some(&app.supplier),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(
        &app.app,
        Method::POST,
        "/api/v1/partner/update",
        Some(&app.supplier),
        Some(json!({ "url": "http://127.0.0.1:1/shop.yaml" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_partner_update_rejects_malformed_document() {
    let app = setup().await;
    let url = serve_price_list("shop: Svyaznoy\ngoods: 12\n").await;

    let (status, body) = call(
        &app.app,
        Method::POST,
        "/api/v1/partner/update",
        Some(&app.supplier),
        Some(json!({ "url": url })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["Errors"].is_object(), "{body}");
}

#[tokio::test]
async fn test_partner_update_with_misspelled_goods_keeps_catalog() {
    let app = setup().await;
    ingest(&app).await;
    let url = serve_price_list("shop: Svyaznoy\ngood:\n  - id: 1\n").await;

    let (status, body) = call(
        &app.app,
        Method::POST,
        "/api/v1/partner/update",
        Some(&app.supplier),
        Some(json!({ "url": url })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["Errors"]["document"].is_array(), "{body}");

    assert_eq!(listing_ids(&app).await.len(), 3);
}

// =============================================================================
// Basket and orders
// =============================================================================

async fn listing_ids(app: &TestApp) -> Vec<i64> {
    let (_, body) = call(&app.app, Method::GET, "/api/v1/products", None, None).await;
    body["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|listing| listing["id"].as_i64().unwrap())
        .collect()
}

#[tokio::test]
async fn test_basket_requires_contact() {
    let app = setup().await;
    ingest(&app).await;
    let ids = listing_ids(&app).await;

    let (status, body) = call(
        &app.app,
        Method::POST,
        "/api/v1/basket",
        Some(&app.buyer),
        Some(json!({ "items": [{ "product_info": ids[0], "quantity": 1 }] })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["Status"], false);
}

#[tokio::test]
async fn test_basket_to_order_flow() {
    let app = setup().await;
    ingest(&app).await;
    let contact = add_contact(&app).await;
    let ids = listing_ids(&app).await;

    // Items may also arrive as a JSON string, ids as digit strings.
    let items = json!([
        { "product_info": ids[0], "quantity": 2 },
        { "product_info": ids[1].to_string(), "quantity": 2 },
        { "product_info": ids[0], "quantity": 1 },
    ]);
    let (status, body) = call(
        &app.app,
        Method::POST,
        "/api/v1/basket",
        Some(&app.buyer),
        Some(json!({ "items": items.to_string() })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["created"], 2);
    assert_eq!(body["rejected"][0]["index"], 2);

    let (_, basket) = call(&app.app, Method::GET, "/api/v1/basket", Some(&app.buyer), None).await;
    assert_eq!(basket["count"], 1);
    let basket = &basket["results"][0];
    assert_eq!(basket["sum"], 2 * 110000 + 2 * 65000);
    assert_eq!(basket["delivery"], 300);
    assert_eq!(basket["total_sum"], 2 * 110000 + 2 * 65000 + 300);
    let order_id = basket["id"].as_i64().unwrap();

    let line = basket["ordered_items"][0]["id"].as_i64().unwrap();
    let (_, updated) = call(
        &app.app,
        Method::PUT,
        "/api/v1/basket",
        Some(&app.buyer),
        Some(json!({ "items": [{ "id": line, "quantity": 1 }, { "id": "x", "quantity": 3 }] })),
    )
    .await;
    assert_eq!(updated["updated"], 1);

    let (status, body) = call(
        &app.app,
        Method::POST,
        "/api/v1/orders",
        Some(&app.buyer),
        Some(json!({ "id": order_id, "contact": contact })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["Status"], true);

    // Placing again finds no basket.
    let (status, _) = call(
        &app.app,
        Method::POST,
        "/api/v1/orders",
        Some(&app.buyer),
        Some(json!({ "id": order_id, "contact": contact })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, orders) = call(&app.app, Method::GET, "/api/v1/orders", Some(&app.buyer), None).await;
    assert_eq!(orders["count"], 1);
    assert_eq!(orders["results"][0]["state"], "new");
    assert_eq!(orders["results"][0]["total_sum"], 110000 + 2 * 65000 + 300);

    let (_, detail) = call(&app.app, Method::GET, &format!("/api/v1/orders/{order_id}"), Some(&app.buyer), None).await;
    assert_eq!(detail["phone"], "+79424238142");
    assert_eq!(detail["contact"]["city"], "Moscow");

    let (_, partner) = call(&app.app, Method::GET, "/api/v1/partner/orders", Some(&app.supplier), None).await;
    assert_eq!(partner["count"], 1);
    assert_eq!(partner["results"][0]["total_sum"], 110000 + 2 * 65000);

    let (status, _) = call(&app.app, Method::GET, "/api/v1/orders/abc", Some(&app.buyer), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let placed = app.db.outbox().list_by_kind("order_placed").await.unwrap();
    assert_eq!(placed.len(), 1);
}

#[tokio::test]
async fn test_malformed_basket_items_do_not_stop_valid_ones() {
    let app = setup().await;
    ingest(&app).await;
    add_contact(&app).await;
    let ids = listing_ids(&app).await;

    let (status, body) = call(
        &app.app,
        Method::POST,
        "/api/v1/basket",
        Some(&app.buyer),
        Some(json!({ "items": [
            { "product_info": ids[0], "quantity": 1 },
            { "quantity": 1 },
            { "product_info": ids[1], "quantity": 0 },
            { "product_info": 999999, "quantity": 1 },
            { "product_info": ids[2], "quantity": 3 },
        ] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["Status"], true);
    assert_eq!(body["created"], 2);

    let rejected: Vec<i64> = body["rejected"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["index"].as_i64().unwrap())
        .collect();
    assert_eq!(rejected, vec![1, 2, 3]);
    assert!(body["rejected"][0]["listing_id"].is_null());
    assert_eq!(body["rejected"][2]["listing_id"], 999999);

    let (_, basket) = call(&app.app, Method::GET, "/api/v1/basket", Some(&app.buyer), None).await;
    assert_eq!(basket["results"][0]["ordered_items"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_remove_items_ignores_bad_ids() {
    let app = setup().await;
    ingest(&app).await;
    add_contact(&app).await;
    let ids = listing_ids(&app).await;

    call(
        &app.app,
        Method::POST,
        "/api/v1/basket",
        Some(&app.buyer),
        Some(json!({ "items": [{ "product_info": ids[0], "quantity": 1 }, { "product_info": ids[2], "quantity": 1 }] })),
    )
    .await;
    let (_, basket) = call(&app.app, Method::GET, "/api/v1/basket", Some(&app.buyer), None).await;
    let lines: Vec<i64> = basket["results"][0]["ordered_items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|line| line["id"].as_i64().unwrap())
        .collect();

    let (status, body) = call(
        &app.app,
        Method::DELETE,
        "/api/v1/basket",
        Some(&app.buyer),
        Some(json!({ "items": format!("{},abc,{}", lines[0], lines[1]) })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], 2);

    let (status, _) = call(
        &app.app,
        Method::DELETE,
        "/api/v1/basket",
        Some(&app.buyer),
        Some(json!({ "items": "abc" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_non_json_body_is_argument_error() {
    let app = setup().await;
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/basket")
        .header(header::AUTHORIZATION, format!("Token {}", app.buyer))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let response = app.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["Errors"], "Invalid request format");
}

// =============================================================================
// Contacts
// =============================================================================

#[tokio::test]
async fn test_contact_lifecycle() {
    let app = setup().await;

    let (status, body) = call(
        &app.app,
        Method::POST,
        "/api/v1/user/contact",
        Some(&app.buyer),
        Some(json!({ "street": "Gogolya", "phone": "+7" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["Errors"]["city"][0], "city is required");

    let id = add_contact(&app).await;

    let (status, _) = call(
        &app.app,
        Method::POST,
        "/api/v1/user/contact",
        Some(&app.buyer),
        Some(json!(ContactInput {
            city: "Tver".to_string(),
            street: "Lenina".to_string(),
            phone: "+7".to_string(),
            ..Default::default()
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = call(
        &app.app,
        Method::PUT,
        "/api/v1/user/contact",
        Some(&app.buyer),
        Some(json!({ "id": id.to_string(), "city": "Tver" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, list) = call(&app.app, Method::GET, "/api/v1/user/contact", Some(&app.buyer), None).await;
    assert_eq!(list["count"], 1);
    assert_eq!(list["results"][0]["city"], "Tver");
    assert_eq!(list["results"][0]["street"], "Gogolya");

    let (_, deleted) = call(
        &app.app,
        Method::DELETE,
        "/api/v1/user/contact",
        Some(&app.buyer),
        Some(json!({ "items": id.to_string() })),
    )
    .await;
    assert_eq!(deleted["deleted"], 1);
}

#[tokio::test]
async fn test_supplier_order_detail_requires_own_lines() {
    let app = setup().await;
    let (status, _) = call(&app.app, Method::GET, "/api/v1/partner/orders/1", Some(&app.supplier), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
