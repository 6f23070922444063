//! End-to-end HTTP surface tests, driving the axum router directly with
//! `tower::ServiceExt::oneshot` instead of binding a real socket.

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use sportsbook_core::config::Config;
use sportsbook_core::eventbus::EventBus;
use sportsbook_core::http::{router, AppState};
use sportsbook_core::runtime::AppRegistries;
use sportsbook_core::store::{InMemoryEventStore, InMemoryStateStore};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceExt;

fn app() -> axum::Router {
    let config = Arc::new(Config::default());
    let registries = Arc::new(AppRegistries::new(
        InMemoryStateStore::new(),
        InMemoryStateStore::new(),
        InMemoryStateStore::new(),
        InMemoryStateStore::new(),
        InMemoryEventStore::new(),
        InMemoryStateStore::new(),
        config.currency,
        config.volatility,
        config.cashout,
    ));
    let bus = Arc::new(EventBus::new());
    router(AppState { registries, bus, config })
}

async fn send(app: &axum::Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri).header("content-type", "application/json");
    let request = match body {
        Some(value) => builder.body(Body::from(value.to_string())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, json)
}

#[tokio::test]
async fn health_check() {
    let app = app();
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn deposit_then_balance() {
    let app = app();
    let (status, _) = send(
        &app,
        "POST",
        "/api/wallet/u1/deposit",
        Some(json!({"amount": "1000.00", "currency": "USD", "transaction_id": "d1"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, "GET", "/api/wallet/u1/balance", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"]["amount"], "1000.00");
}

#[tokio::test]
async fn place_bet_happy_path_scenario_1() {
    let app = app();
    send(
        &app,
        "POST",
        "/api/wallet/u1/deposit",
        Some(json!({"amount": "1000.00", "currency": "USD", "transaction_id": "d1"})),
    )
    .await;
    send(&app, "POST", "/api/odds/m1", Some(json!({"selection_odds": {"home": "2.10"}}))).await;

    let bet_body = json!({
        "user_id": "u1",
        "event_id": "e1",
        "market_id": "m1",
        "selection_id": "home",
        "stake": "100.00",
        "currency": "USD",
        "acceptable_odds": "2.10",
    });
    let (status, body) = send(&app, "POST", "/api/bets", Some(bet_body)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "Accepted");
    assert_eq!(body["payout"]["amount"], "210.00");

    let (status, balance) = send(&app, "GET", "/api/wallet/u1/balance", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(balance["available"]["amount"], "900.00");
}

#[tokio::test]
async fn idempotent_place_bet_via_header_scenario_4() {
    let app = app();
    send(
        &app,
        "POST",
        "/api/wallet/u1/deposit",
        Some(json!({"amount": "1000.00", "currency": "USD", "transaction_id": "d1"})),
    )
    .await;
    send(&app, "POST", "/api/odds/m1", Some(json!({"selection_odds": {"home": "2.10"}}))).await;

    let bet_body = json!({
        "user_id": "u1",
        "event_id": "e1",
        "market_id": "m1",
        "selection_id": "home",
        "stake": "100.00",
        "currency": "USD",
        "acceptable_odds": "2.10",
    });

    let first = Request::builder()
        .method("POST")
        .uri("/api/bets")
        .header("content-type", "application/json")
        .header("Idempotency-Key", "k1")
        .body(Body::from(bet_body.to_string()))
        .unwrap();
    let response = app.clone().oneshot(first).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let first_body: Value = serde_json::from_slice(&bytes).unwrap();

    let second = Request::builder()
        .method("POST")
        .uri("/api/bets")
        .header("content-type", "application/json")
        .header("Idempotency-Key", "k1")
        .body(Body::from(bet_body.to_string()))
        .unwrap();
    let response = app.clone().oneshot(second).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let second_body: Value = serde_json::from_slice(&bytes).unwrap();

    assert_eq!(first_body["bet_id"], second_body["bet_id"]);
    assert_eq!(first_body["payout"], second_body["payout"]);

    let (status, history) = send(&app, "GET", "/api/wallet/u1/transactions", None).await;
    assert_eq!(status, StatusCode::OK);
    let reservations = history.as_array().unwrap().iter().filter(|tx| tx["transaction_type"] == "Reservation").count();
    assert_eq!(reservations, 1);
}

#[tokio::test]
async fn insufficient_balance_scenario_2() {
    let app = app();
    send(
        &app,
        "POST",
        "/api/wallet/u1/deposit",
        Some(json!({"amount": "50.00", "currency": "USD", "transaction_id": "d1"})),
    )
    .await;

    let bet_body = json!({
        "user_id": "u1",
        "event_id": "e1",
        "market_id": "m1",
        "selection_id": "home",
        "stake": "100.00",
        "currency": "USD",
        "acceptable_odds": "2.10",
    });
    let (status, body) = send(&app, "POST", "/api/bets", Some(bet_body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "InsufficientBalance");

    let (_, balance) = send(&app, "GET", "/api/wallet/u1/balance", None).await;
    assert_eq!(balance["total"]["amount"], "50.00");
}

#[tokio::test]
async fn rate_limit_returns_429_after_exhausting_bucket() {
    let config = Arc::new({
        let mut c = Config::default();
        c.server.rate_limit_per_window = 2;
        c.server.rate_limit_window_secs = 60;
        c
    });
    let registries = Arc::new(AppRegistries::new(
        InMemoryStateStore::new(),
        InMemoryStateStore::new(),
        InMemoryStateStore::new(),
        InMemoryStateStore::new(),
        InMemoryEventStore::new(),
        InMemoryStateStore::new(),
        config.currency,
        config.volatility,
        config.cashout,
    ));
    let bus = Arc::new(EventBus::new());
    let app = router(AppState { registries, bus, config });
    let addr: SocketAddr = "127.0.0.1:9001".parse().unwrap();

    let request_with_peer = || {
        Request::builder()
            .uri("/health")
            .extension(ConnectInfo(addr))
            .body(Body::empty())
            .unwrap()
    };

    for _ in 0..2 {
        let response = app.clone().oneshot(request_with_peer()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
    let response = app.clone().oneshot(request_with_peer()).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}
