//! HTTP 层测试：路由、状态码与错误映射

mod common;

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use common::{ledger_with_oracle, FailingOracle};
use serde_json::{json, Value};
use tower::ServiceExt;
use wallet_ledger::{api, app_state::AppState, config::Config};

fn app() -> Router {
    let t = ledger_with_oracle(Arc::new(FailingOracle));
    let config = Arc::new(Config::from_env().unwrap());
    api::routes(Arc::new(AppState::new(config, t.engine, None)))
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn create_wallet(app: &Router) -> (String, String) {
    let (status, body) = send(app, Method::POST, "/wallets", None).await;
    assert_eq!(status, StatusCode::CREATED);
    (
        body["data"]["address"].as_str().unwrap().to_string(),
        body["data"]["private_key"].as_str().unwrap().to_string(),
    )
}

#[tokio::test]
async fn test_health() {
    let app = app();
    let (status, body) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], 0);
    assert_eq!(body["data"]["status"], "ok");
}

#[tokio::test]
async fn test_create_wallet_and_list_balances() {
    let app = app();
    let (address, key) = create_wallet(&app).await;
    assert_eq!(address.len(), 32);
    assert_eq!(key.len(), 64);

    let (status, body) = send(&app, Method::GET, &format!("/wallets/{}", address), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "ACTIVE");
    assert!(body["data"].get("private_key").is_none());

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/wallets/{}/balances", address),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["balances"].as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn test_deposit_and_withdraw() {
    let app = app();
    let (address, key) = create_wallet(&app).await;

    // 币种代码大小写不敏感
    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/wallets/{}/deposits", address),
        Some(json!({ "currency": "usd", "amount": "100" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["currency"], "USD");

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/wallets/{}/withdrawals", address),
        Some(json!({ "currency": "USD", "amount": "10", "private_key": key })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["fee"], "0.10");
    assert_eq!(body["data"]["total"], "10.10");

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/wallets/{}/withdrawals", address),
        Some(json!({ "currency": "USD", "amount": "1000", "private_key": key })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "insufficient_balance");
}

#[tokio::test]
async fn test_error_mapping() {
    let app = app();
    let (address, key) = create_wallet(&app).await;

    let (status, body) = send(&app, Method::GET, "/wallets/unknown", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "wallet_not_found");

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/wallets/{}/deposits", address),
        Some(json!({ "currency": "DOGE", "amount": "1" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "currency_not_found");

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/wallets/{}/deposits", address),
        Some(json!({ "currency": "USD", "amount": "0" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_failed");

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/wallets/{}/deposits", address),
        Some(json!({ "currency": "USD" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_failed");

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/wallets/{}/withdrawals", address),
        Some(json!({ "currency": "USD", "amount": "1", "private_key": "00" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "invalid_credentials");

    // 报价源不可用
    send(
        &app,
        Method::POST,
        &format!("/wallets/{}/deposits", address),
        Some(json!({ "currency": "USD", "amount": "10" })),
    )
    .await;
    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/wallets/{}/conversions", address),
        Some(json!({
            "from_currency": "USD",
            "to_currency": "BTC",
            "amount": "5",
            "private_key": key
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["code"], "quote_unavailable");
}

#[tokio::test]
async fn test_transfer_between_wallets() {
    let app = app();
    let (a, a_key) = create_wallet(&app).await;
    let (b, _) = create_wallet(&app).await;

    send(
        &app,
        Method::POST,
        &format!("/wallets/{}/deposits", a),
        Some(json!({ "currency": "BRL", "amount": 50 })),
    )
    .await;

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/wallets/{}/transfers", a),
        Some(json!({
            "destination_address": b,
            "currency": "BRL",
            "amount": "20",
            "private_key": a_key
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["fee"], "0.20");

    let (_, body) = send(&app, Method::GET, &format!("/wallets/{}/balances", b), None).await;
    let brl = body["data"]["balances"]
        .as_array()
        .unwrap()
        .iter()
        .find(|e| e["code"] == "BRL")
        .unwrap()
        .clone();
    assert_eq!(brl["balance"], "20");
}

#[tokio::test]
async fn test_list_currencies() {
    let app = app();
    let (status, body) = send(&app, Method::GET, "/currencies", None).await;
    assert_eq!(status, StatusCode::OK);
    let codes: Vec<_> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["code"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(codes, vec!["BRL", "BTC", "ETH", "SOL", "USD"]);
}
