mod common;

use httpmock::prelude::*;
use mealpay::application::orchestrator::{FallbackSwitch, PaymentOrchestrator};
use mealpay::config::BackendConfig;
use mealpay::domain::order::OrderStatus;
use mealpay::domain::payment::{PaymentDetails, PaymentRequest};
use mealpay::domain::ports::SessionRef;
use mealpay::error::PaymentError;
use mealpay::infrastructure::in_memory::{InMemoryOrderStore, StaticSession};
use mealpay::infrastructure::supabase::SupabaseClient;
use mealpay::infrastructure::transports::{AppServerTransport, EdgeFunctionTransport};
use rust_decimal_macros::dec;
use serde_json::json;
use std::sync::Arc;

#[cfg(not(feature = "storage-rocksdb"))]
use assert_cmd::{cargo_bin, prelude::*};
#[cfg(not(feature = "storage-rocksdb"))]
use predicates::prelude::*;

fn orchestrator(backend_url: &str, app_server_url: &str) -> PaymentOrchestrator {
    let session: SessionRef = Arc::new(StaticSession::new("user-token"));
    let functions = Arc::new(SupabaseClient::new(
        BackendConfig {
            url: backend_url.to_string(),
            anon_key: "anon".to_string(),
        },
        session.clone(),
    ));
    PaymentOrchestrator::new(
        Arc::new(InMemoryOrderStore::new()),
        session,
        Box::new(AppServerTransport::new(app_server_url)),
        FallbackSwitch::new(),
    )
    .with_primary(Box::new(EdgeFunctionTransport::new(functions)))
}

fn card_request() -> PaymentRequest {
    PaymentRequest {
        order: common::draft(dec!(25)),
        details: PaymentDetails::Card(common::card()),
    }
}

#[tokio::test]
async fn test_unreachable_function_falls_back_to_app_server() {
    let app_server = MockServer::start_async().await;
    let charge = app_server
        .mock_async(|when, then| {
            when.method(POST).path("/api/payments/process-card");
            then.status(200).json_body(json!({ "transactionId": "t1" }));
        })
        .await;

    // Nothing listens on port 1, so the function request cannot be sent.
    let orchestrator = orchestrator("http://127.0.0.1:1", &app_server.base_url());

    let outcome = orchestrator.process_payment(card_request()).await.unwrap();
    assert_eq!(outcome.reference.as_deref(), Some("t1"));
    assert!(orchestrator.fallback_switch().is_engaged());

    let order = orchestrator.order(&outcome.order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Completed);
    assert_eq!(order.reference.as_deref(), Some("t1"));
    assert_eq!(orchestrator.in_flight_order().await, None);

    orchestrator.process_payment(card_request()).await.unwrap();
    charge.assert_hits_async(2).await;
}

#[tokio::test]
async fn test_function_rejection_does_not_fall_back() {
    let backend = MockServer::start_async().await;
    let function = backend
        .mock_async(|when, then| {
            when.method(POST)
                .path("/functions/v1/tropipay-payment")
                .header("authorization", "Bearer user-token")
                .json_body_partial(r#"{ "action": "process-card" }"#);
            then.status(400).json_body(json!({ "error": "Card declined" }));
        })
        .await;
    let app_server = MockServer::start_async().await;
    let charge = app_server
        .mock_async(|when, then| {
            when.method(POST).path("/api/payments/process-card");
            then.status(200).json_body(json!({ "transactionId": "t1" }));
        })
        .await;

    let orchestrator = orchestrator(&backend.base_url(), &app_server.base_url());

    let err = orchestrator.process_payment(card_request()).await.unwrap_err();
    assert!(matches!(err, PaymentError::Rejected(ref m) if m == "Card declined"));
    assert!(!orchestrator.fallback_switch().is_engaged());
    function.assert_async().await;
    charge.assert_hits_async(0).await;

    let order_id = orchestrator.in_flight_order().await.unwrap();
    let order = orchestrator.order(&order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Failed);
    assert_eq!(order.error_message.as_deref(), Some("Card declined"));
}

#[tokio::test]
async fn test_function_error_status_without_body_falls_back() {
    let backend = MockServer::start_async().await;
    let function = backend
        .mock_async(|when, then| {
            when.method(POST).path("/functions/v1/tropipay-payment");
            then.status(502);
        })
        .await;
    let app_server = MockServer::start_async().await;
    let links = app_server
        .mock_async(|when, then| {
            when.method(POST).path("/api/payments/create-payment-link");
            then.status(200)
                .json_body(json!({ "id": "pc-1", "shortUrl": "https://tppay.me/pay" }));
        })
        .await;

    let orchestrator = orchestrator(&backend.base_url(), &app_server.base_url());
    let link_request = || {
        PaymentRequest::parse(
            "tropipay",
            common::draft(dec!(49.5)),
            json!({ "origin": "https://shop", "description": "Semanal - 1 comidas" }),
        )
        .unwrap()
    };

    let outcome = orchestrator.process_payment(link_request()).await.unwrap();
    assert_eq!(outcome.redirect_url.as_deref(), Some("https://tppay.me/pay"));
    assert!(orchestrator.fallback_switch().is_engaged());

    orchestrator.process_payment(link_request()).await.unwrap();
    function.assert_hits_async(1).await;
    links.assert_hits_async(2).await;
}

#[cfg(not(feature = "storage-rocksdb"))]
#[test]
fn test_rocksdb_fallback_warning() {
    let app_server = MockServer::start();
    app_server.mock(|when, then| {
        when.method(POST).path("/api/payments/process-card");
        then.status(200).json_body(json!({ "transactionId": "t1" }));
    });

    let mut cmd = std::process::Command::new(cargo_bin!("mealpay"));
    cmd.env_remove("SUPABASE_URL")
        .env_remove("SUPABASE_ANON_KEY")
        .env("APP_SERVER_URL", app_server.base_url())
        .arg("checkout")
        .arg("tests/fixtures/summary.json")
        .args(["--method", "card"])
        .args(["--card-number", "4111111111111111"])
        .args(["--expiry-date", "12/30"])
        .args(["--cvv", "123"])
        .args(["--db-path", "some_db"]);

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."));
}
