//! Integration tests for the coordinator service.

use std::sync::OnceLock;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use metrics_exporter_prometheus::PrometheusHandle;
use participants::{CoordinatorConfig, EntryState, ParticipantError, TransactionState};
use serde_json::{Value, json};
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

fn setup() -> (axum::Router, api::InMemoryResources) {
    let (state, resources) = api::create_in_memory_state(CoordinatorConfig::default());
    let app = api::create_app(state, get_metrics_handle());
    (app, resources)
}

fn order_body() -> Value {
    json!({
        "userId": 7,
        "productId": 42,
        "quantity": 2,
        "amount": 49.99
    })
}

async fn post(app: axum::Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_health_check() {
    let (app, _) = setup();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_two_phase_order_success() {
    let (app, resources) = setup();

    let (status, json) = post(app, "/transaction/2pc/order", order_body()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["statusCode"], 200);
    assert!(json.get("failedAt").is_none());
    assert!(json["attemptId"].is_string());
    assert!(json["elapsedMilliseconds"].is_u64());
    assert_eq!(json["perResourceStatus"]["payment"]["status"], "Committed");
    for participant in &resources.two_phase {
        assert_eq!(participant.count(TransactionState::Committed), 1);
    }
}

#[tokio::test]
async fn test_two_phase_order_failure_maps_to_500() {
    let (app, resources) = setup();
    resources.two_phase[1].fail_prepare(ParticipantError::rejected(400, "Insufficient stock."));

    let (status, json) = post(app, "/transaction/2pc/order", order_body()).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["statusCode"], 500);
    assert_eq!(json["failedAt"], "InventoryPrepare");
    assert_eq!(json["error"], "HTTP 400: Insufficient stock.");
    assert_eq!(json["perResourceStatus"]["order"]["status"], "Aborted");
    assert_eq!(resources.two_phase[0].count(TransactionState::Aborted), 1);
}

#[tokio::test]
async fn test_saga_order_success() {
    let (app, resources) = setup();

    let (status, json) = post(app, "/transaction/saga/order", order_body()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["statusCode"], 200);
    assert_eq!(json["state"], "Completed");
    assert_eq!(json["steps"].as_array().unwrap().len(), 3);
    assert_eq!(json["steps"][0]["producedId"], "ORD-0001");
    assert!(json["compensations"].as_array().unwrap().is_empty());
    for participant in &resources.saga {
        assert_eq!(participant.active_count(), 1);
    }
}

#[tokio::test]
async fn test_saga_order_failure_reports_compensations() {
    let (app, resources) = setup();
    resources.saga[2].fail_execute(ParticipantError::rejected(402, "Payment declined"));

    let (status, json) = post(app, "/transaction/saga/order", order_body()).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["failedAt"], "PaymentProcessing");
    assert_eq!(json["state"], "Failed");
    let compensated: Vec<_> = json["compensations"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["stepName"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(compensated, vec!["InventoryReservation", "OrderCreate"]);
    assert_eq!(
        resources.saga[0].entry_state("ORD-0001"),
        Some(EntryState::Compensated)
    );
}

#[tokio::test]
async fn test_payment_is_bound_to_order_over_http_surface() {
    let (app, resources) = setup();

    post(app, "/transaction/saga/order", order_body()).await;

    let payload = resources.saga[2].payload_of("PAY-0001").unwrap();
    assert_eq!(
        serde_json::to_value(&payload).unwrap(),
        json!({ "orderId": "ORD-0001", "amount": 49.99 })
    );
}

#[tokio::test]
async fn test_invalid_quantity_is_rejected() {
    let (app, resources) = setup();
    let mut body = order_body();
    body["quantity"] = json!(0);

    let (status, json) = post(app, "/transaction/2pc/order", body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "quantity must be positive");
    assert!(resources.two_phase[0].log().is_empty());
}

#[tokio::test]
async fn test_invalid_amount_is_rejected() {
    let (app, resources) = setup();
    let mut body = order_body();
    body["amount"] = json!(-5.0);

    let (status, json) = post(app, "/transaction/saga/order", body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "amount must be positive");
    assert!(resources.saga[0].log().is_empty());
}

#[tokio::test]
async fn test_malformed_body_is_rejected() {
    let (app, _) = setup();

    let (status, json) = post(app, "/transaction/2pc/order", json!({ "userId": 1 })).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, _) = setup();

    // Record at least one attempt so the counters exist.
    post(app.clone(), "/transaction/2pc/order", order_body()).await;

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
    assert!(text.contains("two_phase_attempts_total"));
}
