//! Integration tests for the SMM panel client.
//!
//! Each test spins up a local axum server standing in for the panel on a
//! random port and exercises the real HTTP contract.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use secrecy::SecretString;
use serde_json::json;
use tokio::net::TcpListener;

use smm_order_bot::commerce::{CommerceApi, OrderRequest, SmmPanelClient};
use smm_order_bot::commerce_config::{CommerceConfig, RecoveryConfig};
use smm_order_bot::commerce_errors::CommerceError;

#[derive(Default)]
struct MockPanel {
    requests: Mutex<Vec<HashMap<String, String>>>,
    /// Number of upcoming requests answered with 500
    failures_left: AtomicU32,
}

impl MockPanel {
    fn fail_next(&self, count: u32) {
        self.failures_left.store(count, Ordering::SeqCst);
    }

    fn requests(&self) -> Vec<HashMap<String, String>> {
        self.requests.lock().unwrap().clone()
    }
}

async fn panel_handler(
    State(panel): State<Arc<MockPanel>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    panel.requests.lock().unwrap().push(params.clone());

    let failing = panel
        .failures_left
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok();
    if failing {
        return (StatusCode::INTERNAL_SERVER_ERROR, "panel down").into_response();
    }

    match params.get("action").map(String::as_str) {
        Some("services") => Json(json!([
            {"service": 101, "name": "IG Followers HQ", "category": "Instagram Followers", "rate": "0.90", "min": "50", "max": "10000"},
            {"service": "111", "name": "IG Likes", "category": "Instagram Likes", "rate": 0.5}
        ]))
        .into_response(),
        Some("balance") => Json(json!({"balance": "12.34", "currency": "USD"})).into_response(),
        Some("add") => match params.get("link").map(String::as_str) {
            Some("https://bad") => Json(json!({"error": "Incorrect link"})).into_response(),
            Some("https://silent") => Json(json!({})).into_response(),
            Some("https://coded") => Json(json!({"error": {"code": 5}})).into_response(),
            _ => Json(json!({"order": 23501})).into_response(),
        },
        _ => (StatusCode::BAD_REQUEST, "unknown action").into_response(),
    }
}

/// Start a mock panel on a random port, return (client, panel).
async fn start_panel(recovery: RecoveryConfig) -> (SmmPanelClient, Arc<MockPanel>) {
    let panel = Arc::new(MockPanel::default());
    let app = Router::new()
        .route("/api/v2", get(panel_handler))
        .with_state(Arc::clone(&panel));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let config = CommerceConfig {
        api_url: format!("http://127.0.0.1:{port}/api/v2"),
        request_timeout: Duration::from_secs(5),
        recovery,
    };
    let client = SmmPanelClient::new(config, SecretString::from("test-key".to_string())).unwrap();
    (client, panel)
}

fn fast_recovery() -> RecoveryConfig {
    RecoveryConfig {
        max_retries: 2,
        base_retry_delay_ms: 1,
        max_retry_delay_ms: 5,
        circuit_breaker_threshold: 10,
        circuit_breaker_reset_secs: 60,
    }
}

fn order(link: &str) -> OrderRequest {
    OrderRequest {
        service_id: 101,
        link: link.to_string(),
        quantity: 250,
    }
}

#[tokio::test]
async fn test_list_services_sends_key_and_action() {
    let (client, panel) = start_panel(fast_recovery()).await;

    let services = client.list_services().await.unwrap();
    assert_eq!(services.len(), 2);
    assert_eq!(services[0].id, 101);
    assert_eq!(services[0].rate_per_thousand, 0.9);
    assert_eq!(services[1].id, 111);

    let requests = panel.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0]["key"], "test-key");
    assert_eq!(requests[0]["action"], "services");
}

#[tokio::test]
async fn test_get_balance() {
    let (client, _) = start_panel(fast_recovery()).await;

    let balance = client.get_balance().await.unwrap();
    assert_eq!(balance.amount, "12.34");
    assert_eq!(balance.currency.as_deref(), Some("USD"));
}

#[tokio::test]
async fn test_reads_retry_server_errors() {
    let (client, panel) = start_panel(fast_recovery()).await;
    panel.fail_next(2);

    let services = client.list_services().await.unwrap();
    assert_eq!(services.len(), 2);
    assert_eq!(panel.requests().len(), 3);
}

#[tokio::test]
async fn test_reads_give_up_after_max_retries() {
    let (client, panel) = start_panel(fast_recovery()).await;
    panel.fail_next(10);

    let err = client.get_balance().await.unwrap_err();
    assert_eq!(err, CommerceError::Status(500));
    assert_eq!(panel.requests().len(), 3);
}

#[tokio::test]
async fn test_place_order_sends_service_link_and_quantity() {
    let (client, panel) = start_panel(fast_recovery()).await;

    let order_id = client.place_order(&order("https://instagram.com/me")).await.unwrap();
    assert_eq!(order_id.to_string(), "23501");

    let requests = panel.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0]["action"], "add");
    assert_eq!(requests[0]["service"], "101");
    assert_eq!(requests[0]["link"], "https://instagram.com/me");
    assert_eq!(requests[0]["quantity"], "250");
}

#[tokio::test]
async fn test_place_order_is_never_retried() {
    let (client, panel) = start_panel(fast_recovery()).await;
    panel.fail_next(1);

    let err = client.place_order(&order("https://instagram.com/me")).await.unwrap_err();
    assert_eq!(err, CommerceError::Status(500));
    assert_eq!(panel.requests().len(), 1);
}

#[tokio::test]
async fn test_place_order_rejections() {
    let (client, _) = start_panel(fast_recovery()).await;

    let err = client.place_order(&order("https://bad")).await.unwrap_err();
    assert_eq!(err, CommerceError::Rejected("Incorrect link".to_string()));

    let err = client.place_order(&order("https://silent")).await.unwrap_err();
    assert!(matches!(err, CommerceError::Rejected(_)));

    // Structured error bodies are rejections too, never a decode failure
    let err = client.place_order(&order("https://coded")).await.unwrap_err();
    assert!(matches!(err, CommerceError::Rejected(msg) if msg.contains("code")));
}

#[tokio::test]
async fn test_circuit_opens_after_repeated_failures() {
    let recovery = RecoveryConfig {
        max_retries: 0,
        circuit_breaker_threshold: 3,
        ..fast_recovery()
    };
    let (client, panel) = start_panel(recovery).await;
    panel.fail_next(100);

    for _ in 0..3 {
        assert_eq!(client.get_balance().await.unwrap_err(), CommerceError::Status(500));
    }
    assert_eq!(client.get_balance().await.unwrap_err(), CommerceError::CircuitOpen);
    assert_eq!(panel.requests().len(), 3);
}
