use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use bytes::Bytes;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use url::Url;

use attendance_checkin::remote::RemoteStorageClient;
use attendance_checkin::serve::{build_router, AppState};

/// Shared state for the mock remote storage API
#[derive(Default)]
struct MockRemoteState {
    /// Raw bodies received on POST
    received: Mutex<Vec<Bytes>>,
    items: Mutex<Vec<Value>>,
    /// When set, every request fails with this status and body
    failure: Mutex<Option<(u16, String)>>,
}

async fn remote_list_handler(State(state): State<Arc<MockRemoteState>>) -> impl IntoResponse {
    if let Some((status, body)) = state.failure.lock().unwrap().clone() {
        return (StatusCode::from_u16(status).unwrap(), body).into_response();
    }
    let items = state.items.lock().unwrap().clone();
    Json(json!({"data": {"Items": items, "Count": items.len()}})).into_response()
}

async fn remote_store_handler(
    State(state): State<Arc<MockRemoteState>>,
    body: Bytes,
) -> impl IntoResponse {
    state.received.lock().unwrap().push(body.clone());
    if let Some((status, body)) = state.failure.lock().unwrap().clone() {
        return (StatusCode::from_u16(status).unwrap(), body).into_response();
    }
    let record: Value = serde_json::from_slice(&body).unwrap();
    state.items.lock().unwrap().push(record);
    (StatusCode::CREATED, Json(json!({"message": "Record stored"}))).into_response()
}

async fn start_mock_remote() -> (String, Arc<MockRemoteState>) {
    let state = Arc::new(MockRemoteState::default());
    let app = Router::new()
        .route("/dev/", get(remote_list_handler).post(remote_store_handler))
        .with_state(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/dev/", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (url, state)
}

async fn start_gateway(remote_url: &str) -> String {
    let remote =
        RemoteStorageClient::new(Url::parse(remote_url).unwrap(), Duration::from_secs(5)).unwrap();
    let app = build_router(Arc::new(AppState { remote }));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give server time to start
    tokio::time::sleep(Duration::from_millis(100)).await;
    url
}

/// URL of a port nothing listens on
async fn unreachable_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/dev/", addr)
}

fn valid_body() -> String {
    // Key order and spacing chosen so a re-serialized body would differ
    r#"{"timestamp": "2026-10-17T09:00:00.000Z", "id": "USR1234",
        "image_url": "data:image/jpeg;base64,/9j/4AAQSkZJRg==", "department": "engineering",
        "location": "37.7749, -122.4194", "location_address": "San Francisco, United States",
        "ip_address": "203.0.113.7"}"#
        .to_string()
}

async fn post_raw(gateway: &str, body: String) -> (StatusCode, Value) {
    let response = reqwest::Client::new()
        .post(format!("{}/api/attendance", gateway))
        .header("Content-Type", "application/json")
        .body(body)
        .send()
        .await
        .unwrap();
    let status = StatusCode::from_u16(response.status().as_u16()).unwrap();
    (status, response.json().await.unwrap())
}

#[tokio::test]
async fn test_valid_submission_is_relayed_unchanged() {
    let (remote_url, remote) = start_mock_remote().await;
    let gateway = start_gateway(&remote_url).await;

    let (status, body) = post_raw(&gateway, valid_body()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Attendance submitted successfully");
    assert_eq!(body["data"]["message"], "Record stored");

    let received = remote.received.lock().unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0], Bytes::from(valid_body()));
}

#[tokio::test]
async fn test_missing_fields_rejected_without_relay() {
    let (remote_url, remote) = start_mock_remote().await;
    let gateway = start_gateway(&remote_url).await;

    let mut record: Value = serde_json::from_str(&valid_body()).unwrap();
    record["department"] = json!("");
    record["ip_address"] = json!(null);
    record.as_object_mut().unwrap().remove("image_url");

    let (status, body) = post_raw(&gateway, record.to_string()).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing required fields");
    assert_eq!(
        body["missing"],
        json!(["image_url", "department", "ip_address"])
    );
    assert!(remote.received.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_empty_object_lists_every_field() {
    let (remote_url, remote) = start_mock_remote().await;
    let gateway = start_gateway(&remote_url).await;

    let (status, body) = post_raw(&gateway, "{}".to_string()).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["missing"],
        json!([
            "id",
            "image_url",
            "department",
            "location",
            "location_address",
            "timestamp",
            "ip_address"
        ])
    );
    assert!(remote.received.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_json_is_internal_error() {
    let (remote_url, remote) = start_mock_remote().await;
    let gateway = start_gateway(&remote_url).await;

    let (status, body) = post_raw(&gateway, "{not json".to_string()).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Internal Server Error");
    assert!(body["message"].as_str().unwrap().starts_with("Invalid JSON body"));
    assert!(remote.received.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_list_is_idempotent() {
    let (remote_url, _remote) = start_mock_remote().await;
    let gateway = start_gateway(&remote_url).await;
    post_raw(&gateway, valid_body()).await;

    let client = reqwest::Client::new();
    let url = format!("{}/api/attendance", gateway);
    let first: Value = client.get(&url).send().await.unwrap().json().await.unwrap();
    let second: Value = client.get(&url).send().await.unwrap().json().await.unwrap();

    assert_eq!(first["success"], true);
    assert_eq!(first["data"]["data"]["Items"][0]["id"], "USR1234");
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_remote_error_status_is_mirrored() {
    let (remote_url, remote) = start_mock_remote().await;
    let gateway = start_gateway(&remote_url).await;
    *remote.failure.lock().unwrap() = Some((
        500,
        r#"{"message": "Table is throttled"}"#.to_string(),
    ));

    let (status, body) = post_raw(&gateway, valid_body()).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Remote API Error");
    assert_eq!(body["message"], "Table is throttled");
    assert_eq!(body["details"]["message"], "Table is throttled");

    *remote.failure.lock().unwrap() = Some((418, "short and stout".to_string()));
    let response = reqwest::get(format!("{}/api/attendance", gateway))
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 418);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Remote API returned status 418");
    assert_eq!(body["details"], "short and stout");
}

#[tokio::test]
async fn test_unreachable_remote_is_503() {
    let gateway = start_gateway(&unreachable_url().await).await;

    let (status, body) = post_raw(&gateway, valid_body()).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "Network Error");

    let response = reqwest::get(format!("{}/api/attendance", gateway))
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 503);
}

#[tokio::test]
async fn test_preflight_allows_cross_origin() {
    let (remote_url, remote) = start_mock_remote().await;
    let gateway = start_gateway(&remote_url).await;

    let response = reqwest::Client::new()
        .request(
            reqwest::Method::OPTIONS,
            format!("{}/api/attendance", gateway),
        )
        .header("Origin", "http://example.com")
        .header("Access-Control-Request-Method", "POST")
        .header("Access-Control-Request-Headers", "content-type")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 200);
    let header = |name: &str| {
        response
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase()
            .replace(' ', "")
    };
    assert_eq!(header("access-control-allow-origin"), "*");
    let methods = header("access-control-allow-methods");
    for method in ["get", "post", "options"] {
        assert!(methods.split(',').any(|m| m == method), "{}", methods);
    }
    assert!(header("access-control-allow-headers").contains("content-type"));
    assert!(remote.received.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_health() {
    let (remote_url, _remote) = start_mock_remote().await;
    let gateway = start_gateway(&remote_url).await;

    let response = reqwest::get(format!("{}/health", gateway)).await.unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(response.text().await.unwrap(), "OK");
}
