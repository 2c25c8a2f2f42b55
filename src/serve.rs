use axum::{
    extract::State,
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use bytes::Bytes;
use log::{error, info, warn};
use serde_json::{json, Value};
use std::sync::Arc as StdArc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use url::Url;

use crate::constants::ATTENDANCE_PATH;
use crate::error::HttpFailure;
use crate::record::{missing_fields, truncate_image};
use crate::remote::RemoteStorageClient;

// State for gateway handlers
pub struct AppState {
    pub remote: RemoteStorageClient,
}

/// Run the submission gateway until the process exits
pub fn serve_gateway(
    remote_api_url: Url,
    port: u16,
    timeout: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    let remote = RemoteStorageClient::new(remote_api_url, timeout)?;

    println!("Starting attendance gateway");
    println!("Remote storage API: {}", remote.url());
    println!("Relay timeout: {}s", timeout.as_secs());
    println!("Listening on: http://[::]:{} (IPv4 + IPv6)", port);
    println!("Endpoints:");
    println!("  GET /health  - Health check");
    println!("  GET {}  - List stored attendance records", ATTENDANCE_PATH);
    println!("  POST {}  - Submit an attendance record", ATTENDANCE_PATH);
    println!("  OPTIONS {}  - CORS preflight", ATTENDANCE_PATH);

    // Create tokio runtime and run server
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let app = build_router(StdArc::new(AppState { remote }));

        let listener = tokio::net::TcpListener::bind(format!("[::]:{}", port))
            .await
            .map_err(|e| format!("Failed to bind to port {}: {}", port, e))?;
        axum::serve(listener, app)
            .await
            .map_err(|e| format!("Server error: {}", e))?;

        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

pub fn build_router(state: StdArc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health_handler))
        .route(
            ATTENDANCE_PATH,
            get(list_handler)
                .post(submit_handler)
                .options(preflight_handler),
        )
        .layer(cors)
        .with_state(state)
}

// Health check endpoint - returns 200 OK if server is running
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn preflight_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        [
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*")),
            (
                header::ACCESS_CONTROL_ALLOW_METHODS,
                HeaderValue::from_static("GET, POST, OPTIONS"),
            ),
            (
                header::ACCESS_CONTROL_ALLOW_HEADERS,
                HeaderValue::from_static("Content-Type"),
            ),
        ],
    )
}

async fn list_handler(State(state): State<StdArc<AppState>>) -> Response {
    info!("Fetching attendance data from {}", state.remote.url());
    match state.remote.list().await {
        Ok(data) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": data,
            })),
        )
            .into_response(),
        Err(failure) => failure_response(failure),
    }
}

async fn submit_handler(State(state): State<StdArc<AppState>>, body: Bytes) -> Response {
    let parsed: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(e) => {
            error!("Failed to parse request body: {}", e);
            return failure_response(HttpFailure::Local(format!("Invalid JSON body: {}", e)));
        }
    };
    info!("Received attendance data: {}", loggable(&parsed));

    let missing = missing_fields(&parsed);
    if !missing.is_empty() {
        warn!("Missing fields: {:?}", missing);
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "Missing required fields",
                "missing": missing,
            })),
        )
            .into_response();
    }

    // Relay the bytes as received so the remote sees the exact payload
    match state.remote.store(body).await {
        Ok(data) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": "Attendance submitted successfully",
                "data": data,
            })),
        )
            .into_response(),
        Err(failure) => failure_response(failure),
    }
}

/// Body with the image cut short for logging
fn loggable(body: &Value) -> Value {
    let mut body = body.clone();
    if let Some(fields) = body.as_object_mut() {
        let image = fields
            .get("image_url")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let truncated = truncate_image(image);
        fields.insert("image_url".to_string(), Value::String(truncated));
    }
    body
}

/// Map a relay failure to the gateway's error envelope
pub fn failure_response(failure: HttpFailure) -> Response {
    match failure {
        HttpFailure::Remote { status, body } => {
            error!("Remote API error status {}: {}", status, body);
            let message = body
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| format!("Remote API returned status {}", status));
            let code = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
            (
                code,
                Json(json!({
                    "error": "Remote API Error",
                    "message": message,
                    "details": body,
                })),
            )
                .into_response()
        }
        HttpFailure::Network => {
            error!("Network error - no response received from remote API");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "error": "Network Error",
                    "message": "Unable to reach remote API. Please check your internet connection.",
                })),
            )
                .into_response()
        }
        HttpFailure::Local(message) => {
            error!("Request setup error: {}", message);
            let message = if message.is_empty() {
                "An unexpected error occurred".to_string()
            } else {
                message
            };
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Internal Server Error",
                    "message": message,
                })),
            )
                .into_response()
        }
    }
}
