use crate::services::get_metrics;
use crate::startup::AppState;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::json;

pub async fn index() -> &'static str {
    "Hello, World!"
}

pub async fn index_head() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
    )
}

/// Liveness with bus connectivity. Stays 200 while reconnecting; the
/// connection recovers on its own.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "sms-relay",
        "version": env!("CARGO_PKG_VERSION"),
        "mqtt_connected": state.is_bus_connected(),
    }))
}

pub async fn metrics() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        get_metrics(),
    )
}
