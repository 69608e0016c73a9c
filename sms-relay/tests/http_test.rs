use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use http_body_util::BodyExt;
use sms_relay::startup::{router, AppState};
use tower::ServiceExt;

async fn call(method: Method, uri: &str) -> axum::response::Response {
    router(AppState::default())
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .expect("Failed to build request"),
        )
        .await
        .expect("Failed to execute request")
}

#[tokio::test]
async fn index_says_hello() {
    let response = call(Method::GET, "/").await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"Hello, World!");
}

#[tokio::test]
async fn index_head_is_empty_html() {
    let response = call(Method::HEAD, "/").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/html; charset=utf-8"
    );
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert!(body.is_empty());
}

#[tokio::test]
async fn health_reports_bus_state() {
    let response = call(Method::GET, "/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).expect("Failed to parse response");
    assert_eq!(json["status"], "ok");
    assert_eq!(json["service"], "sms-relay");
    assert_eq!(json["mqtt_connected"], false);
}

#[tokio::test]
async fn metrics_endpoint_responds() {
    let response = call(Method::GET, "/metrics").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/plain"));
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let response = call(Method::GET, "/nope").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
