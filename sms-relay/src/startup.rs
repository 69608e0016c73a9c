//! Application startup and lifecycle management.
//!
//! Wires the Bark provider, the SMS relay and the MQTT connection together
//! and serves the small HTTP surface (index, health, metrics).

use crate::config::RelayConfig;
use crate::handlers;
use crate::models::TOPIC_ESP_SMS;
use crate::services::{
    BarkProvider, LoggingObserver, MqttConnection, PushProvider, SmsRelay,
};
use axum::{middleware::from_fn, routing::get, Router};
use service_core::error::AppError;
use service_core::middleware::{metrics_middleware, request_id_middleware, REQUEST_ID_HEADER};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::{DefaultOnResponse, TraceLayer};

/// Shared application state.
#[derive(Clone, Default)]
pub struct AppState {
    /// `None` when the HTTP surface runs without a bus, as in tests.
    pub bus: Option<Arc<MqttConnection>>,
}

impl AppState {
    pub fn is_bus_connected(&self) -> bool {
        self.bus.as_ref().is_some_and(|bus| bus.is_connected())
    }
}

/// HTTP router with request-id, metrics and access-log layers.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index).head(handlers::index_head))
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics))
        .layer(from_fn(metrics_middleware))
        .layer(from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    let request_id = request
                        .headers()
                        .get(REQUEST_ID_HEADER)
                        .and_then(|value| value.to_str().ok())
                        .unwrap_or("-");

                    tracing::info_span!(
                        "http_request",
                        request_id = %request_id,
                        method = %request.method(),
                        uri = %request.uri(),
                    )
                })
                .on_response(DefaultOnResponse::new().level(tracing::Level::INFO)),
        )
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    http_listener: TcpListener,
    bus: Arc<MqttConnection>,
}

impl Application {
    /// Connect to the broker, subscribe the relay and bind the HTTP listener.
    ///
    /// Failing to build or connect the MQTT client is fatal. A failed
    /// subscription is only logged.
    pub async fn build(config: RelayConfig) -> Result<Self, AppError> {
        let provider = BarkProvider::new(config.bark.clone()).map_err(|e| {
            tracing::error!("Failed to build Bark provider: {}", e);
            AppError::InternalError(anyhow::Error::new(e))
        })?;
        if provider.is_configured() {
            tracing::info!(api_base = %config.bark.api_base, "Bark provider initialized");
        } else {
            tracing::warn!("Bark API or key not configured - notifications will fail until set");
        }
        let relay = Arc::new(SmsRelay::new(Arc::new(provider)));

        let bus = MqttConnection::connect(&config.mqtt, Arc::new(LoggingObserver))
            .await
            .map_err(|e| {
                tracing::error!("Failed to connect to MQTT broker: {}", e);
                AppError::BusError(anyhow::Error::new(e))
            })?;
        let bus = Arc::new(bus);
        tracing::info!("MQTT client connected successfully");

        if let Err(e) = bus.subscribe(TOPIC_ESP_SMS, config.mqtt.qos, relay).await {
            tracing::error!(topic = TOPIC_ESP_SMS, "Error subscribing: {}", e);
        }

        // Port 0 = random port for testing
        let http_addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let http_listener = TcpListener::bind(http_addr).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", http_addr, e);
            AppError::from(e)
        })?;
        let http_port = http_listener.local_addr()?.port();

        tracing::info!("sms-relay: HTTP on port {}", http_port);

        Ok(Self {
            http_listener,
            bus,
        })
    }

    /// Serve HTTP until a shutdown signal, then close the bus connection.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let state = AppState {
            bus: Some(Arc::clone(&self.bus)),
        };

        let result = axum::serve(self.http_listener, router(state))
            .with_graceful_shutdown(shutdown_signal())
            .await;

        if let Err(e) = &result {
            tracing::error!("HTTP server error: {}", e);
        }

        self.bus.close().await;
        result
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
