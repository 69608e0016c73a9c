//! Metrics collection for sms-relay.
//!
//! Counters go through the `metrics` facade and are rendered by the
//! Prometheus exporter installed in [`init_metrics`]. Before installation the
//! macros are no-ops, which keeps unit tests free of global setup.

use metrics::counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub const MESSAGES_TOTAL: &str = "sms_relay_messages_total";
pub const PROVIDER_CALLS_TOTAL: &str = "sms_relay_provider_calls_total";

/// Install the Prometheus recorder. Calling it twice is a no-op.
pub fn init_metrics() {
    if METRICS_HANDLE.get().is_some() {
        return;
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            metrics::describe_counter!(
                MESSAGES_TOTAL,
                "Inbound bus messages by relay outcome"
            );
            metrics::describe_counter!(
                PROVIDER_CALLS_TOTAL,
                "Push provider calls by provider and status"
            );
            let _ = METRICS_HANDLE.set(handle);
        }
        Err(e) => tracing::warn!(error = %e, "Failed to install Prometheus recorder"),
    }
}

/// Get metrics output in Prometheus text format.
pub fn get_metrics() -> String {
    METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized\n".to_string())
}

/// Record the outcome of one relayed message.
pub fn record_message(topic: &str, outcome: &'static str) {
    counter!(MESSAGES_TOTAL, "topic" => topic.to_string(), "outcome" => outcome).increment(1);
}

/// Record a provider API call.
pub fn record_provider_call(provider: &'static str, status: &'static str) {
    counter!(PROVIDER_CALLS_TOTAL, "provider" => provider, "status" => status).increment(1);
}
