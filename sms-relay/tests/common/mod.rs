#![allow(dead_code)]

use sms_relay::config::BarkConfig;
use sms_relay::services::BarkProvider;
use std::collections::HashMap;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

pub const TEST_KEY: &str = "test-device-key";

pub const SAMPLE_SMS: &str = r#"{"sender":"+15551234567","content":"Hi","operator":"CarrierX","timestamp":"2024-01-01T12:00:00Z"}"#;

/// A mock Bark server plus a provider pointed at it.
pub struct TestBark {
    pub server: MockServer,
    pub provider: BarkProvider,
}

impl TestBark {
    /// Start a server that answers every push with `status`, expecting `calls` requests.
    pub async fn spawn(status: u16, calls: u64) -> Self {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(format!("/{}", TEST_KEY)))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .respond_with(ResponseTemplate::new(status).set_body_string("bark says hi"))
            .expect(calls)
            .mount(&server)
            .await;

        let provider = BarkProvider::new(BarkConfig::new(server.uri(), TEST_KEY)).unwrap();

        TestBark { server, provider }
    }

    pub async fn requests(&self) -> Vec<Request> {
        self.server.received_requests().await.unwrap_or_default()
    }

    /// Decoded form bodies of every request received so far.
    pub async fn forms(&self) -> Vec<HashMap<String, String>> {
        self.requests()
            .await
            .iter()
            .map(|request| form_fields(&request.body))
            .collect()
    }
}

pub fn form_fields(body: &[u8]) -> HashMap<String, String> {
    serde_urlencoded::from_bytes(body).expect("body is not form-encoded")
}
