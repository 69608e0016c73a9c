use super::{ProviderError, PushProvider};
use crate::config::BarkConfig;
use crate::models::{Decorations, NotificationRequest};
use crate::services::metrics::record_provider_call;
use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use secrecy::ExposeSecret;
use std::time::Duration;

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Sends notifications to a Bark server as form-encoded POSTs.
#[derive(Clone)]
pub struct BarkProvider {
    config: BarkConfig,
    client: Client,
}

impl BarkProvider {
    pub fn new(config: BarkConfig) -> Result<Self, ProviderError> {
        Self::with_timeout(config, REQUEST_TIMEOUT)
    }

    /// Provider whose requests give up after `timeout`.
    pub fn with_timeout(config: BarkConfig, timeout: Duration) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Transport(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/{}",
            self.config.api_base.trim_end_matches('/'),
            self.config.key.expose_secret()
        )
    }

    async fn deliver(&self, request: &NotificationRequest) -> Result<(), ProviderError> {
        if !self.config.is_configured() {
            tracing::error!("Bark API base or key is not configured");
            return Err(ProviderError::NotConfigured(
                "BARK_API and BARK_KEY must both be set".to_string(),
            ));
        }

        let form = request
            .to_form()
            .map_err(|e| ProviderError::Encoding(e.to_string()))?;

        tracing::info!(
            api_base = %self.config.api_base,
            title = %request.title,
            group = %request.group,
            "Sending Bark notification"
        );

        let response = self
            .client
            .post(self.endpoint())
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(form)
            .send()
            .await
            .map_err(|e| {
                // Strip the URL; it carries the device key.
                ProviderError::Transport(e.without_url().to_string())
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, response = %body, "Bark returned non-OK status");
            return Err(ProviderError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}

#[async_trait]
impl PushProvider for BarkProvider {
    async fn send(&self, body: &str, decorations: &Decorations) -> Result<(), ProviderError> {
        let request = NotificationRequest::new(body, decorations);
        let result = self.deliver(&request).await;

        match &result {
            Ok(()) => {
                record_provider_call(self.name(), "success");
                tracing::info!(title = %request.title, "Bark notification sent");
            }
            Err(e) => record_provider_call(self.name(), e.kind()),
        }

        result
    }

    fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    fn name(&self) -> &'static str {
        "bark"
    }
}
