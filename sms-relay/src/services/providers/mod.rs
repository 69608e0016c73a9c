pub mod bark;
pub mod mock;

use crate::models::Decorations;
use async_trait::async_trait;
use thiserror::Error;

pub use bark::BarkProvider;
pub use mock::MockPushProvider;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Failed to encode request: {0}")]
    Encoding(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unexpected status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },
}

impl ProviderError {
    /// Label used for the provider call metric.
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::NotConfigured(_) => "not_configured",
            ProviderError::Encoding(_) => "encoding",
            ProviderError::Transport(_) => "transport",
            ProviderError::UnexpectedStatus { .. } => "status",
        }
    }
}

/// A push notification sink. Each `send` makes at most one delivery attempt.
#[async_trait]
pub trait PushProvider: Send + Sync {
    async fn send(&self, body: &str, decorations: &Decorations) -> Result<(), ProviderError>;
    fn is_configured(&self) -> bool;
    fn name(&self) -> &'static str;
}
