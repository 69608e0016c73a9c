use super::{ProviderError, PushProvider};
use crate::models::{Decorations, NotificationRequest};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Mock push provider for testing
pub struct MockPushProvider {
    fail_with_status: Option<u16>,
    send_count: AtomicU64,
    sent: Mutex<Vec<NotificationRequest>>,
}

impl MockPushProvider {
    pub fn new() -> Self {
        Self {
            fail_with_status: None,
            send_count: AtomicU64::new(0),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// A provider whose every send is rejected with `status`.
    pub fn failing(status: u16) -> Self {
        Self {
            fail_with_status: Some(status),
            ..Self::new()
        }
    }

    pub fn send_count(&self) -> u64 {
        self.send_count.load(Ordering::SeqCst)
    }

    /// Requests seen so far, including rejected ones.
    pub fn sent(&self) -> Vec<NotificationRequest> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }
}

impl Default for MockPushProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PushProvider for MockPushProvider {
    async fn send(&self, body: &str, decorations: &Decorations) -> Result<(), ProviderError> {
        let request = NotificationRequest::new(body, decorations);
        self.send_count.fetch_add(1, Ordering::SeqCst);

        tracing::info!(
            title = %request.title,
            group = %request.group,
            body_length = %request.body.len(),
            "[MOCK] Push notification would be sent"
        );

        if let Ok(mut sent) = self.sent.lock() {
            sent.push(request);
        }

        match self.fail_with_status {
            Some(status) => Err(ProviderError::UnexpectedStatus {
                status,
                body: "mock failure".to_string(),
            }),
            None => Ok(()),
        }
    }

    fn is_configured(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
