//! SMS to push-notification relay.

use crate::models::{Decorations, Level, SmsMessage};
use crate::services::decoder::decode;
use crate::services::metrics::record_message;
use crate::services::mqtt::MessageHandler;
use crate::services::providers::PushProvider;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info, info_span, warn, Instrument, Span};

pub const SMS_GROUP: &str = "SMS";

/// What happened to a single inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    Sent,
    DecodeFailed,
    SendFailed,
}

impl RelayOutcome {
    fn as_label(self) -> &'static str {
        match self {
            RelayOutcome::Sent => "sent",
            RelayOutcome::DecodeFailed => "decode_error",
            RelayOutcome::SendFailed => "send_failed",
        }
    }
}

/// Title shown on the device for an incoming SMS.
pub fn sms_title(sms: &SmsMessage) -> String {
    format!("✉️ New SMS from {}", sms.sender)
}

/// Multi-line body: the message text followed by its metadata.
pub fn sms_body(sms: &SmsMessage) -> String {
    format!(
        "{}\n\nFrom: {}\nSent at: {}\n\nOperator: {}\n",
        sms.content,
        sms.sender,
        sms.timestamp.format("%Y-%m-%d %H:%M:%S"),
        sms.operator,
    )
}

pub fn sms_decorations(sms: &SmsMessage) -> Decorations {
    Decorations::new()
        .title(sms_title(sms))
        .group(SMS_GROUP)
        .level(Level::Active)
        .copy(sms.content.clone())
}

/// Forwards each decoded SMS to a push provider.
///
/// Every failure is terminal for its message: it is logged and dropped,
/// never retried and never reported back to the bus.
#[derive(Clone)]
pub struct SmsRelay {
    provider: Arc<dyn PushProvider>,
}

impl SmsRelay {
    pub fn new(provider: Arc<dyn PushProvider>) -> Self {
        Self { provider }
    }

    pub async fn relay(&self, topic: &str, payload: &[u8]) -> RelayOutcome {
        // Each message gets its own trace, detached from the event loop span.
        let span = info_span!(
            parent: Span::none(),
            "sms_message",
            topic = %topic,
            payload_size = payload.len(),
            sender = tracing::field::Empty,
        );

        let outcome = self.process(topic, payload).instrument(span).await;
        record_message(topic, outcome.as_label());
        outcome
    }

    async fn process(&self, topic: &str, payload: &[u8]) -> RelayOutcome {
        info!(topic = %topic, "Received message");

        let sms = match decode(payload) {
            Ok(sms) => sms,
            Err(e) => {
                warn!(error = %e, payload = %e.payload, "Dropping undecodable SMS payload");
                return RelayOutcome::DecodeFailed;
            }
        };

        Span::current().record("sender", sms.sender.as_str());
        info!(
            sender = %sms.sender,
            content = %sms.content,
            operator = %sms.operator,
            timestamp = %sms.timestamp,
            "Processing SMS"
        );

        match self
            .provider
            .send(&sms_body(&sms), &sms_decorations(&sms))
            .await
        {
            Ok(()) => {
                info!(provider = self.provider.name(), "SMS notification sent");
                RelayOutcome::Sent
            }
            Err(e) => {
                error!(
                    provider = self.provider.name(),
                    error = %e,
                    "Failed to send SMS notification"
                );
                RelayOutcome::SendFailed
            }
        }
    }
}

#[async_trait]
impl MessageHandler for SmsRelay {
    async fn handle(&self, topic: &str, payload: &[u8]) {
        self.relay(topic, payload).await;
    }
}
