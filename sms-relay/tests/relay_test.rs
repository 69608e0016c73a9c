mod common;

use common::{TestBark, SAMPLE_SMS};
use sms_relay::models::TOPIC_ESP_SMS;
use sms_relay::services::{MessageHandler, RelayOutcome, SmsRelay};
use std::sync::Arc;

#[tokio::test]
async fn sms_is_relayed_as_bark_notification() {
    let bark = TestBark::spawn(200, 1).await;
    let relay = SmsRelay::new(Arc::new(bark.provider.clone()));

    let outcome = relay.relay(TOPIC_ESP_SMS, SAMPLE_SMS.as_bytes()).await;

    assert_eq!(outcome, RelayOutcome::Sent);
    let forms = bark.forms().await;
    let form = &forms[0];
    assert_eq!(form["title"], "✉️ New SMS from +15551234567");
    assert_eq!(form["group"], "SMS");
    assert_eq!(form["level"], "active");
    assert_eq!(form["copy"], "Hi");
    assert_eq!(
        form["body"],
        "Hi\n\nFrom: +15551234567\nSent at: 2024-01-01 12:00:00\n\nOperator: CarrierX\n"
    );
}

#[tokio::test]
async fn malformed_payload_makes_no_request() {
    let bark = TestBark::spawn(200, 0).await;
    let relay = SmsRelay::new(Arc::new(bark.provider.clone()));

    relay.handle(TOPIC_ESP_SMS, br#"{"sender":"x"}"#).await;

    assert!(bark.requests().await.is_empty());
}

#[tokio::test]
async fn failed_delivery_is_attempted_once() {
    let bark = TestBark::spawn(500, 1).await;
    let relay = SmsRelay::new(Arc::new(bark.provider.clone()));

    let outcome = relay.relay(TOPIC_ESP_SMS, SAMPLE_SMS.as_bytes()).await;

    assert_eq!(outcome, RelayOutcome::SendFailed);
    assert_eq!(bark.requests().await.len(), 1);
}

#[tokio::test]
async fn duplicate_delivery_produces_duplicate_notifications() {
    let bark = TestBark::spawn(200, 2).await;
    let relay = SmsRelay::new(Arc::new(bark.provider.clone()));

    relay.handle(TOPIC_ESP_SMS, SAMPLE_SMS.as_bytes()).await;
    relay.handle(TOPIC_ESP_SMS, SAMPLE_SMS.as_bytes()).await;

    let forms = bark.forms().await;
    assert_eq!(forms.len(), 2);
    assert_eq!(forms[0], forms[1]);
}
