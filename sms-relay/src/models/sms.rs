use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Channel carrying SMS events forwarded by the ESP32 gateway.
pub const TOPIC_ESP_SMS: &str = "esp32/sms";

/// Channel for gateway device status. Reserved; not subscribed.
pub const TOPIC_ESP_DEVICE: &str = "esp32/device";

/// An SMS received by the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmsMessage {
    /// Phone number of the sender.
    pub sender: String,
    pub content: String,
    /// Carrier that delivered the message.
    pub operator: String,
    /// RFC 3339 instant; the sender's UTC offset is kept for display.
    pub timestamp: DateTime<FixedOffset>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceMessage {
    pub message: String,
}
