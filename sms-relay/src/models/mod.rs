pub mod notification;
pub mod sms;

pub use notification::{Decorations, Level, NotificationRequest};
pub use sms::{DeviceMessage, SmsMessage, TOPIC_ESP_DEVICE, TOPIC_ESP_SMS};
