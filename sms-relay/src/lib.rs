//! sms-relay: forwards SMS events from an MQTT gateway to Bark push notifications.
pub mod config;
pub mod handlers;
pub mod models;
pub mod services;
pub mod startup;
