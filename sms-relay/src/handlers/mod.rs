//! HTTP handlers for sms-relay.
//!
//! The relay itself is driven by the message bus; these routes only serve
//! liveness probes and metrics.

pub mod health;

pub use health::{health_check, index, index_head, metrics};
