//! Decoding of raw bus payloads into typed events.

use crate::models::SmsMessage;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("invalid SMS payload: {source}")]
pub struct DecodeError {
    #[source]
    pub source: serde_json::Error,
    /// Lossy UTF-8 rendering of the offending payload, for logs.
    pub payload: String,
}

/// Parse an `esp32/sms` payload.
///
/// All four fields are required and `timestamp` must be an RFC 3339 instant.
/// Unknown fields are ignored.
pub fn decode(raw: &[u8]) -> Result<SmsMessage, DecodeError> {
    serde_json::from_slice(raw).map_err(|source| DecodeError {
        source,
        payload: String::from_utf8_lossy(raw).into_owned(),
    })
}
