//! Protocol utilities for the WebSocket bridge
//!
//! Handles origin validation and the envelope <-> frame codec.

use hueport_protocol::Envelope;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

/// Allowed origins for WebSocket connections
/// Only localhost is allowed by default for security
pub const ALLOWED_ORIGINS: &[&str] = &[
    "http://localhost",
    "http://127.0.0.1",
    "https://localhost",
    "https://127.0.0.1",
];

/// Validate origin header against whitelist using strict URL parsing
///
/// This function parses both the origin and allowed origins as URLs,
/// then compares scheme and host exactly. This prevents bypass attacks
/// like `http://localhost.evil.com` which would pass a naive `starts_with` check.
pub fn validate_origin(origin: &str) -> bool {
    let Ok(origin_url) = Url::parse(origin) else {
        return false;
    };

    let origin_host = origin_url.host_str().unwrap_or("");
    let origin_scheme = origin_url.scheme();

    ALLOWED_ORIGINS.iter().any(|allowed| {
        let Ok(allowed_url) = Url::parse(allowed) else {
            return false;
        };

        let allowed_host = allowed_url.host_str().unwrap_or("");
        let allowed_scheme = allowed_url.scheme();

        // Strict comparison: scheme and host must match exactly
        origin_scheme == allowed_scheme && origin_host == allowed_host
    })
}

/// Encode an envelope as a JSON text frame
pub fn encode_frame(env: &Envelope) -> Result<Message, serde_json::Error> {
    Ok(Message::Text(serde_json::to_string(env)?))
}

/// Decode one frame into an envelope
///
/// Non-text frames carry no envelope and decode to `None`. A text frame with
/// malformed JSON is `Some(Err(..))` so the caller can log what it dropped.
pub fn decode_frame(msg: &Message) -> Option<Result<Envelope, serde_json::Error>> {
    match msg {
        Message::Text(text) => Some(serde_json::from_str(text)),
        _ => None,
    }
}
