// ── Core error types ──
//
// Errors surfaced by the synchronization engine. Consumers never see
// HTTP status codes or JSON parse failures directly; the
// `From<deconz_api::Error>` impl folds them into engine-level variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Hub errors ───────────────────────────────────────────────────
    /// Hub config or URL unusable; the pairing pass is aborted.
    #[error("Discovery failed: {message}")]
    Discovery { message: String },

    /// A single REST call failed.
    #[error("Hub request failed: {message}")]
    Transport {
        message: String,
        status: Option<u16>,
    },

    /// The hub rejected the API key.
    #[error("Hub rejected the API key: {message}")]
    Unauthorized { message: String },

    /// A hub write failed or timed out. The optimistic value is kept.
    #[error("Write to device {device} failed: {message}")]
    Communication { device: String, message: String },

    /// A malformed or unroutable push event.
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    #[error("Event stream lost: {reason}")]
    ConnectionLost { reason: String },

    // ── Host request errors ──────────────────────────────────────────
    #[error("Device not found: {identifier}")]
    DeviceNotFound { identifier: String },

    #[error("Property {property} not found on device {device}")]
    PropertyNotFound { device: String, property: String },

    #[error("Property {property} on device {device} is read-only")]
    ReadOnly { device: String, property: String },

    #[error("Invalid value for {property}: {message}")]
    InvalidValue { property: String, message: String },

    #[error("Operation not supported: {operation}")]
    Unsupported { operation: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<deconz_api::Error> for CoreError {
    fn from(err: deconz_api::Error) -> Self {
        if err.is_unauthorized() {
            return CoreError::Unauthorized {
                message: err.to_string(),
            };
        }
        match err {
            deconz_api::Error::Transport(ref e) => CoreError::Transport {
                message: e.to_string(),
                status: e.status().map(|s| s.as_u16()),
            },
            deconz_api::Error::InvalidUrl(e) => CoreError::Discovery {
                message: format!("Invalid URL: {e}"),
            },
            deconz_api::Error::Timeout { timeout } => CoreError::Transport {
                message: format!("Request timed out after {timeout:?}"),
                status: None,
            },
            deconz_api::Error::Hub {
                status,
                description,
                ..
            } => CoreError::Transport {
                message: description,
                status: Some(status),
            },
            deconz_api::Error::WebSocketConnect(reason) => CoreError::ConnectionLost { reason },
            deconz_api::Error::Deserialization { message, body: _ } => {
                CoreError::Protocol { message }
            }
        }
    }
}
