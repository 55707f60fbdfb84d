use std::time::Duration;

use thiserror::Error;

/// Top-level error type for the `deconz-api` crate.
///
/// Covers every failure mode across both hub surfaces: the REST
/// endpoint and the WebSocket event stream. `deconz-core` maps these
/// into its own taxonomy (transport, communication, protocol).
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    // ── Hub API ─────────────────────────────────────────────────────
    /// Error reported by the hub, parsed from its `[{"error": {...}}]` body.
    #[error("Hub error (HTTP {status}): {description}")]
    Hub {
        status: u16,
        /// deCONZ error type (1 = unauthorized user, 3 = resource not available, ...).
        error_type: Option<u32>,
        address: Option<String>,
        description: String,
    },

    // ── WebSocket ───────────────────────────────────────────────────
    /// WebSocket connection failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

/// deCONZ error type for "unauthorized user" (bad API key).
const HUB_ERROR_UNAUTHORIZED: u32 = 1;
/// deCONZ error type for "resource not available".
const HUB_ERROR_NOT_AVAILABLE: u32 = 3;

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout { .. } | Self::WebSocketConnect(_) => true,
            Self::Hub { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns `true` if the hub reported the resource as missing.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            Self::Hub {
                status, error_type, ..
            } => *status == 404 || *error_type == Some(HUB_ERROR_NOT_AVAILABLE),
            _ => false,
        }
    }

    /// Returns `true` if the hub rejected the API key.
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            Self::Hub {
                status: 401 | 403,
                ..
            } | Self::Hub {
                error_type: Some(HUB_ERROR_UNAUTHORIZED),
                ..
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hub(status: u16, error_type: Option<u32>) -> Error {
        Error::Hub {
            status,
            error_type,
            address: None,
            description: "x".into(),
        }
    }

    #[test]
    fn hub_error_classification() {
        assert!(hub(404, None).is_not_found());
        assert!(hub(400, Some(3)).is_not_found());
        assert!(hub(403, Some(1)).is_unauthorized());
        assert!(hub(503, None).is_transient());
        assert!(!hub(400, Some(7)).is_transient());
    }

    #[test]
    fn websocket_connect_and_timeout_are_transient() {
        assert!(Error::WebSocketConnect("refused".into()).is_transient());
        assert!(
            Error::Timeout {
                timeout: Duration::from_millis(250)
            }
            .is_transient()
        );
        assert!(!hub(401, None).is_transient());
        assert!(hub(401, None).is_unauthorized());
    }
}
