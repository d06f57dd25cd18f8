// ── Core error types ──
//
// Engine-level errors. Callers never see HTTP statuses, WebSocket frames
// or JSON parse failures directly: the `From<symphony_api::Error>` impl
// folds wire-level failures into the recoverable categories the session
// state machine reacts to.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Session establishment ────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Cannot resolve streaming endpoint: {message}")]
    EndpointResolution { message: String },

    #[error("Streaming connection failed: {reason}")]
    ConnectionFailed { reason: String },

    #[error("No response within {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    // ── Protocol ─────────────────────────────────────────────────────
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    #[error("Session is not ready")]
    NotReady,

    // ── Configuration ────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal ─────────────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// `true` for failures that leave the streaming connection unusable.
    pub fn is_transport_failure(&self) -> bool {
        matches!(self, Self::ConnectionFailed { .. } | Self::NotReady)
    }
}

// ── Conversion from wire-level errors ────────────────────────────────

impl From<symphony_api::Error> for CoreError {
    fn from(err: symphony_api::Error) -> Self {
        use symphony_api::Error as Api;

        match err {
            Api::Authentication { message } => Self::AuthenticationFailed { message },
            Api::EndpointNotFound { url } => Self::EndpointResolution {
                message: format!("no ws:// or wss:// URL in {url}"),
            },
            Api::Transport(ref e) if e.is_timeout() => Self::Timeout { timeout_ms: 0 },
            Api::Transport(e) => Self::ConnectionFailed {
                reason: e.to_string(),
            },
            Api::InvalidUrl(e) => Self::Config {
                message: format!("invalid URL: {e}"),
            },
            Api::Timeout { timeout_ms } => Self::Timeout { timeout_ms },
            Api::Tls(reason) | Api::WebSocketConnect(reason) => Self::ConnectionFailed { reason },
            Api::CertificateIdentity { host } => Self::ConnectionFailed {
                reason: format!("certificate identity '{host}' is not allowed"),
            },
            Api::WebSocketClosed { code, reason } => Self::ConnectionFailed {
                reason: format!("stream closed (code {code}): {reason}"),
            },
            Api::NotConnected => Self::NotReady,
            Api::Deserialization { message, .. } => Self::Protocol { message },
            Api::Protocol { message } => Self::Protocol { message },
        }
    }
}
