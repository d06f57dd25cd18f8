use thiserror::Error;

/// Top-level error type for the `symphony-api` crate.
///
/// Covers every failure mode across the three surfaces this crate talks to:
/// the web login form, the endpoint configuration resource, and the
/// streaming (WebSocket) protocol. `symphony-core` maps these into the
/// engine's recoverable error taxonomy.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Web login rejected or answered with something other than a
    /// single-cookie redirect.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Endpoint discovery ──────────────────────────────────────────
    /// The configuration resource did not contain a `ws://` / `wss://` URL.
    #[error("No streaming endpoint found in {url}")]
    EndpointNotFound { url: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// No response within the receive bound.
    #[error("Request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// TLS client construction error.
    #[error("TLS error: {0}")]
    Tls(String),

    /// The endpoint's identity is not on the certificate allow-list.
    #[error("Certificate identity '{host}' is not allowed")]
    CertificateIdentity { host: String },

    // ── WebSocket ───────────────────────────────────────────────────
    /// WebSocket connection failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// WebSocket closed while a request was outstanding.
    #[error("WebSocket closed (code {code}): {reason}")]
    WebSocketClosed { code: u16, reason: String },

    /// Send or receive attempted without a live connection.
    #[error("Streaming transport is not connected")]
    NotConnected,

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    /// Well-formed response that reports a failure (`success: false`, `err`).
    #[error("Protocol error: {message}")]
    Protocol { message: String },
}

impl Error {
    pub(crate) fn deserialization(err: &serde_json::Error, body: &str) -> Self {
        let preview: String = body.chars().take(200).collect();
        Self::Deserialization {
            message: format!("{err} (body preview: {preview:?})"),
            body: body.to_owned(),
        }
    }
}
