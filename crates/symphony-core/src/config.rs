// ── Runtime bridge configuration ──
//
// Describes *how* to reach the Symphony cloud: credentials, endpoints and
// timing. Never touches disk; symphony-config (or any other host)
// builds a `BridgeConfig` and hands it in.

use std::time::Duration;

use secrecy::SecretString;
use symphony_api::transport::{PROXY_HOST, VENDOR_WILDCARD};
use symphony_api::{CertificatePolicy, WebEndpoints};

use crate::error::CoreError;

/// Account credentials for the web login.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: SecretString) -> Self {
        Self {
            username: username.into(),
            password,
        }
    }
}

/// Configuration for one bridge (one account).
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub credentials: Credentials,
    /// Login form and endpoint configuration resource.
    pub endpoints: WebEndpoints,
    /// Identities the streaming endpoint may present.
    pub certificate_identities: Vec<String>,
    /// Accept `ws://` endpoints. Local test servers only.
    pub allow_plaintext_stream: bool,
    /// Sleep between cycles, and the retry backoff after a failed attempt.
    pub poll_interval: Duration,
    /// Bound on every streaming receive.
    pub receive_timeout: Duration,
    /// Lifetime of a web session, counted from the web login.
    pub session_timeout: Duration,
    /// Timeout for web login and endpoint discovery requests.
    pub http_timeout: Duration,
    /// Log every protocol payload at debug level.
    pub verbose_protocol: bool,
}

impl BridgeConfig {
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
    pub const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_secs(10);
    pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(1500);
    pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

    /// Production endpoints and default timing.
    pub fn new(credentials: Credentials) -> Result<Self, CoreError> {
        Ok(Self {
            credentials,
            endpoints: WebEndpoints::production()?,
            certificate_identities: vec![VENDOR_WILDCARD.to_owned(), PROXY_HOST.to_owned()],
            allow_plaintext_stream: false,
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
            receive_timeout: Self::DEFAULT_RECEIVE_TIMEOUT,
            session_timeout: Self::DEFAULT_SESSION_TIMEOUT,
            http_timeout: Self::DEFAULT_HTTP_TIMEOUT,
            verbose_protocol: false,
        })
    }

    pub(crate) fn certificate_policy(&self) -> CertificatePolicy {
        CertificatePolicy::new(self.certificate_identities.iter().cloned())
            .allow_plaintext(self.allow_plaintext_stream)
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.credentials.username.trim().is_empty() {
            return Err(CoreError::Config {
                message: "username must not be empty".into(),
            });
        }
        if self.poll_interval.is_zero() || self.receive_timeout.is_zero() {
            return Err(CoreError::Config {
                message: "poll interval and receive timeout must be non-zero".into(),
            });
        }
        if self.certificate_identities.is_empty() {
            return Err(CoreError::Config {
                message: "at least one certificate identity is required".into(),
            });
        }
        Ok(())
    }
}
