// Shared transport configuration.
//
// The web login and endpoint discovery share one `reqwest::Client` built
// here; the streaming connector shares the certificate identity policy.

use std::time::Duration;

use reqwest::redirect::Policy;
use url::Url;

use crate::error::Error;

const USER_AGENT: &str = concat!("symphony-bridge/", env!("CARGO_PKG_VERSION"));

/// Wildcard identity covering the vendor's service hosts.
pub const VENDOR_WILDCARD: &str = "*.mywaterfurnace.com";

/// Named proxy host that fronts the streaming endpoint.
pub const PROXY_HOST: &str = "awlclientproxy.mywaterfurnace.com";

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` from this config.
    ///
    /// Redirects are never followed: the login form signals success with a
    /// redirect, and the session cookie rides on that redirect response.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(USER_AGENT)
            .redirect(Policy::none())
            .build()
            .map_err(|e| Error::Tls(format!("failed to build HTTP client: {e}")))
    }
}

// ── Certificate identity policy ─────────────────────────────────────

/// Allow-list of identities the streaming endpoint may present.
///
/// The connector refuses any endpoint whose host is not on this list;
/// webpki then verifies that the server certificate actually belongs to
/// that host, so a certificate for any other identity never completes
/// the handshake.
#[derive(Debug, Clone)]
pub struct CertificatePolicy {
    allowed: Vec<String>,
    allow_plaintext: bool,
}

impl Default for CertificatePolicy {
    fn default() -> Self {
        Self {
            allowed: vec![VENDOR_WILDCARD.to_owned(), PROXY_HOST.to_owned()],
            allow_plaintext: false,
        }
    }
}

impl CertificatePolicy {
    /// Policy with an explicit list of identities (`*.` wildcards allowed).
    pub fn new(allowed: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            allowed: allowed.into_iter().map(Into::into).collect(),
            allow_plaintext: false,
        }
    }

    /// Permit unencrypted `ws://` endpoints. Only meant for local test servers.
    pub fn allow_plaintext(mut self, allow: bool) -> Self {
        self.allow_plaintext = allow;
        self
    }

    pub fn allowed(&self) -> &[String] {
        &self.allowed
    }

    /// Check an endpoint URL against the policy.
    pub fn check(&self, url: &Url) -> Result<(), Error> {
        let host = url.host_str().unwrap_or_default().to_ascii_lowercase();

        match url.scheme() {
            "wss" => {}
            "ws" if self.allow_plaintext => return Ok(()),
            _ => return Err(Error::CertificateIdentity { host }),
        }

        if self.allowed.iter().any(|pattern| identity_matches(pattern, &host)) {
            Ok(())
        } else {
            Err(Error::CertificateIdentity { host })
        }
    }
}

/// RFC 6125-style match: a leading `*.` covers exactly one label.
fn identity_matches(pattern: &str, host: &str) -> bool {
    let pattern = pattern.to_ascii_lowercase();
    match pattern.strip_prefix("*.") {
        Some(suffix) => host
            .strip_suffix(suffix)
            .and_then(|label| label.strip_suffix('.'))
            .is_some_and(|label| !label.is_empty() && !label.contains('.')),
        None => pattern == host,
    }
}
