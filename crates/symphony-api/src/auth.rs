// Web login and streaming endpoint discovery
//
// The account login is a plain HTML form post. Success is signalled by a
// redirect that sets exactly one cookie; that cookie's value is the
// session id the streaming protocol authenticates with. The streaming
// endpoint itself is not fixed: it is published inside a JavaScript
// configuration resource and extracted with a pattern match.

use std::sync::LazyLock;

use regex::Regex;
use reqwest::header::COOKIE;
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

/// Account login form.
pub const LOGIN_URL: &str = "https://symphony.mywaterfurnace.com/account/login";

/// JavaScript resource that publishes the streaming endpoint.
pub const CONFIG_URL: &str = "https://symphony.mywaterfurnace.com/assets/js/awlconfig.js.php";

/// First `ws://` or `wss://` URL inside the configuration resource.
static STREAM_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"wss?://[^"']+"#).expect("stream URL pattern is valid"));

/// Cookie the login form expects, acknowledging the legal notice.
const LEGAL_ACKNOWLEDGE: &str = "legal-acknowledge=yes";

/// Where the web client sends its two requests.
#[derive(Debug, Clone)]
pub struct WebEndpoints {
    pub login_url: Url,
    pub config_url: Url,
}

impl WebEndpoints {
    pub fn new(login_url: Url, config_url: Url) -> Self {
        Self {
            login_url,
            config_url,
        }
    }

    /// The vendor's production endpoints.
    pub fn production() -> Result<Self, Error> {
        Ok(Self {
            login_url: Url::parse(LOGIN_URL)?,
            config_url: Url::parse(CONFIG_URL)?,
        })
    }
}

/// HTTP client for the account web surface.
///
/// Holds no session state: [`login`](Self::login) hands the session id
/// back to the caller, so forgetting a session is just dropping the value.
#[derive(Debug, Clone)]
pub struct WebClient {
    http: reqwest::Client,
    endpoints: WebEndpoints,
}

impl WebClient {
    /// Create a web client with its own `reqwest::Client`.
    pub fn new(endpoints: WebEndpoints, transport: &TransportConfig) -> Result<Self, Error> {
        Ok(Self {
            http: transport.build_client()?,
            endpoints,
        })
    }

    /// Post the account login form and return the session id.
    pub async fn login(&self, username: &str, password: &SecretString) -> Result<SecretString, Error> {
        debug!(url = %self.endpoints.login_url, "posting web login");

        let form = [
            ("op", "login"),
            ("redirect", "/"),
            ("emailaddress", username),
            ("password", password.expose_secret()),
        ];

        let resp = self
            .http
            .post(self.endpoints.login_url.clone())
            .header(COOKIE, LEGAL_ACKNOWLEDGE)
            .form(&form)
            .send()
            .await
            .map_err(Error::Transport)?;

        let status = resp.status();
        if !status.is_redirection() {
            return Err(Error::Authentication {
                message: format!("login form answered HTTP {status} instead of a redirect"),
            });
        }

        let mut cookies = resp.cookies();
        let session = match (cookies.next(), cookies.next()) {
            (Some(cookie), None) => cookie.value().to_owned(),
            (None, _) => {
                return Err(Error::Authentication {
                    message: "login redirect carried no session cookie".into(),
                });
            }
            (Some(_), Some(_)) => {
                return Err(Error::Authentication {
                    message: "login redirect carried more than one cookie".into(),
                });
            }
        };

        if session.is_empty() {
            return Err(Error::Authentication {
                message: "login redirect carried an empty session cookie".into(),
            });
        }

        debug!("web login successful");
        Ok(SecretString::from(session))
    }

    /// Fetch the configuration resource and extract the streaming endpoint.
    pub async fn discover_endpoint(&self) -> Result<Url, Error> {
        let url = &self.endpoints.config_url;
        debug!(%url, "discovering streaming endpoint");

        let body = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(Error::Transport)?
            .error_for_status()
            .map_err(Error::Transport)?
            .text()
            .await
            .map_err(Error::Transport)?;

        let endpoint = extract_stream_url(&body)?.ok_or_else(|| Error::EndpointNotFound {
            url: url.to_string(),
        })?;

        debug!(%endpoint, "streaming endpoint discovered");
        Ok(endpoint)
    }
}

/// First streaming URL in `body`, if any.
fn extract_stream_url(body: &str) -> Result<Option<Url>, Error> {
    STREAM_URL_RE
        .find(body)
        .map(|m| Url::parse(m.as_str()).map_err(Error::InvalidUrl))
        .transpose()
}
