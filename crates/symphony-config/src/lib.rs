//! Configuration for the Symphony bridge.
//!
//! TOML profiles, credential resolution (env + keyring + plaintext), and
//! translation to `symphony_core::BridgeConfig`. The CLI layers its flag
//! overrides on top of what this crate resolves.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use symphony_api::WebEndpoints;
use symphony_core::{BridgeConfig, Credentials};
use thiserror::Error;
use url::Url;

/// Keyring service name; entries are keyed `<profile>/password`.
pub const KEYRING_SERVICE: &str = "symphony";

/// Prefix for environment overrides of the TOML file.
pub const ENV_PREFIX: &str = "SYMPHONY_";

/// Fallback password variable, checked after a profile's `password_env`.
pub const PASSWORD_ENV: &str = "SYMPHONY_PASSWORD";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{profile}' is not defined")]
    UnknownProfile { profile: String },

    #[error("no {what} configured for profile '{profile}'")]
    NoCredentials { profile: String, what: &'static str },

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when none is named on the command line.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named account profiles.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: BTreeMap::new(),
        }
    }
}

/// Settings shared by every profile unless the profile overrides them.
/// Durations are whole seconds.
#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,

    #[serde(default = "default_receive_timeout")]
    pub receive_timeout: u64,

    #[serde(default = "default_session_timeout")]
    pub session_timeout: u64,

    #[serde(default = "default_http_timeout")]
    pub http_timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            poll_interval: default_poll_interval(),
            receive_timeout: default_receive_timeout(),
            session_timeout: default_session_timeout(),
            http_timeout: default_http_timeout(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_poll_interval() -> u64 {
    BridgeConfig::DEFAULT_POLL_INTERVAL.as_secs()
}
fn default_receive_timeout() -> u64 {
    BridgeConfig::DEFAULT_RECEIVE_TIMEOUT.as_secs()
}
fn default_session_timeout() -> u64 {
    BridgeConfig::DEFAULT_SESSION_TIMEOUT.as_secs()
}
fn default_http_timeout() -> u64 {
    BridgeConfig::DEFAULT_HTTP_TIMEOUT.as_secs()
}

/// One Symphony account.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct Profile {
    /// Account e-mail address.
    pub username: Option<String>,

    /// Password (plaintext, prefer keyring or env var).
    pub password: Option<String>,

    /// Environment variable holding the password.
    pub password_env: Option<String>,

    /// Override the login form URL.
    pub login_url: Option<String>,

    /// Override the endpoint configuration resource URL.
    pub config_url: Option<String>,

    /// Extra identities the streaming endpoint may present.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub certificate_identities: Vec<String>,

    /// Accept `ws://` streaming endpoints (local test servers only).
    pub allow_plaintext_stream: Option<bool>,

    pub poll_interval: Option<u64>,
    pub receive_timeout: Option<u64>,
    pub session_timeout: Option<u64>,
    pub http_timeout: Option<u64>,

    /// Log protocol payloads.
    pub verbose_protocol: Option<bool>,
}

impl Config {
    /// Name of the profile to use: the override, else `default_profile`,
    /// else `"default"`.
    pub fn profile_name(&self, requested: Option<&str>) -> String {
        requested
            .map(str::to_owned)
            .or_else(|| self.default_profile.clone())
            .unwrap_or_else(|| "default".into())
    }

    /// Look up a profile. A missing `default` profile resolves to an empty
    /// one so env-only setups work.
    pub fn profile(&self, name: &str) -> Result<Profile, ConfigError> {
        match self.profiles.get(name) {
            Some(profile) => Ok(profile.clone()),
            None if name == "default" => Ok(Profile::default()),
            None => Err(ConfigError::UnknownProfile {
                profile: name.into(),
            }),
        }
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "symphony", "symphony").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("symphony");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` + environment. A missing file is not an error.
///
/// Nested keys use a double underscore, e.g.
/// `SYMPHONY_PROFILES__HOME__USERNAME`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if loading fails.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(cfg, &path)?;
    Ok(path)
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

/// Username from the profile, else `SYMPHONY_USERNAME`.
pub fn resolve_username(profile: &Profile, profile_name: &str) -> Result<String, ConfigError> {
    profile
        .username
        .clone()
        .or_else(|| std::env::var("SYMPHONY_USERNAME").ok())
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| ConfigError::NoCredentials {
            profile: profile_name.into(),
            what: "username",
        })
}

/// Resolve the password: env var, then keyring, then plaintext.
pub fn resolve_password(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    // 1. Profile's password_env, then the global variable
    let env_names = profile.password_env.iter().map(String::as_str).chain([PASSWORD_ENV]);
    for name in env_names {
        if let Ok(pw) = std::env::var(name) {
            return Ok(SecretString::from(pw));
        }
    }

    // 2. System keyring
    if let Ok(entry) = keyring_entry(profile_name) {
        if let Ok(pw) = entry.get_password() {
            return Ok(SecretString::from(pw));
        }
    }

    // 3. Plaintext in config
    if let Some(ref pw) = profile.password {
        return Ok(SecretString::from(pw.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
        what: "password",
    })
}

/// Store a profile's password in the system keyring.
pub fn store_password(profile_name: &str, password: &SecretString) -> Result<(), ConfigError> {
    use secrecy::ExposeSecret;

    keyring_entry(profile_name)?.set_password(password.expose_secret())?;
    Ok(())
}

fn keyring_entry(profile_name: &str) -> Result<keyring::Entry, keyring::Error> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/password"))
}

// ── Translation ─────────────────────────────────────────────────────

/// Build a `BridgeConfig` from a profile and the shared defaults.
pub fn profile_to_bridge_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<BridgeConfig, ConfigError> {
    let credentials = Credentials::new(
        resolve_username(profile, profile_name)?,
        resolve_password(profile, profile_name)?,
    );

    let mut config = BridgeConfig::new(credentials).map_err(|e| ConfigError::Validation {
        field: "endpoints".into(),
        reason: e.to_string(),
    })?;

    if profile.login_url.is_some() || profile.config_url.is_some() {
        let production = config.endpoints.clone();
        config.endpoints = WebEndpoints::new(
            parse_url("login_url", profile.login_url.as_deref())?.unwrap_or(production.login_url),
            parse_url("config_url", profile.config_url.as_deref())?.unwrap_or(production.config_url),
        );
    }

    config
        .certificate_identities
        .extend(profile.certificate_identities.iter().cloned());
    config.allow_plaintext_stream = profile.allow_plaintext_stream.unwrap_or(false);
    config.verbose_protocol = profile.verbose_protocol.unwrap_or(false);

    config.poll_interval = secs(profile.poll_interval, defaults.poll_interval);
    config.receive_timeout = secs(profile.receive_timeout, defaults.receive_timeout);
    config.session_timeout = secs(profile.session_timeout, defaults.session_timeout);
    config.http_timeout = secs(profile.http_timeout, defaults.http_timeout);

    config.validate().map_err(|e| ConfigError::Validation {
        field: format!("profile '{profile_name}'"),
        reason: e.to_string(),
    })?;
    Ok(config)
}

fn secs(value: Option<u64>, default: u64) -> Duration {
    Duration::from_secs(value.unwrap_or(default))
}

fn parse_url(field: &str, raw: Option<&str>) -> Result<Option<Url>, ConfigError> {
    raw.map(|raw| {
        raw.parse().map_err(|_| ConfigError::Validation {
            field: field.into(),
            reason: format!("invalid URL: {raw}"),
        })
    })
    .transpose()
}
