//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and a stable exit code each.

use miette::Diagnostic;
use thiserror::Error;

use symphony_config::ConfigError;
use symphony_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the Symphony cloud: {reason}")]
    #[diagnostic(
        code(symphony::connection_failed),
        help("Check network access to symphony.mywaterfurnace.com and retry with -v for details.")
    )]
    ConnectionFailed { reason: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(symphony::auth_failed),
        help(
            "Verify the account e-mail and password.\n\
             Run: symphony config set-password --profile {profile}"
        )
    )]
    AuthFailed { profile: String, message: String },

    #[error("No {what} configured for profile '{profile}'")]
    #[diagnostic(
        code(symphony::no_credentials),
        help(
            "Set username in {path}, pass --username, or export SYMPHONY_USERNAME.\n\
             Store the password with: symphony config set-password\n\
             Or export SYMPHONY_PASSWORD."
        )
    )]
    NoCredentials {
        profile: String,
        what: &'static str,
        path: String,
    },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(symphony::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(symphony::profile_not_found),
        help("Available profiles: {available}")
    )]
    ProfileNotFound { name: String, available: String },

    #[error(transparent)]
    #[diagnostic(code(symphony::config))]
    Config(Box<ConfigError>),

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("No refresh completed within {seconds}s")]
    #[diagnostic(
        code(symphony::timeout),
        help("Increase --wait, or run with -v to watch the session state.")
    )]
    Timeout { seconds: u64 },

    // ── Internal / IO ────────────────────────────────────────────────
    #[error("{message}")]
    #[diagnostic(code(symphony::internal))]
    Internal { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Could not render output: {0}")]
    #[diagnostic(code(symphony::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── Conversions ──────────────────────────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials { profile, what } => Self::NoCredentials {
                profile,
                what,
                path: symphony_config::config_path().display().to_string(),
            },
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::UnknownProfile { profile } => Self::ProfileNotFound {
                name: profile,
                available: String::from("(none)"),
            },
            other => Self::Config(Box::new(other)),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::AuthenticationFailed { message } => Self::AuthFailed {
                profile: "current".into(),
                message,
            },
            CoreError::EndpointResolution { message } => Self::ConnectionFailed { reason: message },
            CoreError::ConnectionFailed { reason } => Self::ConnectionFailed { reason },
            CoreError::NotReady => Self::ConnectionFailed {
                reason: "session is not ready".into(),
            },
            CoreError::Timeout { timeout_ms } => Self::Timeout {
                seconds: timeout_ms.div_ceil(1000),
            },
            CoreError::Config { message } => Self::Validation {
                field: "configuration".into(),
                reason: message,
            },
            CoreError::Protocol { message } | CoreError::Internal(message) => {
                Self::Internal { message }
            }
        }
    }
}
