//! CLI configuration: thin wrapper around `symphony_config`.
//!
//! Adds resolution that respects `GlobalOpts` flag overrides
//! (--profile, --username, --verbose-protocol).

use symphony_core::BridgeConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use symphony_config::{Config, Profile, config_path, load_config};

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    config.profile_name(global.profile.as_deref())
}

/// The named profile, with the available names listed when it is missing.
pub fn active_profile(global: &GlobalOpts, config: &Config) -> Result<(String, Profile), CliError> {
    let name = active_profile_name(global, config);
    match config.profile(&name) {
        Ok(profile) => Ok((name, profile)),
        Err(symphony_config::ConfigError::UnknownProfile { profile }) => {
            let available = if config.profiles.is_empty() {
                "(none)".to_owned()
            } else {
                config.profiles.keys().cloned().collect::<Vec<_>>().join(", ")
            };
            Err(CliError::ProfileNotFound {
                name: profile,
                available,
            })
        }
        Err(other) => Err(other.into()),
    }
}

/// Translate config file + flags into a `BridgeConfig`.
///
/// CLI flag overrides take priority over profile values.
pub fn build_bridge_config(global: &GlobalOpts) -> Result<BridgeConfig, CliError> {
    let cfg = load_config()?;
    let (name, mut profile) = active_profile(global, &cfg)?;

    if let Some(ref username) = global.username {
        profile.username = Some(username.clone());
    }

    let mut bridge = symphony_config::profile_to_bridge_config(&profile, &name, &cfg.defaults)?;

    if global.verbose_protocol {
        bridge.verbose_protocol = true;
    }
    tracing::debug!(profile = %name, user = %bridge.credentials.username, "bridge config resolved");
    Ok(bridge)
}
