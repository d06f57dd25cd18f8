//! Config subcommand handlers.

use std::fmt::Write as _;

use secrecy::SecretString;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config};
use crate::error::CliError;
use crate::output;

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            output::print_output(&config::config_path().display().to_string(), global.quiet);
            Ok(())
        }
        ConfigCommand::Show => {
            let cfg = config::load_config()?;
            output::print_output(&format_config_redacted(&cfg), global.quiet);
            Ok(())
        }
        ConfigCommand::SetPassword => set_password(global),
    }
}

fn set_password(global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load_config()?;
    let name = config::active_profile_name(global, &cfg);

    let password = rpassword::prompt_password(format!("Password for profile '{name}': "))
        .map_err(|e| CliError::Validation {
            field: "password".into(),
            reason: format!("prompt failed: {e}"),
        })?;
    if password.is_empty() {
        return Err(CliError::Validation {
            field: "password".into(),
            reason: "password cannot be empty".into(),
        });
    }

    symphony_config::store_password(&name, &SecretString::from(password))?;
    if !global.quiet {
        eprintln!("Password for profile '{name}' stored in the system keyring.");
    }
    Ok(())
}

/// Format config for display, masking secrets.
fn format_config_redacted(cfg: &Config) -> String {
    let mut out = String::new();

    if let Some(ref default) = cfg.default_profile {
        let _ = writeln!(out, "default_profile = \"{default}\"");
    }
    let d = &cfg.defaults;
    let _ = writeln!(out);
    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "output = \"{}\"", d.output);
    let _ = writeln!(out, "color = \"{}\"", d.color);
    let _ = writeln!(out, "poll_interval = {}", d.poll_interval);
    let _ = writeln!(out, "receive_timeout = {}", d.receive_timeout);
    let _ = writeln!(out, "session_timeout = {}", d.session_timeout);
    let _ = writeln!(out, "http_timeout = {}", d.http_timeout);

    for (name, p) in &cfg.profiles {
        let _ = writeln!(out);
        let _ = writeln!(out, "[profiles.{name}]");
        if let Some(ref u) = p.username {
            let _ = writeln!(out, "username = \"{u}\"");
        }
        if p.password.is_some() {
            let _ = writeln!(out, "password = \"****\"");
        }
        if let Some(ref env) = p.password_env {
            let _ = writeln!(out, "password_env = \"{env}\"");
        }
        for (key, value) in [("login_url", &p.login_url), ("config_url", &p.config_url)] {
            if let Some(url) = value {
                let _ = writeln!(out, "{key} = \"{url}\"");
            }
        }
        if !p.certificate_identities.is_empty() {
            let _ = writeln!(out, "certificate_identities = {:?}", p.certificate_identities);
        }
        if let Some(plaintext) = p.allow_plaintext_stream {
            let _ = writeln!(out, "allow_plaintext_stream = {plaintext}");
        }
        let timings = [
            ("poll_interval", p.poll_interval),
            ("receive_timeout", p.receive_timeout),
            ("session_timeout", p.session_timeout),
            ("http_timeout", p.http_timeout),
        ];
        for (key, value) in timings {
            if let Some(secs) = value {
                let _ = writeln!(out, "{key} = {secs}");
            }
        }
        if let Some(verbose) = p.verbose_protocol {
            let _ = writeln!(out, "verbose_protocol = {verbose}");
        }
    }

    out
}
