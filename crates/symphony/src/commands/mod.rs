//! Command dispatch: bridges CLI args -> engine -> output formatting.

pub mod config_cmd;
pub mod run;
pub mod units;

use std::sync::Arc;

use symphony_core::Bridge;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;
use crate::output;
use crate::surface::ConsoleSurface;

/// Dispatch a command that needs a live bridge.
pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    let config = crate::config::build_bridge_config(global)?;
    let live = matches!(cmd, Command::Run(_)) && !global.quiet;
    let surface = Arc::new(ConsoleSurface::new(output::should_color(global.color), live));
    let bridge = Bridge::new(config, surface)?;

    match cmd {
        Command::Run(args) => run::handle(&bridge, args).await,
        Command::Units(args) => units::handle(&bridge, args, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => Err(CliError::Internal {
            message: "command does not need a connection".into(),
        }),
    }
}
