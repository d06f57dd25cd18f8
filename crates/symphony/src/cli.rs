//! Clap derive structures for the `symphony` CLI.
//!
//! Kept free of crate-internal imports: build.rs compiles this file on its
//! own to render man pages and completions.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// symphony -- bridge WaterFurnace Symphony units to your terminal
#[derive(Debug, Parser)]
#[command(
    name = "symphony",
    version,
    about = "Monitor and control WaterFurnace Symphony geothermal units",
    long_about = "Logs in to the WaterFurnace Symphony cloud, keeps the streaming\n\
        session alive, and polls every unit on the account.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Account profile to use
    #[arg(long, short = 'p', env = "SYMPHONY_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Account e-mail (overrides profile)
    #[arg(long, short = 'u', global = true)]
    pub username: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "SYMPHONY_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Log every protocol payload (needs -vv to be visible)
    #[arg(long, global = true)]
    pub verbose_protocol: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// Unit ids, one per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Connect and keep polling until interrupted
    Run(RunArgs),

    /// Connect, wait for one refresh, and list units
    #[command(alias = "ls")]
    Units(UnitsArgs),

    /// Manage configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Run ──────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Heating setpoint to apply once the unit appears (UNIT=DEGREES)
    #[arg(long = "heat", value_name = "UNIT=DEGREES", value_parser = parse_setpoint)]
    pub heat: Vec<SetpointArg>,

    /// Cooling setpoint to apply once the unit appears (UNIT=DEGREES)
    #[arg(long = "cool", value_name = "UNIT=DEGREES", value_parser = parse_setpoint)]
    pub cool: Vec<SetpointArg>,
}

/// `UNIT=DEGREES` pair. UNIT is a unit id, gateway id or display name.
#[derive(Debug, Clone, PartialEq)]
pub struct SetpointArg {
    pub unit: String,
    pub degrees: f64,
}

pub fn parse_setpoint(raw: &str) -> Result<SetpointArg, String> {
    let (unit, degrees) = raw
        .rsplit_once('=')
        .ok_or_else(|| format!("expected UNIT=DEGREES, got '{raw}'"))?;
    let unit = unit.trim();
    if unit.is_empty() {
        return Err("unit must not be empty".into());
    }
    let degrees: f64 = degrees
        .trim()
        .parse()
        .map_err(|_| format!("'{degrees}' is not a temperature"))?;
    if !degrees.is_finite() {
        return Err(format!("'{degrees}' is not a temperature"));
    }
    Ok(SetpointArg {
        unit: unit.to_owned(),
        degrees,
    })
}

// ── Units ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct UnitsArgs {
    /// Seconds to wait for the first refresh
    #[arg(long, short = 'w', default_value = "30")]
    pub wait: u64,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file location
    Path,

    /// Display current configuration (secrets masked)
    Show,

    /// Store the profile's password in the system keyring
    SetPassword,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
