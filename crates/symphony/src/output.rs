//! Output formatting: table, JSON, plain.
//!
//! Renders unit data in the format selected by `--output`. Table uses
//! `tabled`, structured formats use serde, plain emits one unit id per line.

use std::io::{self, IsTerminal, Write};

use serde::Serialize;
use tabled::{Table, Tabled, settings::Style};

use symphony_core::{OperatingSummary, UnitRecord};

use crate::cli::{ColorMode, OutputFormat};
use crate::error::CliError;

// ── Color ────────────────────────────────────────────────────────────

/// Determine whether color output should be enabled.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stderr().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

// ── Unit views ───────────────────────────────────────────────────────

/// A unit as printed: the record plus its derived summary.
#[derive(Debug, Serialize)]
pub struct UnitView<'a> {
    #[serde(flatten)]
    pub record: &'a UnitRecord,
    pub summary: Option<OperatingSummary>,
}

impl<'a> From<&'a UnitRecord> for UnitView<'a> {
    fn from(record: &'a UnitRecord) -> Self {
        Self {
            record,
            summary: record.last_read.as_deref().map(OperatingSummary::from),
        }
    }
}

#[derive(Tabled)]
struct UnitRow {
    #[tabled(rename = "Unit")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Series")]
    series: String,
    #[tabled(rename = "Online")]
    online: &'static str,
    #[tabled(rename = "Mode")]
    mode: String,
    #[tabled(rename = "Room")]
    room: String,
    #[tabled(rename = "Heat/Cool")]
    setpoints: String,
    #[tabled(rename = "Power")]
    power: String,
    #[tabled(rename = "Refreshed")]
    refreshed: String,
}

impl From<&UnitView<'_>> for UnitRow {
    fn from(view: &UnitView<'_>) -> Self {
        let record = view.record;
        let summary = view.summary.as_ref();
        let dash = || "-".to_owned();

        Self {
            id: record.unit_id.to_string(),
            name: record.display_name.clone(),
            series: record.series.to_string(),
            online: if record.online { "yes" } else { "no" },
            mode: summary.map_or_else(dash, |s| s.mode.clone()),
            room: summary.map_or_else(dash, |s| format!("{:.1}°F", s.room_temperature)),
            setpoints: summary
                .and_then(|s| Some(format!("{}/{}", s.heating_setpoint?, s.cooling_setpoint?)))
                .unwrap_or_else(dash),
            power: summary.map_or_else(dash, OperatingSummary::total_power_label),
            refreshed: record
                .refreshed_at
                .map_or_else(dash, |at| at.format("%H:%M:%S").to_string()),
        }
    }
}

// ── Render ───────────────────────────────────────────────────────────

pub fn render_units(format: OutputFormat, units: &[UnitRecord]) -> Result<String, CliError> {
    let views: Vec<UnitView<'_>> = units.iter().map(UnitView::from).collect();
    Ok(match format {
        OutputFormat::Table => {
            let rows: Vec<UnitRow> = views.iter().map(UnitRow::from).collect();
            Table::new(rows).with(Style::rounded()).to_string()
        }
        OutputFormat::Json => serde_json::to_string_pretty(&views)?,
        OutputFormat::JsonCompact => serde_json::to_string(&views)?,
        OutputFormat::Plain => views
            .iter()
            .map(|v| v.record.unit_id.to_string())
            .collect::<Vec<_>>()
            .join("\n"),
    })
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}
