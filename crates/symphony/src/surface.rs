//! Console device surface: renders unit events to the terminal.
//!
//! Under `symphony run` every refresh prints the unit's name followed by
//! one indented line per reading.

use std::collections::HashMap;
use std::io::Write;
use std::sync::{Arc, PoisonError, RwLock};

use owo_colors::OwoColorize;
use tracing::{debug, info, warn};

use symphony_api::ReadResponse;
use symphony_core::{
    ConnectableDevice, DeviceSurface, OperatingSummary, PlatformProtocol, UnitId, UnitRecord,
};

/// Prints one status line per refresh when `live`, otherwise only logs.
pub struct ConsoleSurface {
    names: Arc<RwLock<HashMap<UnitId, String>>>,
    color: bool,
    live: bool,
}

impl ConsoleSurface {
    pub fn new(color: bool, live: bool) -> Self {
        Self {
            names: Arc::default(),
            color,
            live,
        }
    }
}

struct ConsoleDevice {
    unit: UnitId,
    names: Arc<RwLock<HashMap<UnitId, String>>>,
    color: bool,
    live: bool,
}

impl ConsoleDevice {
    fn name(&self) -> String {
        self.names
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&self.unit)
            .cloned()
            .unwrap_or_else(|| self.unit.to_string())
    }
}

impl ConnectableDevice for ConsoleDevice {
    fn set_connection_status(&self, online: bool) {
        debug!(unit = %self.unit, online, "connection status");
        if !self.live {
            return;
        }
        let name = self.name();
        let line = match (online, self.color) {
            (true, true) => format!("{} {name}", "●".green()),
            (false, true) => format!("{} {name} offline", "○".red()),
            (true, false) => format!("+ {name}"),
            (false, false) => format!("- {name} offline"),
        };
        let _ = writeln!(std::io::stderr().lock(), "{line}");
    }

    fn refresh_with_data(&self, data: &ReadResponse) {
        let summary = OperatingSummary::from(data);
        debug!(unit = %self.unit, mode = %summary.mode, room = summary.room_temperature, "refreshed");
        if !self.live {
            return;
        }

        let name = self.name();
        let heading = if self.color {
            name.bold().to_string()
        } else {
            name
        };
        let mut err = std::io::stderr().lock();
        let _ = writeln!(err, "{heading}");
        for line in summary.lines() {
            let _ = writeln!(err, "  {line}");
        }
    }
}

impl DeviceSurface for ConsoleSurface {
    fn add_unit(
        &self,
        record: &UnitRecord,
        _protocol: Arc<dyn PlatformProtocol>,
    ) -> Arc<dyn ConnectableDevice> {
        info!(unit = %record.unit_id, name = %record.display_name, series = %record.series, "unit added");
        self.names
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(record.unit_id.clone(), record.display_name.clone());

        Arc::new(ConsoleDevice {
            unit: record.unit_id.clone(),
            names: Arc::clone(&self.names),
            color: self.color,
            live: self.live,
        })
    }

    fn rename_unit(&self, unit: &UnitId, name: &str) {
        info!(%unit, %name, "unit renamed");
        self.names
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(unit.clone(), name.to_owned());
    }

    fn remove_unit(&self, unit: &UnitId) {
        info!(%unit, "unit removed");
        self.names
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(unit);
    }

    fn connectivity_changed(&self, connected: bool) {
        if connected {
            info!("connected to Symphony");
        } else {
            warn!("lost connection to Symphony, retrying");
        }
    }
}
