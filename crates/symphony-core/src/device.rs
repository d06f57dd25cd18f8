// ── Host-facing capability traits ──
//
// The engine never owns UI or property-binding state. A host plugs in a
// `DeviceSurface`; for every unit the surface hands back a
// `ConnectableDevice` the engine pushes state into, and it receives a
// `PlatformProtocol` handle to push setpoint intents the other way.

use std::sync::Arc;

use symphony_api::ReadResponse;

use crate::model::{UnitId, UnitRecord};

/// Per-unit sink for state coming from the cloud.
pub trait ConnectableDevice: Send + Sync {
    fn set_connection_status(&self, online: bool);

    /// Called after every successful read with the fresh response.
    fn refresh_with_data(&self, data: &ReadResponse);
}

/// Setpoint intents flowing from the host to the engine.
///
/// Calls never block and never fail: the intent is queued and applied on
/// the next polling cycle. Outcomes are only visible through later reads.
pub trait PlatformProtocol: Send + Sync {
    fn set_heating_setpoint(&self, unit: &UnitId, value: f64);
    fn set_cooling_setpoint(&self, unit: &UnitId, value: f64);
}

/// Host registry of unit representations.
pub trait DeviceSurface: Send + Sync {
    /// A unit appeared on the roster.
    fn add_unit(
        &self,
        record: &UnitRecord,
        protocol: Arc<dyn PlatformProtocol>,
    ) -> Arc<dyn ConnectableDevice>;

    fn rename_unit(&self, unit: &UnitId, name: &str);

    /// A unit left the roster; its device is dropped after this call.
    fn remove_unit(&self, unit: &UnitId);

    /// The session reached `Ready` (`true`) or lost its stream (`false`).
    fn connectivity_changed(&self, _connected: bool) {}
}
