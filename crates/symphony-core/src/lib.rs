// symphony-core: Session and polling engine between symphony-api and hosts (CLI, integrations).

pub mod config;
pub mod device;
pub mod diff;
pub mod error;
pub mod model;
pub mod poll;
pub mod registry;
pub mod session;
pub mod setpoint;
pub mod transaction;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{BridgeConfig, Credentials};
pub use device::{ConnectableDevice, DeviceSurface, PlatformProtocol};
pub use diff::{GatewayDiff, diff};
pub use error::CoreError;
pub use model::{OperatingSummary, Series, UnitId, UnitRecord};
pub use poll::{Cycle, CycleReport};
pub use registry::UnitRegistry;
pub use session::{Bridge, SessionState};
pub use setpoint::{PendingSetpoint, SetpointHandle, SetpointKind, SetpointQueues};
pub use transaction::TransactionCounter;
