// ── Setpoint queues ──
//
// The only channel from host threads into the background task. Callers
// enqueue from anywhere; the task drains once per cycle.

use indexmap::IndexMap;
use serde_json::{Map, Value};
use strum::Display;
use symphony_api::protocol::{COOLING_SETPOINT_FIELD, HEATING_SETPOINT_FIELD};
use tokio::sync::mpsc;
use tracing::debug;

use crate::device::PlatformProtocol;
use crate::model::UnitId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum SetpointKind {
    Heating,
    Cooling,
}

impl SetpointKind {
    /// Register the write command sets for this kind.
    pub fn field(self) -> &'static str {
        match self {
            Self::Heating => HEATING_SETPOINT_FIELD,
            Self::Cooling => COOLING_SETPOINT_FIELD,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingSetpoint {
    pub unit_id: UnitId,
    pub kind: SetpointKind,
    pub value: f64,
}

/// Producer side. Cheap to clone; safe to use from any thread.
#[derive(Debug, Clone)]
pub struct SetpointHandle {
    heating: mpsc::UnboundedSender<PendingSetpoint>,
    cooling: mpsc::UnboundedSender<PendingSetpoint>,
}

/// Consumer side, owned by the background task.
#[derive(Debug)]
pub struct SetpointQueues {
    heating: mpsc::UnboundedReceiver<PendingSetpoint>,
    cooling: mpsc::UnboundedReceiver<PendingSetpoint>,
}

/// Create a connected handle/queue pair.
pub fn channel() -> (SetpointHandle, SetpointQueues) {
    let (heat_tx, heat_rx) = mpsc::unbounded_channel();
    let (cool_tx, cool_rx) = mpsc::unbounded_channel();
    (
        SetpointHandle {
            heating: heat_tx,
            cooling: cool_tx,
        },
        SetpointQueues {
            heating: heat_rx,
            cooling: cool_rx,
        },
    )
}

impl SetpointHandle {
    pub fn queue(&self, kind: SetpointKind, unit_id: UnitId, value: f64) {
        let queue = match kind {
            SetpointKind::Heating => &self.heating,
            SetpointKind::Cooling => &self.cooling,
        };
        if queue
            .send(PendingSetpoint {
                unit_id,
                kind,
                value,
            })
            .is_err()
        {
            debug!(%kind, "setpoint dropped, engine is gone");
        }
    }
}

impl PlatformProtocol for SetpointHandle {
    fn set_heating_setpoint(&self, unit: &UnitId, value: f64) {
        self.queue(SetpointKind::Heating, unit.clone(), value);
    }

    fn set_cooling_setpoint(&self, unit: &UnitId, value: f64) {
        self.queue(SetpointKind::Cooling, unit.clone(), value);
    }
}

impl SetpointQueues {
    /// Take everything queued so far, merged into one update map per unit.
    ///
    /// Heating is drained before cooling; within a queue later entries for
    /// the same field overwrite earlier ones. Units keep first-seen order.
    pub fn drain(&mut self) -> IndexMap<UnitId, Map<String, Value>> {
        let mut updates: IndexMap<UnitId, Map<String, Value>> = IndexMap::new();
        for queue in [&mut self.heating, &mut self.cooling] {
            while let Ok(pending) = queue.try_recv() {
                updates
                    .entry(pending.unit_id)
                    .or_default()
                    .insert(pending.kind.field().to_owned(), Value::from(pending.value));
            }
        }
        updates
    }
}
