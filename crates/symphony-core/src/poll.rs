// ── Polling / command cycle ──
//
// One pass over the registry: drain queued setpoints, then for each unit
// send its pending write (if any) followed by a read. Strictly one
// outstanding request at a time. A frame only counts as the reply when its
// `rsp` kind and `awlid` answer that request; leftovers from a request that
// already timed out are dropped.

use std::time::Duration;

use serde::Serialize;
use symphony_api::protocol::{self, ReadResponse, Request, ResponseHeader};
use symphony_api::StreamingTransport;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::CoreError;
use crate::model::UnitRecord;
use crate::registry::UnitRegistry;
use crate::setpoint::SetpointQueues;
use crate::transaction::TransactionCounter;

/// Outcome of one cycle, for logging and observers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub units: usize,
    pub writes: usize,
    pub reads: usize,
    pub failures: usize,
    /// Setpoints addressed to units that are not registered.
    pub dropped_setpoints: usize,
}

/// Everything a cycle needs, borrowed from the session for its duration.
pub struct Cycle<'a> {
    pub transport: &'a mut dyn StreamingTransport,
    pub session_id: &'a str,
    pub counter: &'a TransactionCounter,
    pub registry: &'a UnitRegistry,
    pub receive_timeout: Duration,
    pub verbose: bool,
}

impl Cycle<'_> {
    /// Run one cycle.
    ///
    /// Per-unit failures are logged and counted; the cycle only fails as a
    /// whole when the transport is gone, since no later unit can succeed.
    pub async fn run(mut self, queues: &mut SetpointQueues) -> Result<CycleReport, CoreError> {
        let mut updates = queues.drain();
        let mut report = CycleReport::default();

        updates.retain(|unit, fields| {
            let known = self.registry.contains(unit);
            if !known {
                warn!(%unit, fields = fields.len(), "setpoint for an unknown unit, dropping");
                report.dropped_setpoints += fields.len();
            }
            known
        });

        for record in self.registry.all() {
            report.units += 1;
            let pending = updates.shift_remove(&record.unit_id);
            let wrote = pending.is_some();

            match self.poll_unit(&record, pending).await {
                Ok(()) => {
                    report.reads += 1;
                    report.writes += usize::from(wrote);
                }
                Err(e) => {
                    report.failures += 1;
                    warn!(unit = %record.unit_id, error = %e, "unit poll failed");
                    if e.is_transport_failure() || !self.transport.is_connected() {
                        return Err(CoreError::ConnectionFailed {
                            reason: format!("stream lost during cycle: {e}"),
                        });
                    }
                }
            }
        }

        debug!(?report, "cycle complete");
        Ok(report)
    }

    async fn poll_unit(
        &mut self,
        record: &UnitRecord,
        pending: Option<serde_json::Map<String, serde_json::Value>>,
    ) -> Result<(), CoreError> {
        if let Some(fields) = pending.filter(|f| !f.is_empty()) {
            let request = Request::write(self.session_id, self.counter.next(), &record.awl_id, fields);
            let ack = self.exchange(&request).await?;
            debug!(unit = %record.unit_id, %ack, "write acknowledged");
        }

        let request = Request::read(self.session_id, self.counter.next(), &record.awl_id);
        let reply = self.exchange(&request).await?;
        let read: ReadResponse = protocol::decode::<ReadResponse>(&reply)?.check()?;
        self.registry.apply_read(&record.unit_id, read);
        Ok(())
    }

    async fn exchange(&mut self, request: &Request) -> Result<String, CoreError> {
        exchange(&mut *self.transport, request, self.receive_timeout, self.verbose).await
    }
}

/// Send one command and wait for the frame that answers it.
///
/// Frames already buffered are dropped before sending. Frames that arrive
/// while waiting but answer some other command are skipped; the deadline
/// covers the whole wait.
pub(crate) async fn exchange(
    transport: &mut dyn StreamingTransport,
    request: &Request,
    timeout: Duration,
    verbose: bool,
) -> Result<String, CoreError> {
    let stale = transport.discard_pending();
    if stale > 0 {
        debug!(tid = request.tid, stale, "dropped unanswered frames");
    }

    let payload = request.to_payload()?;
    if verbose {
        debug!(tid = request.tid, %payload, "stream >>");
    }
    transport.send(payload).await?;

    let deadline = Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(timed_out(timeout));
        }
        let reply = match transport.receive(remaining).await {
            Ok(reply) => reply,
            Err(symphony_api::Error::Timeout { .. }) => return Err(timed_out(timeout)),
            Err(e) => return Err(e.into()),
        };
        if verbose {
            debug!(tid = request.tid, %reply, "stream <<");
        }

        match protocol::decode::<ResponseHeader>(&reply) {
            Ok(header) if request.is_answered_by(&header) => return Ok(reply),
            Ok(header) => warn!(
                cmd = request.cmd.as_str(),
                tid = request.tid,
                rsp = %header.rsp,
                awlid = ?header.awl_id,
                "frame does not answer the outstanding command, skipping"
            ),
            Err(e) => warn!(tid = request.tid, error = %e, "undecodable frame, skipping"),
        }
    }
}

fn timed_out(timeout: Duration) -> CoreError {
    CoreError::Timeout {
        timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
    }
}
